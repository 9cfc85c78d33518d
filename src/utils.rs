use std::str::FromStr;

use ethers_core::{types::H160, utils::to_checksum};

pub const DISCONNECTED: &str = "Disconnected";
const ADDRESS_LEN: usize = 42;

/// `0x` (either case) followed only by hex digits.
pub fn is_hex_strict(text: &str) -> bool {
    let digits = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(digits) => digits,
        None => return false,
    };
    digits.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Accepts any-case 42-character hex addresses; everything else is `None`.
pub fn parse_address(text: &str) -> Option<H160> {
    if text.len() != ADDRESS_LEN || !is_hex_strict(text) {
        return None;
    }
    H160::from_str(&text[2..]).ok()
}

pub fn checksum_address(address: &H160) -> String {
    to_checksum(address, None)
}

/// `0x1234…abcd` from the checksum form.
pub fn shorten_address(address: &H160) -> String {
    let checksummed = checksum_address(address);
    format!("{}…{}", &checksummed[..6], &checksummed[ADDRESS_LEN - 4..])
}

/// What the wallet badge shows for a possibly missing or malformed account.
pub fn display_address(account: Option<&str>) -> String {
    match account.and_then(parse_address) {
        Some(address) => shorten_address(&address),
        None => DISCONNECTED.to_string(),
    }
}
