use std::collections::HashMap;

use ethers_core::types::{H160, U256};
use tracing::debug;

use crate::{
    error::{CoreError, Result},
    fixed::{self, Fraction},
    types::{AddressRole, BalanceRecord, ReserveSnapshot, TokenInfo, ETH_DECIMALS},
};

#[derive(Debug, Clone, Default)]
pub struct BalanceBook {
    exchange_by_token: HashMap<H160, H160>,
    snapshots: HashMap<H160, ReserveSnapshot>,
    tokens: HashMap<H160, TokenInfo>,
    eth_balances: HashMap<H160, U256>,
    token_balances: HashMap<(H160, H160), U256>,
}

/// A holder's claim on one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolShare {
    pub ownership: Fraction,
    pub owned_eth: U256,
    pub owned_token: U256,
    pub token_decimals: u8,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces the snapshot for an exchange, also recording the
    /// token -> exchange mapping.
    pub fn apply_snapshot(&mut self, snapshot: ReserveSnapshot) {
        debug!(
            exchange = ?snapshot.exchange_address,
            token = ?snapshot.token_address,
            "applying reserve snapshot"
        );
        self.exchange_by_token
            .insert(snapshot.token_address, snapshot.exchange_address);
        self.snapshots.insert(snapshot.exchange_address, snapshot);
    }

    /// Forgets an exchange whose reserves could not be refreshed.
    pub fn remove_snapshot(&mut self, exchange: H160) -> Option<ReserveSnapshot> {
        let snapshot = self.snapshots.remove(&exchange)?;
        if self.exchange_by_token.get(&snapshot.token_address) == Some(&exchange) {
            self.exchange_by_token.remove(&snapshot.token_address);
        }
        Some(snapshot)
    }

    /// Token metadata is immutable on-chain, so the first value wins.
    pub fn cache_token(&mut self, info: TokenInfo) {
        self.tokens.entry(info.address).or_insert(info);
    }

    pub fn token_info(&self, token: H160) -> Option<&TokenInfo> {
        self.tokens.get(&token)
    }

    pub fn set_eth_balance(&mut self, owner: H160, value: U256) {
        self.eth_balances.insert(owner, value);
    }

    pub fn set_token_balance(&mut self, owner: H160, token: H160, value: U256) {
        self.token_balances.insert((owner, token), value);
    }

    pub fn exchange_for(&self, token: H160) -> Result<H160> {
        self.exchange_by_token
            .get(&token)
            .copied()
            .ok_or(CoreError::missing_exchange(token))
    }

    pub fn snapshot(&self, exchange: H160) -> Result<&ReserveSnapshot> {
        self.snapshots
            .get(&exchange)
            .ok_or(CoreError::MissingSnapshot {
                what: "exchange",
                address: exchange,
            })
    }

    pub fn snapshot_for_token(&self, token: H160) -> Result<&ReserveSnapshot> {
        self.snapshot(self.exchange_for(token)?)
    }

    pub fn role_of(&self, address: H160) -> AddressRole {
        match self.snapshots.get(&address) {
            Some(snapshot) => AddressRole::PoolReserve {
                exchange: snapshot.exchange_address,
                token: snapshot.token_address,
            },
            None => AddressRole::HolderBalance,
        }
    }

    /// Balance of `owner` in `token`, or in ETH when `token` is `None`.
    pub fn get_balance(&self, owner: H160, token: Option<H160>) -> Result<BalanceRecord> {
        match self.role_of(owner) {
            AddressRole::PoolReserve { exchange, token: pool_token } => {
                let snapshot = self.snapshot(exchange)?;
                match token {
                    None => Ok(BalanceRecord::eth(snapshot.eth_reserve)),
                    Some(token) if token == exchange => Ok(BalanceRecord::eth(snapshot.eth_reserve)),
                    Some(token) if token == pool_token => {
                        let info = self.token_info_or_snapshot(snapshot);
                        Ok(BalanceRecord::token(snapshot.token_reserve, &info))
                    }
                    Some(token) => self.holder_token_balance(owner, token),
                }
            }
            AddressRole::HolderBalance => match token {
                None => self.holder_eth_balance(owner),
                Some(token) if self.snapshots.contains_key(&token) => self
                    .token_balances
                    .get(&(owner, token))
                    .map(|value| BalanceRecord::liquidity(*value))
                    .ok_or(CoreError::MissingSnapshot {
                        what: "liquidity balance",
                        address: owner,
                    }),
                Some(token) => self.holder_token_balance(owner, token),
            },
        }
    }

    /// Same as `get_balance` with the token first.
    pub fn get_token_balance(&self, token: H160, owner: H160) -> Result<BalanceRecord> {
        self.get_balance(owner, Some(token))
    }

    fn holder_eth_balance(&self, owner: H160) -> Result<BalanceRecord> {
        self.eth_balances
            .get(&owner)
            .map(|value| BalanceRecord::eth(*value))
            .ok_or(CoreError::MissingSnapshot {
                what: "eth balance",
                address: owner,
            })
    }

    fn holder_token_balance(&self, owner: H160, token: H160) -> Result<BalanceRecord> {
        let info = self.tokens.get(&token).ok_or(CoreError::MissingSnapshot {
            what: "token metadata",
            address: token,
        })?;
        let value = self
            .token_balances
            .get(&(owner, token))
            .ok_or(CoreError::MissingSnapshot {
                what: "token balance",
                address: owner,
            })?;
        Ok(BalanceRecord::token(*value, info))
    }

    fn token_info_or_snapshot(&self, snapshot: &ReserveSnapshot) -> TokenInfo {
        self.tokens
            .get(&snapshot.token_address)
            .cloned()
            .unwrap_or_else(|| TokenInfo {
                address: snapshot.token_address,
                symbol: String::new(),
                decimals: snapshot.token_decimals,
            })
    }

    /// What `owner` can redeem from the pool trading `token`.
    pub fn pool_share(&self, owner: H160, token: H160) -> Result<PoolShare> {
        let exchange = self.exchange_for(token)?;
        let snapshot = self.snapshot(exchange)?;
        let liquidity = self.get_balance(owner, Some(exchange))?;
        ownership_share(snapshot, liquidity.value)
    }
}

/// `amount / total_supply`, rejected when above one.
pub fn supply_share(snapshot: &ReserveSnapshot, amount: U256, what: &'static str) -> Result<Fraction> {
    let share = Fraction::new(amount, snapshot.total_supply).ok_or(CoreError::DivisionByZero(what))?;
    if !share.is_unit_interval() {
        return Err(CoreError::InconsistentSnapshot {
            held: amount,
            total_supply: snapshot.total_supply,
        });
    }
    Ok(share)
}

/// `liquidity / total_supply` and the reserves it entitles the holder to.
pub fn ownership_share(snapshot: &ReserveSnapshot, liquidity: U256) -> Result<PoolShare> {
    let ownership = supply_share(snapshot, liquidity, "ownership share")?;
    Ok(PoolShare {
        ownership,
        owned_eth: ownership.scale(snapshot.eth_reserve)?,
        owned_token: ownership.scale(snapshot.token_reserve)?,
        token_decimals: snapshot.token_decimals,
    })
}

/// Tokens per ETH with the token side normalized to 18 decimals.
pub fn exchange_rate(snapshot: &ReserveSnapshot) -> Result<Fraction> {
    normalized_token_ratio(snapshot, snapshot.eth_reserve, "exchange rate")
}

/// ETH redeemable per whole liquidity token.
pub fn eth_per_liquidity(snapshot: &ReserveSnapshot) -> Result<Fraction> {
    Fraction::new(snapshot.eth_reserve, snapshot.total_supply)
        .ok_or(CoreError::DivisionByZero("eth per liquidity token"))
}

/// Tokens redeemable per whole liquidity token, in whole-token units.
pub fn token_per_liquidity(snapshot: &ReserveSnapshot) -> Result<Fraction> {
    normalized_token_ratio(snapshot, snapshot.total_supply, "token per liquidity token")
}

/// `token_reserve * 10^(18 - token_decimals) / denom`. Tokens with more than
/// 18 decimals scale the denominator up instead.
fn normalized_token_ratio(
    snapshot: &ReserveSnapshot,
    denom: U256,
    what: &'static str,
) -> Result<Fraction> {
    let (numer, denom) = if snapshot.token_decimals <= ETH_DECIMALS {
        let shift = (ETH_DECIMALS - snapshot.token_decimals) as u32;
        let numer = snapshot
            .token_reserve
            .checked_mul(fixed::pow10(shift)?)
            .ok_or(CoreError::Overflow("normalized token reserve"))?;
        (numer, denom)
    } else {
        let shift = (snapshot.token_decimals - ETH_DECIMALS) as u32;
        let denom = denom
            .checked_mul(fixed::pow10(shift)?)
            .ok_or(CoreError::Overflow("normalized token reserve"))?;
        (snapshot.token_reserve, denom)
    };
    Fraction::new(numer, denom).ok_or(CoreError::DivisionByZero(what))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(n: u64, decimals: u32) -> U256 {
        U256::from(n) * U256::exp10(decimals as usize)
    }

    fn addr(byte: u8) -> H160 {
        H160::repeat_byte(byte)
    }

    fn book() -> BalanceBook {
        let mut book = BalanceBook::new();
        book.apply_snapshot(ReserveSnapshot {
            exchange_address: addr(0xee),
            token_address: addr(0x70),
            eth_reserve: units(10, 18),
            token_reserve: units(5000, 6),
            token_decimals: 6,
            total_supply: units(100, 18),
        });
        book.cache_token(TokenInfo {
            address: addr(0x70),
            symbol: "USDC".into(),
            decimals: 6,
        });
        book.set_token_balance(addr(0x01), addr(0xee), units(10, 18));
        book.set_token_balance(addr(0x01), addr(0x70), units(42, 6));
        book.set_eth_balance(addr(0x01), units(3, 18));
        book
    }

    #[test]
    fn exchange_address_resolves_to_pool_reserves() {
        let book = book();
        assert_eq!(
            book.role_of(addr(0xee)),
            AddressRole::PoolReserve {
                exchange: addr(0xee),
                token: addr(0x70)
            }
        );

        let eth = book.get_balance(addr(0xee), None).unwrap();
        assert_eq!(eth, BalanceRecord::eth(units(10, 18)));
        assert_eq!(book.get_balance(addr(0xee), Some(addr(0xee))).unwrap(), eth);

        let token = book.get_balance(addr(0xee), Some(addr(0x70))).unwrap();
        assert_eq!(token.value, units(5000, 6));
        assert_eq!(token.decimals, 6);
        assert_eq!(token.label, "USDC");
    }

    #[test]
    fn wallet_address_resolves_to_holder_balances() {
        let book = book();
        assert_eq!(book.role_of(addr(0x01)), AddressRole::HolderBalance);

        let liquidity = book.get_balance(addr(0x01), Some(addr(0xee))).unwrap();
        assert_eq!(liquidity, BalanceRecord::liquidity(units(10, 18)));

        let token = book.get_token_balance(addr(0x70), addr(0x01)).unwrap();
        assert_eq!(token.to_fixed(2), "42.00");

        assert_eq!(book.get_balance(addr(0x01), None).unwrap().to_fixed(1), "3.0");
    }

    #[test]
    fn unknown_token_is_a_missing_snapshot() {
        let book = book();
        assert!(matches!(
            book.exchange_for(addr(0x99)),
            Err(CoreError::MissingSnapshot { .. })
        ));
        assert!(matches!(
            book.get_balance(addr(0x02), None),
            Err(CoreError::MissingSnapshot { .. })
        ));
    }

    #[test]
    fn queries_are_deterministic() {
        let book = book();
        let a = book.get_balance(addr(0x01), Some(addr(0xee))).unwrap();
        let b = book.get_balance(addr(0x01), Some(addr(0xee))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pool_share_matches_reserves() {
        let share = book().pool_share(addr(0x01), addr(0x70)).unwrap();
        assert_eq!(share.ownership.to_fixed(2), "0.10");
        assert_eq!(share.owned_eth, units(1, 18));
        assert_eq!(share.owned_token, units(500, 6));
        assert!(share.ownership.is_unit_interval());
    }

    #[test]
    fn zero_supply_signals_division_by_zero() {
        let mut book = book();
        let mut snapshot = book.snapshot(addr(0xee)).unwrap().clone();
        snapshot.total_supply = U256::zero();
        book.apply_snapshot(snapshot);

        assert_eq!(
            book.pool_share(addr(0x01), addr(0x70)),
            Err(CoreError::DivisionByZero("ownership share"))
        );
    }

    #[test]
    fn exchange_rate_normalizes_token_decimals() {
        let book = book();
        let snapshot = book.snapshot(addr(0xee)).unwrap();
        assert_eq!(exchange_rate(snapshot).unwrap().to_fixed(4), "500.0000");
        assert_eq!(token_per_liquidity(snapshot).unwrap().to_fixed(2), "50.00");
        assert_eq!(eth_per_liquidity(snapshot).unwrap().to_fixed(2), "0.10");
    }

    #[test]
    fn tokens_above_eighteen_decimals_scale_down() {
        let snapshot = ReserveSnapshot {
            exchange_address: addr(0xe2),
            token_address: addr(0x24),
            eth_reserve: units(10, 18),
            token_reserve: units(5000, 24),
            token_decimals: 24,
            total_supply: units(100, 18),
        };
        assert_eq!(exchange_rate(&snapshot).unwrap().to_fixed(4), "500.0000");
        assert_eq!(token_per_liquidity(&snapshot).unwrap().to_fixed(4), "50.0000");

        let empty = ReserveSnapshot {
            eth_reserve: U256::zero(),
            ..snapshot
        };
        assert_eq!(
            exchange_rate(&empty),
            Err(CoreError::DivisionByZero("exchange rate"))
        );
    }

    #[test]
    fn liquidity_above_supply_is_inconsistent() {
        let mut book = book();
        book.set_token_balance(addr(0x01), addr(0xee), units(200, 18));

        assert_eq!(
            book.pool_share(addr(0x01), addr(0x70)),
            Err(CoreError::InconsistentSnapshot {
                held: units(200, 18),
                total_supply: units(100, 18),
            })
        );
        assert!(ownership_share(book.snapshot(addr(0xee)).unwrap(), units(100, 18))
            .unwrap()
            .ownership
            .is_unit_interval());
    }

    #[test]
    fn removed_snapshot_is_no_longer_served() {
        let mut book = book();
        assert!(book.remove_snapshot(addr(0xee)).is_some());
        assert!(matches!(
            book.snapshot(addr(0xee)),
            Err(CoreError::MissingSnapshot { .. })
        ));
        assert!(book.exchange_for(addr(0x70)).is_err());
        assert!(book.remove_snapshot(addr(0xee)).is_none());
    }
}
