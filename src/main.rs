use std::{fs::File, io::Write, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use ethers_core::types::H160;
use ethers_providers::{Http, Middleware, Provider};
use tracing::{error, info, warn, Level};
use uniswap_pool_ledger::{
    balances::BalanceBook,
    config::Settings,
    display::{is_connected, status_text, PoolSummary},
    ledger::ExpiryPolicy,
    removal::{contextual_info, submit_removal, RemovalPlan, RemovalPreview},
    requests::{refresh_book, ChainClient, ChainRead},
    tracker::{spawn_ledger, ConfirmationWatcher},
    types::PoolReportJson,
    utils::{checksum_address, parse_address},
};

#[derive(Parser, Debug)]
#[clap(version)]
struct Args {
    #[clap(long, env)]
    rpc_url: String,

    /// Exchange contract to report on; repeatable.
    #[clap(long, required = true)]
    exchange: Vec<String>,

    /// Wallet whose liquidity is shown and, with --remove, burned.
    #[clap(long, env)]
    account: Option<String>,

    #[clap(long, default_value_t = 1)]
    network_id: u64,

    /// Liquidity tokens to remove from the first exchange.
    #[clap(long)]
    remove: Option<String>,

    /// Send the removal instead of only sizing it.
    #[clap(long)]
    submit: bool,

    #[clap(long, default_value_t = 200)]
    slippage_bps: u64,

    #[clap(long, default_value_t = 250)]
    estimate_slippage_bps: u64,

    #[clap(long, default_value_t = 300)]
    deadline_offset_secs: u64,

    #[clap(long, default_value_t = 4000)]
    poll_interval_ms: u64,

    #[clap(long)]
    pending_expiry_secs: Option<u64>,

    #[clap(long, default_value = "output.json")]
    output: String,
}

impl Args {
    fn settings(&self) -> Settings {
        Settings {
            network_id: self.network_id,
            submit_slippage_bps: self.slippage_bps,
            estimate_slippage_bps: self.estimate_slippage_bps,
            deadline_offset_secs: self.deadline_offset_secs,
            receipt_poll_interval_ms: self.poll_interval_ms,
            pending_expiry_secs: self.pending_expiry_secs,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
    let args: Args = Args::parse();
    let settings = args.settings();

    let provider = Provider::<Http>::try_from(args.rpc_url.as_str())?;
    let network_id = provider.get_chainid().await?.as_u64();
    let client = ChainClient::new(Arc::new(provider));

    let account = args.account.as_deref().and_then(parse_address);
    if !is_connected(args.account.as_deref(), Some(network_id), settings.network_id) {
        warn!(
            "not connected: account {:?}, network {} (expected {})",
            args.account, network_id, settings.network_id
        );
    }

    let exchanges = args
        .exchange
        .iter()
        .map(|text| parse_address(text).ok_or_else(|| anyhow!("invalid exchange address {text}")))
        .collect::<Result<Vec<H160>>>()?;

    let mut book = BalanceBook::new();
    refresh_book(&client, &mut book, &exchanges, account).await?;
    let block_timestamp = client.latest_block_timestamp().await?;

    let reports = pool_reports(&book, account, &exchanges, block_timestamp);
    info!("pools reported: {}", reports.len());

    let json_data = serde_json::to_string_pretty(&reports);
    match json_data {
        Ok(json_string) => {
            if let Err(err) = File::create(&args.output)
                .and_then(|mut file| file.write_all(json_string.as_bytes()))
            {
                error!("Error writing to file: {}", err);
            }
        }
        Err(err) => error!("Error serializing to JSON: {}", err),
    }

    if let Some(input) = args.remove.as_deref() {
        let account = account.context("--remove needs a valid --account")?;
        let exchange = exchanges[0];
        run_removal(&client, &book, account, exchange, input, &settings, args.submit).await?;
    }

    Ok(())
}

pub fn pool_reports(
    book: &BalanceBook,
    account: Option<H160>,
    exchanges: &[H160],
    block_timestamp: u64,
) -> Vec<PoolReportJson> {
    exchanges
        .iter()
        .filter_map(|exchange| book.snapshot(*exchange).ok())
        .map(|snapshot| {
            let summary = PoolSummary::build(book, account, snapshot.token_address);
            PoolReportJson {
                exchange_address: checksum_address(&snapshot.exchange_address),
                token_address: checksum_address(&snapshot.token_address),
                token_symbol: summary.label.clone(),
                eth_reserve: snapshot.eth_reserve.to_string(),
                token_reserve: snapshot.token_reserve.to_string(),
                total_supply: snapshot.total_supply.to_string(),
                exchange_rate: summary.exchange_rate,
                pool_size: summary.pool_size,
                pool_share: summary.share_percent,
                owned: summary.owned,
                balance_hint: summary.balance_hint,
                block_timestamp,
            }
        })
        .collect()
}

async fn run_removal<M: Middleware + 'static>(
    client: &ChainClient<M>,
    book: &BalanceBook,
    account: H160,
    exchange: H160,
    input: &str,
    settings: &Settings,
    submit: bool,
) -> Result<()> {
    let snapshot = book.snapshot(exchange)?;
    let label = book
        .token_info(snapshot.token_address)
        .map(|info| info.symbol.clone())
        .unwrap_or_default();
    let liquidity = book.get_balance(account, Some(exchange))?;

    let preview = RemovalPreview::build(input, snapshot, &label, settings.estimate_slippage_bps)?;
    info!("estimated output: {}", preview.output_line());
    for line in preview.detail_lines() {
        info!("{}", line);
    }

    let plan = match RemovalPlan::build(input, snapshot, &liquidity, settings.submit_slippage_bps) {
        Ok(plan) => plan,
        Err(err) => {
            if let Some(context) = contextual_info(Some(&label), input, Some(&err)) {
                error!("{}", context.message);
            }
            return Err(err.into());
        }
    };
    info!(
        "removeLiquidity(amount={}, min_eth={}, min_tokens={})",
        plan.amount, plan.min_eth, plan.min_tokens
    );

    if !submit {
        info!("dry run, pass --submit to send");
        return Ok(());
    }

    let (ledger, ledger_task) = spawn_ledger(ExpiryPolicy {
        max_pending_age: settings.pending_expiry(),
    });
    let id = submit_removal(client, &ledger, account, &plan, settings).await?;
    info!("{} ({})", status_text(None, &ledger.snapshot()), id.explorer_link());

    let watcher = ConfirmationWatcher::new(client.clone(), ledger.clone(), settings.receipt_poll_interval());
    watcher.run_until_settled().await?;
    info!("{}", status_text(Some(&checksum_address(&account)), &ledger.snapshot()));

    drop(watcher);
    drop(ledger);
    let ledger = ledger_task.await?;
    for entry in ledger.history() {
        info!("{} {:?}", entry.id, entry.status);
    }

    Ok(())
}
