//! Flash-loan liquidation operator
//!
//! Runs one configured liquidation against a forked ledger:
//! - Loads the operator config and the fork snapshot (optionally refreshed
//!   from an archive node)
//! - Executes borrow, liquidate, swap, repay and the profit check as one
//!   atomic call
//! - Checks the emitted liquidation events against the expected borrower
//! - Writes the caller's profit to the profit file

use anyhow::{bail, Context, Result};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use liquidation_chain::{FileSnapshotSource, ForkSnapshot, Ledger, RpcForkSource, SnapshotSource};
use liquidation_core::config::{config_dir, load_operator_from_env};
use liquidation_core::u256_math::format_units;
use liquidation_core::{Host, LiquidationEventFilter, LiquidationOperator, Settlement, REGISTRY};

/// Environment variable names.
mod env {
    pub const PROFIT_FILE: &str = "PROFIT_FILE";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

const DEFAULT_PROFIT_FILE: &str = "profit.txt";

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,liquidation_core=debug,liquidation_chain=debug"));
    if std::env::var(env::LOG_FORMAT).is_ok_and(|format| format == "json") {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .init();
    }

    let (config, settings) = load_operator_from_env()?;
    let fork = config
        .fork
        .as_ref()
        .context("operator config has no [fork] section")?;

    let snapshot_path = config_dir().join(&fork.snapshot);
    let source: Box<dyn SnapshotSource> = match &fork.rpc_url {
        Some(rpc_url) => {
            let base = ForkSnapshot::from_file(&snapshot_path)?;
            Box::new(RpcForkSource::new(rpc_url.clone(), fork.block, base))
        }
        None => Box::new(FileSnapshotSource::new(snapshot_path)),
    };
    info!(source = %source.describe(), "Loading fork state");
    let snapshot = source.load().await?;
    if snapshot.block != fork.block {
        warn!(
            snapshot = snapshot.block,
            configured = fork.block,
            "Snapshot block differs from configured fork block"
        );
    }
    let mut ledger = Ledger::from_snapshot(&snapshot)?;

    info!(
        block = ledger.block_number(),
        operator = %settings.address,
        caller = %settings.caller,
        borrower = %settings.borrower,
        debt = %REGISTRY.symbol(&settings.debt_asset),
        collateral = %REGISTRY.symbol(&settings.collateral_asset),
        "Starting liquidation"
    );

    let caller = settings.caller;
    let starting = settings.settlement.reference().balance_of(&ledger, caller);
    let filter = LiquidationEventFilter::new(settings.lending_pool, settings.borrower);
    let operator = LiquidationOperator::new(settings);

    let report = match operator.operate(&mut ledger) {
        Ok(report) => report,
        Err(err) => bail!("liquidation failed ({}): {err}", err.reason_code()),
    };

    let liquidations = filter.verify(&report.logs)?;
    for record in &liquidations {
        info!(
            user = %record.user,
            debt_to_cover = %record.debt_to_cover,
            collateral = %record.liquidated_collateral_amount,
            liquidator = %record.liquidator,
            "Liquidation event"
        );
    }

    let ending = operator.settings().settlement.reference().balance_of(&ledger, caller);
    if ending <= starting {
        bail!("no profit: balance {ending} <= {starting}");
    }
    let profit = ending - starting;
    let (decimals, unit) = match operator.settings().settlement {
        Settlement::Native { .. } => (18, "ETH".to_string()),
        Settlement::Token { asset } => (REGISTRY.decimals(&asset).unwrap_or(18), REGISTRY.symbol(&asset)),
    };
    let profit_display = format_units(profit, decimals);

    let profit_file = std::env::var(env::PROFIT_FILE).unwrap_or_else(|_| DEFAULT_PROFIT_FILE.to_string());
    tokio::fs::write(&profit_file, &profit_display)
        .await
        .with_context(|| format!("failed to write {profit_file}"))?;

    info!(
        profit = %profit_display,
        stages = ?report.stages,
        file = %profit_file,
        "Profit recorded"
    );
    println!("Profit: {profit_display} {unit}");

    Ok(())
}

fn print_banner() {
    println!(r#"
    ╦  ┬┌─┐ ┬ ┬┬┌┬┐┌─┐┌┬┐┌─┐┬─┐
    ║  ││─┼┐│ ││ ││├─┤ │ │ │├┬┘
    ╩═╝┴└─┘└└─┘┴─┴┘┴ ┴ ┴ └─┘┴└─
    Flash-loan Liquidation Operator v0.1.0
    "#);
}
