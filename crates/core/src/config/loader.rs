//! Resolves the raw operator file into typed settings.

use alloy::primitives::Address;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use super::operator::{
    FlashLoanKind, OperatorConfig, RouteHopConfig, SettlementSection,
};
use crate::assets::REGISTRY;
use crate::flash_loan::FlashLoanSource;
use crate::profit::ReferenceAsset;
use crate::router::{SwapHop, SwapRoute};
use crate::valuation::DebtToCover;

/// Default config file name inside the config directory.
pub const DEFAULT_CONFIG_FILE: &str = "operator.toml";

/// Form in which the profit reaches the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// Unwrap the wrapped native token and send native balance
    Native { wrapped: Address },
    /// Transfer the token as is
    Token { asset: Address },
}

impl Settlement {
    /// Token the payout route must end in.
    pub fn token(&self) -> Address {
        match self {
            Self::Native { wrapped } => *wrapped,
            Self::Token { asset } => *asset,
        }
    }

    /// Asset the caller's profit is measured in.
    pub fn reference(&self) -> ReferenceAsset {
        match self {
            Self::Native { .. } => ReferenceAsset::Native,
            Self::Token { asset } => ReferenceAsset::Token(*asset),
        }
    }
}

/// Everything the operator needs, fixed before the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorSettings {
    pub name: String,
    /// Operator contract; holds funds only during the call
    pub address: Address,
    /// Invoking account; receives the profit
    pub caller: Address,
    pub lending_pool: Address,
    pub borrower: Address,
    pub debt_asset: Address,
    pub collateral_asset: Address,
    pub debt_to_cover: DebtToCover,
    pub close_factor_cap_bps: Option<u16>,
    pub receive_a_token: bool,
    pub flash_loan: FlashLoanSource,
    pub collateral_route: SwapRoute,
    pub payout_route: SwapRoute,
    pub payout_slippage_bps: u16,
    pub settlement: Settlement,
}

impl OperatorConfig {
    /// Resolve symbols, parse amounts and check that the routes connect
    /// the collateral, debt and settlement assets.
    pub fn resolve(&self) -> Result<OperatorSettings> {
        let debt_asset = resolve_asset(&self.target.debt_asset)?;
        let collateral_asset = resolve_asset(&self.target.collateral_asset)?;
        let debt_to_cover = DebtToCover::parse(&self.target.debt_to_cover)
            .with_context(|| format!("invalid debt_to_cover {:?}", self.target.debt_to_cover))?;

        let settlement = match &self.settlement {
            SettlementSection::Native { wrapped } => Settlement::Native {
                wrapped: resolve_asset(wrapped)?,
            },
            SettlementSection::Token { asset } => Settlement::Token {
                asset: resolve_asset(asset)?,
            },
        };

        let flash_loan = match self.flash_loan.kind {
            FlashLoanKind::LendingPool => FlashLoanSource::LendingPool {
                pool: self.flash_loan.address,
            },
            FlashLoanKind::Pair => FlashLoanSource::Pair {
                pair: self.flash_loan.address,
            },
        };

        let collateral_route = resolve_route(&self.swap.collateral_route)
            .context("invalid collateral route")?;
        check_route_ends(&collateral_route, collateral_asset, debt_asset)
            .context("invalid collateral route")?;

        let payout_route =
            resolve_route(&self.swap.payout_route).context("invalid payout route")?;
        check_route_ends(&payout_route, debt_asset, settlement.token())
            .context("invalid payout route")?;

        if let FlashLoanSource::Pair { pair } = flash_loan {
            if collateral_route.uses_pair(pair) || payout_route.uses_pair(pair) {
                bail!("flash loan pair {pair} cannot also be a swap hop: it is locked until repaid");
            }
        }
        if self.swap.payout_slippage_bps > 10_000 {
            bail!("payout_slippage_bps {} exceeds 10000", self.swap.payout_slippage_bps);
        }
        if let Some(cap) = self.liquidation.close_factor_bps {
            if cap == 0 || cap > 10_000 {
                bail!("close_factor_bps {} outside 1..=10000", cap);
            }
        }
        if self.liquidation.receive_a_token {
            bail!("receive_a_token is not supported: the collateral must be swapped");
        }

        Ok(OperatorSettings {
            name: self.operator.name.clone(),
            address: self.operator.address,
            caller: self.operator.caller,
            lending_pool: self.target.lending_pool,
            borrower: self.target.borrower,
            debt_asset,
            collateral_asset,
            debt_to_cover,
            close_factor_cap_bps: self.liquidation.close_factor_bps,
            receive_a_token: self.liquidation.receive_a_token,
            flash_loan,
            collateral_route,
            payout_route,
            payout_slippage_bps: self.swap.payout_slippage_bps,
            settlement,
        })
    }
}

fn resolve_asset(value: &str) -> Result<Address> {
    REGISTRY
        .resolve(value)
        .with_context(|| format!("unknown asset {value:?}"))
}

fn resolve_route(hops: &[RouteHopConfig]) -> Result<SwapRoute> {
    let hops = hops
        .iter()
        .map(|hop| {
            Ok(SwapHop {
                pair: hop.pair,
                token_in: resolve_asset(&hop.token_in)?,
                token_out: resolve_asset(&hop.token_out)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;
    SwapRoute::new(hops).map_err(anyhow::Error::msg)
}

/// An empty route is only valid when no conversion is needed.
fn check_route_ends(route: &SwapRoute, from: Address, to: Address) -> Result<()> {
    if route.is_empty() {
        if from != to {
            bail!("no route from {from} to {to}");
        }
        return Ok(());
    }
    if route.token_in() != Some(from) || route.token_out() != Some(to) {
        bail!(
            "route runs {:?} -> {:?}, expected {from} -> {to}",
            route.token_in(),
            route.token_out()
        );
    }
    Ok(())
}

/// Config directory: `CONFIG_DIR` or `./config`.
pub fn config_dir() -> PathBuf {
    std::env::var("CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"))
}

/// Load and resolve a config file.
pub fn load_operator(path: impl AsRef<Path>) -> Result<(OperatorConfig, OperatorSettings)> {
    let path = path.as_ref();
    let config = OperatorConfig::from_file(path)
        .with_context(|| format!("Failed to load operator config from {:?}", path))?;
    let settings = config.resolve()?;
    info!(
        operator = %settings.name,
        borrower = %settings.borrower,
        debt = %REGISTRY.symbol(&settings.debt_asset),
        collateral = %REGISTRY.symbol(&settings.collateral_asset),
        "Operator configuration loaded"
    );
    Ok((config, settings))
}

/// Load the config named by `OPERATOR_CONFIG` (default `operator.toml`)
/// from the config directory.
pub fn load_operator_from_env() -> Result<(OperatorConfig, OperatorSettings)> {
    let file = std::env::var("OPERATOR_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
    load_operator(config_dir().join(file))
}
