//! Operator configuration file (`config/operator.toml`).
//!
//! Addresses are hex strings. Asset fields also accept a registry symbol
//! ("WBTC"). Amounts are decimal strings in the asset's minimal unit and
//! may use `_` separators.

use alloy::primitives::Address;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

/// Top-level operator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorConfig {
    pub operator: OperatorSection,
    pub target: TargetSection,
    #[serde(default)]
    pub liquidation: LiquidationSection,
    pub flash_loan: FlashLoanSection,
    #[serde(default)]
    pub swap: SwapSection,
    pub settlement: SettlementSection,
    #[serde(default)]
    pub fork: Option<ForkSection>,
}

/// Identity of the operator contract and of the account that invokes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperatorSection {
    /// Name (for logging/identification)
    #[serde(default = "default_name")]
    pub name: String,
    /// Operator contract address
    pub address: Address,
    /// Account calling `operate`; receives the profit
    pub caller: Address,
}

fn default_name() -> String {
    "liquidation-operator".to_string()
}

/// The position to liquidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSection {
    /// Lending pool contract
    pub lending_pool: Address,
    /// Borrower whose position is liquidated
    pub borrower: Address,
    /// Asset repaid on the borrower's behalf
    pub debt_asset: String,
    /// Asset seized
    pub collateral_asset: String,
    /// "max" or an amount of the debt asset
    #[serde(default = "default_debt_to_cover")]
    pub debt_to_cover: String,
}

fn default_debt_to_cover() -> String {
    "max".to_string()
}

/// Liquidation call options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiquidationSection {
    /// Cap on the share of the debt repaid, applied on top of the pool's
    /// own close factor (basis points)
    #[serde(default)]
    pub close_factor_bps: Option<u16>,
    /// Take the receipt token instead of the underlying collateral
    #[serde(default)]
    pub receive_a_token: bool,
}

/// Flash-loan source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlashLoanKind {
    LendingPool,
    Pair,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashLoanSection {
    pub kind: FlashLoanKind,
    /// Pool or pair address
    pub address: Address,
}

/// One hop of a configured route.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteHopConfig {
    pub pair: Address,
    pub token_in: String,
    pub token_out: String,
}

/// Swap routes and tolerances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapSection {
    /// Collateral asset -> debt asset
    #[serde(default)]
    pub collateral_route: Vec<RouteHopConfig>,
    /// Debt asset -> settlement asset
    #[serde(default)]
    pub payout_route: Vec<RouteHopConfig>,
    /// Accepted shortfall of the payout swap against the oracle value
    /// (basis points)
    #[serde(default = "default_payout_slippage_bps")]
    pub payout_slippage_bps: u16,
}

fn default_payout_slippage_bps() -> u16 {
    100
}

impl Default for SwapSection {
    fn default() -> Self {
        Self {
            collateral_route: Vec::new(),
            payout_route: Vec::new(),
            payout_slippage_bps: default_payout_slippage_bps(),
        }
    }
}

/// Form in which the profit reaches the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SettlementSection {
    /// Unwrap to the native asset
    Native { wrapped: String },
    /// Transfer a token
    Token { asset: String },
}

/// Where the fork state comes from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkSection {
    /// Snapshot fixture, relative to the config directory
    pub snapshot: String,
    /// Archive node used to refresh the snapshot (optional)
    #[serde(default)]
    pub rpc_url: Option<String>,
    /// Fork block
    pub block: u64,
}

impl OperatorConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let mut config: Self = toml::from_str(content)?;
        config.expand_env_vars();
        Ok(config)
    }

    /// Expand environment variables in config values.
    pub fn expand_env_vars(&mut self) {
        if let Some(fork) = self.fork.as_mut() {
            fork.rpc_url = fork
                .rpc_url
                .as_deref()
                .map(expand_env)
                .filter(|url| !url.is_empty() && !url.contains("${"));
        }
    }
}

static ENV_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").ok());

/// Expand ${VAR_NAME} patterns with environment variable values.
/// Unset variables are left as written.
pub fn expand_env(s: &str) -> String {
    let Some(re) = ENV_PATTERN.as_ref() else {
        return s.to_string();
    };
    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            if let Ok(value) = std::env::var(var_match.as_str()) {
                result = result.replace(full_match.as_str(), &value);
            }
        }
    }
    result
}

#[cfg(test)]
pub(crate) const SAMPLE_CONFIG: &str = r#"
[operator]
name = "sample"
address = "0x5FbDB2315678afecb367f032d93F642f64180aa3"
caller = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"

[target]
lending_pool = "0x7d2768dE32b0b80b7a3454c06BdAc94A69DDc7A9"
borrower = "0x59CE4a2AC5bC3f5F225439B2993b86B42f6D3e9F"
debt_asset = "USDT"
collateral_asset = "WBTC"
debt_to_cover = "2_916_378_221_684"

[flash_loan]
kind = "lending-pool"
address = "0x7d2768dE32b0b80b7a3454c06BdAc94A69DDc7A9"

[[swap.collateral_route]]
pair = "0xBb2b8038a1640196FbE3e38816F3e67Cba72D940"
token_in = "WBTC"
token_out = "WETH"

[[swap.collateral_route]]
pair = "0x0d4a11d5EEaaC28EC3F61d100daF4d40471f1852"
token_in = "WETH"
token_out = "USDT"

[[swap.payout_route]]
pair = "0x0d4a11d5EEaaC28EC3F61d100daF4d40471f1852"
token_in = "USDT"
token_out = "WETH"

[settlement]
kind = "native"
wrapped = "WETH"

[fork]
snapshot = "fork/sample.toml"
rpc_url = "${OPERATOR_CONFIG_TEST_RPC}"
block = 12489619
"#;
