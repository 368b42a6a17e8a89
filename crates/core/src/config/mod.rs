//! Operator configuration.
//!
//! This module provides:
//! - The TOML file layout (`operator`)
//! - Resolution into typed settings and env-driven loading (`loader`)

mod loader;
mod operator;

pub use operator::{
    expand_env, FlashLoanKind, FlashLoanSection, ForkSection, LiquidationSection, OperatorConfig,
    OperatorSection, RouteHopConfig, SettlementSection, SwapSection, TargetSection,
};

pub use loader::{
    config_dir, load_operator, load_operator_from_env, OperatorSettings, Settlement,
    DEFAULT_CONFIG_FILE,
};
