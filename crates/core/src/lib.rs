//! Liquidation operator core logic.
//!
//! This crate provides the flash-loan funded liquidation pipeline:
//! - Fixed-point math matching the lending protocol's rounding
//! - Position valuation and liquidation quotes
//! - Constant-product swap routing
//! - Flash-loan terms and the profit guard
//! - The staged operator and its configuration
//!
//! All state is reached through the `Host` trait; this crate performs no I/O
//! beyond reading its config file.

mod assets;
pub mod config;
mod error;
pub mod events;
mod flash_loan;
mod host;
mod operator;
mod position;
mod profit;
mod reader;
pub mod router;
pub mod u256_math;
pub mod valuation;

pub use assets::{Asset, AssetRegistry, ASSETS, DAI, REGISTRY, USDC, USDT, WBTC, WETH};
pub use config::{OperatorConfig, OperatorSettings, Settlement};
pub use error::{LedgerError, OperatorError, ProtocolRevert, Result, ValuationError};
pub use events::{EventCheckError, EventSignatures, LiquidationEventFilter, LiquidationRecord};
pub use flash_loan::{FlashLoanSource, FlashLoanTerms};
pub use host::{Host, LiquidationCall, LiquidationReceipt};
pub use operator::{ExecutionPlan, ExecutionReport, LiquidationOperator, Stage, StageMachine};
pub use position::{CollateralData, DebtData, Position, ReserveConfig};
pub use profit::{AssetFlows, Flow, FlowKind, FlowLedger, ProfitLedger, ReferenceAsset};
pub use reader::ReserveReader;
pub use router::{PairReserves, ReserveOverlay, SwapHop, SwapQuote, SwapRoute, SwapRouter};
pub use valuation::{DebtToCover, LiquidationParams, LiquidationQuote};
