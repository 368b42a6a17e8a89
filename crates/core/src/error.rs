//! Error types for the liquidation operator and the host it runs on.

use alloy::primitives::{Address, U256};
use thiserror::Error;

use crate::host::LiquidationCall;
use crate::operator::Stage;

/// Result type alias for operator calls.
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Revert codes raised by the lending protocol's liquidation logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProtocolRevert {
    #[error("42: health factor not below threshold")]
    HealthFactorNotBelowThreshold,
    #[error("43: collateral cannot be liquidated")]
    CollateralCannotBeLiquidated,
    #[error("44: specified currency not borrowed by user")]
    CurrencyNotBorrowed,
    #[error("45: not enough liquidity to liquidate")]
    NotEnoughLiquidityToLiquidate,
}

impl ProtocolRevert {
    /// Protocol error code string as emitted on revert.
    pub fn code(&self) -> &'static str {
        match self {
            Self::HealthFactorNotBelowThreshold => "42",
            Self::CollateralCannotBeLiquidated => "43",
            Self::CurrencyNotBorrowed => "44",
            Self::NotEnoughLiquidityToLiquidate => "45",
        }
    }
}

/// Why a position cannot be liquidated for the requested pair of assets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValuationError {
    #[error("health factor {health_factor} is not below 1e18")]
    HealthFactorNotBelowThreshold { health_factor: U256 },
    #[error("collateral {0} is not enabled for liquidation")]
    CollateralNotEnabled(Address),
    #[error("debt asset {0} is not borrowed by user")]
    CurrencyNotBorrowed(Address),
    #[error("no seizable collateral for the requested repayment")]
    NoSeizableCollateral,
    #[error("arithmetic overflow in liquidation math")]
    Overflow,
}

impl ValuationError {
    /// Lending-protocol revert equivalent of this valuation failure.
    pub fn as_revert(&self) -> ProtocolRevert {
        match self {
            Self::HealthFactorNotBelowThreshold { .. } => ProtocolRevert::HealthFactorNotBelowThreshold,
            Self::CollateralNotEnabled(_) => ProtocolRevert::CollateralCannotBeLiquidated,
            Self::CurrencyNotBorrowed(_) => ProtocolRevert::CurrencyNotBorrowed,
            Self::NoSeizableCollateral | Self::Overflow => {
                ProtocolRevert::NotEnoughLiquidityToLiquidate
            }
        }
    }
}

/// Failures raised by the host ledger while applying a call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("unknown lending pool {0}")]
    UnknownPool(Address),
    #[error("unknown pair {0}")]
    UnknownPair(Address),
    #[error("reserve {asset} not listed on pool {pool}")]
    UnknownReserve { pool: Address, asset: Address },
    #[error("token {token} not traded by pair {pair}")]
    TokenNotInPair { pair: Address, token: Address },
    #[error("insufficient {token} balance for {holder}: needed {needed}, available {available}")]
    InsufficientBalance {
        token: Address,
        holder: Address,
        needed: U256,
        available: U256,
    },
    #[error("insufficient native balance for {holder}: needed {needed}, available {available}")]
    InsufficientNativeBalance {
        holder: Address,
        needed: U256,
        available: U256,
    },
    #[error("insufficient liquidity of {asset} at {source_address}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        source_address: Address,
        asset: Address,
        requested: U256,
        available: U256,
    },
    #[error("insufficient output amount from {pair}: got {amount_out}, minimum {min_out}")]
    InsufficientOutputAmount {
        pair: Address,
        amount_out: U256,
        min_out: U256,
    },
    #[error("insufficient input amount")]
    InsufficientInputAmount,
    #[error("flash loan of {asset} from {source_address} still outstanding")]
    FlashLoanOutstanding { source_address: Address, asset: Address },
    #[error("no outstanding flash loan of {asset} from {source_address}")]
    FlashLoanNotFound { source_address: Address, asset: Address },
    #[error("{0} is not the wrapped native token")]
    NotWrappedNative(Address),
    #[error("flash loan repayment of {asset}: {repaid} below required {required}")]
    FlashLoanUnderpaid {
        asset: Address,
        required: U256,
        repaid: U256,
    },
    #[error("lending protocol reverted: {0}")]
    Protocol(#[from] ProtocolRevert),
    #[error("arithmetic overflow")]
    Overflow,
}

/// Operator failures. Every variant is fatal to the call and rolls back
/// all state changes made during it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OperatorError {
    #[error("position {user} is not liquidatable: {reason}")]
    NotLiquidatable { user: Address, reason: ValuationError },

    #[error("insufficient liquidity of {asset} at {source_address}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        source_address: Address,
        asset: Address,
        requested: U256,
        available: U256,
    },

    #[error("slippage exceeded: swap returned {amount_out}, required {min_out}")]
    SlippageExceeded { amount_out: U256, min_out: U256 },

    #[error("repayment shortfall: holding {available} of {asset}, owe {required}")]
    RepaymentShortfall {
        asset: Address,
        required: U256,
        available: U256,
    },

    #[error("unprofitable outcome: ending balance {ending} <= starting balance {starting}")]
    UnprofitableOutcome { starting: U256, ending: U256 },

    #[error("invalid stage transition {from:?} -> {to:?}")]
    InvalidTransition { from: Stage, to: Stage },

    #[error("invalid operator configuration: {0}")]
    Config(String),

    #[error("host ledger error during {stage:?}: {source}")]
    Ledger {
        stage: Stage,
        #[source]
        source: LedgerError,
    },
}

impl OperatorError {
    /// Stable reason code exposed to callers of a failed call.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::NotLiquidatable { .. } => "NOT_LIQUIDATABLE",
            Self::InsufficientLiquidity { .. } => "INSUFFICIENT_LIQUIDITY",
            Self::SlippageExceeded { .. } => "SLIPPAGE_EXCEEDED",
            Self::RepaymentShortfall { .. } => "REPAYMENT_SHORTFALL",
            Self::UnprofitableOutcome { .. } => "UNPROFITABLE_OUTCOME",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::Config(_) => "INVALID_CONFIG",
            Self::Ledger { .. } => "LEDGER_ERROR",
        }
    }

    /// Map a host failure raised while in `stage` onto the taxonomy.
    pub fn from_ledger(stage: Stage, user: Address, err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientLiquidity {
                source_address,
                asset,
                requested,
                available,
            } => Self::InsufficientLiquidity {
                source_address,
                asset,
                requested,
                available,
            },
            LedgerError::InsufficientOutputAmount {
                amount_out, min_out, ..
            } => Self::SlippageExceeded { amount_out, min_out },
            LedgerError::Protocol(ProtocolRevert::HealthFactorNotBelowThreshold) => {
                Self::NotLiquidatable {
                    user,
                    reason: ValuationError::HealthFactorNotBelowThreshold {
                        health_factor: U256::ZERO,
                    },
                }
            }
            LedgerError::Protocol(ProtocolRevert::NotEnoughLiquidityToLiquidate) => {
                Self::NotLiquidatable {
                    user,
                    reason: ValuationError::NoSeizableCollateral,
                }
            }
            LedgerError::InsufficientBalance {
                token,
                needed,
                available,
                ..
            } if stage == Stage::Repaying => Self::RepaymentShortfall {
                asset: token,
                required: needed,
                available,
            },
            LedgerError::FlashLoanUnderpaid {
                asset,
                required,
                repaid,
            } => Self::RepaymentShortfall {
                asset,
                required,
                available: repaid,
            },
            source => Self::Ledger { stage, source },
        }
    }

    /// Map a failed `liquidation_call`, naming the call's assets in
    /// protocol reverts.
    pub fn from_liquidation(call: &LiquidationCall, err: LedgerError) -> Self {
        let reason = match err {
            LedgerError::Protocol(ProtocolRevert::CollateralCannotBeLiquidated) => {
                ValuationError::CollateralNotEnabled(call.collateral_asset)
            }
            LedgerError::Protocol(ProtocolRevert::CurrencyNotBorrowed) => {
                ValuationError::CurrencyNotBorrowed(call.debt_asset)
            }
            other => return Self::from_ledger(Stage::Liquidating, call.user, other),
        };
        Self::NotLiquidatable {
            user: call.user,
            reason,
        }
    }
}
