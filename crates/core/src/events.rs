//! Protocol event types, signatures and the liquidation log filter.
//!
//! The lending pool's `LiquidationCall` log is the only externally visible
//! proof that a liquidation ran. `LiquidationEventFilter` applies the same
//! checks a fork test runs against a receipt.

use alloy::primitives::{keccak256, Address, Log, B256, U256};
use alloy::sol;
use alloy::sol_types::SolEvent;
use thiserror::Error;

sol! {
    /// Lending pool events (Aave V2 layout).
    interface ILendingPoolEvents {
        event LiquidationCall(
            address indexed collateralAsset,
            address indexed debtAsset,
            address indexed user,
            uint256 debtToCover,
            uint256 liquidatedCollateralAmount,
            address liquidator,
            bool receiveAToken
        );

        event FlashLoan(
            address indexed target,
            address indexed initiator,
            address indexed asset,
            uint256 amount,
            uint256 premium,
            uint16 referralCode
        );
    }

    /// Constant-product pair events (Uniswap V2 layout).
    interface IPairEvents {
        event Swap(
            address indexed sender,
            uint256 amount0In,
            uint256 amount1In,
            uint256 amount0Out,
            uint256 amount1Out,
            address indexed to
        );
    }
}

pub use ILendingPoolEvents::{FlashLoan, LiquidationCall as LiquidationCallEvent};
pub use IPairEvents::Swap as PairSwap;

/// Event signatures for log filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventSignatures {
    /// LiquidationCall(address,address,address,uint256,uint256,address,bool)
    pub liquidation: B256,
    /// FlashLoan(address,address,address,uint256,uint256,uint16)
    pub flash_loan: B256,
    /// Swap(address,uint256,uint256,uint256,uint256,address)
    pub swap: B256,
}

impl EventSignatures {
    pub fn new() -> Self {
        Self {
            liquidation: keccak256("LiquidationCall(address,address,address,uint256,uint256,address,bool)"),
            flash_loan: keccak256("FlashLoan(address,address,address,uint256,uint256,uint16)"),
            swap: keccak256("Swap(address,uint256,uint256,uint256,uint256,address)"),
        }
    }
}

impl Default for EventSignatures {
    fn default() -> Self {
        Self::new()
    }
}

/// A decoded `LiquidationCall` log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationRecord {
    pub pool: Address,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub user: Address,
    pub debt_to_cover: U256,
    pub liquidated_collateral_amount: U256,
    pub liquidator: Address,
}

impl LiquidationRecord {
    /// Decode `log` if it is a `LiquidationCall`.
    pub fn decode(log: &Log) -> Option<Self> {
        if log.data.topics().first() != Some(&LiquidationCallEvent::SIGNATURE_HASH) {
            return None;
        }
        let event = LiquidationCallEvent::decode_log_data(&log.data, true).ok()?;
        Some(Self {
            pool: log.address,
            collateral_asset: event.collateralAsset,
            debt_asset: event.debtAsset,
            user: event.user,
            debt_to_cover: event.debtToCover,
            liquidated_collateral_amount: event.liquidatedCollateralAmount,
            liquidator: event.liquidator,
        })
    }
}

/// Why a set of logs does not prove the expected liquidation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventCheckError {
    #[error("no expected liquidation of {0}")]
    NoExpectedLiquidation(Address),
    #[error("unexpected liquidation: {found} liquidation events, {expected} for the expected borrower")]
    UnexpectedLiquidation { found: usize, expected: usize },
}

/// Harness filter over a call's logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationEventFilter {
    pub pool: Address,
    pub expected_borrower: Address,
}

impl LiquidationEventFilter {
    pub fn new(pool: Address, expected_borrower: Address) -> Self {
        Self {
            pool,
            expected_borrower,
        }
    }

    /// Liquidation logs from the pool: address matches, more than three
    /// topics, topic0 is the `LiquidationCall` signature.
    pub fn liquidation_logs<'a>(&self, logs: &'a [Log]) -> Vec<&'a Log> {
        let signature = EventSignatures::new().liquidation;
        logs.iter()
            .filter(|log| {
                let topics = log.data.topics();
                log.address == self.pool && topics.len() > 3 && topics[0] == signature
            })
            .collect()
    }

    /// Logs whose topic3 is the expected borrower, left-padded to 32 bytes.
    pub fn expected_logs<'a>(&self, logs: &'a [Log]) -> Vec<&'a Log> {
        let borrower_topic = self.expected_borrower.into_word();
        logs.iter()
            .filter(|log| log.data.topics().get(3) == Some(&borrower_topic))
            .collect()
    }

    /// At least one expected log, and every liquidation log is expected.
    /// Returns the decoded liquidations.
    pub fn verify(&self, logs: &[Log]) -> Result<Vec<LiquidationRecord>, EventCheckError> {
        let expected = self.expected_logs(logs);
        if expected.is_empty() {
            return Err(EventCheckError::NoExpectedLiquidation(self.expected_borrower));
        }
        let found = self.liquidation_logs(logs);
        if found.len() != expected.len() {
            return Err(EventCheckError::UnexpectedLiquidation {
                found: found.len(),
                expected: expected.len(),
            });
        }
        Ok(found.into_iter().filter_map(|log| LiquidationRecord::decode(log)).collect())
    }
}
