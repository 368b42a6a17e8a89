//! The ledger the operator runs against.
//!
//! Every protocol the operator touches is reached through a `Host`; there
//! is no ambient state. A host serializes calls and provides checkpoints,
//! so a failed operation can be rolled back in full.

use alloy::primitives::{Address, Log, U256};
use std::fmt::Debug;

use crate::error::LedgerError;
use crate::flash_loan::{FlashLoanSource, FlashLoanTerms};
use crate::position::{Position, ReserveConfig};
use crate::router::PairReserves;
use crate::valuation::{DebtToCover, LiquidationParams};

/// Arguments of a lending pool `liquidationCall`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationCall {
    pub collateral_asset: Address,
    pub debt_asset: Address,
    pub user: Address,
    pub debt_to_cover: DebtToCover,
    /// Account paying the debt and receiving the collateral
    pub liquidator: Address,
    /// Receive the interest-bearing receipt token instead of the underlying
    pub receive_a_token: bool,
}

/// What a liquidation call actually moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationReceipt {
    pub debt_repaid: U256,
    pub collateral_seized: U256,
}

/// Explicit state handle over the lending pools, pairs and token ledgers.
pub trait Host {
    /// Opaque handle to a point in the host's history.
    type Checkpoint: Copy + Debug;

    fn block_number(&self) -> u64;

    /// Start an atomic section.
    fn checkpoint(&mut self) -> Self::Checkpoint;

    /// Discard every change made since `checkpoint`, logs included.
    fn revert_to(&mut self, checkpoint: Self::Checkpoint);

    /// Keep the changes made since `checkpoint`. Fails if a flash loan
    /// opened inside the section is still outstanding.
    fn commit(&mut self, checkpoint: Self::Checkpoint) -> Result<(), LedgerError>;

    /// Logs emitted after `checkpoint`, in emission order.
    fn logs_since(&self, checkpoint: Self::Checkpoint) -> Vec<Log>;

    // Balances

    fn native_balance(&self, holder: Address) -> U256;

    fn token_balance(&self, token: Address, holder: Address) -> U256;

    fn transfer(
        &mut self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), LedgerError>;

    fn transfer_native(&mut self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError>;

    /// Burn `amount` of the wrapped native token held by `holder` and credit
    /// the same amount of native balance.
    fn withdraw_wrapped(&mut self, wrapped: Address, holder: Address, amount: U256) -> Result<(), LedgerError>;

    // Lending pools

    /// Live position of `user` on `pool`, priced at the current oracle.
    fn user_position(&self, pool: Address, user: Address) -> Result<Position, LedgerError>;

    fn reserve_config(&self, pool: Address, asset: Address) -> Result<ReserveConfig, LedgerError>;

    fn liquidation_params(&self, pool: Address) -> Result<LiquidationParams, LedgerError>;

    fn liquidation_call(
        &mut self,
        pool: Address,
        call: &LiquidationCall,
    ) -> Result<LiquidationReceipt, LedgerError>;

    // Flash loans

    /// Amount of `asset` the source can lend right now.
    fn available_liquidity(&self, source: FlashLoanSource, asset: Address) -> Result<U256, LedgerError>;

    /// Fee charged by the source: pool premium or pair swap fee.
    fn flash_loan_fee_bps(&self, source: FlashLoanSource) -> Result<u16, LedgerError>;

    /// Lend `amount` of `asset` to `receiver`. The loan must be repaid with
    /// `flash_repay` before the enclosing checkpoint is committed.
    fn flash_borrow(
        &mut self,
        source: FlashLoanSource,
        asset: Address,
        amount: U256,
        receiver: Address,
    ) -> Result<FlashLoanTerms, LedgerError>;

    fn flash_repay(&mut self, terms: &FlashLoanTerms, payer: Address) -> Result<(), LedgerError>;

    // Pairs

    fn pair_reserves(&self, pair: Address) -> Result<PairReserves, LedgerError>;

    /// Sell `amount_in` of `token_in` held by `sender`, paying the output to
    /// `recipient`. Returns the output amount.
    fn swap(
        &mut self,
        pair: Address,
        token_in: Address,
        amount_in: U256,
        min_out: U256,
        sender: Address,
        recipient: Address,
    ) -> Result<U256, LedgerError>;
}
