//! Fork ledger the liquidation operator runs against.
//!
//! This crate provides:
//! - A journaled in-memory ledger implementing `liquidation_core::Host`
//! - AAVE V2 lending pool and Uniswap V2 pair state
//! - Snapshot fixtures of mainnet state at a fork block
//! - Snapshot refresh from an archive node

mod fork;
mod ledger;
pub mod protocol;
mod snapshot;

pub use fork::{FileSnapshotSource, RpcForkSource, SnapshotSource};
pub use ledger::{Checkpoint, Ledger};
pub use protocol::{LendingPool, Pair, SuppliedBalance, UserAccount};
pub use snapshot::{
    AmountEntry, BalanceEntry, CollateralEntry, ForkSnapshot, LendingPoolEntry,
    NativeBalanceEntry, PairEntry, PositionEntry, ReserveEntry,
};
