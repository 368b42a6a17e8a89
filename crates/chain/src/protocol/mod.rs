//! Protocol state held by the fork ledger.
//!
//! - [`LendingPool`]: AAVE V2 reserves, oracle prices and user accounts
//! - [`Pair`]: Uniswap V2 constant-product pairs
//!
//! These types hold protocol bookkeeping only. Token custody and call
//! semantics (transfers, events, flash loans) live in [`crate::Ledger`].

mod aave_v2;
mod uniswap_v2;

pub use aave_v2::{LendingPool, SuppliedBalance, UserAccount};
pub use uniswap_v2::Pair;
