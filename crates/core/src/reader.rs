//! Price and reserve reads.
//!
//! Every accessor goes to the host; nothing is cached, so a value read
//! after an external call reflects that call.

use alloy::primitives::{Address, U256};
use tracing::debug;

use crate::error::LedgerError;
use crate::flash_loan::FlashLoanSource;
use crate::host::Host;
use crate::position::{Position, ReserveConfig};
use crate::router::PairReserves;
use crate::u256_math;
use crate::valuation::LiquidationParams;

/// Read-through view of a host.
pub struct ReserveReader<'a, H: Host> {
    host: &'a H,
}

impl<'a, H: Host> ReserveReader<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Position of `user` with current oracle prices.
    pub fn position(&self, pool: Address, user: Address) -> Result<Position, LedgerError> {
        let position = self.host.user_position(pool, user)?;
        debug!(
            block = self.host.block_number(),
            %user,
            collaterals = position.collaterals.len(),
            debts = position.debts.len(),
            health_factor = ?position.health_factor(),
            "Position read"
        );
        Ok(position)
    }

    pub fn reserve(&self, pool: Address, asset: Address) -> Result<ReserveConfig, LedgerError> {
        self.host.reserve_config(pool, asset)
    }

    pub fn liquidation_params(&self, pool: Address) -> Result<LiquidationParams, LedgerError> {
        self.host.liquidation_params(pool)
    }

    pub fn pair(&self, pair: Address) -> Result<PairReserves, LedgerError> {
        let reserves = self.host.pair_reserves(pair)?;
        debug!(
            %pair,
            reserve0 = %reserves.reserve0,
            reserve1 = %reserves.reserve1,
            "Pair reserves read"
        );
        Ok(reserves)
    }

    /// Lendable amount of `asset` at `source`.
    pub fn liquidity(&self, source: FlashLoanSource, asset: Address) -> Result<U256, LedgerError> {
        self.host.available_liquidity(source, asset)
    }

    pub fn flash_loan_fee_bps(&self, source: FlashLoanSource) -> Result<u16, LedgerError> {
        self.host.flash_loan_fee_bps(source)
    }

    /// Oracle value of `amount` of `from`, expressed in `to`.
    /// `None` if either asset is not listed on `pool`.
    pub fn oracle_convert(&self, pool: Address, from: Address, to: Address, amount: U256) -> Option<U256> {
        if from == to {
            return Some(amount);
        }
        let from = self.host.reserve_config(pool, from).ok()?;
        let to = self.host.reserve_config(pool, to).ok()?;
        let value = u256_math::base_value(amount, from.price, from.decimals)?;
        if to.price.is_zero() {
            return None;
        }
        u256_math::mul_div(value, u256_math::pow10(to.decimals), to.price)
    }
}
