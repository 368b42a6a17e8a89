//! Uniswap V2 pair state.

use alloy::primitives::{Address, U256};
use liquidation_core::{LedgerError, PairReserves};

/// Constant-product pair. Reserves are synced to the pair's token
/// balances after every swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    /// Swap fee (basis points, 30 on Uniswap V2)
    pub fee_bps: u16,
    /// Set while a flash swap is outstanding
    pub locked: bool,
}

impl Pair {
    pub fn reserves(&self) -> PairReserves {
        PairReserves {
            pair: self.address,
            token0: self.token0,
            token1: self.token1,
            reserve0: self.reserve0,
            reserve1: self.reserve1,
            fee_bps: self.fee_bps,
        }
    }

    pub fn has_token(&self, token: Address) -> bool {
        token == self.token0 || token == self.token1
    }

    /// Reserve of `token`.
    pub fn reserve_of(&self, token: Address) -> Result<U256, LedgerError> {
        if token == self.token0 {
            Ok(self.reserve0)
        } else if token == self.token1 {
            Ok(self.reserve1)
        } else {
            Err(LedgerError::TokenNotInPair {
                pair: self.address,
                token,
            })
        }
    }

    /// Fee-adjusted invariant check after a swap:
    /// `(b0 * 10000 - in0 * fee) * (b1 * 10000 - in1 * fee) >= r0 * r1 * 10000^2`.
    pub fn k_holds(
        &self,
        balance0: U256,
        balance1: U256,
        amount0_in: U256,
        amount1_in: U256,
    ) -> Result<bool, LedgerError> {
        let scale = U256::from(10_000u16);
        let fee = U256::from(self.fee_bps);
        let adjusted = |balance: U256, amount_in: U256| -> Result<U256, LedgerError> {
            balance
                .checked_mul(scale)
                .and_then(|b| b.checked_sub(amount_in.checked_mul(fee)?))
                .ok_or(LedgerError::Overflow)
        };
        let lhs = adjusted(balance0, amount0_in)?
            .checked_mul(adjusted(balance1, amount1_in)?)
            .ok_or(LedgerError::Overflow)?;
        let rhs = self
            .reserve0
            .checked_mul(self.reserve1)
            .and_then(|k| k.checked_mul(scale * scale))
            .ok_or(LedgerError::Overflow)?;
        Ok(lhs >= rhs)
    }

    pub fn sync(&mut self, balance0: U256, balance1: U256) {
        self.reserve0 = balance0;
        self.reserve1 = balance1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquidation_core::router::get_amount_out;

    fn pair() -> Pair {
        Pair {
            address: Address::repeat_byte(9),
            token0: Address::repeat_byte(1),
            token1: Address::repeat_byte(2),
            reserve0: U256::from(1_000_000u64),
            reserve1: U256::from(2_000_000u64),
            fee_bps: 30,
            locked: false,
        }
    }

    #[test]
    fn test_router_output_satisfies_k() {
        let pair = pair();
        let amount_in = U256::from(10_000u64);
        let out = get_amount_out(amount_in, pair.reserve0, pair.reserve1, pair.fee_bps).unwrap();
        let b0 = pair.reserve0 + amount_in;
        assert!(pair.k_holds(b0, pair.reserve1 - out, amount_in, U256::ZERO).unwrap());
        // One unit more breaks the invariant
        assert!(!pair
            .k_holds(b0, pair.reserve1 - out - U256::from(1u64), amount_in, U256::ZERO)
            .unwrap());
    }

    #[test]
    fn test_reserve_of() {
        let pair = pair();
        assert_eq!(pair.reserve_of(pair.token1).unwrap(), U256::from(2_000_000u64));
        assert!(pair.reserve_of(Address::ZERO).is_err());
        assert!(pair.has_token(pair.token0));
    }
}
