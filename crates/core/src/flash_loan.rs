//! Flash-loan sources and terms.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};

use crate::u256_math::{self, BPS_DENOMINATOR};

/// Where the working capital is borrowed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum FlashLoanSource {
    /// Lending pool flash loan; premium = principal * premium_bps / 10000
    LendingPool { pool: Address },
    /// Constant-product pair flash swap, repaid in the borrowed token;
    /// repayment = ceil(principal * 10000 / (10000 - fee_bps))
    Pair { pair: Address },
}

impl FlashLoanSource {
    /// Contract the loan is drawn from.
    pub fn address(&self) -> Address {
        match self {
            Self::LendingPool { pool } => *pool,
            Self::Pair { pair } => *pair,
        }
    }
}

/// Terms of one flash loan, fixed when it is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLoanTerms {
    pub source: FlashLoanSource,
    pub asset: Address,
    pub principal: U256,
    pub premium: U256,
}

impl FlashLoanTerms {
    /// Lending-pool terms (premium truncated, as the pool charges it).
    pub fn lending_pool(pool: Address, asset: Address, principal: U256, premium_bps: u16) -> Option<Self> {
        let premium = u256_math::mul_div(principal, U256::from(premium_bps), BPS_DENOMINATOR)?;
        Some(Self {
            source: FlashLoanSource::LendingPool { pool },
            asset,
            principal,
            premium,
        })
    }

    /// Pair flash-swap terms. The pair's invariant check after the callback
    /// needs `repaid * (10000 - fee) >= principal * 10000`, so the
    /// repayment rounds up.
    pub fn pair(pair: Address, asset: Address, principal: U256, fee_bps: u16) -> Option<Self> {
        if fee_bps >= 10_000 {
            return None;
        }
        let repayment = u256_math::mul_div_up(
            principal,
            BPS_DENOMINATOR,
            U256::from(10_000u16 - fee_bps),
        )?;
        Some(Self {
            source: FlashLoanSource::Pair { pair },
            asset,
            principal,
            premium: repayment - principal,
        })
    }

    /// Principal plus premium.
    pub fn repayment(&self) -> U256 {
        self.principal.saturating_add(self.premium)
    }
}
