//! Position data structures for a borrower's lending account.
//!
//! Prices are the lending oracle's quotes in base-currency wei (the
//! chain's native asset, 18 decimals) per whole token.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::u256_math::{self, BPS_DENOMINATOR};

/// Listing parameters of one asset on a lending pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveConfig {
    /// Token address
    pub asset: Address,
    /// Token decimals
    pub decimals: u8,
    /// Loan-to-value (basis points)
    pub ltv_bps: u16,
    /// Liquidation threshold (basis points, e.g., 7500 = 75%)
    pub liquidation_threshold_bps: u16,
    /// Liquidation bonus premium (basis points, e.g., 650 = 6.5%)
    pub liquidation_bonus_bps: u16,
    /// Whether the reserve may back borrows
    pub usage_as_collateral_enabled: bool,
    /// Oracle price (base wei per whole token)
    pub price: U256,
}

impl ReserveConfig {
    /// Bonus multiplier as protocol percentage (10000 + premium).
    pub fn bonus_factor(&self) -> U256 {
        BPS_DENOMINATOR + U256::from(self.liquidation_bonus_bps)
    }
}

/// Collateral position data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralData {
    /// Reserve listing (price, decimals, threshold, bonus)
    pub reserve: ReserveConfig,
    /// Raw balance (token decimals)
    pub amount: U256,
    /// Whether the user enabled this balance as collateral
    pub enabled: bool,
}

impl CollateralData {
    pub fn asset(&self) -> Address {
        self.reserve.asset
    }

    /// Value in base currency.
    pub fn base_value(&self) -> Option<U256> {
        u256_math::base_value(self.amount, self.reserve.price, self.reserve.decimals)
    }

    /// Counts toward health only when enabled by the user and the reserve.
    pub fn counts_as_collateral(&self) -> bool {
        self.enabled
            && self.reserve.usage_as_collateral_enabled
            && self.reserve.liquidation_threshold_bps > 0
            && !self.amount.is_zero()
    }
}

/// Debt position data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebtData {
    /// Reserve listing (price, decimals)
    pub reserve: ReserveConfig,
    /// Raw debt amount, stable plus variable (token decimals)
    pub amount: U256,
}

impl DebtData {
    pub fn asset(&self) -> Address {
        self.reserve.asset
    }

    /// Value in base currency.
    pub fn base_value(&self) -> Option<U256> {
        u256_math::base_value(self.amount, self.reserve.price, self.reserve.decimals)
    }
}

/// A borrower's account on the lending protocol, read at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Borrower address
    pub user: Address,
    /// Collateral positions
    pub collaterals: SmallVec<[CollateralData; 4]>,
    /// Debt positions
    pub debts: SmallVec<[DebtData; 4]>,
}

impl Position {
    /// Create an empty position.
    pub fn new(user: Address) -> Self {
        Self {
            user,
            collaterals: SmallVec::new(),
            debts: SmallVec::new(),
        }
    }

    pub fn collateral(&self, asset: Address) -> Option<&CollateralData> {
        self.collaterals.iter().find(|c| c.asset() == asset)
    }

    pub fn debt(&self, asset: Address) -> Option<&DebtData> {
        self.debts.iter().find(|d| d.asset() == asset)
    }

    /// Total collateral counted toward health, in base currency.
    pub fn total_collateral_base(&self) -> Option<U256> {
        self.collaterals
            .iter()
            .filter(|c| c.counts_as_collateral())
            .try_fold(U256::ZERO, |acc, c| acc.checked_add(c.base_value()?))
    }

    /// Total debt in base currency.
    pub fn total_debt_base(&self) -> Option<U256> {
        self.debts
            .iter()
            .try_fold(U256::ZERO, |acc, d| acc.checked_add(d.base_value()?))
    }

    /// Threshold-weighted collateral in base currency:
    /// sum(value * threshold) / 10000.
    pub fn adjusted_collateral_base(&self) -> Option<U256> {
        let total = self.total_collateral_base()?;
        if total.is_zero() {
            return Some(U256::ZERO);
        }
        let weighted = self
            .collaterals
            .iter()
            .filter(|c| c.counts_as_collateral())
            .try_fold(U256::ZERO, |acc, c| {
                let value = c.base_value()?;
                acc.checked_add(value.checked_mul(U256::from(c.reserve.liquidation_threshold_bps))?)
            })?;
        // Average threshold, then percent_mul, as the protocol does it.
        let avg_threshold = weighted / total;
        u256_math::percent_mul(total, avg_threshold)
    }

    /// Health factor in WAD. `U256::MAX` when there is no debt.
    pub fn health_factor(&self) -> Option<U256> {
        let debt = self.total_debt_base()?;
        if debt.is_zero() {
            return Some(U256::MAX);
        }
        u256_math::wad_div(self.adjusted_collateral_base()?, debt)
    }

    /// Check if position is liquidatable (HF < 1.0).
    pub fn is_liquidatable(&self) -> bool {
        self.health_factor()
            .map(u256_math::is_liquidatable_wad)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::u256_math::WAD;
    use alloy::primitives::address;

    const WBTC: Address = address!("2260fac5e5542a773aa44fbcfedf7c193bc2c599");
    const USDT: Address = address!("dac17f958d2ee523a2206206994597c13d831ec7");

    fn reserve(asset: Address, decimals: u8, price: U256, threshold: u16) -> ReserveConfig {
        ReserveConfig {
            asset,
            decimals,
            ltv_bps: threshold.saturating_sub(500),
            liquidation_threshold_bps: threshold,
            liquidation_bonus_bps: 650,
            usage_as_collateral_enabled: threshold > 0,
            price,
        }
    }

    fn position(collateral_btc: u64, debt_usdt: u64) -> Position {
        let mut pos = Position::new(Address::ZERO);
        pos.collaterals.push(CollateralData {
            reserve: reserve(WBTC, 8, U256::from(15u64) * WAD, 7500),
            amount: U256::from(collateral_btc) * U256::from(100_000_000u64),
            enabled: true,
        });
        // 1 USDT = 0.0005 ETH
        pos.debts.push(DebtData {
            reserve: reserve(USDT, 6, WAD / U256::from(2000u64), 0),
            amount: U256::from(debt_usdt) * U256::from(1_000_000u64),
        });
        pos
    }

    #[test]
    fn test_health_factor_calculation() {
        // Collateral: 10 WBTC = 150 ETH, adjusted 112.5 ETH
        // Debt: 150_000 USDT = 75 ETH -> HF = 1.5
        let pos = position(10, 150_000);
        assert_eq!(pos.total_collateral_base(), Some(U256::from(150u64) * WAD));
        assert_eq!(pos.total_debt_base(), Some(U256::from(75u64) * WAD));
        let hf = pos.health_factor().unwrap();
        assert_eq!(hf, WAD + WAD / U256::from(2u64));
        assert!(!pos.is_liquidatable());
    }

    #[test]
    fn test_underwater_position_is_liquidatable() {
        // Adjusted collateral 112.5 ETH vs debt 120 ETH
        let pos = position(10, 240_000);
        assert!(pos.health_factor().unwrap() < WAD);
        assert!(pos.is_liquidatable());
    }

    #[test]
    fn test_no_debt_is_infinitely_healthy() {
        let mut pos = position(10, 0);
        pos.debts.clear();
        assert_eq!(pos.health_factor(), Some(U256::MAX));
        assert!(!pos.is_liquidatable());
    }

    #[test]
    fn test_disabled_collateral_does_not_count() {
        let mut pos = position(10, 1);
        pos.collaterals[0].enabled = false;
        assert_eq!(pos.total_collateral_base(), Some(U256::ZERO));
        assert!(pos.is_liquidatable());
    }
}
