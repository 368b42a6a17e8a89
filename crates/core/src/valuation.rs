//! Debt valuation: how much debt a liquidation may repay and how much
//! collateral it releases.
//!
//! The lending pool executes the same functions when it processes a
//! liquidation call, so a quote taken from a fresh position read matches
//! the execution exactly.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ValuationError;
use crate::position::{Position, ReserveConfig};
use crate::u256_math::{self, pow10};

/// Protocol-level liquidation rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationParams {
    /// Maximum share of a debt repayable per call (basis points)
    pub close_factor_bps: u16,
}

impl Default for LiquidationParams {
    fn default() -> Self {
        Self {
            close_factor_bps: 5000,
        }
    }
}

/// Amount of debt the liquidator asks to repay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebtToCover {
    /// Repay as much as the close factor allows
    Max,
    /// Repay at most this amount (debt asset decimals)
    Exact(U256),
}

impl DebtToCover {
    /// Parse "max" or a decimal amount.
    pub fn parse(value: &str) -> Option<Self> {
        if value.trim().eq_ignore_ascii_case("max") {
            return Some(Self::Max);
        }
        u256_math::parse_amount(value).map(Self::Exact)
    }

    /// The requested amount as the protocol sees it (`Max` is 2^256 - 1).
    pub fn requested(&self) -> U256 {
        match self {
            Self::Max => U256::MAX,
            Self::Exact(amount) => *amount,
        }
    }
}

/// Result of valuing a liquidation against a position snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationQuote {
    pub user: Address,
    pub collateral_asset: Address,
    pub debt_asset: Address,
    /// Health factor at quote time (WAD)
    pub health_factor: U256,
    /// Outstanding debt of `debt_asset`
    pub user_debt: U256,
    /// Close-factor cap on this call
    pub max_liquidatable_debt: U256,
    /// Debt that will actually be repaid
    pub debt_to_cover: U256,
    /// Collateral that will be released, bonus included
    pub collateral_to_seize: U256,
    /// Whether the seizure was limited by the user's collateral balance
    pub collateral_clamped: bool,
}

/// Close-factor cap on a single liquidation.
pub fn max_liquidatable_debt(user_debt: U256, params: &LiquidationParams) -> Option<U256> {
    u256_math::percent_mul(user_debt, U256::from(params.close_factor_bps))
}

/// Collateral released for repaying `debt_amount`, bonus included:
/// `(debt_price * debt_amount * 10^col_dec) ⊗ bonus / (col_price * 10^debt_dec)`.
pub fn collateral_for_debt(
    debt: &ReserveConfig,
    collateral: &ReserveConfig,
    debt_amount: U256,
) -> Option<U256> {
    let debt_value = debt
        .price
        .checked_mul(debt_amount)?
        .checked_mul(pow10(collateral.decimals))?;
    let with_bonus = u256_math::percent_mul(debt_value, collateral.bonus_factor())?;
    let denominator = collateral.price.checked_mul(pow10(debt.decimals))?;
    if denominator.is_zero() {
        return None;
    }
    Some(with_bonus / denominator)
}

/// Debt repayable for seizing exactly `collateral_amount`, bonus removed.
pub fn debt_for_collateral(
    debt: &ReserveConfig,
    collateral: &ReserveConfig,
    collateral_amount: U256,
) -> Option<U256> {
    let numerator = collateral
        .price
        .checked_mul(collateral_amount)?
        .checked_mul(pow10(debt.decimals))?;
    let denominator = debt.price.checked_mul(pow10(collateral.decimals))?;
    if denominator.is_zero() {
        return None;
    }
    u256_math::percent_div(numerator / denominator, collateral.bonus_factor())
}

/// Value a liquidation of `position`, repaying `debt_asset` for
/// `collateral_asset`.
///
/// Checks run in the protocol's order: health factor, collateral usable,
/// debt present. If the bonus-inclusive collateral exceeds what the user
/// holds, the seizure is clamped to the balance and the repayment shrinks
/// to match; a clamp that leaves nothing to repay fails.
pub fn quote_liquidation(
    position: &Position,
    collateral_asset: Address,
    debt_asset: Address,
    requested: DebtToCover,
    params: &LiquidationParams,
) -> Result<LiquidationQuote, ValuationError> {
    let health_factor = position.health_factor().ok_or(ValuationError::Overflow)?;
    if !u256_math::is_liquidatable_wad(health_factor) {
        return Err(ValuationError::HealthFactorNotBelowThreshold { health_factor });
    }

    let collateral = position
        .collateral(collateral_asset)
        .filter(|c| c.enabled && c.reserve.usage_as_collateral_enabled)
        .ok_or(ValuationError::CollateralNotEnabled(collateral_asset))?;

    let debt = position
        .debt(debt_asset)
        .filter(|d| !d.amount.is_zero())
        .ok_or(ValuationError::CurrencyNotBorrowed(debt_asset))?;

    let max_debt = max_liquidatable_debt(debt.amount, params).ok_or(ValuationError::Overflow)?;
    let mut debt_to_cover = u256_math::min(requested.requested(), max_debt);

    let max_collateral = collateral_for_debt(&debt.reserve, &collateral.reserve, debt_to_cover)
        .ok_or(ValuationError::Overflow)?;

    let (collateral_to_seize, clamped) = if max_collateral > collateral.amount {
        debt_to_cover = debt_for_collateral(&debt.reserve, &collateral.reserve, collateral.amount)
            .ok_or(ValuationError::Overflow)?;
        (collateral.amount, true)
    } else {
        (max_collateral, false)
    };

    if debt_to_cover.is_zero() || collateral_to_seize.is_zero() {
        return Err(ValuationError::NoSeizableCollateral);
    }

    debug!(
        user = %position.user,
        health_factor = %health_factor,
        debt_to_cover = %debt_to_cover,
        collateral_to_seize = %collateral_to_seize,
        clamped,
        "Liquidation valued"
    );

    Ok(LiquidationQuote {
        user: position.user,
        collateral_asset,
        debt_asset,
        health_factor,
        user_debt: debt.amount,
        max_liquidatable_debt: max_debt,
        debt_to_cover,
        collateral_to_seize,
        collateral_clamped: clamped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::position::{CollateralData, DebtData};
    use crate::u256_math::WAD;
    use alloy::primitives::address;

    const WBTC: Address = address!("2260fac5e5542a773aa44fbcfedf7c193bc2c599");
    const USDT: Address = address!("dac17f958d2ee523a2206206994597c13d831ec7");

    fn wbtc_reserve() -> ReserveConfig {
        ReserveConfig {
            asset: WBTC,
            decimals: 8,
            ltv_bps: 7000,
            liquidation_threshold_bps: 7500,
            liquidation_bonus_bps: 500,
            usage_as_collateral_enabled: true,
            price: U256::from(20u64) * WAD,
        }
    }

    fn usdt_reserve() -> ReserveConfig {
        ReserveConfig {
            asset: USDT,
            decimals: 6,
            ltv_bps: 0,
            liquidation_threshold_bps: 0,
            liquidation_bonus_bps: 0,
            usage_as_collateral_enabled: false,
            // 1 USDT = 0.0005 ETH
            price: WAD / U256::from(2000u64),
        }
    }

    /// 10 WBTC (200 ETH, adjusted 150 ETH) against `debt_usdt` USDT.
    fn position(collateral_sats: u64, debt_usdt: u64) -> Position {
        let mut pos = Position::new(Address::ZERO);
        pos.collaterals.push(CollateralData {
            reserve: wbtc_reserve(),
            amount: U256::from(collateral_sats),
            enabled: true,
        });
        pos.debts.push(DebtData {
            reserve: usdt_reserve(),
            amount: U256::from(debt_usdt) * U256::from(1_000_000u64),
        });
        pos
    }

    fn usdt(amount: u64) -> U256 {
        U256::from(amount) * U256::from(1_000_000u64)
    }

    #[test]
    fn test_collateral_for_debt_applies_bonus() {
        // 40_000 USDT = 20 ETH = 1 WBTC, plus 5% bonus = 1.05 WBTC
        let seized = collateral_for_debt(&usdt_reserve(), &wbtc_reserve(), usdt(40_000)).unwrap();
        assert_eq!(seized, U256::from(105_000_000u64));

        let back = debt_for_collateral(&usdt_reserve(), &wbtc_reserve(), seized).unwrap();
        assert_eq!(back, usdt(40_000));
    }

    #[test]
    fn test_close_factor_caps_repayment() {
        // 320_000 USDT = 160 ETH > 150 ETH adjusted -> liquidatable
        let pos = position(1_000_000_000, 320_000);
        let quote = quote_liquidation(&pos, WBTC, USDT, DebtToCover::Max, &LiquidationParams::default())
            .unwrap();
        assert_eq!(quote.max_liquidatable_debt, usdt(160_000));
        assert_eq!(quote.debt_to_cover, usdt(160_000));
        // 160_000 USDT = 80 ETH = 4 WBTC, * 1.05 = 4.2 WBTC
        assert_eq!(quote.collateral_to_seize, U256::from(420_000_000u64));
        assert!(!quote.collateral_clamped);
    }

    #[test]
    fn test_exact_request_below_cap_is_honoured() {
        let pos = position(1_000_000_000, 320_000);
        let quote = quote_liquidation(
            &pos,
            WBTC,
            USDT,
            DebtToCover::Exact(usdt(40_000)),
            &LiquidationParams::default(),
        )
        .unwrap();
        assert_eq!(quote.debt_to_cover, usdt(40_000));
        assert_eq!(quote.collateral_to_seize, U256::from(105_000_000u64));
    }

    #[test]
    fn test_collateral_clamped_to_balance() {
        // 1 WBTC (20 ETH, adjusted 15) against 40_000 USDT (20 ETH)
        let pos = position(100_000_000, 40_000);
        let quote = quote_liquidation(&pos, WBTC, USDT, DebtToCover::Max, &LiquidationParams::default())
            .unwrap();
        // Close factor would allow 20_000 USDT -> 0.525 WBTC, within balance
        assert!(!quote.collateral_clamped);

        // Full close factor: 40_000 USDT needs 1.05 WBTC, only 1 held
        let params = LiquidationParams {
            close_factor_bps: 10_000,
        };
        let quote = quote_liquidation(&pos, WBTC, USDT, DebtToCover::Max, &params).unwrap();
        assert!(quote.collateral_clamped);
        assert_eq!(quote.collateral_to_seize, U256::from(100_000_000u64));
        // 1 WBTC = 20 ETH = 40_000 USDT, / 1.05 = 38_095.238095 USDT
        assert_eq!(quote.debt_to_cover, U256::from(38_095_238_095u64));
    }

    #[test]
    fn test_healthy_position_rejected() {
        let pos = position(1_000_000_000, 100_000);
        let err = quote_liquidation(&pos, WBTC, USDT, DebtToCover::Max, &LiquidationParams::default())
            .unwrap_err();
        assert!(matches!(err, ValuationError::HealthFactorNotBelowThreshold { .. }));
    }

    #[test]
    fn test_wrong_assets_rejected() {
        let pos = position(1_000_000_000, 320_000);
        let params = LiquidationParams::default();
        assert_eq!(
            quote_liquidation(&pos, USDT, USDT, DebtToCover::Max, &params).unwrap_err(),
            ValuationError::CollateralNotEnabled(USDT)
        );
        assert_eq!(
            quote_liquidation(&pos, WBTC, WBTC, DebtToCover::Max, &params).unwrap_err(),
            ValuationError::CurrencyNotBorrowed(WBTC)
        );
    }

    #[test]
    fn test_zero_repayment_rejected() {
        let pos = position(1_000_000_000, 320_000);
        let err = quote_liquidation(
            &pos,
            WBTC,
            USDT,
            DebtToCover::Exact(U256::ZERO),
            &LiquidationParams::default(),
        )
        .unwrap_err();
        assert_eq!(err, ValuationError::NoSeizableCollateral);
    }

    #[test]
    fn test_parse_debt_to_cover() {
        assert_eq!(DebtToCover::parse("MAX"), Some(DebtToCover::Max));
        assert_eq!(DebtToCover::parse("1_000"), Some(DebtToCover::Exact(U256::from(1000u64))));
        assert_eq!(DebtToCover::parse("lots"), None);
    }
}
