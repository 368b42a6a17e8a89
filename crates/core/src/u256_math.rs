//! Fixed-point U256 arithmetic for liquidation and swap accounting.
//!
//! Every amount is an integer in the asset's minimal unit. Rounding is
//! explicit per helper:
//! - `percent_mul` / `percent_div` / `wad_div` round half-up, matching the
//!   lending protocol's PercentageMath and WadRayMath libraries
//! - `mul_div` truncates toward zero (swap math)
//! - `mul_div_up` rounds toward positive infinity (repayment sizing)
//!
//! Multiplications are checked: `None` means the intermediate product
//! overflowed 256 bits.

use alloy::primitives::U256;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

const HALF_WAD: U256 = U256::from_limbs([500_000_000_000_000_000u64, 0, 0, 0]);

/// Basis points denominator (10000 = 100%)
pub const BPS_DENOMINATOR: U256 = U256::from_limbs([10_000u64, 0, 0, 0]);

const HALF_BPS: U256 = U256::from_limbs([5_000u64, 0, 0, 0]);

/// Decimals of the lending oracle's base currency (native-asset wei).
pub const BASE_DECIMALS: u8 = 18;

/// Power of 10 as U256.
#[inline(always)]
pub fn pow10(exp: u8) -> U256 {
    U256::from(10u64).pow(U256::from(exp))
}

/// `a * b / denominator`, truncated toward zero.
#[inline]
pub fn mul_div(a: U256, b: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    Some(a.checked_mul(b)? / denominator)
}

/// `a * b / denominator`, rounded up.
#[inline]
pub fn mul_div_up(a: U256, b: U256, denominator: U256) -> Option<U256> {
    if denominator.is_zero() {
        return None;
    }
    let product = a.checked_mul(b)?;
    let quotient = product / denominator;
    if (product % denominator).is_zero() {
        Some(quotient)
    } else {
        quotient.checked_add(U256::from(1u64))
    }
}

/// Apply basis points reduction (e.g., for slippage).
/// Returns: value * (10000 - basis_points) / 10000, truncated.
///
/// Example: apply_basis_points(1000, 100) = 990 (1% reduction)
#[inline(always)]
pub fn apply_basis_points(value: U256, basis_points: u16) -> Option<U256> {
    let factor = U256::from(10_000u16.saturating_sub(basis_points));
    mul_div(value, factor, BPS_DENOMINATOR)
}

/// `value * percentage_bps / 10000`, rounded half-up.
///
/// Example: percent_mul(1000, 10650) = 1065
#[inline]
pub fn percent_mul(value: U256, percentage_bps: U256) -> Option<U256> {
    if value.is_zero() || percentage_bps.is_zero() {
        return Some(U256::ZERO);
    }
    let product = value.checked_mul(percentage_bps)?.checked_add(HALF_BPS)?;
    Some(product / BPS_DENOMINATOR)
}

/// `value * 10000 / percentage_bps`, rounded half-up.
#[inline]
pub fn percent_div(value: U256, percentage_bps: U256) -> Option<U256> {
    if percentage_bps.is_zero() {
        return None;
    }
    let half = percentage_bps / U256::from(2u64);
    let product = value.checked_mul(BPS_DENOMINATOR)?.checked_add(half)?;
    Some(product / percentage_bps)
}

/// Multiply two WAD values: (a * b + WAD/2) / WAD
#[inline(always)]
pub fn wad_mul(a: U256, b: U256) -> Option<U256> {
    if a.is_zero() || b.is_zero() {
        return Some(U256::ZERO);
    }
    Some(a.checked_mul(b)?.checked_add(HALF_WAD)? / WAD)
}

/// Divide two WAD values: (a * WAD + b/2) / b
///
/// Returns `U256::MAX` when `b` is zero (infinite health factor).
#[inline(always)]
pub fn wad_div(a: U256, b: U256) -> Option<U256> {
    if b.is_zero() {
        return Some(U256::MAX);
    }
    let half = b / U256::from(2u64);
    Some(a.checked_mul(WAD)?.checked_add(half)? / b)
}

/// Value of `amount` (with `decimals`) in base currency at `price`
/// (base wei per whole token). Truncated.
#[inline]
pub fn base_value(amount: U256, price: U256, decimals: u8) -> Option<U256> {
    if amount.is_zero() || price.is_zero() {
        return Some(U256::ZERO);
    }
    mul_div(amount, price, pow10(decimals))
}

/// Check if health factor indicates liquidatable position (HF < 1.0).
#[inline(always)]
pub fn is_liquidatable_wad(hf_wad: U256) -> bool {
    hf_wad < WAD
}

/// Render a minimal-unit amount with `decimals` as a decimal string.
/// Use only for display/logging, not for computation.
pub fn format_units(amount: U256, decimals: u8) -> String {
    let unit = pow10(decimals);
    let whole = amount / unit;
    let frac = amount % unit;
    if decimals == 0 || frac.is_zero() {
        return format!("{whole}.0");
    }
    let frac = format!("{:0>width$}", frac.to_string(), width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Parse a decimal integer string, allowing `_` separators.
pub fn parse_amount(value: &str) -> Option<U256> {
    let digits: String = value.trim().chars().filter(|c| *c != '_').collect();
    if digits.is_empty() {
        return None;
    }
    U256::from_str_radix(&digits, 10).ok()
}

/// Safe minimum of two U256 values
#[inline(always)]
pub fn min(a: U256, b: U256) -> U256 {
    if a < b {
        a
    } else {
        b
    }
}
