//! Swap routing through constant-product pairs.
//!
//! Quotes and executions share `get_amount_out`. Quoting walks the route
//! on a local reserve overlay so a pair visited twice is priced after its
//! own earlier hop; execution re-reads each pair from the host right
//! before swapping through it.

use alloy::primitives::{Address, U256};
use smallvec::SmallVec;
use std::collections::HashMap;
use tracing::debug;

use crate::error::LedgerError;
use crate::host::Host;

/// Default pair fee (30 bps = 0.3%).
pub const DEFAULT_PAIR_FEE_BPS: u16 = 30;

/// Reserves of a two-token pair as stored on chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairReserves {
    pub pair: Address,
    pub token0: Address,
    pub token1: Address,
    pub reserve0: U256,
    pub reserve1: U256,
    /// Swap fee in basis points
    pub fee_bps: u16,
}

impl PairReserves {
    /// Orient the reserves for a swap selling `token_in`.
    pub fn oriented(&self, token_in: Address) -> Option<ReserveState> {
        let (token_out, reserve_in, reserve_out) = if token_in == self.token0 {
            (self.token1, self.reserve0, self.reserve1)
        } else if token_in == self.token1 {
            (self.token0, self.reserve1, self.reserve0)
        } else {
            return None;
        };
        Some(ReserveState {
            pair: self.pair,
            token_in,
            token_out,
            reserve_in,
            reserve_out,
            fee_bps: self.fee_bps,
        })
    }

    /// Reserves after `amount_in` of `token_in` was sold for `amount_out`.
    fn after_swap(mut self, token_in: Address, amount_in: U256, amount_out: U256) -> Self {
        if token_in == self.token0 {
            self.reserve0 = self.reserve0.saturating_add(amount_in);
            self.reserve1 = self.reserve1.saturating_sub(amount_out);
        } else {
            self.reserve1 = self.reserve1.saturating_add(amount_in);
            self.reserve0 = self.reserve0.saturating_sub(amount_out);
        }
        self
    }
}

/// Reserves oriented for one swap direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReserveState {
    pub pair: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub reserve_in: U256,
    pub reserve_out: U256,
    pub fee_bps: u16,
}

impl ReserveState {
    /// Output for selling `amount_in` into this state.
    pub fn amount_out(&self, amount_in: U256) -> Result<U256, LedgerError> {
        get_amount_out(amount_in, self.reserve_in, self.reserve_out, self.fee_bps)
            .map_err(|err| self.with_pair(err))
    }

    fn with_pair(&self, err: LedgerError) -> LedgerError {
        match err {
            LedgerError::InsufficientLiquidity {
                asset,
                requested,
                available,
                ..
            } => LedgerError::InsufficientLiquidity {
                source_address: self.pair,
                asset,
                requested,
                available,
            },
            other => other,
        }
    }
}

/// Constant-product output, fee taken from the input, truncated:
/// `out = in_fee * reserve_out / (reserve_in * 10000 + in_fee)` with
/// `in_fee = amount_in * (10000 - fee_bps)`.
pub fn get_amount_out(
    amount_in: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_bps: u16,
) -> Result<U256, LedgerError> {
    if amount_in.is_zero() {
        return Err(LedgerError::InsufficientInputAmount);
    }
    if reserve_in.is_zero() || reserve_out.is_zero() {
        return Err(LedgerError::InsufficientLiquidity {
            source_address: Address::ZERO,
            asset: Address::ZERO,
            requested: amount_in,
            available: U256::ZERO,
        });
    }
    let amount_in_with_fee = amount_in
        .checked_mul(U256::from(10_000u16.saturating_sub(fee_bps)))
        .ok_or(LedgerError::Overflow)?;
    let numerator = amount_in_with_fee
        .checked_mul(reserve_out)
        .ok_or(LedgerError::Overflow)?;
    let denominator = reserve_in
        .checked_mul(U256::from(10_000u16))
        .and_then(|r| r.checked_add(amount_in_with_fee))
        .ok_or(LedgerError::Overflow)?;
    Ok(numerator / denominator)
}

/// Input needed to receive exactly `amount_out`, rounded up.
pub fn get_amount_in(
    amount_out: U256,
    reserve_in: U256,
    reserve_out: U256,
    fee_bps: u16,
) -> Result<U256, LedgerError> {
    if amount_out >= reserve_out || reserve_in.is_zero() {
        return Err(LedgerError::InsufficientLiquidity {
            source_address: Address::ZERO,
            asset: Address::ZERO,
            requested: amount_out,
            available: reserve_out,
        });
    }
    let numerator = reserve_in
        .checked_mul(amount_out)
        .and_then(|n| n.checked_mul(U256::from(10_000u16)))
        .ok_or(LedgerError::Overflow)?;
    let denominator = (reserve_out - amount_out)
        .checked_mul(U256::from(10_000u16.saturating_sub(fee_bps)))
        .ok_or(LedgerError::Overflow)?;
    if denominator.is_zero() {
        return Err(LedgerError::Overflow);
    }
    Ok(numerator / denominator + U256::from(1u64))
}

/// One hop of a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapHop {
    pub pair: Address,
    pub token_in: Address,
    pub token_out: Address,
}

/// Ordered hops from `token_in` to `token_out`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwapRoute {
    pub hops: SmallVec<[SwapHop; 3]>,
}

impl SwapRoute {
    /// Build a route, checking that each hop starts where the last ended.
    pub fn new(hops: impl IntoIterator<Item = SwapHop>) -> Result<Self, String> {
        let hops: SmallVec<[SwapHop; 3]> = hops.into_iter().collect();
        for window in hops.windows(2) {
            if window[0].token_out != window[1].token_in {
                return Err(format!(
                    "route breaks between {} and {}: {} != {}",
                    window[0].pair, window[1].pair, window[0].token_out, window[1].token_in
                ));
            }
        }
        if let Some(hop) = hops.iter().find(|h| h.token_in == h.token_out) {
            return Err(format!("hop through {} swaps a token for itself", hop.pair));
        }
        Ok(Self { hops })
    }

    pub fn is_empty(&self) -> bool {
        self.hops.is_empty()
    }

    /// Check if this is a direct swap (single hop).
    pub fn is_direct(&self) -> bool {
        self.hops.len() == 1
    }

    pub fn token_in(&self) -> Option<Address> {
        self.hops.first().map(|h| h.token_in)
    }

    pub fn token_out(&self) -> Option<Address> {
        self.hops.last().map(|h| h.token_out)
    }

    /// Whether any hop trades through `pair`.
    pub fn uses_pair(&self, pair: Address) -> bool {
        self.hops.iter().any(|h| h.pair == pair)
    }
}

/// A priced swap, per hop and overall.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub amount_out: U256,
    /// Output of each hop, in route order
    pub hop_outputs: SmallVec<[U256; 3]>,
}

/// Pair reserves overlaid with swaps that have been simulated but not
/// executed.
#[derive(Debug, Default)]
pub struct ReserveOverlay {
    pairs: HashMap<Address, PairReserves>,
}

impl ReserveOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current reserves of `pair`: the overlay's if simulated, else the host's.
    pub fn reserves<H: Host>(&self, host: &H, pair: Address) -> Result<PairReserves, LedgerError> {
        match self.pairs.get(&pair) {
            Some(reserves) => Ok(*reserves),
            None => host.pair_reserves(pair),
        }
    }

    fn record(&mut self, reserves: PairReserves) {
        self.pairs.insert(reserves.pair, reserves);
    }
}

/// Stateless router over a host's pairs.
pub struct SwapRouter;

impl SwapRouter {
    /// Simulate `route` for `amount_in` without touching the host.
    pub fn quote<H: Host>(
        host: &H,
        overlay: &mut ReserveOverlay,
        route: &SwapRoute,
        amount_in: U256,
    ) -> Result<SwapQuote, LedgerError> {
        let (token_in, token_out) = route_ends(route)?;
        let mut amount = amount_in;
        let mut hop_outputs = SmallVec::new();

        for hop in &route.hops {
            let reserves = overlay.reserves(host, hop.pair)?;
            let state = oriented(&reserves, hop)?;
            let out = state.amount_out(amount)?;
            overlay.record(reserves.after_swap(hop.token_in, amount, out));
            hop_outputs.push(out);
            amount = out;
        }

        Ok(SwapQuote {
            token_in,
            token_out,
            amount_in,
            amount_out: amount,
            hop_outputs,
        })
    }

    /// Swap `amount_in` held by `holder` along `route`, delivering the
    /// output to `holder`. Each hop is priced from reserves read
    /// immediately before it executes. Fails with
    /// `InsufficientOutputAmount` when the final output is below `min_out`.
    pub fn execute<H: Host>(
        host: &mut H,
        route: &SwapRoute,
        amount_in: U256,
        min_out: U256,
        holder: Address,
    ) -> Result<SwapQuote, LedgerError> {
        let (token_in, token_out) = route_ends(route)?;
        let mut amount = amount_in;
        let mut hop_outputs = SmallVec::new();

        for hop in &route.hops {
            let reserves = host.pair_reserves(hop.pair)?;
            let expected = oriented(&reserves, hop)?.amount_out(amount)?;
            let out = host.swap(hop.pair, hop.token_in, amount, expected, holder, holder)?;
            debug!(
                pair = %hop.pair,
                token_in = %hop.token_in,
                token_out = %hop.token_out,
                amount_in = %amount,
                amount_out = %out,
                "Hop executed"
            );
            hop_outputs.push(out);
            amount = out;
        }

        if amount < min_out {
            return Err(LedgerError::InsufficientOutputAmount {
                pair: route.hops.last().map(|h| h.pair).unwrap_or_default(),
                amount_out: amount,
                min_out,
            });
        }

        Ok(SwapQuote {
            token_in,
            token_out,
            amount_in,
            amount_out: amount,
            hop_outputs,
        })
    }
}

fn route_ends(route: &SwapRoute) -> Result<(Address, Address), LedgerError> {
    match (route.token_in(), route.token_out()) {
        (Some(token_in), Some(token_out)) => Ok((token_in, token_out)),
        _ => Err(LedgerError::InsufficientInputAmount),
    }
}

fn oriented(reserves: &PairReserves, hop: &SwapHop) -> Result<ReserveState, LedgerError> {
    reserves
        .oriented(hop.token_in)
        .filter(|state| state.token_out == hop.token_out)
        .ok_or(LedgerError::TokenNotInPair {
            pair: hop.pair,
            token: hop.token_in,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(v: u64) -> U256 {
        U256::from(v)
    }

    #[test]
    fn test_get_amount_out_matches_formula() {
        // 1000 in, reserves 10_000/10_000, 0.3% fee
        // in_fee = 9_970_000; out = 9_970_000 * 10_000 / (100_000_000 + 9_970_000) = 906.61 -> 906
        assert_eq!(get_amount_out(u(1000), u(10_000), u(10_000), 30).unwrap(), u(906));
    }

    #[test]
    fn test_amount_out_is_monotonic_and_below_invariant_bound() {
        let (r_in, r_out) = (u(1_000_000), u(2_000_000));
        let mut last = U256::ZERO;
        for amount in [1u64, 10, 1_000, 100_000, 10_000_000] {
            let out = get_amount_out(u(amount), r_in, r_out, 30).unwrap();
            assert!(out >= last);
            // Fee-free constant-product output is an upper bound
            let bound = u(amount) * r_out / (r_in + u(amount));
            assert!(out <= bound);
            assert!(out < r_out);
            last = out;
        }
    }

    #[test]
    fn test_get_amount_in_inverts_amount_out() {
        let (r_in, r_out) = (u(5_000_000), u(9_000_000));
        let wanted = u(123_456);
        let needed = get_amount_in(wanted, r_in, r_out, 30).unwrap();
        assert!(get_amount_out(needed, r_in, r_out, 30).unwrap() >= wanted);
        assert!(get_amount_out(needed - u(1), r_in, r_out, 30).unwrap() <= wanted);
    }

    #[test]
    fn test_zero_and_empty_reserves() {
        assert_eq!(
            get_amount_out(U256::ZERO, u(1), u(1), 30).unwrap_err(),
            LedgerError::InsufficientInputAmount
        );
        assert!(matches!(
            get_amount_out(u(1), U256::ZERO, u(1), 30).unwrap_err(),
            LedgerError::InsufficientLiquidity { .. }
        ));
        assert!(get_amount_in(u(10), u(100), u(10), 30).is_err());
    }

    #[test]
    fn test_oriented_reserves() {
        let a = Address::repeat_byte(1);
        let b = Address::repeat_byte(2);
        let reserves = PairReserves {
            pair: Address::repeat_byte(9),
            token0: a,
            token1: b,
            reserve0: u(10),
            reserve1: u(20),
            fee_bps: 30,
        };
        let state = reserves.oriented(b).unwrap();
        assert_eq!((state.reserve_in, state.reserve_out, state.token_out), (u(20), u(10), a));
        assert!(reserves.oriented(Address::repeat_byte(3)).is_none());

        let after = reserves.after_swap(a, u(5), u(4));
        assert_eq!((after.reserve0, after.reserve1), (u(15), u(16)));
    }

    #[test]
    fn test_route_continuity() {
        let (a, b, c) = (Address::repeat_byte(1), Address::repeat_byte(2), Address::repeat_byte(3));
        let hop = |pair: u8, token_in, token_out| SwapHop {
            pair: Address::repeat_byte(pair),
            token_in,
            token_out,
        };
        let route = SwapRoute::new([hop(10, a, b), hop(11, b, c)]).unwrap();
        assert_eq!(route.token_in(), Some(a));
        assert_eq!(route.token_out(), Some(c));
        assert!(!route.is_direct());

        assert!(SwapRoute::new([hop(10, a, b), hop(11, a, c)]).is_err());
        assert!(SwapRoute::new([hop(10, a, a)]).is_err());
    }
}
