//! Journaled in-memory ledger forked from a historical block.
//!
//! Every call mutates the working state directly. `checkpoint` pushes a
//! copy of the state onto a journal; `revert_to` restores it and drops the
//! logs emitted since, `commit` discards the copy.

use alloy::primitives::{Address, Log, U256};
use alloy::sol_types::SolEvent;
use liquidation_core::events::{FlashLoan, LiquidationCallEvent, PairSwap};
use liquidation_core::valuation::quote_liquidation;
use liquidation_core::{
    FlashLoanSource, FlashLoanTerms, Host, LedgerError, LiquidationCall, LiquidationParams,
    LiquidationReceipt, PairReserves, Position, ReserveConfig,
};
use std::collections::HashMap;
use tracing::{debug, warn};

use crate::protocol::{LendingPool, Pair};

/// Handle to a journal entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    depth: usize,
    log_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OpenFlashLoan {
    terms: FlashLoanTerms,
    receiver: Address,
    /// Journal depth when the loan was opened
    depth: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct State {
    /// token -> holder -> balance
    balances: HashMap<Address, HashMap<Address, U256>>,
    native: HashMap<Address, U256>,
    pools: HashMap<Address, LendingPool>,
    pairs: HashMap<Address, Pair>,
    flash_loans: Vec<OpenFlashLoan>,
}

/// Fork ledger implementing [`Host`].
#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    chain_id: u64,
    block_number: u64,
    wrapped_native: Option<Address>,
    state: State,
    logs: Vec<Log>,
    journal: Vec<State>,
}

impl Ledger {
    pub fn new(chain_id: u64, block_number: u64) -> Self {
        Self {
            chain_id,
            block_number,
            wrapped_native: None,
            state: State::default(),
            logs: Vec::new(),
            journal: Vec::new(),
        }
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn wrapped_native(&self) -> Option<Address> {
        self.wrapped_native
    }

    pub fn set_wrapped_native(&mut self, token: Address) {
        self.wrapped_native = Some(token);
    }

    /// All logs emitted and not reverted.
    pub fn logs(&self) -> &[Log] {
        &self.logs
    }

    pub fn lending_pool(&self, pool: Address) -> Option<&LendingPool> {
        self.state.pools.get(&pool)
    }

    pub fn pair(&self, pair: Address) -> Option<&Pair> {
        self.state.pairs.get(&pair)
    }

    pub fn add_lending_pool(&mut self, pool: LendingPool) {
        self.state.pools.insert(pool.address, pool);
    }

    /// Register a pair and credit it with its reserves.
    pub fn add_pair(&mut self, pair: Pair) -> Result<(), LedgerError> {
        self.credit(pair.token0, pair.address, pair.reserve0)?;
        self.credit(pair.token1, pair.address, pair.reserve1)?;
        self.state.pairs.insert(pair.address, pair);
        Ok(())
    }

    // Fixture helpers

    /// Create `amount` of `token` out of thin air.
    pub fn mint(&mut self, token: Address, holder: Address, amount: U256) -> Result<(), LedgerError> {
        self.credit(token, holder, amount)
    }

    pub fn set_token_balance(&mut self, token: Address, holder: Address, amount: U256) {
        self.state.balances.entry(token).or_default().insert(holder, amount);
    }

    pub fn set_native_balance(&mut self, holder: Address, amount: U256) {
        self.state.native.insert(holder, amount);
    }

    /// Override the lending pool oracle price of `asset`.
    pub fn set_asset_price(&mut self, pool: Address, asset: Address, price: U256) -> Result<(), LedgerError> {
        self.pool_mut(pool)?.set_price(asset, price)
    }

    /// Set a pair's reserves and token balances.
    pub fn set_pair_reserves(&mut self, pair: Address, reserve0: U256, reserve1: U256) -> Result<(), LedgerError> {
        let (token0, token1) = {
            let pair = self.pair_ref(pair)?;
            (pair.token0, pair.token1)
        };
        self.set_token_balance(token0, pair, reserve0);
        self.set_token_balance(token1, pair, reserve1);
        self.pair_mut(pair)?.sync(reserve0, reserve1);
        Ok(())
    }

    // Internals

    fn pool_ref(&self, pool: Address) -> Result<&LendingPool, LedgerError> {
        self.state.pools.get(&pool).ok_or(LedgerError::UnknownPool(pool))
    }

    fn pool_mut(&mut self, pool: Address) -> Result<&mut LendingPool, LedgerError> {
        self.state.pools.get_mut(&pool).ok_or(LedgerError::UnknownPool(pool))
    }

    fn pair_ref(&self, pair: Address) -> Result<&Pair, LedgerError> {
        self.state.pairs.get(&pair).ok_or(LedgerError::UnknownPair(pair))
    }

    fn pair_mut(&mut self, pair: Address) -> Result<&mut Pair, LedgerError> {
        self.state.pairs.get_mut(&pair).ok_or(LedgerError::UnknownPair(pair))
    }

    fn credit(&mut self, token: Address, holder: Address, amount: U256) -> Result<(), LedgerError> {
        let balance = self.state.balances.entry(token).or_default().entry(holder).or_default();
        *balance = balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    fn debit(&mut self, token: Address, holder: Address, amount: U256) -> Result<(), LedgerError> {
        let available = self.token_balance(token, holder);
        if available < amount {
            return Err(LedgerError::InsufficientBalance {
                token,
                holder,
                needed: amount,
                available,
            });
        }
        self.state
            .balances
            .entry(token)
            .or_default()
            .insert(holder, available - amount);
        Ok(())
    }

    fn move_tokens(&mut self, token: Address, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        self.debit(token, from, amount)?;
        self.credit(token, to, amount)
    }

    fn emit<E: SolEvent>(&mut self, address: Address, event: &E) {
        self.logs.push(Log {
            address,
            data: event.encode_log_data(),
        });
    }

    fn sync_pair(&mut self, pair: Address) -> Result<(), LedgerError> {
        let (token0, token1) = {
            let p = self.pair_ref(pair)?;
            (p.token0, p.token1)
        };
        let balance0 = self.token_balance(token0, pair);
        let balance1 = self.token_balance(token1, pair);
        self.pair_mut(pair)?.sync(balance0, balance1);
        Ok(())
    }

    fn repay_to_pair(&mut self, pair: Address, terms: &FlashLoanTerms, payer: Address) -> Result<(), LedgerError> {
        let repayment = terms.repayment();
        self.move_tokens(terms.asset, payer, pair, repayment)?;

        let p = self.pair_ref(pair)?.clone();
        let balance0 = self.token_balance(p.token0, pair);
        let balance1 = self.token_balance(p.token1, pair);
        let (amount0_in, amount1_in, amount0_out, amount1_out) = if terms.asset == p.token0 {
            (repayment, U256::ZERO, terms.principal, U256::ZERO)
        } else {
            (U256::ZERO, repayment, U256::ZERO, terms.principal)
        };
        if !p.k_holds(balance0, balance1, amount0_in, amount1_in)? {
            // Reserves still hold the pre-loan amount
            let balance = if terms.asset == p.token0 { balance0 } else { balance1 };
            let lent_out = p.reserve_of(terms.asset)?.saturating_sub(terms.principal);
            return Err(LedgerError::FlashLoanUnderpaid {
                asset: terms.asset,
                required: repayment,
                repaid: balance.saturating_sub(lent_out),
            });
        }

        let pair_state = self.pair_mut(pair)?;
        pair_state.sync(balance0, balance1);
        pair_state.locked = false;
        self.emit(
            pair,
            &PairSwap {
                sender: payer,
                amount0In: amount0_in,
                amount1In: amount1_in,
                amount0Out: amount0_out,
                amount1Out: amount1_out,
                to: payer,
            },
        );
        Ok(())
    }
}

impl Host for Ledger {
    type Checkpoint = Checkpoint;

    fn block_number(&self) -> u64 {
        self.block_number
    }

    fn checkpoint(&mut self) -> Checkpoint {
        self.journal.push(self.state.clone());
        Checkpoint {
            depth: self.journal.len() - 1,
            log_index: self.logs.len(),
        }
    }

    fn revert_to(&mut self, checkpoint: Checkpoint) {
        if checkpoint.depth >= self.journal.len() {
            warn!(depth = checkpoint.depth, "Revert to a resolved checkpoint ignored");
            return;
        }
        self.journal.truncate(checkpoint.depth + 1);
        if let Some(saved) = self.journal.pop() {
            self.state = saved;
        }
        self.logs.truncate(checkpoint.log_index);
        debug!(depth = checkpoint.depth, "State reverted");
    }

    fn commit(&mut self, checkpoint: Checkpoint) -> Result<(), LedgerError> {
        if checkpoint.depth >= self.journal.len() {
            return Ok(());
        }
        if let Some(open) = self
            .state
            .flash_loans
            .iter()
            .find(|loan| loan.depth > checkpoint.depth)
        {
            return Err(LedgerError::FlashLoanOutstanding {
                source_address: open.terms.source.address(),
                asset: open.terms.asset,
            });
        }
        self.journal.truncate(checkpoint.depth);
        Ok(())
    }

    fn logs_since(&self, checkpoint: Checkpoint) -> Vec<Log> {
        let start = checkpoint.log_index.min(self.logs.len());
        self.logs[start..].to_vec()
    }

    fn native_balance(&self, holder: Address) -> U256 {
        self.state.native.get(&holder).copied().unwrap_or_default()
    }

    fn token_balance(&self, token: Address, holder: Address) -> U256 {
        self.state
            .balances
            .get(&token)
            .and_then(|holders| holders.get(&holder))
            .copied()
            .unwrap_or_default()
    }

    fn transfer(&mut self, token: Address, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        self.move_tokens(token, from, to, amount)
    }

    fn transfer_native(&mut self, from: Address, to: Address, amount: U256) -> Result<(), LedgerError> {
        let available = self.native_balance(from);
        if available < amount {
            return Err(LedgerError::InsufficientNativeBalance {
                holder: from,
                needed: amount,
                available,
            });
        }
        self.state.native.insert(from, available - amount);
        let to_balance = self.state.native.entry(to).or_default();
        *to_balance = to_balance.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    fn withdraw_wrapped(&mut self, wrapped: Address, holder: Address, amount: U256) -> Result<(), LedgerError> {
        if self.wrapped_native != Some(wrapped) {
            return Err(LedgerError::NotWrappedNative(wrapped));
        }
        self.debit(wrapped, holder, amount)?;
        // The wrapper contract holds the native backing
        self.transfer_native(wrapped, holder, amount)
    }

    fn user_position(&self, pool: Address, user: Address) -> Result<Position, LedgerError> {
        self.pool_ref(pool)?.position(user)
    }

    fn reserve_config(&self, pool: Address, asset: Address) -> Result<ReserveConfig, LedgerError> {
        self.pool_ref(pool)?.reserve(asset).copied()
    }

    fn liquidation_params(&self, pool: Address) -> Result<LiquidationParams, LedgerError> {
        Ok(self.pool_ref(pool)?.params)
    }

    fn liquidation_call(&mut self, pool: Address, call: &LiquidationCall) -> Result<LiquidationReceipt, LedgerError> {
        let lending_pool = self.pool_ref(pool)?;
        let position = lending_pool.position(call.user)?;
        let quote = quote_liquidation(
            &position,
            call.collateral_asset,
            call.debt_asset,
            call.debt_to_cover,
            &lending_pool.params,
        )
        .map_err(|reason| LedgerError::Protocol(reason.as_revert()))?;

        if !call.receive_a_token {
            let available = self.token_balance(call.collateral_asset, pool);
            if available < quote.collateral_to_seize {
                return Err(LedgerError::InsufficientLiquidity {
                    source_address: pool,
                    asset: call.collateral_asset,
                    requested: quote.collateral_to_seize,
                    available,
                });
            }
        }

        self.move_tokens(call.debt_asset, call.liquidator, pool, quote.debt_to_cover)?;
        self.pool_mut(pool)?.apply_liquidation(
            call.user,
            call.collateral_asset,
            call.debt_asset,
            quote.debt_to_cover,
            quote.collateral_to_seize,
        )?;
        if call.receive_a_token {
            let supplied = self
                .pool_mut(pool)?
                .accounts
                .entry(call.liquidator)
                .or_default()
                .supplied
                .entry(call.collateral_asset)
                .or_default();
            supplied.amount = supplied
                .amount
                .checked_add(quote.collateral_to_seize)
                .ok_or(LedgerError::Overflow)?;
        } else {
            self.move_tokens(call.collateral_asset, pool, call.liquidator, quote.collateral_to_seize)?;
        }

        self.emit(
            pool,
            &LiquidationCallEvent {
                collateralAsset: call.collateral_asset,
                debtAsset: call.debt_asset,
                user: call.user,
                debtToCover: quote.debt_to_cover,
                liquidatedCollateralAmount: quote.collateral_to_seize,
                liquidator: call.liquidator,
                receiveAToken: call.receive_a_token,
            },
        );
        debug!(
            %pool,
            user = %call.user,
            liquidator = %call.liquidator,
            debt_repaid = %quote.debt_to_cover,
            collateral_seized = %quote.collateral_to_seize,
            "liquidationCall executed"
        );

        Ok(LiquidationReceipt {
            debt_repaid: quote.debt_to_cover,
            collateral_seized: quote.collateral_to_seize,
        })
    }

    fn available_liquidity(&self, source: FlashLoanSource, asset: Address) -> Result<U256, LedgerError> {
        match source {
            FlashLoanSource::LendingPool { pool } => {
                self.pool_ref(pool)?.reserve(asset)?;
                Ok(self.token_balance(asset, pool))
            }
            // A pair must keep at least one unit of each reserve
            FlashLoanSource::Pair { pair } => {
                Ok(self.pair_ref(pair)?.reserve_of(asset)?.saturating_sub(U256::from(1u64)))
            }
        }
    }

    fn flash_loan_fee_bps(&self, source: FlashLoanSource) -> Result<u16, LedgerError> {
        match source {
            FlashLoanSource::LendingPool { pool } => Ok(self.pool_ref(pool)?.flash_loan_premium_bps),
            FlashLoanSource::Pair { pair } => Ok(self.pair_ref(pair)?.fee_bps),
        }
    }

    fn flash_borrow(
        &mut self,
        source: FlashLoanSource,
        asset: Address,
        amount: U256,
        receiver: Address,
    ) -> Result<FlashLoanTerms, LedgerError> {
        let outstanding = LedgerError::FlashLoanOutstanding {
            source_address: source.address(),
            asset,
        };
        if self
            .state
            .flash_loans
            .iter()
            .any(|loan| loan.terms.source == source && loan.terms.asset == asset)
        {
            return Err(outstanding);
        }

        let available = self.available_liquidity(source, asset)?;
        if available < amount {
            return Err(LedgerError::InsufficientLiquidity {
                source_address: source.address(),
                asset,
                requested: amount,
                available,
            });
        }

        let fee_bps = self.flash_loan_fee_bps(source)?;
        let terms = match source {
            FlashLoanSource::LendingPool { pool } => FlashLoanTerms::lending_pool(pool, asset, amount, fee_bps),
            FlashLoanSource::Pair { pair } => {
                if self.pair_ref(pair)?.locked {
                    return Err(outstanding);
                }
                FlashLoanTerms::pair(pair, asset, amount, fee_bps)
            }
        }
        .ok_or(LedgerError::Overflow)?;

        self.move_tokens(asset, source.address(), receiver, amount)?;
        if let FlashLoanSource::Pair { pair } = source {
            self.pair_mut(pair)?.locked = true;
        }
        self.state.flash_loans.push(OpenFlashLoan {
            terms,
            receiver,
            depth: self.journal.len(),
        });
        debug!(
            source = %source.address(),
            %asset,
            principal = %terms.principal,
            premium = %terms.premium,
            "Flash loan opened"
        );
        Ok(terms)
    }

    fn flash_repay(&mut self, terms: &FlashLoanTerms, payer: Address) -> Result<(), LedgerError> {
        let index = self
            .state
            .flash_loans
            .iter()
            .position(|loan| loan.terms == *terms)
            .ok_or(LedgerError::FlashLoanNotFound {
                source_address: terms.source.address(),
                asset: terms.asset,
            })?;
        let open = self.state.flash_loans[index];

        match terms.source {
            FlashLoanSource::LendingPool { pool } => {
                self.move_tokens(terms.asset, payer, pool, terms.repayment())?;
                self.emit(
                    pool,
                    &FlashLoan {
                        target: open.receiver,
                        initiator: open.receiver,
                        asset: terms.asset,
                        amount: terms.principal,
                        premium: terms.premium,
                        referralCode: 0,
                    },
                );
            }
            FlashLoanSource::Pair { pair } => self.repay_to_pair(pair, terms, payer)?,
        }

        self.state.flash_loans.remove(index);
        debug!(
            source = %terms.source.address(),
            asset = %terms.asset,
            repayment = %terms.repayment(),
            "Flash loan closed"
        );
        Ok(())
    }

    fn pair_reserves(&self, pair: Address) -> Result<PairReserves, LedgerError> {
        Ok(self.pair_ref(pair)?.reserves())
    }

    fn swap(
        &mut self,
        pair: Address,
        token_in: Address,
        amount_in: U256,
        min_out: U256,
        sender: Address,
        recipient: Address,
    ) -> Result<U256, LedgerError> {
        let p = self.pair_ref(pair)?.clone();
        if p.locked {
            return Err(LedgerError::FlashLoanOutstanding {
                source_address: pair,
                asset: token_in,
            });
        }
        let state = p
            .reserves()
            .oriented(token_in)
            .ok_or(LedgerError::TokenNotInPair { pair, token: token_in })?;
        let amount_out = state.amount_out(amount_in)?;
        if amount_out.is_zero() || amount_out < min_out {
            return Err(LedgerError::InsufficientOutputAmount {
                pair,
                amount_out,
                min_out,
            });
        }

        self.move_tokens(token_in, sender, pair, amount_in)?;
        self.move_tokens(state.token_out, pair, recipient, amount_out)?;

        let (amount0_in, amount1_in, amount0_out, amount1_out) = if token_in == p.token0 {
            (amount_in, U256::ZERO, U256::ZERO, amount_out)
        } else {
            (U256::ZERO, amount_in, amount_out, U256::ZERO)
        };
        let balance0 = self.token_balance(p.token0, pair);
        let balance1 = self.token_balance(p.token1, pair);
        if !p.k_holds(balance0, balance1, amount0_in, amount1_in)? {
            return Err(LedgerError::InsufficientInputAmount);
        }
        self.sync_pair(pair)?;

        self.emit(
            pair,
            &PairSwap {
                sender,
                amount0In: amount0_in,
                amount1In: amount1_in,
                amount0Out: amount0_out,
                amount1Out: amount1_out,
                to: recipient,
            },
        );
        debug!(%pair, %token_in, %amount_in, %amount_out, "Pair swap");
        Ok(amount_out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquidation_core::router::get_amount_out;
    use liquidation_core::WETH;

    const A: Address = Address::repeat_byte(0x0a);
    const B: Address = Address::repeat_byte(0x0b);
    const PAIR: Address = Address::repeat_byte(0x50);
    const ALICE: Address = Address::repeat_byte(0xa1);

    fn ledger() -> Ledger {
        let mut ledger = Ledger::new(1, 100);
        ledger
            .add_pair(Pair {
                address: PAIR,
                token0: A,
                token1: B,
                reserve0: U256::from(1_000_000u64),
                reserve1: U256::from(1_000_000u64),
                fee_bps: 30,
                locked: false,
            })
            .unwrap();
        ledger.mint(A, ALICE, U256::from(10_000u64)).unwrap();
        ledger
    }

    #[test]
    fn test_revert_restores_balances_and_logs() {
        let mut ledger = ledger();
        let cp = ledger.checkpoint();
        ledger.swap(PAIR, A, U256::from(1_000u64), U256::ZERO, ALICE, ALICE).unwrap();
        assert_eq!(ledger.logs().len(), 1);
        assert_eq!(ledger.logs_since(cp).len(), 1);
        ledger.revert_to(cp);
        assert!(ledger.logs().is_empty());
        assert_eq!(ledger.token_balance(A, ALICE), U256::from(10_000u64));
        assert_eq!(ledger.pair(PAIR).unwrap().reserve0, U256::from(1_000_000u64));
    }

    #[test]
    fn test_commit_keeps_changes() {
        let mut ledger = ledger();
        let cp = ledger.checkpoint();
        ledger.transfer(A, ALICE, B, U256::from(5u64)).unwrap();
        ledger.commit(cp).unwrap();
        assert_eq!(ledger.token_balance(A, B), U256::from(5u64));
        // Resolved checkpoint: revert is a no-op
        ledger.revert_to(cp);
        assert_eq!(ledger.token_balance(A, B), U256::from(5u64));
    }

    #[test]
    fn test_swap_matches_router_and_syncs() {
        let mut ledger = ledger();
        let amount_in = U256::from(1_000u64);
        let expected = get_amount_out(amount_in, U256::from(1_000_000u64), U256::from(1_000_000u64), 30).unwrap();
        let out = ledger.swap(PAIR, A, amount_in, expected, ALICE, ALICE).unwrap();
        assert_eq!(out, expected);
        let pair = ledger.pair(PAIR).unwrap();
        assert_eq!(pair.reserve0, U256::from(1_001_000u64));
        assert_eq!(pair.reserve1, U256::from(1_000_000u64) - out);

        let err = ledger
            .swap(PAIR, A, amount_in, U256::from(1_000u64), ALICE, ALICE)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientOutputAmount { .. }));
    }

    #[test]
    fn test_pair_flash_loan_must_be_repaid_before_commit() {
        let mut ledger = ledger();
        let source = FlashLoanSource::Pair { pair: PAIR };
        let cp = ledger.checkpoint();
        let terms = ledger.flash_borrow(source, B, U256::from(1_000u64), ALICE).unwrap();
        assert_eq!(terms.repayment(), U256::from(1_004u64));

        // Locked while the flash swap is open
        assert!(ledger.swap(PAIR, A, U256::from(10u64), U256::ZERO, ALICE, ALICE).is_err());
        assert!(matches!(
            ledger.commit(cp).unwrap_err(),
            LedgerError::FlashLoanOutstanding { .. }
        ));

        // Borrower only holds the principal: repayment fails
        assert!(matches!(
            ledger.flash_repay(&terms, ALICE).unwrap_err(),
            LedgerError::InsufficientBalance { .. }
        ));
        ledger.revert_to(cp);
        assert_eq!(ledger.token_balance(B, ALICE), U256::ZERO);
        assert!(!ledger.pair(PAIR).unwrap().locked);
    }

    #[test]
    fn test_pair_flash_loan_round_trip() {
        let mut ledger = ledger();
        ledger.mint(B, ALICE, U256::from(4u64)).unwrap();
        let source = FlashLoanSource::Pair { pair: PAIR };
        let cp = ledger.checkpoint();
        let terms = ledger.flash_borrow(source, B, U256::from(1_000u64), ALICE).unwrap();
        ledger.flash_repay(&terms, ALICE).unwrap();
        ledger.commit(cp).unwrap();
        assert_eq!(ledger.pair(PAIR).unwrap().reserve1, U256::from(1_000_004u64));
        assert!(ledger.flash_repay(&terms, ALICE).is_err());
    }

    #[test]
    fn test_pair_flash_loan_underpaid_after_drain() {
        let mut ledger = ledger();
        ledger.mint(B, ALICE, U256::from(4u64)).unwrap();
        let source = FlashLoanSource::Pair { pair: PAIR };
        let cp = ledger.checkpoint();
        let terms = ledger.flash_borrow(source, B, U256::from(1_000u64), ALICE).unwrap();

        // 100 of the remaining B leaves the pair while the loan is open
        ledger.set_token_balance(B, PAIR, U256::from(998_900u64));
        assert_eq!(
            ledger.flash_repay(&terms, ALICE).unwrap_err(),
            LedgerError::FlashLoanUnderpaid {
                asset: B,
                required: U256::from(1_004u64),
                repaid: U256::from(904u64),
            }
        );
        ledger.revert_to(cp);
        assert_eq!(ledger.token_balance(B, PAIR), U256::from(1_000_000u64));
    }

    #[test]
    fn test_withdraw_wrapped_native() {
        let mut ledger = Ledger::new(1, 1);
        ledger.set_wrapped_native(WETH.address);
        ledger.set_native_balance(WETH.address, U256::from(100u64));
        ledger.mint(WETH.address, ALICE, U256::from(40u64)).unwrap();
        ledger.withdraw_wrapped(WETH.address, ALICE, U256::from(40u64)).unwrap();
        assert_eq!(ledger.native_balance(ALICE), U256::from(40u64));
        assert_eq!(ledger.token_balance(WETH.address, ALICE), U256::ZERO);
        assert_eq!(
            ledger.withdraw_wrapped(A, ALICE, U256::from(1u64)).unwrap_err(),
            LedgerError::NotWrappedNative(A)
        );
    }

    #[test]
    fn test_unknown_pool() {
        let ledger = ledger();
        assert_eq!(
            ledger.liquidation_params(PAIR).unwrap_err(),
            LedgerError::UnknownPool(PAIR)
        );
    }
}
