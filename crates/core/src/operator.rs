//! The liquidation operator.
//!
//! One call runs a fixed pipeline inside a single host checkpoint:
//!
//! ```text
//! Idle → Borrowing → Liquidating → Swapping → Repaying → ProfitChecked → Succeeded
//!   └──────────────┴──────────────┴──────────┴───────────┴──────────────→ RevertedAtomically
//! ```
//!
//! Any failure rolls the host back to the checkpoint, so callers observe
//! either the whole liquidation or nothing.

use alloy::primitives::{Address, Log, U256};
use smallvec::SmallVec;
use tracing::{debug, info, instrument, warn};

use crate::assets::REGISTRY;
use crate::config::{OperatorSettings, Settlement};
use crate::error::{LedgerError, OperatorError, Result};
use crate::flash_loan::{FlashLoanSource, FlashLoanTerms};
use crate::host::{Host, LiquidationCall, LiquidationReceipt};
use crate::profit::{FlowKind, FlowLedger, ProfitLedger, ReferenceAsset};
use crate::reader::ReserveReader;
use crate::router::{ReserveOverlay, SwapQuote, SwapRoute, SwapRouter};
use crate::u256_math;
use crate::valuation::{quote_liquidation, DebtToCover, LiquidationQuote};

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Idle,
    Borrowing,
    Liquidating,
    Swapping,
    Repaying,
    ProfitChecked,
    Succeeded,
    RevertedAtomically,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::RevertedAtomically)
    }

    /// Forward by exactly one step, or to `RevertedAtomically` from any
    /// non-terminal stage.
    pub fn can_transition_to(self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (Idle, Borrowing)
            | (Borrowing, Liquidating)
            | (Liquidating, Swapping)
            | (Swapping, Repaying)
            | (Repaying, ProfitChecked)
            | (ProfitChecked, Succeeded) => true,
            (from, RevertedAtomically) => !from.is_terminal(),
            _ => false,
        }
    }
}

/// Stage tracker with transition checks.
#[derive(Debug, Clone)]
pub struct StageMachine {
    history: SmallVec<[Stage; 8]>,
}

impl StageMachine {
    /// Every call starts at `Idle`.
    pub fn new() -> Self {
        let mut history = SmallVec::new();
        history.push(Stage::Idle);
        Self { history }
    }

    pub fn current(&self) -> Stage {
        self.history.last().copied().unwrap_or(Stage::Idle)
    }

    pub fn advance(&mut self, next: Stage) -> Result<()> {
        let from = self.current();
        if !from.can_transition_to(next) {
            return Err(OperatorError::InvalidTransition { from, to: next });
        }
        debug!(?from, to = ?next, "Stage transition");
        self.history.push(next);
        Ok(())
    }

    /// Move to `RevertedAtomically`. Returns the stage that failed.
    pub fn revert(&mut self) -> Stage {
        let failed = self.current();
        if !failed.is_terminal() {
            self.history.push(Stage::RevertedAtomically);
        }
        failed
    }

    pub fn history(&self) -> &[Stage] {
        &self.history
    }
}

impl Default for StageMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only dry run of one call against current host state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    pub block_number: u64,
    pub liquidation: LiquidationQuote,
    pub flash_loan: FlashLoanTerms,
    /// Collateral -> debt asset, if the assets differ
    pub collateral_swap: Option<SwapQuote>,
    /// Debt asset available for repayment after the collateral swap
    pub proceeds: U256,
    /// Debt asset left after repaying the flash loan
    pub residual: U256,
    /// Debt asset -> settlement token, if the assets differ
    pub payout_swap: Option<SwapQuote>,
    /// Minimum accepted payout swap output
    pub payout_min_out: U256,
    /// Expected credit to the caller in the reference asset
    pub expected_profit: U256,
}

/// Outcome of a successful call.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub plan: ExecutionPlan,
    pub flash_loan: FlashLoanTerms,
    pub liquidation: LiquidationReceipt,
    pub collateral_swap: Option<SwapQuote>,
    pub payout_swap: Option<SwapQuote>,
    pub profit: U256,
    pub profit_ledger: ProfitLedger,
    pub flows: FlowLedger,
    pub stages: Vec<Stage>,
    /// Logs emitted during the call
    pub logs: Vec<Log>,
}

/// Flash-loan funded liquidation of one configured position.
#[derive(Debug, Clone)]
pub struct LiquidationOperator {
    settings: OperatorSettings,
}

impl LiquidationOperator {
    pub fn new(settings: OperatorSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &OperatorSettings {
        &self.settings
    }

    /// Price the whole pipeline from fresh reads without mutating the host.
    pub fn plan<H: Host>(&self, host: &H) -> Result<ExecutionPlan> {
        let s = &self.settings;
        let reader = ReserveReader::new(host);
        let ledger_err = |err: LedgerError| OperatorError::from_ledger(Stage::Idle, s.borrower, err);

        // A pair stays locked for swaps while its flash loan is open
        if let FlashLoanSource::Pair { pair } = s.flash_loan {
            if s.collateral_route.uses_pair(pair) || s.payout_route.uses_pair(pair) {
                return Err(OperatorError::Config(format!(
                    "flash loan pair {pair} is also a swap hop"
                )));
            }
        }

        let position = reader.position(s.lending_pool, s.borrower).map_err(ledger_err)?;
        let mut params = reader.liquidation_params(s.lending_pool).map_err(ledger_err)?;
        if let Some(cap) = s.close_factor_cap_bps {
            params.close_factor_bps = params.close_factor_bps.min(cap);
        }

        let liquidation = quote_liquidation(
            &position,
            s.collateral_asset,
            s.debt_asset,
            s.debt_to_cover,
            &params,
        )
        .map_err(|reason| OperatorError::NotLiquidatable {
            user: s.borrower,
            reason,
        })?;

        let available = reader.liquidity(s.flash_loan, s.debt_asset).map_err(ledger_err)?;
        if available < liquidation.debt_to_cover {
            return Err(OperatorError::InsufficientLiquidity {
                source_address: s.flash_loan.address(),
                asset: s.debt_asset,
                requested: liquidation.debt_to_cover,
                available,
            });
        }

        let fee_bps = reader.flash_loan_fee_bps(s.flash_loan).map_err(ledger_err)?;
        let flash_loan = flash_terms(s.flash_loan, s.debt_asset, liquidation.debt_to_cover, fee_bps)
            .ok_or_else(|| ledger_err(LedgerError::Overflow))?;

        let mut overlay = ReserveOverlay::new();
        let collateral_swap = quote_route(
            host,
            &mut overlay,
            &s.collateral_route,
            liquidation.collateral_to_seize,
        )
        .map_err(ledger_err)?;
        let proceeds = collateral_swap
            .as_ref()
            .map(|q| q.amount_out)
            .unwrap_or(liquidation.collateral_to_seize);

        let repayment = flash_loan.repayment();
        if proceeds < repayment {
            return Err(OperatorError::RepaymentShortfall {
                asset: s.debt_asset,
                required: repayment,
                available: proceeds,
            });
        }
        let residual = proceeds - repayment;

        let (payout_swap, expected_profit) = if residual.is_zero() {
            (None, U256::ZERO)
        } else {
            let quote = quote_route(host, &mut overlay, &s.payout_route, residual).map_err(ledger_err)?;
            let out = quote.as_ref().map(|q| q.amount_out).unwrap_or(residual);
            (quote, out)
        };
        let payout_min_out = self.payout_min_out(host, residual, expected_profit);

        let plan = ExecutionPlan {
            block_number: host.block_number(),
            liquidation,
            flash_loan,
            collateral_swap,
            proceeds,
            residual,
            payout_swap,
            payout_min_out,
            expected_profit,
        };
        debug!(
            debt_to_cover = %plan.liquidation.debt_to_cover,
            collateral_to_seize = %plan.liquidation.collateral_to_seize,
            repayment = %repayment,
            proceeds = %plan.proceeds,
            expected_profit = %plan.expected_profit,
            "Execution planned"
        );
        Ok(plan)
    }

    /// Run the liquidation as one atomic call on `host`.
    #[instrument(skip_all, fields(operator = %self.settings.name, borrower = %self.settings.borrower))]
    pub fn operate<H: Host>(&self, host: &mut H) -> Result<ExecutionReport> {
        let checkpoint = host.checkpoint();
        let mut machine = StageMachine::new();

        let outcome = self.run(host, &mut machine).and_then(|mut report| {
            report.logs = host.logs_since(checkpoint);
            host.commit(checkpoint)
                .map_err(|err| OperatorError::from_ledger(machine.current(), self.settings.borrower, err))?;
            Ok(report)
        });

        match outcome {
            Ok(mut report) => {
                machine.advance(Stage::Succeeded)?;
                report.stages = machine.history().to_vec();
                info!(
                    profit = %report.profit,
                    logs = report.logs.len(),
                    "Liquidation succeeded"
                );
                Ok(report)
            }
            Err(err) => {
                host.revert_to(checkpoint);
                let failed_at = machine.revert();
                warn!(
                    stage = ?failed_at,
                    reason = err.reason_code(),
                    error = %err,
                    "Liquidation reverted"
                );
                Err(err)
            }
        }
    }

    fn run<H: Host>(&self, host: &mut H, machine: &mut StageMachine) -> Result<ExecutionReport> {
        let s = &self.settings;
        let user = s.borrower;
        let operator = s.address;
        let debt = ReferenceAsset::Token(s.debt_asset);
        let collateral = ReferenceAsset::Token(s.collateral_asset);

        // Fails fast with no mutation if the position is not eligible.
        let plan = self.plan(host)?;

        let mut profit = ProfitLedger::open(host, s.caller, s.settlement.reference());
        let mut flows = FlowLedger::new();
        let entry_balance = host.token_balance(s.debt_asset, operator);

        machine.advance(Stage::Borrowing)?;
        let flash_loan = host
            .flash_borrow(s.flash_loan, s.debt_asset, plan.flash_loan.principal, operator)
            .map_err(|err| OperatorError::from_ledger(Stage::Borrowing, user, err))?;
        flows.credit(FlowKind::FlashPrincipal, debt, flash_loan.principal);
        info!(
            source = %s.flash_loan.address(),
            asset = %REGISTRY.symbol(&s.debt_asset),
            principal = %flash_loan.principal,
            premium = %flash_loan.premium,
            "Flash loan taken"
        );

        machine.advance(Stage::Liquidating)?;
        let call = LiquidationCall {
            collateral_asset: s.collateral_asset,
            debt_asset: s.debt_asset,
            user,
            debt_to_cover: DebtToCover::Exact(flash_loan.principal),
            liquidator: operator,
            receive_a_token: s.receive_a_token,
        };
        let liquidation = host
            .liquidation_call(s.lending_pool, &call)
            .map_err(|err| OperatorError::from_liquidation(&call, err))?;
        flows.debit(FlowKind::DebtRepaid, debt, liquidation.debt_repaid);
        flows.credit(FlowKind::CollateralSeized, collateral, liquidation.collateral_seized);
        info!(
            debt_repaid = %liquidation.debt_repaid,
            collateral_seized = %liquidation.collateral_seized,
            "Position liquidated"
        );

        machine.advance(Stage::Swapping)?;
        let repayment = flash_loan.repayment();
        let on_hand = host.token_balance(s.debt_asset, operator).saturating_sub(entry_balance);
        let collateral_swap = if s.collateral_route.is_empty() {
            None
        } else {
            let min_out = repayment.saturating_sub(on_hand);
            let quote = SwapRouter::execute(host, &s.collateral_route, liquidation.collateral_seized, min_out, operator)
                .map_err(|err| OperatorError::from_ledger(Stage::Swapping, user, err))?;
            flows.debit(FlowKind::SwapIn, collateral, quote.amount_in);
            flows.credit(FlowKind::SwapOut, debt, quote.amount_out);
            info!(
                amount_in = %quote.amount_in,
                amount_out = %quote.amount_out,
                min_out = %min_out,
                hops = quote.hop_outputs.len(),
                "Collateral swapped"
            );
            Some(quote)
        };

        machine.advance(Stage::Repaying)?;
        let available = host.token_balance(s.debt_asset, operator).saturating_sub(entry_balance);
        if available < repayment {
            return Err(OperatorError::RepaymentShortfall {
                asset: s.debt_asset,
                required: repayment,
                available,
            });
        }
        host.flash_repay(&flash_loan, operator)
            .map_err(|err| OperatorError::from_ledger(Stage::Repaying, user, err))?;
        flows.debit(FlowKind::FlashRepayment, debt, repayment);
        info!(repayment = %repayment, "Flash loan repaid");

        let residual = available - repayment;
        let payout_swap = self.settle(host, residual, &mut flows)?;

        machine.advance(Stage::ProfitChecked)?;
        let realized = profit.close(host)?;
        info!(
            starting = %profit.starting,
            ending = ?profit.ending,
            profit = %realized,
            "Profit checked"
        );

        Ok(ExecutionReport {
            plan,
            flash_loan,
            liquidation,
            collateral_swap,
            payout_swap,
            profit: realized,
            profit_ledger: profit,
            flows,
            stages: Vec::new(),
            logs: Vec::new(),
        })
    }

    /// Convert the residual debt asset to the settlement asset and send it
    /// to the caller.
    fn settle<H: Host>(
        &self,
        host: &mut H,
        residual: U256,
        flows: &mut FlowLedger,
    ) -> Result<Option<SwapQuote>> {
        let s = &self.settings;
        let operator = s.address;
        let ledger_err = |err: LedgerError| OperatorError::from_ledger(Stage::Repaying, s.borrower, err);

        if residual.is_zero() {
            debug!("Nothing left to pay out");
            return Ok(None);
        }

        let (amount, payout_swap) = if s.payout_route.is_empty() {
            (residual, None)
        } else {
            let quoted = SwapRouter::quote(&*host, &mut ReserveOverlay::new(), &s.payout_route, residual)
                .map_err(ledger_err)?
                .amount_out;
            let min_out = self.payout_min_out(host, residual, quoted);
            let quote = SwapRouter::execute(host, &s.payout_route, residual, min_out, operator)
                .map_err(ledger_err)?;
            flows.debit(FlowKind::SwapIn, ReferenceAsset::Token(s.debt_asset), quote.amount_in);
            flows.credit(FlowKind::SwapOut, ReferenceAsset::Token(s.settlement.token()), quote.amount_out);
            (quote.amount_out, Some(quote))
        };

        match s.settlement {
            Settlement::Native { wrapped } => {
                host.withdraw_wrapped(wrapped, operator, amount).map_err(ledger_err)?;
                flows.debit(FlowKind::Unwrap, ReferenceAsset::Token(wrapped), amount);
                flows.credit(FlowKind::Unwrap, ReferenceAsset::Native, amount);
                host.transfer_native(operator, s.caller, amount).map_err(ledger_err)?;
                flows.debit(FlowKind::Payout, ReferenceAsset::Native, amount);
            }
            Settlement::Token { asset } => {
                host.transfer(asset, operator, s.caller, amount).map_err(ledger_err)?;
                flows.debit(FlowKind::Payout, ReferenceAsset::Token(asset), amount);
            }
        }
        info!(to = %s.caller, amount = %amount, "Profit paid out");
        Ok(payout_swap)
    }

    /// Oracle value of `residual` in the settlement token, less the payout
    /// slippage allowance. Falls back to `quoted` when the pool does not
    /// price both assets.
    fn payout_min_out<H: Host>(&self, host: &H, residual: U256, quoted: U256) -> U256 {
        let s = &self.settings;
        let reference = ReserveReader::new(host)
            .oracle_convert(s.lending_pool, s.debt_asset, s.settlement.token(), residual)
            .unwrap_or(quoted);
        u256_math::apply_basis_points(reference, s.payout_slippage_bps).unwrap_or(U256::ZERO)
    }
}

fn flash_terms(
    source: FlashLoanSource,
    asset: Address,
    principal: U256,
    fee_bps: u16,
) -> Option<FlashLoanTerms> {
    match source {
        FlashLoanSource::LendingPool { pool } => FlashLoanTerms::lending_pool(pool, asset, principal, fee_bps),
        FlashLoanSource::Pair { pair } => FlashLoanTerms::pair(pair, asset, principal, fee_bps),
    }
}

fn quote_route<H: Host>(
    host: &H,
    overlay: &mut ReserveOverlay,
    route: &SwapRoute,
    amount_in: U256,
) -> std::result::Result<Option<SwapQuote>, LedgerError> {
    if route.is_empty() {
        return Ok(None);
    }
    SwapRouter::quote(host, overlay, route, amount_in).map(Some)
}
