//! Profit guard and per-asset flow accounting.

use alloy::primitives::{Address, U256};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{OperatorError, Result};
use crate::host::Host;

/// The asset profit is measured in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceAsset {
    /// The chain's native asset
    Native,
    /// An ERC-20 token
    Token(Address),
}

impl ReferenceAsset {
    pub fn balance_of<H: Host>(&self, host: &H, holder: Address) -> U256 {
        match self {
            Self::Native => host.native_balance(holder),
            Self::Token(token) => host.token_balance(*token, holder),
        }
    }
}

/// Starting and ending reference balance of one account over one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfitLedger {
    pub account: Address,
    pub reference: ReferenceAsset,
    pub starting: U256,
    pub ending: Option<U256>,
}

impl ProfitLedger {
    /// Record the starting balance.
    pub fn open<H: Host>(host: &H, account: Address, reference: ReferenceAsset) -> Self {
        Self {
            account,
            reference,
            starting: reference.balance_of(host, account),
            ending: None,
        }
    }

    /// Record the ending balance and enforce `ending > starting`.
    /// Returns the profit.
    pub fn close<H: Host>(&mut self, host: &H) -> Result<U256> {
        let ending = self.reference.balance_of(host, self.account);
        self.ending = Some(ending);
        if ending > self.starting {
            Ok(ending - self.starting)
        } else {
            Err(OperatorError::UnprofitableOutcome {
                starting: self.starting,
                ending,
            })
        }
    }

    pub fn profit(&self) -> Option<U256> {
        self.ending.map(|ending| ending.saturating_sub(self.starting))
    }
}

/// What moved value in or out of the operator account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FlowKind {
    FlashPrincipal,
    DebtRepaid,
    CollateralSeized,
    SwapIn,
    SwapOut,
    FlashRepayment,
    Unwrap,
    Payout,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::FlashPrincipal => "flash_principal",
            Self::DebtRepaid => "debt_repaid",
            Self::CollateralSeized => "collateral_seized",
            Self::SwapIn => "swap_in",
            Self::SwapOut => "swap_out",
            Self::FlashRepayment => "flash_repayment",
            Self::Unwrap => "unwrap",
            Self::Payout => "payout",
        };
        f.write_str(name)
    }
}

/// One recorded movement. `inflow` is from the operator's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Flow {
    pub kind: FlowKind,
    pub asset: ReferenceAsset,
    pub amount: U256,
    pub inflow: bool,
}

/// Totals for one asset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssetFlows {
    pub inflow: U256,
    pub outflow: U256,
}

impl AssetFlows {
    pub fn is_balanced(&self) -> bool {
        self.inflow == self.outflow
    }
}

/// Every inflow and outflow of the operator account during one call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlowLedger {
    flows: Vec<Flow>,
}

impl FlowLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn credit(&mut self, kind: FlowKind, asset: ReferenceAsset, amount: U256) {
        self.flows.push(Flow {
            kind,
            asset,
            amount,
            inflow: true,
        });
    }

    pub fn debit(&mut self, kind: FlowKind, asset: ReferenceAsset, amount: U256) {
        self.flows.push(Flow {
            kind,
            asset,
            amount,
            inflow: false,
        });
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    /// Sum of recorded amounts of `kind`.
    pub fn total(&self, kind: FlowKind) -> U256 {
        self.flows
            .iter()
            .filter(|f| f.kind == kind)
            .fold(U256::ZERO, |acc, f| acc.saturating_add(f.amount))
    }

    /// Per-asset totals, keyed by token address (`Address::ZERO` for native).
    pub fn by_asset(&self) -> BTreeMap<Address, AssetFlows> {
        let mut totals: BTreeMap<Address, AssetFlows> = BTreeMap::new();
        for flow in &self.flows {
            let key = match flow.asset {
                ReferenceAsset::Native => Address::ZERO,
                ReferenceAsset::Token(token) => token,
            };
            let entry = totals.entry(key).or_default();
            if flow.inflow {
                entry.inflow = entry.inflow.saturating_add(flow.amount);
            } else {
                entry.outflow = entry.outflow.saturating_add(flow.amount);
            }
        }
        totals
    }

    /// True when the operator account ends the call holding nothing it
    /// did not hold at the start.
    pub fn reconciles(&self) -> bool {
        self.by_asset().values().all(AssetFlows::is_balanced)
    }

    /// Amount paid out in the reference asset.
    pub fn paid_out(&self) -> U256 {
        self.total(FlowKind::Payout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_ledger_reconciles_round_trip() {
        let debt = ReferenceAsset::Token(Address::repeat_byte(1));
        let collateral = ReferenceAsset::Token(Address::repeat_byte(2));
        let mut flows = FlowLedger::new();

        flows.credit(FlowKind::FlashPrincipal, debt, U256::from(100u64));
        flows.debit(FlowKind::DebtRepaid, debt, U256::from(100u64));
        flows.credit(FlowKind::CollateralSeized, collateral, U256::from(7u64));
        flows.debit(FlowKind::SwapIn, collateral, U256::from(7u64));
        flows.credit(FlowKind::SwapOut, debt, U256::from(110u64));
        flows.debit(FlowKind::FlashRepayment, debt, U256::from(101u64));
        assert!(!flows.reconciles());

        flows.debit(FlowKind::Payout, debt, U256::from(9u64));
        assert!(flows.reconciles());
        assert_eq!(flows.paid_out(), U256::from(9u64));
        assert_eq!(flows.by_asset().len(), 2);
    }

    #[test]
    fn test_flow_kind_display() {
        assert_eq!(FlowKind::FlashRepayment.to_string(), "flash_repayment");
    }
}
