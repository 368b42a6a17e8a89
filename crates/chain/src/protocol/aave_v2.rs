//! AAVE V2 lending pool state.
//!
//! Holds reserve listings, oracle prices and user balances. Token custody
//! (the underlying held by the pool) lives in the ledger's token balances
//! under the pool's address.

use alloy::primitives::{Address, U256};
use liquidation_core::{
    CollateralData, DebtData, LedgerError, LiquidationParams, Position, ProtocolRevert,
    ReserveConfig,
};
use std::collections::{BTreeMap, HashMap};

/// A user's supplied balance of one reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SuppliedBalance {
    pub amount: U256,
    /// Whether the user uses this balance as collateral
    pub enabled: bool,
}

/// One user's account on the pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserAccount {
    pub supplied: BTreeMap<Address, SuppliedBalance>,
    /// Stable plus variable debt per asset
    pub borrowed: BTreeMap<Address, U256>,
}

/// AAVE V2 `LendingPool` with its oracle and configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LendingPool {
    pub address: Address,
    pub reserves: BTreeMap<Address, ReserveConfig>,
    pub accounts: HashMap<Address, UserAccount>,
    pub params: LiquidationParams,
    /// Flash loan premium (basis points, 9 on AAVE V2)
    pub flash_loan_premium_bps: u16,
}

impl LendingPool {
    pub fn new(address: Address, params: LiquidationParams, flash_loan_premium_bps: u16) -> Self {
        Self {
            address,
            reserves: BTreeMap::new(),
            accounts: HashMap::new(),
            params,
            flash_loan_premium_bps,
        }
    }

    pub fn reserve(&self, asset: Address) -> Result<&ReserveConfig, LedgerError> {
        self.reserves.get(&asset).ok_or(LedgerError::UnknownReserve {
            pool: self.address,
            asset,
        })
    }

    /// Override the oracle price of a listed asset.
    pub fn set_price(&mut self, asset: Address, price: U256) -> Result<(), LedgerError> {
        let pool = self.address;
        let reserve = self
            .reserves
            .get_mut(&asset)
            .ok_or(LedgerError::UnknownReserve { pool, asset })?;
        reserve.price = price;
        Ok(())
    }

    /// Current position of `user`. Unknown users have an empty position.
    pub fn position(&self, user: Address) -> Result<Position, LedgerError> {
        let mut position = Position::new(user);
        let Some(account) = self.accounts.get(&user) else {
            return Ok(position);
        };
        for (asset, balance) in &account.supplied {
            if balance.amount.is_zero() {
                continue;
            }
            position.collaterals.push(CollateralData {
                reserve: *self.reserve(*asset)?,
                amount: balance.amount,
                enabled: balance.enabled,
            });
        }
        for (asset, amount) in &account.borrowed {
            if amount.is_zero() {
                continue;
            }
            position.debts.push(DebtData {
                reserve: *self.reserve(*asset)?,
                amount: *amount,
            });
        }
        Ok(position)
    }

    /// Book a liquidation against `user`: burn `debt_repaid` of debt and
    /// release `collateral_seized` of the supplied balance.
    pub fn apply_liquidation(
        &mut self,
        user: Address,
        collateral_asset: Address,
        debt_asset: Address,
        debt_repaid: U256,
        collateral_seized: U256,
    ) -> Result<(), LedgerError> {
        let account = self
            .accounts
            .get_mut(&user)
            .ok_or(LedgerError::Protocol(ProtocolRevert::CurrencyNotBorrowed))?;

        let debt = account.borrowed.entry(debt_asset).or_default();
        *debt = debt.checked_sub(debt_repaid).ok_or(LedgerError::Overflow)?;

        let supplied = account.supplied.entry(collateral_asset).or_default();
        supplied.amount = supplied
            .amount
            .checked_sub(collateral_seized)
            .ok_or(LedgerError::Overflow)?;
        if supplied.amount.is_zero() {
            // The pool stops counting an emptied reserve as collateral
            supplied.enabled = false;
        }
        Ok(())
    }
}
