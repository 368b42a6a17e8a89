//! Fork snapshot fixtures.
//!
//! A snapshot is the subset of mainnet state at one block that the
//! liquidation touches: lending pool reserves and accounts, pair reserves
//! and a few balances. Assets may be written as registry symbols or
//! addresses; amounts are raw integer strings (underscores allowed).

use alloy::primitives::{Address, U256};
use anyhow::{Context, Result};
use liquidation_core::u256_math::parse_amount;
use liquidation_core::{LiquidationParams, ReserveConfig, REGISTRY};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::ledger::Ledger;
use crate::protocol::{LendingPool, Pair, SuppliedBalance};

/// Complete fork fixture.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForkSnapshot {
    pub block: u64,
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Token whose contract backs native withdrawals
    #[serde(default)]
    pub wrapped_native: Option<String>,
    #[serde(default)]
    pub native_balances: Vec<NativeBalanceEntry>,
    #[serde(default)]
    pub balances: Vec<BalanceEntry>,
    #[serde(default)]
    pub lending_pools: Vec<LendingPoolEntry>,
    #[serde(default)]
    pub pairs: Vec<PairEntry>,
}

fn default_chain_id() -> u64 {
    1
}

fn default_close_factor_bps() -> u16 {
    5000
}

fn default_premium_bps() -> u16 {
    9
}

fn default_pair_fee_bps() -> u16 {
    30
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeBalanceEntry {
    pub holder: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceEntry {
    pub token: String,
    pub holder: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendingPoolEntry {
    pub address: String,
    #[serde(default = "default_close_factor_bps")]
    pub close_factor_bps: u16,
    #[serde(default = "default_premium_bps")]
    pub flash_loan_premium_bps: u16,
    /// Price oracle, used when refreshing from an archive node
    #[serde(default)]
    pub oracle: Option<String>,
    /// Protocol data provider, used when refreshing from an archive node
    #[serde(default)]
    pub data_provider: Option<String>,
    #[serde(default)]
    pub reserves: Vec<ReserveEntry>,
    #[serde(default)]
    pub positions: Vec<PositionEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReserveEntry {
    pub asset: String,
    /// Falls back to the asset registry
    #[serde(default)]
    pub decimals: Option<u8>,
    pub ltv_bps: u16,
    pub liquidation_threshold_bps: u16,
    /// Bonus over par (650 = 6.5%)
    pub liquidation_bonus_bps: u16,
    #[serde(default = "default_true")]
    pub usage_as_collateral_enabled: bool,
    /// Oracle price in wei per whole token
    pub price: String,
    /// Underlying held by the pool
    #[serde(default)]
    pub liquidity: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionEntry {
    pub user: String,
    #[serde(default)]
    pub collateral: Vec<CollateralEntry>,
    #[serde(default)]
    pub debt: Vec<AmountEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollateralEntry {
    pub asset: String,
    pub amount: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmountEntry {
    pub asset: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairEntry {
    pub address: String,
    pub token0: String,
    pub token1: String,
    pub reserve0: String,
    pub reserve1: String,
    #[serde(default = "default_pair_fee_bps")]
    pub fee_bps: u16,
}

impl ForkSnapshot {
    /// Load a snapshot from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn lending_pool(&self, address: Address) -> Option<&LendingPoolEntry> {
        self.lending_pools
            .iter()
            .find(|pool| resolve_address(&pool.address).ok() == Some(address))
    }
}

/// Resolve a registry symbol or hex address.
pub(crate) fn resolve_address(value: &str) -> Result<Address> {
    REGISTRY
        .resolve(value)
        .with_context(|| format!("unknown asset or invalid address {value:?}"))
}

pub(crate) fn resolve_amount(value: &str) -> Result<U256> {
    parse_amount(value).with_context(|| format!("invalid amount {value:?}"))
}

impl ReserveEntry {
    fn to_config(&self) -> Result<ReserveConfig> {
        let asset = resolve_address(&self.asset)?;
        let decimals = match self.decimals {
            Some(decimals) => decimals,
            None => REGISTRY
                .decimals(&asset)
                .with_context(|| format!("decimals missing for reserve {}", self.asset))?,
        };
        Ok(ReserveConfig {
            asset,
            decimals,
            ltv_bps: self.ltv_bps,
            liquidation_threshold_bps: self.liquidation_threshold_bps,
            liquidation_bonus_bps: self.liquidation_bonus_bps,
            usage_as_collateral_enabled: self.usage_as_collateral_enabled,
            price: resolve_amount(&self.price)?,
        })
    }
}

impl LendingPoolEntry {
    fn build(&self) -> Result<(LendingPool, Vec<(Address, U256)>)> {
        let address = resolve_address(&self.address)?;
        let params = LiquidationParams {
            close_factor_bps: self.close_factor_bps,
        };
        let mut pool = LendingPool::new(address, params, self.flash_loan_premium_bps);
        let mut liquidity = Vec::new();

        for entry in &self.reserves {
            let reserve = entry.to_config()?;
            if let Some(amount) = &entry.liquidity {
                liquidity.push((reserve.asset, resolve_amount(amount)?));
            }
            pool.reserves.insert(reserve.asset, reserve);
        }

        for entry in &self.positions {
            let user = resolve_address(&entry.user)?;
            let account = pool.accounts.entry(user).or_default();
            for collateral in &entry.collateral {
                account.supplied.insert(
                    resolve_address(&collateral.asset)?,
                    SuppliedBalance {
                        amount: resolve_amount(&collateral.amount)?,
                        enabled: collateral.enabled,
                    },
                );
            }
            for debt in &entry.debt {
                account
                    .borrowed
                    .insert(resolve_address(&debt.asset)?, resolve_amount(&debt.amount)?);
            }
        }

        // Every account must resolve against listed reserves
        for user in pool.accounts.keys() {
            pool.position(*user)
                .with_context(|| format!("position of {user} references an unlisted reserve"))?;
        }
        Ok((pool, liquidity))
    }
}

impl PairEntry {
    fn build(&self) -> Result<Pair> {
        Ok(Pair {
            address: resolve_address(&self.address)?,
            token0: resolve_address(&self.token0)?,
            token1: resolve_address(&self.token1)?,
            reserve0: resolve_amount(&self.reserve0)?,
            reserve1: resolve_amount(&self.reserve1)?,
            fee_bps: self.fee_bps,
            locked: false,
        })
    }
}

impl Ledger {
    /// Build a ledger holding exactly the state in `snapshot`.
    pub fn from_snapshot(snapshot: &ForkSnapshot) -> Result<Self> {
        let mut ledger = Ledger::new(snapshot.chain_id, snapshot.block);
        if let Some(wrapped) = &snapshot.wrapped_native {
            ledger.set_wrapped_native(resolve_address(wrapped)?);
        }

        for entry in &snapshot.lending_pools {
            let (pool, liquidity) = entry.build()?;
            let address = pool.address;
            ledger.add_lending_pool(pool);
            for (asset, amount) in liquidity {
                ledger.set_token_balance(asset, address, amount);
            }
        }

        for entry in &snapshot.pairs {
            ledger.add_pair(entry.build()?)?;
        }

        for entry in &snapshot.native_balances {
            ledger.set_native_balance(resolve_address(&entry.holder)?, resolve_amount(&entry.amount)?);
        }

        for entry in &snapshot.balances {
            ledger.set_token_balance(
                resolve_address(&entry.token)?,
                resolve_address(&entry.holder)?,
                resolve_amount(&entry.amount)?,
            );
        }

        info!(
            block = snapshot.block,
            chain_id = snapshot.chain_id,
            pools = snapshot.lending_pools.len(),
            pairs = snapshot.pairs.len(),
            "Fork ledger built from snapshot"
        );
        Ok(ledger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use liquidation_core::{Host, USDT, WBTC, WETH};

    const SNAPSHOT: &str = r#"
        block = 100
        wrapped_native = "WETH"

        [[native_balances]]
        holder = "WETH"
        amount = "1_000_000000000000000000"

        [[balances]]
        token = "USDT"
        holder = "0x00000000000000000000000000000000000000a1"
        amount = "5_000000"

        [[lending_pools]]
        address = "0x00000000000000000000000000000000000000aa"

        [[lending_pools.reserves]]
        asset = "WBTC"
        ltv_bps = 7000
        liquidation_threshold_bps = 7500
        liquidation_bonus_bps = 650
        price = "15000000000000000000"
        liquidity = "1_00000000"

        [[lending_pools.reserves]]
        asset = "USDT"
        ltv_bps = 0
        liquidation_threshold_bps = 0
        liquidation_bonus_bps = 0
        usage_as_collateral_enabled = false
        price = "500000000000000"

        [[lending_pools.positions]]
        user = "0x0000000000000000000000000000000000000001"
        collateral = [{ asset = "WBTC", amount = "1_00000000" }]
        debt = [{ asset = "USDT", amount = "30000_000000" }]

        [[pairs]]
        address = "0x0000000000000000000000000000000000000050"
        token0 = "WBTC"
        token1 = "WETH"
        reserve0 = "10_00000000"
        reserve1 = "150_000000000000000000"
    "#;

    #[test]
    fn test_snapshot_builds_ledger() {
        let snapshot = ForkSnapshot::from_toml(SNAPSHOT).unwrap();
        assert_eq!(snapshot.chain_id, 1);
        let ledger = Ledger::from_snapshot(&snapshot).unwrap();

        let pool = Address::with_last_byte(0xaa);
        assert_eq!(ledger.block_number(), 100);
        assert_eq!(ledger.wrapped_native(), Some(WETH.address));
        assert_eq!(ledger.token_balance(WBTC.address, pool), U256::from(100_000_000u64));
        assert_eq!(ledger.liquidation_params(pool).unwrap().close_factor_bps, 5000);
        assert_eq!(ledger.flash_loan_fee_bps(liquidation_core::FlashLoanSource::LendingPool { pool }).unwrap(), 9);

        let position = ledger
            .user_position(pool, Address::with_last_byte(1))
            .unwrap();
        assert_eq!(position.collaterals[0].reserve.decimals, 8);
        assert_eq!(position.debts[0].amount, U256::from(30_000_000_000u64));

        let pair = ledger.pair(Address::with_last_byte(0x50)).unwrap();
        assert_eq!(ledger.token_balance(WETH.address, pair.address), pair.reserve1);
        assert_eq!(
            ledger.token_balance(USDT.address, Address::with_last_byte(0xa1)),
            U256::from(5_000_000u64)
        );
    }

    #[test]
    fn test_position_with_unlisted_reserve_is_rejected() {
        let broken = SNAPSHOT.replace("debt = [{ asset = \"USDT\"", "debt = [{ asset = \"DAI\"");
        let snapshot = ForkSnapshot::from_toml(&broken).unwrap();
        assert!(Ledger::from_snapshot(&snapshot).is_err());
    }

    #[test]
    fn test_snapshot_toml_round_trip() {
        let snapshot = ForkSnapshot::from_toml(SNAPSHOT).unwrap();
        let reparsed = ForkSnapshot::from_toml(&snapshot.to_toml().unwrap()).unwrap();
        assert_eq!(reparsed.lending_pools[0].reserves.len(), 2);
        assert_eq!(reparsed.pairs[0].fee_bps, 30);
    }
}
