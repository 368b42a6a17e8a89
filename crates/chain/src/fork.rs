//! Fork state sources.
//!
//! [`FileSnapshotSource`] reads a checked-in fixture. [`RpcForkSource`]
//! refreshes the prices, reserve parameters, user balances, pool liquidity
//! and pair reserves of a fixture from an archive node at the fork block.

use alloy::eips::BlockId;
use alloy::primitives::{Address, U256};
use alloy::providers::ProviderBuilder;
use alloy::sol;
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::try_join_all;
use std::path::PathBuf;
use tracing::{debug, info};

use crate::snapshot::{resolve_address, ForkSnapshot};

sol! {
    #[sol(rpc)]
    interface IAaveOracle {
        function getAssetPrice(address asset) external view returns (uint256);
    }

    #[sol(rpc)]
    interface IProtocolDataProvider {
        function getReserveConfigurationData(address asset)
            external
            view
            returns (
                uint256 decimals,
                uint256 ltv,
                uint256 liquidationThreshold,
                uint256 liquidationBonus,
                uint256 reserveFactor,
                bool usageAsCollateralEnabled,
                bool borrowingEnabled,
                bool stableBorrowRateEnabled,
                bool isActive,
                bool isFrozen
            );

        function getUserReserveData(address asset, address user)
            external
            view
            returns (
                uint256 currentATokenBalance,
                uint256 currentStableDebt,
                uint256 currentVariableDebt,
                uint256 principalStableDebt,
                uint256 scaledVariableDebt,
                uint256 stableBorrowRate,
                uint256 liquidityRate,
                uint40 stableRateLastUpdated,
                bool usageAsCollateralEnabled
            );

        function getReserveTokensAddresses(address asset)
            external
            view
            returns (
                address aTokenAddress,
                address stableDebtTokenAddress,
                address variableDebtTokenAddress
            );
    }

    #[sol(rpc)]
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
    }

    #[sol(rpc)]
    interface IUniswapV2Pair {
        function getReserves()
            external
            view
            returns (uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast);
    }
}

/// Where the fork state comes from.
#[async_trait]
pub trait SnapshotSource: Send + Sync {
    async fn load(&self) -> Result<ForkSnapshot>;

    /// Human-readable origin for logs.
    fn describe(&self) -> String;
}

/// Checked-in snapshot file.
#[derive(Debug, Clone)]
pub struct FileSnapshotSource {
    path: PathBuf,
}

impl FileSnapshotSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SnapshotSource for FileSnapshotSource {
    async fn load(&self) -> Result<ForkSnapshot> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("failed to read snapshot {}", self.path.display()))?;
        let snapshot = ForkSnapshot::from_toml(&content)?;
        debug!(path = %self.path.display(), block = snapshot.block, "Snapshot loaded");
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!("file {}", self.path.display())
    }
}

/// Archive node refresh of a base snapshot.
///
/// The base names the accounts and contracts; every numeric value it
/// carries for them is replaced by the on-chain value at `block`. Pools
/// without `oracle` and `data_provider` keep their fixture values.
#[derive(Debug, Clone)]
pub struct RpcForkSource {
    rpc_url: String,
    block: u64,
    base: ForkSnapshot,
}

impl RpcForkSource {
    pub fn new(rpc_url: impl Into<String>, block: u64, base: ForkSnapshot) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            block,
            base,
        }
    }
}

#[async_trait]
impl SnapshotSource for RpcForkSource {
    async fn load(&self) -> Result<ForkSnapshot> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let at = BlockId::number(self.block);
        let mut snapshot = self.base.clone();
        snapshot.block = self.block;

        info!(rpc = %self.rpc_url, block = self.block, "Refreshing snapshot from archive node");

        for pool in &mut snapshot.lending_pools {
            let (Some(oracle), Some(data_provider)) = (&pool.oracle, &pool.data_provider) else {
                debug!(pool = %pool.address, "No oracle or data provider; keeping fixture values");
                continue;
            };
            let oracle = IAaveOracle::new(resolve_address(oracle)?, &provider);
            let data_provider = IProtocolDataProvider::new(resolve_address(data_provider)?, &provider);
            let pool_address = resolve_address(&pool.address)?;

            let reserves = try_join_all(pool.reserves.iter().map(|reserve| {
                let oracle = &oracle;
                let data_provider = &data_provider;
                let provider = &provider;
                async move {
                    let asset = resolve_address(&reserve.asset)?;
                    let price = oracle.getAssetPrice(asset).block(at).call().await?._0;
                    let config = data_provider
                        .getReserveConfigurationData(asset)
                        .block(at)
                        .call()
                        .await?;
                    let tokens = data_provider
                        .getReserveTokensAddresses(asset)
                        .block(at)
                        .call()
                        .await?;
                    // The pool's underlying sits in the aToken contract
                    let liquidity = IERC20::new(asset, provider)
                        .balanceOf(tokens.aTokenAddress)
                        .block(at)
                        .call()
                        .await?
                        ._0;
                    anyhow::Ok((asset, price, config, liquidity))
                }
            }))
            .await?;

            for (entry, (asset, price, config, liquidity)) in pool.reserves.iter_mut().zip(reserves) {
                entry.decimals = Some(config.decimals.saturating_to::<u8>());
                entry.ltv_bps = config.ltv.saturating_to::<u16>();
                entry.liquidation_threshold_bps = config.liquidationThreshold.saturating_to::<u16>();
                // Stored as 10000 + bonus
                entry.liquidation_bonus_bps = config
                    .liquidationBonus
                    .saturating_sub(U256::from(10_000u16))
                    .saturating_to::<u16>();
                entry.usage_as_collateral_enabled = config.usageAsCollateralEnabled;
                entry.price = price.to_string();
                entry.liquidity = Some(liquidity.to_string());
                debug!(pool = %pool_address, %asset, %price, %liquidity, "Reserve refreshed");
            }

            for position in &mut pool.positions {
                let user = resolve_address(&position.user)?;
                for collateral in &mut position.collateral {
                    let asset = resolve_address(&collateral.asset)?;
                    let data = data_provider.getUserReserveData(asset, user).block(at).call().await?;
                    collateral.amount = data.currentATokenBalance.to_string();
                    collateral.enabled = data.usageAsCollateralEnabled;
                }
                for debt in &mut position.debt {
                    let asset = resolve_address(&debt.asset)?;
                    let data = data_provider.getUserReserveData(asset, user).block(at).call().await?;
                    let total = data.currentStableDebt.saturating_add(data.currentVariableDebt);
                    debt.amount = total.to_string();
                }
                debug!(pool = %pool_address, %user, "Position refreshed");
            }
        }

        let pair_reserves = try_join_all(snapshot.pairs.iter().map(|pair| {
            let provider = &provider;
            async move {
                let address: Address = resolve_address(&pair.address)?;
                let reserves = IUniswapV2Pair::new(address, provider)
                    .getReserves()
                    .block(at)
                    .call()
                    .await?;
                anyhow::Ok((U256::from(reserves.reserve0), U256::from(reserves.reserve1)))
            }
        }))
        .await?;
        for (pair, (reserve0, reserve1)) in snapshot.pairs.iter_mut().zip(pair_reserves) {
            pair.reserve0 = reserve0.to_string();
            pair.reserve1 = reserve1.to_string();
        }

        info!(
            block = snapshot.block,
            pools = snapshot.lending_pools.len(),
            pairs = snapshot.pairs.len(),
            "Snapshot refreshed"
        );
        Ok(snapshot)
    }

    fn describe(&self) -> String {
        format!("archive node {} at block {}", self.rpc_url, self.block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
        block = 12489619

        [[lending_pools]]
        address = "0x7d2768dE32b0b80b7a3454c06BdAc94A69DDc7A9"
        oracle = "0xA50ba011c48153De246E5192C8f9258A2ba79Ca9"
        data_provider = "0x057835Ad21a177dbdd3090bB1CAE03EaCF78Fc6d"

        [[lending_pools.reserves]]
        asset = "WBTC"
        ltv_bps = 0
        liquidation_threshold_bps = 0
        liquidation_bonus_bps = 0
        price = "0"

        [[lending_pools.positions]]
        user = "0x59CE4a2AC5bC3f5F225439B2993b86B42f6D3e9F"
        collateral = [{ asset = "WBTC", amount = "0" }]

        [[pairs]]
        address = "0xBb2b8038a1640196FbE3e38816F3e67Cba72D940"
        token0 = "WBTC"
        token1 = "WETH"
        reserve0 = "0"
        reserve1 = "0"
    "#;

    #[tokio::test]
    async fn test_file_source_reads_snapshot() {
        let path = std::env::temp_dir().join(format!("fork-source-{}.toml", std::process::id()));
        tokio::fs::write(&path, BASE).await.unwrap();
        let source = FileSnapshotSource::new(&path);
        let snapshot = source.load().await.unwrap();
        assert_eq!(snapshot.block, 12489619);
        assert!(source.describe().starts_with("file "));
        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_file_fails() {
        let source = FileSnapshotSource::new("/nonexistent/snapshot.toml");
        assert!(source.load().await.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires ARCHIVE_RPC_URL pointing at a mainnet archive node
    async fn test_rpc_refresh_at_fork_block() {
        let rpc_url = std::env::var("ARCHIVE_RPC_URL").expect("ARCHIVE_RPC_URL not set");
        let base = ForkSnapshot::from_toml(BASE).unwrap();
        let snapshot = RpcForkSource::new(rpc_url, 12489619, base).load().await.unwrap();

        let reserve = &snapshot.lending_pools[0].reserves[0];
        assert_eq!(reserve.decimals, Some(8));
        assert_eq!(reserve.liquidation_bonus_bps, 650);
        assert_ne!(reserve.price, "0");
        assert_ne!(snapshot.lending_pools[0].positions[0].collateral[0].amount, "0");
        assert_ne!(snapshot.pairs[0].reserve0, "0");
    }
}
