//! Asset registry for the Ethereum mainnet fork.
//!
//! Assets are defined by the external protocols; this registry only names
//! the ones the operator config and fork fixtures refer to, so they can be
//! addressed by symbol.

use alloy::primitives::{address, Address};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A fungible token the operator moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Asset {
    /// Asset symbol (e.g., "WETH", "USDT")
    pub symbol: &'static str,
    /// Token contract address
    pub address: Address,
    /// Token decimals
    pub decimals: u8,
}

impl Asset {
    const fn new(symbol: &'static str, address: Address, decimals: u8) -> Self {
        Self {
            symbol,
            address,
            decimals,
        }
    }
}

/// WETH - Wrapped Ether (the native asset's token form)
pub const WETH: Asset = Asset::new(
    "WETH",
    address!("c02aaa39b223fe8d0a0e5c4f27ead9083c756cc2"),
    18,
);

/// USDT - Tether USD
pub const USDT: Asset = Asset::new(
    "USDT",
    address!("dac17f958d2ee523a2206206994597c13d831ec7"),
    6,
);

/// USDC - USD Coin
pub const USDC: Asset = Asset::new(
    "USDC",
    address!("a0b86991c6218b36c1d19d4a2e9eb0ce3606eb48"),
    6,
);

/// DAI - Dai Stablecoin
pub const DAI: Asset = Asset::new(
    "DAI",
    address!("6b175474e89094c44da98b954eedeac495271d0f"),
    18,
);

/// WBTC - Wrapped Bitcoin
pub const WBTC: Asset = Asset::new(
    "WBTC",
    address!("2260fac5e5542a773aa44fbcfedf7c193bc2c599"),
    8,
);

/// All known assets.
pub const ASSETS: &[Asset] = &[WETH, USDT, USDC, DAI, WBTC];

/// Asset lookup by address and by symbol.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    by_address: HashMap<Address, Asset>,
    by_symbol: HashMap<String, Asset>,
}

impl AssetRegistry {
    /// Create a registry of the built-in assets.
    pub fn new() -> Self {
        let mut registry = Self::default();
        for asset in ASSETS {
            registry.insert(*asset);
        }
        registry
    }

    fn insert(&mut self, asset: Asset) {
        self.by_address.insert(asset.address, asset);
        self.by_symbol.insert(asset.symbol.to_ascii_uppercase(), asset);
    }

    /// Get asset by token address.
    pub fn get(&self, address: &Address) -> Option<&Asset> {
        self.by_address.get(address)
    }

    /// Get asset by symbol (case-insensitive).
    pub fn by_symbol(&self, symbol: &str) -> Option<&Asset> {
        self.by_symbol.get(&symbol.to_ascii_uppercase())
    }

    /// Resolve a config value that is either a known symbol or an address.
    pub fn resolve(&self, value: &str) -> Option<Address> {
        if let Some(asset) = self.by_symbol(value) {
            return Some(asset.address);
        }
        value.trim().parse().ok()
    }

    /// Decimals for an address, if the asset is known.
    pub fn decimals(&self, address: &Address) -> Option<u8> {
        self.get(address).map(|a| a.decimals)
    }

    /// Display symbol, falling back to the address.
    pub fn symbol(&self, address: &Address) -> String {
        self.get(address)
            .map(|a| a.symbol.to_string())
            .unwrap_or_else(|| address.to_string())
    }
}

/// Global asset registry.
pub static REGISTRY: LazyLock<AssetRegistry> = LazyLock::new(AssetRegistry::new);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        assert_eq!(REGISTRY.get(&WBTC.address).map(|a| a.decimals), Some(8));
        assert_eq!(REGISTRY.by_symbol("usdt").map(|a| a.address), Some(USDT.address));
        assert_eq!(REGISTRY.symbol(&WETH.address), "WETH");
    }

    #[test]
    fn test_resolve_symbol_or_address() {
        assert_eq!(REGISTRY.resolve("WETH"), Some(WETH.address));
        assert_eq!(
            REGISTRY.resolve("0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599"),
            Some(WBTC.address)
        );
        assert_eq!(REGISTRY.resolve("not-an-asset"), None);
    }
}
