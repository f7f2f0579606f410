//! 配置驱动的币种元数据表。

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use crate::config::CoinConfig;
use crate::settlement::ports::CoinResolver;
use crate::settlement::types::CoinInfo;
use crate::settlement::{NATIVE_SOL_SENTINEL, WRAPPED_SOL_MINT};

pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

#[derive(Debug, Clone)]
pub struct CoinRegistry {
    coins: HashMap<String, CoinInfo>,
}

impl CoinRegistry {
    /// 内置 SOL（原生占位地址与 wSOL 共用一份元数据）和 USDC。
    pub fn with_builtins() -> Self {
        let sol = CoinInfo {
            internal_id: "SOL".to_string(),
            decimals: 9,
            symbol: "SOL".to_string(),
        };
        let mut coins = HashMap::new();
        coins.insert(NATIVE_SOL_SENTINEL.to_string(), sol.clone());
        coins.insert(WRAPPED_SOL_MINT.to_string(), sol);
        coins.insert(
            USDC_MINT.to_string(),
            CoinInfo {
                internal_id: "USDC".to_string(),
                decimals: 6,
                symbol: "USDC".to_string(),
            },
        );
        Self { coins }
    }

    /// 配置项覆盖同 mint 的内置条目。
    pub fn from_config(entries: &[CoinConfig]) -> Self {
        let mut registry = Self::with_builtins();
        for entry in entries {
            registry.insert(
                &entry.mint,
                CoinInfo {
                    internal_id: entry.id.clone().unwrap_or_else(|| entry.symbol.clone()),
                    decimals: entry.decimals,
                    symbol: entry.symbol.clone(),
                },
            );
        }
        registry
    }

    pub fn insert(&mut self, mint: &str, info: CoinInfo) {
        self.coins.insert(mint.trim().to_string(), info);
    }

    pub fn get(&self, mint: &str) -> Option<&CoinInfo> {
        self.coins.get(mint.trim())
    }

    pub fn len(&self) -> usize {
        self.coins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coins.is_empty()
    }
}

impl Default for CoinRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[async_trait]
impl CoinResolver for CoinRegistry {
    async fn resolve(&self, mint: &str) -> Result<Option<CoinInfo>> {
        let found = self.get(mint).cloned();
        if found.is_none() {
            debug!(target: "coins", mint, "币种未登记");
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn native_and_wrapped_sol_share_metadata() {
        let registry = CoinRegistry::default();
        let native = registry.resolve(&NATIVE_SOL_SENTINEL.to_string()).await.expect("resolve");
        let wrapped = registry.resolve(&WRAPPED_SOL_MINT.to_string()).await.expect("resolve");
        assert_eq!(native, wrapped);
        assert_eq!(native.map(|coin| coin.decimals), Some(9));
    }

    #[tokio::test]
    async fn config_entries_extend_and_override() {
        let registry = CoinRegistry::from_config(&[
            CoinConfig {
                mint: "JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN".to_string(),
                symbol: "JUP".to_string(),
                decimals: 6,
                id: None,
            },
            CoinConfig {
                mint: USDC_MINT.to_string(),
                symbol: "USDC".to_string(),
                decimals: 6,
                id: Some("usd-coin".to_string()),
            },
        ]);
        assert_eq!(registry.len(), 4);
        let jup = registry
            .resolve("JUPyiwrYJFskUPiHa7hkeR8VUtAeFoSYbKedZNsDvCN")
            .await
            .expect("resolve")
            .expect("jup");
        assert_eq!(jup.internal_id, "JUP");
        assert_eq!(registry.get(USDC_MINT).map(|c| c.internal_id.as_str()), Some("usd-coin"));
        assert!(registry.resolve("unknown").await.expect("resolve").is_none());
    }
}
