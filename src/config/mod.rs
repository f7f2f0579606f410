//! TOML 配置：结构定义、默认值与加载。

pub mod loader;
pub mod types;
pub mod wallet;

pub use loader::*;
pub use types::*;

use self::types as cfg;
use crate::settlement::FINALITY_THRESHOLD;

pub(crate) fn default_rpc_url() -> String {
    "https://api.mainnet-beta.solana.com".to_string()
}

pub(crate) fn default_logging_level() -> String {
    "info".to_string()
}

pub(crate) fn default_jupiter_base_url() -> String {
    "https://lite-api.jup.ag".to_string()
}

pub(crate) fn default_jupiter_timeout_ms() -> u64 {
    10_000
}

pub(crate) fn default_finality_threshold() -> u64 {
    FINALITY_THRESHOLD
}

impl Default for cfg::GlobalConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            logging: cfg::LoggingConfig::default(),
        }
    }
}

impl Default for cfg::LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_logging_level(),
            json: false,
        }
    }
}

impl Default for cfg::JupiterConfig {
    fn default() -> Self {
        Self {
            quote_base_url: default_jupiter_base_url(),
            price_base_url: default_jupiter_base_url(),
            api_key: None,
            timeout_ms: default_jupiter_timeout_ms(),
        }
    }
}

impl Default for cfg::ReconcileConfig {
    fn default() -> Self {
        Self {
            finality_threshold: default_finality_threshold(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config: SettlerConfig = toml::from_str("").expect("parse");
        assert_eq!(config.global.rpc_url, default_rpc_url());
        assert_eq!(config.global.logging.level, "info");
        assert_eq!(config.reconcile.finality_threshold, 31);
        assert_eq!(config.jupiter.timeout_ms, 10_000);
        assert!(config.jupiter.api_key().is_none());
        assert!(config.coins.is_empty());
    }

    #[test]
    fn sections_override_defaults() {
        let raw = r#"
            [global]
            rpc_url = "http://127.0.0.1:8899"

            [global.logging]
            level = "debug"
            json = true

            [jupiter]
            quote_base_url = "https://api.jup.ag"
            api_key = "  "

            [platform_fee]
            fee_bps = 25
            fee_owner = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM"

            [reconcile]
            finality_threshold = 10

            [[coins]]
            mint = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v"
            symbol = "USDC"
            decimals = 6
        "#;
        let config: SettlerConfig = toml::from_str(raw).expect("parse");
        assert_eq!(config.global.rpc_url, "http://127.0.0.1:8899");
        assert!(config.global.logging.json);
        assert_eq!(config.jupiter.quote_base_url, "https://api.jup.ag");
        assert_eq!(config.jupiter.price_base_url, default_jupiter_base_url());
        assert!(config.jupiter.api_key().is_none());
        assert_eq!(config.platform_fee.fee_bps, 25);
        assert!(config.platform_fee.fallback_destination.is_none());
        assert_eq!(config.reconcile.finality_threshold, 10);
        assert_eq!(config.coins[0].decimals, 6);
        assert!(config.coins[0].id.is_none());
    }
}
