use std::str::FromStr;

use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;

use super::ConfigError;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SettlerConfig {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub jupiter: JupiterConfig,
    #[serde(default)]
    pub platform_fee: PlatformFeeConfig,
    #[serde(default)]
    pub wallet: WalletConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub coins: Vec<CoinConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlobalConfig {
    #[serde(default = "super::default_rpc_url")]
    pub rpc_url: String,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "super::default_logging_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct JupiterConfig {
    #[serde(default = "super::default_jupiter_base_url")]
    pub quote_base_url: String,
    #[serde(default = "super::default_jupiter_base_url")]
    pub price_base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "super::default_jupiter_timeout_ms")]
    pub timeout_ms: u64,
}

impl JupiterConfig {
    /// 空白 key 视为未配置。
    pub fn api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlatformFeeConfig {
    #[serde(default)]
    pub fee_bps: u16,
    /// 平台费 ATA 的 owner。
    #[serde(default)]
    pub fee_owner: Option<String>,
    /// 报价未携带平台费时使用的固定收款地址。
    #[serde(default)]
    pub fallback_destination: Option<String>,
}

impl PlatformFeeConfig {
    pub fn fee_owner_pubkey(&self) -> Result<Option<Pubkey>, ConfigError> {
        parse_optional_pubkey("platform_fee.fee_owner", self.fee_owner.as_deref())
    }

    pub fn fallback_destination_pubkey(&self) -> Result<Option<Pubkey>, ConfigError> {
        parse_optional_pubkey(
            "platform_fee.fallback_destination",
            self.fallback_destination.as_deref(),
        )
    }
}

fn parse_optional_pubkey(
    field: &'static str,
    value: Option<&str>,
) -> Result<Option<Pubkey>, ConfigError> {
    match value.map(str::trim).filter(|value| !value.is_empty()) {
        None => Ok(None),
        Some(value) => Pubkey::from_str(value)
            .map(Some)
            .map_err(|err| ConfigError::Invalid {
                field,
                message: format!("`{value}` 不是合法地址: {err}"),
            }),
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct WalletConfig {
    #[serde(default)]
    pub private_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileConfig {
    #[serde(default = "super::default_finality_threshold")]
    pub finality_threshold: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub snapshot_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CoinConfig {
    pub mint: String,
    pub symbol: String,
    pub decimals: u8,
    /// 内部币种 id，缺省时使用 symbol。
    #[serde(default)]
    pub id: Option<String>,
}
