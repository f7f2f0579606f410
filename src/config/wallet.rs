use solana_sdk::signature::Keypair;
use tracing::{debug, info};

use super::{ConfigError, WalletConfig};

/// 设置后覆盖 `[wallet].private_key`。
pub const PRIVATE_KEY_ENV: &str = "SWAP_SETTLER_PRIVATE_KEY";

/// 解析结算签名钱包；未配置私钥时返回 `None`，此时无法代建收款账户。
pub fn load_signer(wallet: &WalletConfig) -> Result<Option<Keypair>, ConfigError> {
    let from_env = std::env::var(PRIVATE_KEY_ENV)
        .ok()
        .filter(|value| !value.trim().is_empty());
    let (raw, source) = match from_env {
        Some(value) => (value, "env"),
        None => (wallet.private_key.clone(), "config"),
    };
    if raw.trim().is_empty() {
        debug!(target: "config", "未配置签名私钥");
        return Ok(None);
    }

    let keypair = parse_keypair_string(&raw).map_err(|err| ConfigError::Invalid {
        field: "wallet.private_key",
        message: err.to_string(),
    })?;
    info!(target: "config", source, "已加载签名钱包");
    Ok(Some(keypair))
}

/// 支持 JSON 数组、逗号分隔字节与 base58 三种格式。
pub fn parse_keypair_string(raw: &str) -> Result<Keypair, anyhow::Error> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("keypair string empty");
    }

    if trimmed.starts_with('[') {
        let bytes: Vec<u8> = serde_json::from_str(trimmed)?;
        Ok(Keypair::try_from(bytes.as_slice())?)
    } else if trimmed.contains(',') {
        let bytes = trimmed
            .split(',')
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .map(|part| part.parse::<u8>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Keypair::try_from(bytes.as_slice())?)
    } else {
        let data = bs58::decode(trimmed).into_vec()?;
        Ok(Keypair::try_from(data.as_slice())?)
    }
}

#[cfg(test)]
mod tests {
    use solana_sdk::signature::Signer;

    use super::*;

    #[test]
    fn all_encodings_yield_the_same_keypair() {
        let keypair = Keypair::new();
        let bytes = keypair.to_bytes();

        let json = serde_json::to_string(&bytes.to_vec()).expect("json");
        let comma = bytes
            .iter()
            .map(u8::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let base58 = bs58::encode(bytes).into_string();

        for encoded in [json, comma, base58] {
            let parsed = parse_keypair_string(&encoded).expect("parse");
            assert_eq!(parsed.pubkey(), keypair.pubkey());
        }
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(parse_keypair_string("").is_err());
        assert!(parse_keypair_string("[1,2,3]").is_err());
        assert!(parse_keypair_string("0OIl").is_err());
    }
}
