use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use solana_sdk::pubkey::Pubkey;

use super::error::{SettlementError, SettlementResult};

pub const MAX_SLIPPAGE_BPS: u32 = 5_000;

const SIGNATURE_BYTES: usize = 64;
const MIN_SIGNATURE_LEN: usize = 64;
const MAX_SIGNATURE_LEN: usize = 88;

pub fn parse_address(field: &str, value: &str) -> SettlementResult<Pubkey> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(SettlementError::validation(format!("{field} 不能为空")));
    }
    Pubkey::from_str(trimmed)
        .map_err(|err| SettlementError::validation(format!("{field} 地址非法 `{trimmed}`: {err}")))
}

/// 金额为源资产最小单位的十进制整数串，必须大于 0。
pub fn parse_amount(value: &str) -> SettlementResult<u64> {
    let trimmed = value.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SettlementError::validation(format!(
            "amount 必须是正整数，实际为 `{trimmed}`"
        )));
    }
    let amount = trimmed
        .parse::<u64>()
        .map_err(|err| SettlementError::validation(format!("amount 超出范围: {err}")))?;
    if amount == 0 {
        return Err(SettlementError::validation("amount 必须大于 0"));
    }
    Ok(amount)
}

pub fn check_slippage(bps: u32) -> SettlementResult<u16> {
    if bps > MAX_SLIPPAGE_BPS {
        return Err(SettlementError::validation(format!(
            "slippageBps 超出范围 0..={MAX_SLIPPAGE_BPS}: {bps}"
        )));
    }
    u16::try_from(bps).map_err(|err| {
        SettlementError::validation(format!("slippageBps 无法转换: {bps}: {err}"))
    })
}

/// 校验 base58 签名的长度与字符集。
pub fn validate_signature(hash: &str) -> SettlementResult<()> {
    let trimmed = hash.trim();
    if !(MIN_SIGNATURE_LEN..=MAX_SIGNATURE_LEN).contains(&trimmed.len()) {
        return Err(SettlementError::validation(format!(
            "交易哈希长度非法: {}",
            trimmed.len()
        )));
    }
    let decoded = bs58::decode(trimmed)
        .into_vec()
        .map_err(|err| SettlementError::validation(format!("交易哈希不是合法 base58: {err}")))?;
    if decoded.len() != SIGNATURE_BYTES {
        return Err(SettlementError::validation(format!(
            "交易哈希解码后应为 {SIGNATURE_BYTES} 字节，实际 {}",
            decoded.len()
        )));
    }
    Ok(())
}

pub fn decode_signed_transaction(encoded: &str) -> SettlementResult<Vec<u8>> {
    let trimmed = encoded.trim();
    if trimmed.is_empty() {
        return Err(SettlementError::validation("signedTransaction 不能为空"));
    }
    let raw = BASE64
        .decode(trimmed)
        .map_err(|err| SettlementError::validation(format!("signedTransaction 解码失败: {err}")))?;
    if raw.is_empty() {
        return Err(SettlementError::validation("signedTransaction 解码后为空"));
    }
    Ok(raw)
}
