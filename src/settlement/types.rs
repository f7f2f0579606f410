use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use time::OffsetDateTime;

/// 聚合器支持的 swap 模式。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapMode {
    #[default]
    #[serde(rename = "ExactIn", alias = "exactIn")]
    ExactIn,
    #[serde(rename = "ExactOut", alias = "exactOut")]
    ExactOut,
}

impl SwapMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SwapMode::ExactIn => "ExactIn",
            SwapMode::ExactOut => "ExactOut",
        }
    }
}

impl fmt::Display for SwapMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SwapMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exactin" | "exact_in" | "exact-in" => Ok(SwapMode::ExactIn),
            "exactout" | "exact_out" | "exact-out" => Ok(SwapMode::ExactOut),
            other => Err(format!("未知的 swap 模式: {other}")),
        }
    }
}

/// 交易记录的生命周期状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Prepared,
    Submitted,
    Completed,
    Finalized,
    Failed,
}

impl TradeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeStatus::Prepared => "prepared",
            TradeStatus::Submitted => "submitted",
            TradeStatus::Completed => "completed",
            TradeStatus::Finalized => "finalized",
            TradeStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TradeStatus::Completed | TradeStatus::Finalized | TradeStatus::Failed
        )
    }

    /// 状态只允许单调前进；同状态重写视为合法（字段更新）。
    pub fn can_transition_to(self, next: TradeStatus) -> bool {
        if self == next {
            return true;
        }
        match self {
            TradeStatus::Prepared => {
                matches!(next, TradeStatus::Submitted | TradeStatus::Failed)
            }
            TradeStatus::Submitted => matches!(
                next,
                TradeStatus::Completed | TradeStatus::Finalized | TradeStatus::Failed
            ),
            TradeStatus::Completed | TradeStatus::Finalized | TradeStatus::Failed => false,
        }
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "prepared" => Ok(TradeStatus::Prepared),
            "submitted" => Ok(TradeStatus::Submitted),
            "completed" => Ok(TradeStatus::Completed),
            "finalized" => Ok(TradeStatus::Finalized),
            "failed" => Ok(TradeStatus::Failed),
            other => Err(format!("未知的交易状态: {other}")),
        }
    }
}

/// 一次结算尝试的持久化记录。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trade {
    /// 持久化时分配，未入库前为空串。
    #[serde(default)]
    pub id: String,
    pub user_address: String,
    pub from_mint: String,
    pub to_mint: String,
    pub from_coin_id: String,
    pub to_coin_id: String,
    pub symbol: String,
    pub amount: String,
    pub price: Decimal,
    pub fee: Decimal,
    pub platform_fee_amount: u64,
    pub platform_fee_percent: Decimal,
    pub platform_fee_destination: String,
    pub platform_fee_mint: String,
    pub status: TradeStatus,
    pub unsigned_transaction: String,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub confirmations: u64,
    #[serde(default)]
    pub finalized: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub completed_at: Option<OffsetDateTime>,
}

/// 可用于二级索引查询的字段。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeField {
    UnsignedTransaction,
    TransactionHash,
}

impl TradeField {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeField::UnsignedTransaction => "unsignedTransaction",
            TradeField::TransactionHash => "transactionHash",
        }
    }
}

pub const DEFAULT_PAGE_LIMIT: usize = 20;
pub const MAX_PAGE_LIMIT: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub user_address: Option<String>,
    pub status: Option<TradeStatus>,
    pub offset: usize,
    pub limit: usize,
}

impl ListOptions {
    /// `limit` 为 0 时取默认值，上限为 [`MAX_PAGE_LIMIT`]。
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            DEFAULT_PAGE_LIMIT
        } else {
            self.limit.min(MAX_PAGE_LIMIT)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

/// 币种元数据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinInfo {
    pub internal_id: String,
    pub decimals: u8,
    pub symbol: String,
}

/// 聚合器路由中的单个 leg（已拍平的 swapInfo）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteLeg {
    pub label: String,
    pub fee_amount: String,
    pub fee_mint: String,
}

/// 报价中附带的平台费信息。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFeeQuote {
    pub amount: String,
    pub fee_bps: u16,
    pub mint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatorQuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub slippage_bps: u16,
    pub platform_fee_bps: u16,
    pub swap_mode: SwapMode,
}

/// 聚合器报价的归一化视图，`raw_payload` 为原始响应字节。
#[derive(Debug, Clone)]
pub struct AggregatorQuote {
    pub in_amount: u64,
    pub out_amount: u64,
    pub route_plan: Vec<RouteLeg>,
    pub platform_fee: Option<PlatformFeeQuote>,
    pub price_impact_pct: String,
    pub fee_mint_hint: Option<String>,
    pub raw_payload: Bytes,
}

#[derive(Debug, Clone)]
pub struct BuildTransactionRequest {
    pub raw_payload: Bytes,
    pub user_public_key: Pubkey,
    pub fee_account: Option<Pubkey>,
}

/// 聚合器构建出的未签名交易集合（均为 base64）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuiltTransaction {
    pub unsigned_transaction: String,
    pub setup_transaction: Option<String>,
    pub cleanup_transaction: Option<String>,
    pub prioritization_fee_lamports: Option<u64>,
}

impl BuiltTransaction {
    /// 主交易始终计 1，setup / cleanup 各加 1。
    pub fn sub_transaction_count(&self) -> u64 {
        1 + u64::from(self.setup_transaction.is_some()) + u64::from(self.cleanup_transaction.is_some())
    }
}

/// 时点报价，不落库。
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub input_mint: String,
    pub output_mint: String,
    pub swap_mode: SwapMode,
    pub in_amount: u64,
    pub out_amount: u64,
    pub estimated_amount: Decimal,
    pub exchange_rate: Decimal,
    /// USD 手续费总额除以 10^9 后的值，调用方需要乘回才是 USD。
    pub aggregate_fee: Decimal,
    pub fee_usd: Decimal,
    pub price_impact: String,
    pub route_summary: Vec<String>,
    pub platform_fee: Option<PlatformFeeQuote>,
    pub fee_mint_hint: Option<String>,
    #[serde(skip)]
    pub raw_payload: Bytes,
}

/// 以 SOL 计价的费用拆分，字段均为 9 位小数字符串。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolFeeBreakdown {
    pub trading_fee: String,
    pub transaction_fee: String,
    pub account_creation_fee: String,
    pub priority_fee: String,
    pub total: String,
    pub accounts_to_create: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeMintSelection {
    pub selected_mint: Pubkey,
    pub fee_account: Pubkey,
}

/// 提交交易时的预检承诺级别。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreflightCommitment {
    Processed,
    Confirmed,
    Finalized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    pub skip_preflight: bool,
    pub preflight_commitment: PreflightCommitment,
}

/// 链上观测到的交易状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainStatus {
    Pending,
    Processed,
    Confirmed,
    Finalized,
    Failed,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainTransactionStatus {
    pub status: ChainStatus,
    pub confirmations: u64,
    pub err: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_never_regress() {
        for terminal in [
            TradeStatus::Completed,
            TradeStatus::Finalized,
            TradeStatus::Failed,
        ] {
            assert!(terminal.is_terminal());
            for next in [TradeStatus::Prepared, TradeStatus::Submitted] {
                assert!(!terminal.can_transition_to(next));
            }
        }
        assert!(TradeStatus::Prepared.can_transition_to(TradeStatus::Submitted));
        assert!(TradeStatus::Submitted.can_transition_to(TradeStatus::Finalized));
        assert!(!TradeStatus::Prepared.can_transition_to(TradeStatus::Completed));
        assert!(!TradeStatus::Completed.can_transition_to(TradeStatus::Finalized));
    }

    #[test]
    fn sub_transaction_count_includes_setup_and_cleanup() {
        let mut built = BuiltTransaction {
            unsigned_transaction: "AQ==".to_string(),
            ..BuiltTransaction::default()
        };
        assert_eq!(built.sub_transaction_count(), 1);
        built.setup_transaction = Some("AQ==".to_string());
        built.cleanup_transaction = Some("AQ==".to_string());
        assert_eq!(built.sub_transaction_count(), 3);
    }

    #[test]
    fn list_limit_is_clamped() {
        let mut options = ListOptions::default();
        assert_eq!(options.effective_limit(), DEFAULT_PAGE_LIMIT);
        options.limit = 1_000;
        assert_eq!(options.effective_limit(), MAX_PAGE_LIMIT);
    }

    #[test]
    fn trade_status_serializes_lowercase() {
        let encoded = serde_json::to_string(&TradeStatus::Finalized).expect("serialize");
        assert_eq!(encoded, "\"finalized\"");
        assert_eq!("Submitted".parse::<TradeStatus>(), Ok(TradeStatus::Submitted));
    }
}
