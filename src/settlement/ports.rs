//! 结算核心依赖的外部协作方接口。

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;

use super::error::StoreError;
use super::types::{
    AggregatorQuote, AggregatorQuoteRequest, BuildTransactionRequest, BuiltTransaction,
    ChainTransactionStatus, CoinInfo, ListOptions, Page, SendOptions, Trade, TradeField,
    TradeStatus,
};

/// 链上提交与状态查询。
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// 返回 base58 交易签名。
    async fn send_raw_transaction(&self, raw: &[u8], options: SendOptions) -> Result<String>;

    async fn get_transaction_status(&self, signature: &str) -> Result<ChainTransactionStatus>;
}

/// 可选能力：估算单笔交易的优先费（lamports）。组装服务时注入，不在调用时探测。
#[async_trait]
pub trait FeeEstimator: Send + Sync {
    async fn estimate_priority_fee_lamports(&self) -> Result<u64>;
}

#[async_trait]
pub trait QuoteAggregator: Send + Sync {
    async fn quote(&self, request: &AggregatorQuoteRequest) -> Result<AggregatorQuote>;

    async fn build_transaction(&self, request: &BuildTransactionRequest)
    -> Result<BuiltTransaction>;
}

#[async_trait]
pub trait CoinResolver: Send + Sync {
    /// 未知 mint 返回 `Ok(None)`。
    async fn resolve(&self, mint: &str) -> Result<Option<CoinInfo>>;
}

#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// 未能定价的 mint 不出现在结果中。
    async fn batch_price(&self, mints: &[String]) -> Result<HashMap<String, Decimal>>;
}

#[async_trait]
pub trait TradeStore: Send + Sync {
    /// 分配 id 并写入，返回入库后的记录。
    async fn create(&self, trade: Trade) -> Result<Trade, StoreError>;

    async fn update(&self, trade: &Trade) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<Trade>, StoreError>;

    async fn get_by_field(&self, field: TradeField, value: &str)
    -> Result<Option<Trade>, StoreError>;

    async fn list(&self, options: &ListOptions) -> Result<Page<Trade>, StoreError>;

    /// 仅当库中记录状态等于 `expected` 时写入；状态不符返回 `Ok(false)`。
    async fn compare_and_swap(&self, expected: TradeStatus, trade: &Trade)
    -> Result<bool, StoreError>;
}

/// 平台费收款账户（ATA）的推导、查询与创建。
#[async_trait]
pub trait AccountProvisioner: Send + Sync {
    async fn derive_account(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey>;

    async fn exists(&self, address: &Pubkey) -> Result<bool>;

    async fn create(&self, owner: &Pubkey, mint: &Pubkey, payer: &Keypair) -> Result<()>;
}
