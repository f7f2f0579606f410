use std::sync::Arc;

use tracing::{info, warn};

use super::error::{SettlementError, SettlementResult};
use super::ports::{ChainClient, TradeStore};
use super::types::{PreflightCommitment, SendOptions, Trade, TradeField, TradeStatus};
use super::validation;

/// 固定的提交参数：保留预检，承诺级别 confirmed。
pub const SUBMIT_OPTIONS: SendOptions = SendOptions {
    skip_preflight: false,
    preflight_commitment: PreflightCommitment::Confirmed,
};

pub struct TradeExecutor {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn TradeStore>,
}

impl TradeExecutor {
    pub fn new(chain: Arc<dyn ChainClient>, store: Arc<dyn TradeStore>) -> Self {
        Self { chain, store }
    }

    /// 以未签名交易为幂等键提交用户签名后的交易。
    pub async fn execute(
        &self,
        unsigned_transaction: &str,
        signed_transaction: &str,
    ) -> SettlementResult<Trade> {
        let key = unsigned_transaction.trim();
        if key.is_empty() {
            return Err(SettlementError::validation("unsignedTransaction 不能为空"));
        }
        let prepared = self
            .store
            .get_by_field(TradeField::UnsignedTransaction, key)
            .await?
            .filter(|trade| trade.status == TradeStatus::Prepared)
            .ok_or_else(no_prepared_trade)?;

        let raw = validation::decode_signed_transaction(signed_transaction)?;

        // 先把 prepared 原子地占为 submitted，竞争失败的一方不会触达链上。
        // 占用后若任务在发送前被取消，或下方 failed 状态写入失败，记录会停在
        // 没有交易哈希的 submitted，只能按未签名交易索引人工排查。
        let mut trade = prepared;
        trade.status = TradeStatus::Submitted;
        trade.error = None;
        if !self
            .store
            .compare_and_swap(TradeStatus::Prepared, &trade)
            .await?
        {
            warn!(
                target: "settlement::executor",
                trade_id = %trade.id,
                "交易已被并发执行占用"
            );
            return Err(no_prepared_trade());
        }

        match self.chain.send_raw_transaction(&raw, SUBMIT_OPTIONS).await {
            Ok(signature) => {
                trade.transaction_hash = Some(signature.clone());
                trade.error = None;
                if let Err(err) = self.store.update(&trade).await {
                    // 链上提交已成功，记账失败留给后续 reconcile
                    warn!(
                        target: "settlement::executor",
                        trade_id = %trade.id,
                        signature = %signature,
                        error = %err,
                        "交易已提交但记录交易哈希失败"
                    );
                }
                info!(
                    target: "settlement::executor",
                    trade_id = %trade.id,
                    signature = %signature,
                    bytes = raw.len(),
                    "交易已提交"
                );
                Ok(trade)
            }
            Err(err) => {
                let reason = format!("{err:#}");
                trade.status = TradeStatus::Failed;
                trade.error = Some(reason.clone());
                if let Err(store_err) = self.store.update(&trade).await {
                    warn!(
                        target: "settlement::executor",
                        trade_id = %trade.id,
                        error = %store_err,
                        "记录提交失败状态时出错"
                    );
                }
                warn!(
                    target: "settlement::executor",
                    trade_id = %trade.id,
                    error = %reason,
                    "链上拒绝了交易"
                );
                Err(SettlementError::Chain(reason))
            }
        }
    }
}

fn no_prepared_trade() -> SettlementError {
    SettlementError::not_found("没有匹配的 prepared 交易")
}
