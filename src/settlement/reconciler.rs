use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use super::error::{SettlementError, SettlementResult};
use super::ports::{ChainClient, TradeStore};
use super::types::{ChainStatus, ChainTransactionStatus, Trade, TradeField, TradeStatus};
use super::validation;

/// 达到该确认数的 confirmed 交易视为实际完成。
pub const FINALITY_THRESHOLD: u64 = 31;

const GENERIC_FAILURE: &str = "交易在链上执行失败";

pub struct StatusReconciler {
    chain: Arc<dyn ChainClient>,
    store: Arc<dyn TradeStore>,
    finality_threshold: u64,
}

impl StatusReconciler {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        store: Arc<dyn TradeStore>,
        finality_threshold: u64,
    ) -> Self {
        Self {
            chain,
            store,
            finality_threshold,
        }
    }

    pub async fn reconcile(&self, transaction_hash: &str) -> SettlementResult<Trade> {
        validation::validate_signature(transaction_hash)?;
        let hash = transaction_hash.trim();

        let mut trade = self
            .store
            .get_by_field(TradeField::TransactionHash, hash)
            .await?
            .ok_or_else(|| SettlementError::not_found(format!("交易哈希 {hash} 没有对应记录")))?;

        if trade.status.is_terminal() {
            debug!(
                target: "settlement::reconciler",
                trade_id = %trade.id,
                status = %trade.status,
                "交易已处于终态，跳过链上查询"
            );
            return Ok(trade);
        }

        let observed = match self.chain.get_transaction_status(hash).await {
            Ok(observed) => observed,
            Err(err) => {
                warn!(
                    target: "settlement::reconciler",
                    trade_id = %trade.id,
                    signature = %hash,
                    error = %format!("{err:#}"),
                    "查询链上状态失败，返回已存储的记录"
                );
                return Ok(trade);
            }
        };

        if !self.apply(&mut trade, &observed, OffsetDateTime::now_utc()) {
            return Ok(trade);
        }

        if let Err(err) = self.store.update(&trade).await {
            warn!(
                target: "settlement::reconciler",
                trade_id = %trade.id,
                error = %err,
                "同步链上状态后写入记录失败"
            );
        }
        Ok(trade)
    }

    /// 把链上观测合并进交易记录，返回是否有字段发生变化。
    pub fn apply(
        &self,
        trade: &mut Trade,
        observed: &ChainTransactionStatus,
        now: OffsetDateTime,
    ) -> bool {
        let mut changed = false;
        // rooted 交易不再返回确认数，已记录的值只增不减
        if observed.confirmations > trade.confirmations {
            trade.confirmations = observed.confirmations;
            changed = true;
        }

        match observed.status {
            ChainStatus::Failed => {
                let reason = observed
                    .err
                    .clone()
                    .filter(|detail| !detail.trim().is_empty())
                    .unwrap_or_else(|| GENERIC_FAILURE.to_string());
                trade.status = TradeStatus::Failed;
                trade.error = Some(reason.clone());
                trade.finalized = true;
                trade.completed_at = Some(now);
                changed = true;
                warn!(
                    target: "settlement::reconciler",
                    trade_id = %trade.id,
                    error = %reason,
                    "链上交易失败"
                );
            }
            ChainStatus::Finalized => {
                if trade.status != TradeStatus::Completed {
                    trade.status = TradeStatus::Finalized;
                    trade.completed_at = Some(now);
                    trade.finalized = true;
                    trade.error = None;
                    changed = true;
                    info!(
                        target: "settlement::reconciler",
                        trade_id = %trade.id,
                        confirmations = trade.confirmations,
                        "交易已最终确认"
                    );
                }
            }
            ChainStatus::Confirmed if observed.confirmations >= self.finality_threshold => {
                trade.status = TradeStatus::Completed;
                trade.completed_at = Some(now);
                trade.finalized = false;
                changed = true;
                info!(
                    target: "settlement::reconciler",
                    trade_id = %trade.id,
                    confirmations = observed.confirmations,
                    threshold = self.finality_threshold,
                    "交易确认数达到阈值，标记完成"
                );
            }
            status => {
                debug!(
                    target: "settlement::reconciler",
                    trade_id = %trade.id,
                    ?status,
                    confirmations = observed.confirmations,
                    "交易尚未完成"
                );
            }
        }
        changed
    }
}
