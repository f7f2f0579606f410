//! 进程内的交易记录存储，可选落盘为 JSON 快照以便多次 CLI 调用共享状态。

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::settlement::error::StoreError;
use crate::settlement::ports::TradeStore;
use crate::settlement::types::{ListOptions, Page, Trade, TradeField, TradeStatus};

#[derive(Debug, Default)]
struct StoreState {
    trades: BTreeMap<String, Trade>,
    by_unsigned: HashMap<String, String>,
    by_hash: HashMap<String, String>,
}

impl StoreState {
    fn from_trades(trades: Vec<Trade>) -> Self {
        let mut state = Self::default();
        for trade in trades {
            state.trades.insert(trade.id.clone(), trade.clone());
            state.index(&trade);
        }
        state
    }

    fn index(&mut self, trade: &Trade) {
        // 同一未签名交易可能对应多条历史记录，索引总是指向仍然活跃的那条
        let replace = match self.by_unsigned.get(&trade.unsigned_transaction) {
            Some(current) if current != &trade.id => self
                .trades
                .get(current)
                .is_none_or(|existing| existing.status.is_terminal()),
            _ => true,
        };
        if replace {
            self.by_unsigned
                .insert(trade.unsigned_transaction.clone(), trade.id.clone());
        }
        if let Some(hash) = trade.transaction_hash.as_ref() {
            self.by_hash.insert(hash.clone(), trade.id.clone());
        }
    }

    fn check_unique(&self, trade: &Trade) -> Result<(), StoreError> {
        if !trade.status.is_terminal() {
            if let Some(owner) = self.by_unsigned.get(&trade.unsigned_transaction) {
                let active = self
                    .trades
                    .get(owner)
                    .is_some_and(|existing| !existing.status.is_terminal());
                if owner != &trade.id && active {
                    return Err(StoreError::Duplicate {
                        field: TradeField::UnsignedTransaction.as_str(),
                        value: trade.unsigned_transaction.clone(),
                    });
                }
            }
        }
        if let Some(hash) = trade.transaction_hash.as_ref() {
            if let Some(owner) = self.by_hash.get(hash) {
                if owner != &trade.id {
                    return Err(StoreError::Duplicate {
                        field: TradeField::TransactionHash.as_str(),
                        value: hash.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_update(&self, existing: &Trade, next: &Trade) -> Result<(), StoreError> {
        if !existing.status.can_transition_to(next.status) {
            return Err(StoreError::InvalidTransition {
                from: existing.status,
                to: next.status,
            });
        }
        if existing.unsigned_transaction != next.unsigned_transaction {
            return Err(StoreError::Immutable(TradeField::UnsignedTransaction.as_str()));
        }
        if existing.created_at != next.created_at {
            return Err(StoreError::Immutable("createdAt"));
        }
        if let Some(hash) = existing.transaction_hash.as_ref() {
            if next.transaction_hash.as_ref() != Some(hash) {
                return Err(StoreError::Immutable(TradeField::TransactionHash.as_str()));
            }
        }
        self.check_unique(next)
    }
}

pub struct MemoryTradeStore {
    state: Mutex<StoreState>,
    snapshot_path: Option<PathBuf>,
}

impl Default for MemoryTradeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTradeStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StoreState::default()),
            snapshot_path: None,
        }
    }

    /// 从快照文件恢复；文件不存在时从空库开始。
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let trades: Vec<Trade> = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.is_empty() => Vec::new(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(StoreError::Io(err)),
        };
        info!(
            target: "store",
            path = %path.display(),
            trades = trades.len(),
            "已加载交易快照"
        );
        Ok(Self {
            state: Mutex::new(StoreState::from_trades(trades)),
            snapshot_path: Some(path),
        })
    }

    async fn persist(&self, state: &StoreState) -> Result<(), StoreError> {
        let Some(path) = self.snapshot_path.as_ref() else {
            return Ok(());
        };
        let trades: Vec<&Trade> = state.trades.values().collect();
        let encoded = serde_json::to_vec_pretty(&trades)?;
        if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, encoded).await?;
        tokio::fs::rename(&staging, path).await?;
        debug!(
            target: "store",
            path = %path.display(),
            trades = trades.len(),
            "交易快照已写入"
        );
        Ok(())
    }

    /// 写入新版本并落盘，落盘失败时回滚内存状态。
    async fn commit(
        &self,
        state: &mut StoreState,
        trade: &Trade,
        previous: Option<Trade>,
    ) -> Result<(), StoreError> {
        let unsigned_owner = state.by_unsigned.get(&trade.unsigned_transaction).cloned();
        state.trades.insert(trade.id.clone(), trade.clone());
        state.index(trade);

        if let Err(err) = self.persist(state).await {
            match previous {
                Some(previous) => {
                    state.trades.insert(previous.id.clone(), previous);
                }
                None => {
                    state.trades.remove(&trade.id);
                }
            }
            if let Some(hash) = trade.transaction_hash.as_ref() {
                if state.by_hash.get(hash) == Some(&trade.id)
                    && state
                        .trades
                        .get(&trade.id)
                        .is_none_or(|restored| restored.transaction_hash.as_ref() != Some(hash))
                {
                    state.by_hash.remove(hash);
                }
            }
            match unsigned_owner {
                Some(owner) => {
                    state
                        .by_unsigned
                        .insert(trade.unsigned_transaction.clone(), owner);
                }
                None => {
                    state.by_unsigned.remove(&trade.unsigned_transaction);
                }
            }
            return Err(err);
        }
        Ok(())
    }
}

#[async_trait]
impl TradeStore for MemoryTradeStore {
    async fn create(&self, mut trade: Trade) -> Result<Trade, StoreError> {
        let mut state = self.state.lock().await;
        if trade.id.is_empty() {
            trade.id = Uuid::new_v4().to_string();
        } else if state.trades.contains_key(&trade.id) {
            return Err(StoreError::Duplicate {
                field: "id",
                value: trade.id.clone(),
            });
        }
        state.check_unique(&trade)?;
        self.commit(&mut state, &trade, None).await?;
        debug!(target: "store", trade_id = %trade.id, status = %trade.status, "交易记录已创建");
        Ok(trade)
    }

    async fn update(&self, trade: &Trade) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let existing = state
            .trades
            .get(&trade.id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(trade.id.clone()))?;
        state.check_update(&existing, trade)?;
        self.commit(&mut state, trade, Some(existing)).await
    }

    async fn get(&self, id: &str) -> Result<Option<Trade>, StoreError> {
        Ok(self.state.lock().await.trades.get(id).cloned())
    }

    async fn get_by_field(
        &self,
        field: TradeField,
        value: &str,
    ) -> Result<Option<Trade>, StoreError> {
        let state = self.state.lock().await;
        let index = match field {
            TradeField::UnsignedTransaction => &state.by_unsigned,
            TradeField::TransactionHash => &state.by_hash,
        };
        Ok(index
            .get(value)
            .and_then(|id| state.trades.get(id))
            .cloned())
    }

    async fn list(&self, options: &ListOptions) -> Result<Page<Trade>, StoreError> {
        let state = self.state.lock().await;
        let user = options.user_address.as_deref().map(str::trim);
        let mut matched: Vec<&Trade> = state
            .trades
            .values()
            .filter(|trade| user.is_none_or(|user| trade.user_address == user))
            .filter(|trade| options.status.is_none_or(|status| trade.status == status))
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));

        let total = matched.len();
        let items = matched
            .into_iter()
            .skip(options.offset)
            .take(options.effective_limit())
            .cloned()
            .collect();
        Ok(Page { items, total })
    }

    async fn compare_and_swap(
        &self,
        expected: TradeStatus,
        trade: &Trade,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let existing = state
            .trades
            .get(&trade.id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(trade.id.clone()))?;
        if existing.status != expected {
            return Ok(false);
        }
        state.check_update(&existing, trade)?;
        self.commit(&mut state, trade, Some(existing)).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use time::{Duration, OffsetDateTime};

    fn trade(unsigned: &str, created_offset: i64) -> Trade {
        Trade {
            id: String::new(),
            user_address: "wallet-a".to_string(),
            from_mint: "So11111111111111111111111111111111111111112".to_string(),
            to_mint: "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            from_coin_id: "sol".to_string(),
            to_coin_id: "usdc".to_string(),
            symbol: "SOL/USDC".to_string(),
            amount: "1000".to_string(),
            price: Decimal::ONE,
            fee: Decimal::ZERO,
            platform_fee_amount: 0,
            platform_fee_percent: Decimal::ZERO,
            platform_fee_destination: String::new(),
            platform_fee_mint: String::new(),
            status: TradeStatus::Prepared,
            unsigned_transaction: unsigned.to_string(),
            transaction_hash: None,
            confirmations: 0,
            finalized: false,
            error: None,
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(created_offset),
            completed_at: None,
        }
    }

    #[tokio::test]
    async fn create_assigns_id_and_indexes_unsigned_transaction() {
        let store = MemoryTradeStore::new();
        let created = store.create(trade("tx-a", 0)).await.expect("create");
        assert!(!created.id.is_empty());

        let found = store
            .get_by_field(TradeField::UnsignedTransaction, "tx-a")
            .await
            .expect("lookup");
        assert_eq!(found.map(|t| t.id), Some(created.id));
    }

    #[tokio::test]
    async fn active_unsigned_transaction_must_be_unique() {
        let store = MemoryTradeStore::new();
        let first = store.create(trade("tx-a", 0)).await.expect("create");
        let err = store.create(trade("tx-a", 1)).await.expect_err("duplicate");
        assert!(matches!(err, StoreError::Duplicate { .. }));

        let mut failed = first.clone();
        failed.status = TradeStatus::Failed;
        store.update(&failed).await.expect("fail first");

        let second = store.create(trade("tx-a", 2)).await.expect("re-prepare");
        let found = store
            .get_by_field(TradeField::UnsignedTransaction, "tx-a")
            .await
            .expect("lookup");
        assert_eq!(found.map(|t| t.id), Some(second.id));
    }

    #[tokio::test]
    async fn updates_never_regress_status_or_rewrite_hash() {
        let store = MemoryTradeStore::new();
        let mut stored = store.create(trade("tx-a", 0)).await.expect("create");
        stored.status = TradeStatus::Submitted;
        stored.transaction_hash = Some("sig-1".to_string());
        store.update(&stored).await.expect("submit");

        let mut regressed = stored.clone();
        regressed.status = TradeStatus::Prepared;
        assert!(matches!(
            store.update(&regressed).await,
            Err(StoreError::InvalidTransition { .. })
        ));

        let mut rewritten = stored.clone();
        rewritten.transaction_hash = Some("sig-2".to_string());
        assert!(matches!(
            store.update(&rewritten).await,
            Err(StoreError::Immutable(_))
        ));

        let by_hash = store
            .get_by_field(TradeField::TransactionHash, "sig-1")
            .await
            .expect("lookup");
        assert_eq!(by_hash.map(|t| t.status), Some(TradeStatus::Submitted));
    }

    #[tokio::test]
    async fn compare_and_swap_claims_once() {
        let store = MemoryTradeStore::new();
        let mut claimed = store.create(trade("tx-a", 0)).await.expect("create");
        claimed.status = TradeStatus::Submitted;

        assert!(store
            .compare_and_swap(TradeStatus::Prepared, &claimed)
            .await
            .expect("first claim"));
        assert!(!store
            .compare_and_swap(TradeStatus::Prepared, &claimed)
            .await
            .expect("second claim"));
    }

    #[tokio::test]
    async fn list_is_newest_first_with_filters() {
        let store = MemoryTradeStore::new();
        for (index, unsigned) in ["tx-a", "tx-b", "tx-c"].iter().enumerate() {
            store
                .create(trade(unsigned, index as i64))
                .await
                .expect("create");
        }
        let mut other = trade("tx-d", 10);
        other.user_address = "wallet-b".to_string();
        store.create(other).await.expect("create");

        let page = store
            .list(&ListOptions {
                user_address: Some("wallet-a".to_string()),
                limit: 2,
                ..ListOptions::default()
            })
            .await
            .expect("list");
        assert_eq!(page.total, 3);
        let unsigned: Vec<&str> = page
            .items
            .iter()
            .map(|trade| trade.unsigned_transaction.as_str())
            .collect();
        assert_eq!(unsigned, vec!["tx-c", "tx-b"]);

        let submitted = store
            .list(&ListOptions {
                status: Some(TradeStatus::Submitted),
                ..ListOptions::default()
            })
            .await
            .expect("list");
        assert_eq!(submitted.total, 0);
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("trades.json");

        let store = MemoryTradeStore::open(&path).await.expect("open");
        let created = store.create(trade("tx-a", 0)).await.expect("create");
        drop(store);

        let reopened = MemoryTradeStore::open(&path).await.expect("reopen");
        let restored = reopened.get(&created.id).await.expect("get");
        assert_eq!(restored.map(|t| t.unsigned_transaction), Some("tx-a".to_string()));
        let by_unsigned = reopened
            .get_by_field(TradeField::UnsignedTransaction, "tx-a")
            .await
            .expect("lookup");
        assert!(by_unsigned.is_some());
    }
}
