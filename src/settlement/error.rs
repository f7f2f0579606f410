use std::fmt;

use thiserror::Error;

use super::types::TradeStatus;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("参数非法: {0}")]
    Validation(String),
    #[error("未找到: {0}")]
    NotFound(String),
    #[error("上游服务失败: {0}")]
    Upstream(String),
    #[error("链上提交被拒绝: {0}")]
    Chain(String),
    #[error("费用账户准备失败: {0}")]
    Provisioning(String),
    #[error("交易记录持久化失败: {0}")]
    Persistence(#[from] StoreError),
}

impl SettlementError {
    pub fn validation(reason: impl fmt::Display) -> Self {
        Self::Validation(reason.to_string())
    }

    pub fn not_found(reason: impl fmt::Display) -> Self {
        Self::NotFound(reason.to_string())
    }

    /// 上游错误保留完整的 cause 链。
    pub fn upstream(stage: &str, err: &anyhow::Error) -> Self {
        Self::Upstream(format!("{stage}: {err:#}"))
    }

    pub fn provisioning(reason: impl fmt::Display) -> Self {
        Self::Provisioning(reason.to_string())
    }

    pub fn kind(&self) -> &'static str {
        match self {
            SettlementError::Validation(_) => "validation",
            SettlementError::NotFound(_) => "not_found",
            SettlementError::Upstream(_) => "upstream",
            SettlementError::Chain(_) => "chain",
            SettlementError::Provisioning(_) => "provisioning",
            SettlementError::Persistence(_) => "persistence",
        }
    }
}

pub type SettlementResult<T> = Result<T, SettlementError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("交易记录 {0} 不存在")]
    NotFound(String),
    #[error("{field} 已被占用: {value}")]
    Duplicate { field: &'static str, value: String },
    #[error("非法状态迁移 {from} -> {to}")]
    InvalidTransition { from: TradeStatus, to: TradeStatus },
    #[error("字段 {0} 写入后不可修改")]
    Immutable(&'static str),
    #[error("快照文件读写失败: {0}")]
    Io(#[from] std::io::Error),
    #[error("快照序列化失败: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("{0}")]
    Backend(String),
}
