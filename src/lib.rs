//! Solana swap 结算服务：报价、费用核算、交易准备、提交与链上状态同步。

pub mod api;
pub mod chain;
pub mod coins;
pub mod config;
pub mod settlement;
pub mod store;
