//! Solana RPC 适配：交易提交、状态查询、优先费估算与 ATA 管理。

pub mod ata;
pub mod provisioner;
pub mod rpc;

use thiserror::Error;

pub use provisioner::AtaProvisioner;
pub use rpc::RpcChainClient;

#[derive(Debug, Error)]
pub enum ChainClientError {
    #[error("无法解码已签名交易: {0}")]
    Decode(String),
    #[error("无效的交易签名: {0}")]
    Signature(String),
    #[error(transparent)]
    Rpc(#[from] solana_client::client_error::ClientError),
}
