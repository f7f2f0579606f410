use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result as AnyResult;
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_client::rpc_config::RpcSendTransactionConfig;
use solana_commitment_config::{CommitmentConfig, CommitmentLevel};
use solana_sdk::signature::Signature;
use solana_sdk::transaction::VersionedTransaction;
use tracing::{debug, info};

use super::ChainClientError;
use crate::settlement::ports::{ChainClient, FeeEstimator};
use crate::settlement::types::{
    ChainStatus, ChainTransactionStatus, PreflightCommitment, SendOptions,
};

/// 估算优先费时假设的 compute unit 消耗。
pub const ESTIMATED_COMPUTE_UNITS: u64 = 200_000;
const MICRO_LAMPORTS_PER_LAMPORT: u64 = 1_000_000;

#[derive(Clone)]
pub struct RpcChainClient {
    client: Arc<RpcClient>,
}

impl RpcChainClient {
    pub fn new(client: Arc<RpcClient>) -> Self {
        Self { client }
    }

    pub fn rpc(&self) -> &Arc<RpcClient> {
        &self.client
    }

    async fn submit(&self, raw: &[u8], options: SendOptions) -> Result<Signature, ChainClientError> {
        let (tx, _): (VersionedTransaction, usize) =
            bincode::serde::decode_from_slice(raw, bincode::config::legacy())
                .map_err(|err| ChainClientError::Decode(err.to_string()))?;
        let config = RpcSendTransactionConfig {
            skip_preflight: options.skip_preflight,
            preflight_commitment: Some(commitment_level(options.preflight_commitment)),
            ..RpcSendTransactionConfig::default()
        };
        let signature = self
            .client
            .send_transaction_with_config(&tx, config)
            .await?;
        info!(
            target: "chain::rpc",
            signature = %signature,
            endpoint = %self.client.url(),
            skip_preflight = options.skip_preflight,
            "交易已通过 RPC 提交"
        );
        Ok(signature)
    }

    async fn status(&self, signature: &str) -> Result<ChainTransactionStatus, ChainClientError> {
        let signature = Signature::from_str(signature.trim())
            .map_err(|err| ChainClientError::Signature(err.to_string()))?;
        let statuses = self
            .client
            .get_signature_statuses_with_history(&[signature])
            .await?
            .value;

        let Some(status) = statuses.into_iter().next().flatten() else {
            return Ok(ChainTransactionStatus {
                status: ChainStatus::Unknown,
                confirmations: 0,
                err: None,
            });
        };

        // rooted 交易不再返回确认数
        let confirmations = status
            .confirmations
            .and_then(|count| u64::try_from(count).ok())
            .unwrap_or(0);
        let mapped = if let Some(err) = status.err.as_ref() {
            ChainTransactionStatus {
                status: ChainStatus::Failed,
                confirmations,
                err: Some(err.to_string()),
            }
        } else if status.satisfies_commitment(CommitmentConfig::finalized()) {
            ChainTransactionStatus {
                status: ChainStatus::Finalized,
                confirmations,
                err: None,
            }
        } else if status.satisfies_commitment(CommitmentConfig::confirmed()) {
            ChainTransactionStatus {
                status: ChainStatus::Confirmed,
                confirmations,
                err: None,
            }
        } else {
            ChainTransactionStatus {
                status: ChainStatus::Processed,
                confirmations,
                err: None,
            }
        };
        debug!(
            target: "chain::rpc",
            signature = %signature,
            slot = status.slot,
            status = ?mapped.status,
            confirmations,
            "查询交易状态"
        );
        Ok(mapped)
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn send_raw_transaction(&self, raw: &[u8], options: SendOptions) -> AnyResult<String> {
        let signature = self.submit(raw, options).await?;
        Ok(signature.to_string())
    }

    async fn get_transaction_status(&self, signature: &str) -> AnyResult<ChainTransactionStatus> {
        Ok(self.status(signature).await?)
    }
}

#[async_trait]
impl FeeEstimator for RpcChainClient {
    async fn estimate_priority_fee_lamports(&self) -> AnyResult<u64> {
        let fees = self
            .client
            .get_recent_prioritization_fees(&[])
            .await
            .map_err(ChainClientError::from)?;
        let micro_lamports_per_cu =
            median(fees.iter().map(|fee| fee.prioritization_fee).collect());
        let lamports = priority_fee_lamports(micro_lamports_per_cu);
        debug!(
            target: "chain::rpc",
            samples = fees.len(),
            micro_lamports_per_cu,
            lamports,
            "估算优先费"
        );
        Ok(lamports)
    }
}

fn commitment_level(commitment: PreflightCommitment) -> CommitmentLevel {
    match commitment {
        PreflightCommitment::Processed => CommitmentLevel::Processed,
        PreflightCommitment::Confirmed => CommitmentLevel::Confirmed,
        PreflightCommitment::Finalized => CommitmentLevel::Finalized,
    }
}

fn median(mut values: Vec<u64>) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.sort_unstable();
    values[values.len() / 2]
}

fn priority_fee_lamports(micro_lamports_per_cu: u64) -> u64 {
    let total = u128::from(micro_lamports_per_cu) * u128::from(ESTIMATED_COMPUTE_UNITS)
        / u128::from(MICRO_LAMPORTS_PER_LAMPORT);
    u64::try_from(total).unwrap_or(u64::MAX)
}
