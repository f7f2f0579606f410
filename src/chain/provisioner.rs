use std::sync::Arc;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use solana_sdk::transaction::Transaction;
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::Account as SplTokenAccount;
use tracing::{debug, info};

use super::ata::{
    associated_token_address, cached_token_program, create_associated_token_account_idempotent,
    is_token_program, remember_token_program,
};
use crate::settlement::ports::AccountProvisioner;

/// 基于 RPC 的 ATA 推导、存在性检查与幂等创建。
#[derive(Clone)]
pub struct AtaProvisioner {
    rpc: Arc<RpcClient>,
}

impl AtaProvisioner {
    pub fn new(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }

    async fn token_program_of(&self, mint: &Pubkey) -> Result<Pubkey> {
        if let Some(program) = cached_token_program(mint) {
            return Ok(program);
        }
        let account = self
            .rpc
            .get_account_with_commitment(mint, CommitmentConfig::confirmed())
            .await?
            .value
            .ok_or_else(|| anyhow!("mint {mint} 不存在"))?;
        if !is_token_program(&account.owner) {
            return Err(anyhow!("mint {mint} 的 owner {} 不是 token program", account.owner));
        }
        remember_token_program(*mint, account.owner);
        Ok(account.owner)
    }
}

#[async_trait]
impl AccountProvisioner for AtaProvisioner {
    async fn derive_account(&self, owner: &Pubkey, mint: &Pubkey) -> Result<Pubkey> {
        let token_program = self.token_program_of(mint).await?;
        Ok(associated_token_address(owner, mint, &token_program))
    }

    async fn exists(&self, address: &Pubkey) -> Result<bool> {
        let Some(account) = self
            .rpc
            .get_account_with_commitment(address, CommitmentConfig::confirmed())
            .await?
            .value
        else {
            return Ok(false);
        };
        if !is_token_program(&account.owner) {
            return Err(anyhow!("账户 {address} 已被非 token 账户占用"));
        }
        // Token-2022 账户在基础布局后附带扩展，只解析前 165 字节
        if account.data.len() < SplTokenAccount::LEN {
            return Err(anyhow!("账户 {address} 数据长度不足"));
        }
        let state = SplTokenAccount::unpack_from_slice(&account.data[..SplTokenAccount::LEN])
            .map_err(|err| anyhow!("解析 token 账户 {address} 失败: {err}"))?;
        debug!(
            target: "chain::provisioner",
            %address,
            mint = %state.mint,
            owner = %state.owner,
            "收款账户已存在"
        );
        Ok(true)
    }

    async fn create(&self, owner: &Pubkey, mint: &Pubkey, payer: &Keypair) -> Result<()> {
        let token_program = self.token_program_of(mint).await?;
        let payer_pubkey = payer.pubkey();
        let instruction =
            create_associated_token_account_idempotent(&payer_pubkey, owner, mint, &token_program);
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let tx = Transaction::new_signed_with_payer(
            &[instruction],
            Some(&payer_pubkey),
            &[payer],
            blockhash,
        );
        let signature = self.rpc.send_and_confirm_transaction(&tx).await?;
        info!(
            target: "chain::provisioner",
            %owner,
            %mint,
            %token_program,
            %signature,
            "收款 ATA 创建交易已确认"
        );
        Ok(())
    }
}
