use std::str::FromStr;
use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use tracing::{debug, info, warn};

use super::error::{SettlementError, SettlementResult};
use super::ports::AccountProvisioner;
use super::types::{FeeMintSelection, SwapMode};

pub const WRAPPED_SOL_MINT: Pubkey =
    solana_sdk::pubkey!("So11111111111111111111111111111111111111112");
/// 客户端用来表示未包装原生 SOL 的哨兵地址。
pub const NATIVE_SOL_SENTINEL: Pubkey = solana_sdk::pubkey!("11111111111111111111111111111111");

pub fn is_native_sentinel(mint: &Pubkey) -> bool {
    *mint == NATIVE_SOL_SENTINEL
}

pub fn is_sol_like(mint: &Pubkey) -> bool {
    is_native_sentinel(mint) || *mint == WRAPPED_SOL_MINT
}

/// 原生 SOL 没有自己的关联账户，推导前统一改写为 wSOL。
pub fn normalize_native(mint: Pubkey) -> Pubkey {
    if is_native_sentinel(&mint) {
        WRAPPED_SOL_MINT
    } else {
        mint
    }
}

/// 不考虑聚合器提示时的费用币种选择。
pub fn preferred_fee_mint(input: &Pubkey, output: &Pubkey, swap_mode: SwapMode) -> Pubkey {
    let selected = match swap_mode {
        // ExactOut 只能从卖出资产中扣费
        SwapMode::ExactOut => *input,
        SwapMode::ExactIn => {
            if is_sol_like(input) || is_sol_like(output) {
                WRAPPED_SOL_MINT
            } else {
                *input
            }
        }
    };
    normalize_native(selected)
}

pub struct FeeMintSelector {
    provisioner: Arc<dyn AccountProvisioner>,
    fee_owner: Pubkey,
    signer: Option<Arc<Keypair>>,
}

impl FeeMintSelector {
    pub fn new(
        provisioner: Arc<dyn AccountProvisioner>,
        fee_owner: Pubkey,
        signer: Option<Arc<Keypair>>,
    ) -> Self {
        Self {
            provisioner,
            fee_owner,
            signer,
        }
    }

    pub fn fee_owner(&self) -> &Pubkey {
        &self.fee_owner
    }

    pub async fn select(
        &self,
        input: &Pubkey,
        output: &Pubkey,
        swap_mode: SwapMode,
        hint: Option<&str>,
    ) -> SettlementResult<FeeMintSelection> {
        if let Some(hint) = hint {
            if let Some(selection) = self.try_hint(hint).await {
                return Ok(selection);
            }
        }

        let selected_mint = preferred_fee_mint(input, output, swap_mode);
        let fee_account = self.ensure_account(&selected_mint).await?;
        debug!(
            target: "settlement::fee_mint",
            mint = %selected_mint,
            fee_account = %fee_account,
            swap_mode = %swap_mode,
            "已选定平台费币种"
        );
        Ok(FeeMintSelection {
            selected_mint,
            fee_account,
        })
    }

    /// 提示不可用时返回 `None`，交由常规规则处理。
    async fn try_hint(&self, hint: &str) -> Option<FeeMintSelection> {
        let mint = match Pubkey::from_str(hint.trim()) {
            Ok(mint) => normalize_native(mint),
            Err(err) => {
                warn!(
                    target: "settlement::fee_mint",
                    hint,
                    error = %err,
                    "聚合器推荐的费用币种非法，忽略"
                );
                return None;
            }
        };

        let account = match self.provisioner.derive_account(&self.fee_owner, &mint).await {
            Ok(account) => account,
            Err(err) => {
                warn!(
                    target: "settlement::fee_mint",
                    mint = %mint,
                    error = %err,
                    "推导推荐币种的费用账户失败，回退默认规则"
                );
                return None;
            }
        };

        match self.provisioner.exists(&account).await {
            Ok(true) => Some(FeeMintSelection {
                selected_mint: mint,
                fee_account: account,
            }),
            Ok(false) => {
                debug!(
                    target: "settlement::fee_mint",
                    mint = %mint,
                    fee_account = %account,
                    "推荐币种的费用账户不存在，回退默认规则"
                );
                None
            }
            Err(err) => {
                warn!(
                    target: "settlement::fee_mint",
                    fee_account = %account,
                    error = %err,
                    "查询推荐币种费用账户失败，回退默认规则"
                );
                None
            }
        }
    }

    async fn ensure_account(&self, mint: &Pubkey) -> SettlementResult<Pubkey> {
        let account = self
            .provisioner
            .derive_account(&self.fee_owner, mint)
            .await
            .map_err(|err| {
                SettlementError::provisioning(format!("推导 {mint} 的费用账户失败: {err:#}"))
            })?;

        let exists = self.provisioner.exists(&account).await.map_err(|err| {
            SettlementError::provisioning(format!("查询费用账户 {account} 失败: {err:#}"))
        })?;
        if exists {
            return Ok(account);
        }

        let Some(signer) = self.signer.as_ref() else {
            return Err(SettlementError::provisioning(format!(
                "费用账户 {account} 不存在且未配置签名者，无法创建"
            )));
        };

        self.provisioner
            .create(&self.fee_owner, mint, signer)
            .await
            .map_err(|err| {
                SettlementError::provisioning(format!("创建费用账户 {account} 失败: {err:#}"))
            })?;
        info!(
            target: "settlement::fee_mint",
            mint = %mint,
            fee_account = %account,
            owner = %self.fee_owner,
            "已创建平台费收款账户"
        );
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const USDC: Pubkey = solana_sdk::pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
    const BONK: Pubkey = solana_sdk::pubkey!("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263");

    #[test]
    fn exact_out_uses_input_mint() {
        assert_eq!(preferred_fee_mint(&USDC, &WRAPPED_SOL_MINT, SwapMode::ExactOut), USDC);
        assert_eq!(
            preferred_fee_mint(&NATIVE_SOL_SENTINEL, &USDC, SwapMode::ExactOut),
            WRAPPED_SOL_MINT
        );
    }

    #[test]
    fn exact_in_prefers_wrapped_sol_when_either_leg_is_sol() {
        assert_eq!(
            preferred_fee_mint(&NATIVE_SOL_SENTINEL, &USDC, SwapMode::ExactIn),
            WRAPPED_SOL_MINT
        );
        assert_eq!(preferred_fee_mint(&USDC, &WRAPPED_SOL_MINT, SwapMode::ExactIn), WRAPPED_SOL_MINT);
        assert_eq!(
            preferred_fee_mint(&BONK, &NATIVE_SOL_SENTINEL, SwapMode::ExactIn),
            WRAPPED_SOL_MINT
        );
    }

    #[test]
    fn exact_in_token_pair_uses_input_mint() {
        assert_eq!(preferred_fee_mint(&BONK, &USDC, SwapMode::ExactIn), BONK);
    }
}
