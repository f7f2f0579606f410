use dashmap::DashMap;
use once_cell::sync::Lazy;
use solana_sdk::instruction::{AccountMeta, Instruction};
use solana_sdk::pubkey::Pubkey;

pub const TOKEN_PROGRAM_ID: Pubkey = spl_token::ID;
pub const TOKEN_2022_PROGRAM_ID: Pubkey = spl_token_2022::ID;
pub const ASSOCIATED_TOKEN_PROGRAM_ID: Pubkey = spl_associated_token_account::ID;
const SYSTEM_PROGRAM_ID: Pubkey = solana_sdk::pubkey!("11111111111111111111111111111111");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct AtaKey {
    owner: Pubkey,
    mint: Pubkey,
    token_program: Pubkey,
}

static ATA_CACHE: Lazy<DashMap<AtaKey, Pubkey>> = Lazy::new(DashMap::new);
/// mint -> 所属 token program，mint 的 owner 不会变化。
static TOKEN_PROGRAM_CACHE: Lazy<DashMap<Pubkey, Pubkey>> = Lazy::new(DashMap::new);

pub fn is_token_program(program: &Pubkey) -> bool {
    *program == TOKEN_PROGRAM_ID || *program == TOKEN_2022_PROGRAM_ID
}

pub fn cached_token_program(mint: &Pubkey) -> Option<Pubkey> {
    TOKEN_PROGRAM_CACHE.get(mint).map(|entry| *entry)
}

pub fn remember_token_program(mint: Pubkey, token_program: Pubkey) {
    TOKEN_PROGRAM_CACHE.insert(mint, token_program);
}

/// 返回缓存的 ATA 地址，未命中时计算并写入缓存。
pub fn associated_token_address(owner: &Pubkey, mint: &Pubkey, token_program: &Pubkey) -> Pubkey {
    let key = AtaKey {
        owner: *owner,
        mint: *mint,
        token_program: *token_program,
    };
    if let Some(entry) = ATA_CACHE.get(&key) {
        return *entry;
    }
    let address = Pubkey::find_program_address(
        &[owner.as_ref(), token_program.as_ref(), mint.as_ref()],
        &ASSOCIATED_TOKEN_PROGRAM_ID,
    )
    .0;
    ATA_CACHE.insert(key, address);
    address
}

/// `CreateIdempotent`：账户已存在时不会失败。
pub fn create_associated_token_account_idempotent(
    payer: &Pubkey,
    owner: &Pubkey,
    mint: &Pubkey,
    token_program: &Pubkey,
) -> Instruction {
    let associated = associated_token_address(owner, mint, token_program);
    Instruction {
        program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
        accounts: vec![
            AccountMeta::new(*payer, true),
            AccountMeta::new(associated, false),
            AccountMeta::new_readonly(*owner, false),
            AccountMeta::new_readonly(*mint, false),
            AccountMeta::new_readonly(SYSTEM_PROGRAM_ID, false),
            AccountMeta::new_readonly(*token_program, false),
        ],
        data: vec![1u8],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_depends_on_token_program() {
        let owner = Pubkey::new_unique();
        let mint = solana_sdk::pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
        let classic = associated_token_address(&owner, &mint, &TOKEN_PROGRAM_ID);
        assert_eq!(associated_token_address(&owner, &mint, &TOKEN_PROGRAM_ID), classic);
        assert_ne!(
            associated_token_address(&owner, &mint, &TOKEN_2022_PROGRAM_ID),
            classic
        );
    }

    #[test]
    fn idempotent_instruction_layout() {
        let payer = Pubkey::new_unique();
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();
        let ix = create_associated_token_account_idempotent(&payer, &owner, &mint, &TOKEN_PROGRAM_ID);
        assert_eq!(ix.program_id, ASSOCIATED_TOKEN_PROGRAM_ID);
        assert_eq!(ix.data, vec![1]);
        assert_eq!(ix.accounts.len(), 6);
        assert!(ix.accounts[0].is_signer);
        assert_eq!(
            ix.accounts[1].pubkey,
            associated_token_address(&owner, &mint, &TOKEN_PROGRAM_ID)
        );
    }
}
