use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use solana_sdk::pubkey::Pubkey;

use crate::api::serde_helpers::{field_as_string, option_field_as_string};
use crate::settlement::types::BuiltTransaction;

/// `/swap/v1/swap` 请求体；`quoteResponse` 原样嵌入报价响应。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapRequest<'a> {
    pub quote_response: &'a RawValue,
    #[serde(with = "field_as_string")]
    pub user_public_key: Pubkey,
    #[serde(
        with = "option_field_as_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub fee_account: Option<Pubkey>,
    pub wrap_and_unwrap_sol: bool,
    pub dynamic_compute_unit_limit: bool,
}

impl<'a> SwapRequest<'a> {
    pub fn new(
        quote_response: &'a RawValue,
        user_public_key: Pubkey,
        fee_account: Option<Pubkey>,
    ) -> Self {
        Self {
            quote_response,
            user_public_key,
            fee_account,
            wrap_and_unwrap_sol: true,
            dynamic_compute_unit_limit: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapResponse {
    pub swap_transaction: String,
    #[serde(default)]
    pub setup_transaction: Option<String>,
    #[serde(default)]
    pub cleanup_transaction: Option<String>,
    #[serde(default)]
    pub prioritization_fee_lamports: Option<u64>,
    #[serde(default)]
    pub last_valid_block_height: Option<u64>,
}

impl SwapResponse {
    pub fn into_built_transaction(self) -> BuiltTransaction {
        let non_empty = |value: Option<String>| value.filter(|tx| !tx.trim().is_empty());
        BuiltTransaction {
            unsigned_transaction: self.swap_transaction,
            setup_transaction: non_empty(self.setup_transaction),
            cleanup_transaction: non_empty(self.cleanup_transaction),
            prioritization_fee_lamports: self.prioritization_fee_lamports,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    #[test]
    fn request_embeds_quote_verbatim() {
        let quote = r#"{"inAmount":"1000000","outAmount":"148213","routePlan":[]}"#;
        let raw: &RawValue = serde_json::from_str(quote).expect("raw");
        let user = Pubkey::new_unique();
        let fee_account = Pubkey::new_unique();

        let encoded = serde_json::to_string(&SwapRequest::new(raw, user, Some(fee_account)))
            .expect("encode");
        assert!(encoded.contains(quote));

        let value: Value = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(value["userPublicKey"], json!(user.to_string()));
        assert_eq!(value["feeAccount"], json!(fee_account.to_string()));
        assert_eq!(value["wrapAndUnwrapSol"], json!(true));

        let without_fee =
            serde_json::to_value(SwapRequest::new(raw, user, None)).expect("encode");
        assert!(without_fee.get("feeAccount").is_none());
    }

    #[test]
    fn empty_auxiliary_transactions_are_dropped() {
        let response: SwapResponse = serde_json::from_value(json!({
            "swapTransaction": "AQAB",
            "setupTransaction": "",
            "cleanupTransaction": "AgAC",
            "lastValidBlockHeight": 279_632_475u64,
            "prioritizationFeeLamports": 9_999
        }))
        .expect("decode");
        let built = response.into_built_transaction();
        assert_eq!(built.unsigned_transaction, "AQAB");
        assert!(built.setup_transaction.is_none());
        assert_eq!(built.cleanup_transaction.as_deref(), Some("AgAC"));
        assert_eq!(built.prioritization_fee_lamports, Some(9_999));
        assert_eq!(built.sub_transaction_count(), 2);
    }
}
