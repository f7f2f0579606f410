use bytes::Bytes;
use serde::Deserialize;
use solana_sdk::pubkey::Pubkey;

use crate::api::serde_helpers::field_as_string;
use crate::settlement::types::{AggregatorQuote, PlatformFeeQuote, RouteLeg, SwapMode};

/// `/swap/v1/quote` 请求，使用查询字符串传参。
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub input_mint: Pubkey,
    pub output_mint: Pubkey,
    pub amount: u64,
    pub swap_mode: SwapMode,
    pub slippage_bps: u16,
    pub platform_fee_bps: Option<u16>,
}

impl QuoteRequest {
    pub fn to_query_params(&self) -> Vec<(String, String)> {
        let mut params = Vec::with_capacity(6);
        params.push(("inputMint".to_string(), self.input_mint.to_string()));
        params.push(("outputMint".to_string(), self.output_mint.to_string()));
        params.push(("amount".to_string(), self.amount.to_string()));
        params.push(("swapMode".to_string(), self.swap_mode.as_str().to_string()));
        params.push(("slippageBps".to_string(), self.slippage_bps.to_string()));
        if let Some(value) = self.platform_fee_bps {
            params.push(("platformFeeBps".to_string(), value.to_string()));
        }
        params
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwapInfo {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub fee_amount: String,
    #[serde(default)]
    pub fee_mint: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutePlanStep {
    pub swap_info: SwapInfo,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFee {
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub fee_bps: u16,
    #[serde(default)]
    pub fee_mint: Option<String>,
}

/// `/quote` 响应中结算需要的字段，其余字段保留在原始字节里原样回传给 `/swap`。
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponsePayload {
    #[serde(with = "field_as_string")]
    pub in_amount: u64,
    #[serde(with = "field_as_string")]
    pub out_amount: u64,
    #[serde(default)]
    pub price_impact_pct: String,
    #[serde(default)]
    pub route_plan: Vec<RoutePlanStep>,
    #[serde(default)]
    pub platform_fee: Option<PlatformFee>,
    #[serde(default)]
    pub fee_mint: Option<String>,
}

impl QuoteResponsePayload {
    pub fn into_aggregator_quote(self, request: &QuoteRequest, raw: Bytes) -> AggregatorQuote {
        // 未显式给出时，ExactOut 从输入资产扣费，ExactIn 从输出资产扣费
        let implied_fee_mint = match request.swap_mode {
            SwapMode::ExactOut => request.input_mint,
            SwapMode::ExactIn => request.output_mint,
        };
        let platform_fee = self.platform_fee.map(|fee| PlatformFeeQuote {
            amount: fee.amount,
            fee_bps: fee.fee_bps,
            mint: Some(
                fee.fee_mint
                    .filter(|mint| !mint.trim().is_empty())
                    .unwrap_or_else(|| implied_fee_mint.to_string()),
            ),
        });

        AggregatorQuote {
            in_amount: self.in_amount,
            out_amount: self.out_amount,
            route_plan: self
                .route_plan
                .into_iter()
                .map(|step| RouteLeg {
                    label: step.swap_info.label,
                    fee_amount: step.swap_info.fee_amount,
                    fee_mint: step.swap_info.fee_mint,
                })
                .collect(),
            platform_fee,
            price_impact_pct: self.price_impact_pct,
            fee_mint_hint: self.fee_mint.filter(|mint| !mint.trim().is_empty()),
            raw_payload: raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const WSOL: &str = "So11111111111111111111111111111111111111112";
    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn request(swap_mode: SwapMode) -> QuoteRequest {
        QuoteRequest {
            input_mint: WSOL.parse().expect("wsol"),
            output_mint: USDC.parse().expect("usdc"),
            amount: 1_000_000,
            swap_mode,
            slippage_bps: 50,
            platform_fee_bps: Some(20),
        }
    }

    #[test]
    fn query_params_include_platform_fee() {
        let params = request(SwapMode::ExactIn).to_query_params();
        assert!(params.contains(&("platformFeeBps".to_string(), "20".to_string())));
        assert!(params.contains(&("swapMode".to_string(), "ExactIn".to_string())));
        assert!(params.contains(&("slippageBps".to_string(), "50".to_string())));
    }

    #[test]
    fn response_is_flattened_into_aggregator_quote() {
        let body = json!({
            "inputMint": WSOL,
            "outputMint": USDC,
            "inAmount": "1000000",
            "outAmount": "148213",
            "otherAmountThreshold": "147472",
            "swapMode": "ExactIn",
            "slippageBps": 50,
            "priceImpactPct": "0.0001234567",
            "platformFee": { "amount": "296", "feeBps": 20 },
            "routePlan": [
                {
                    "swapInfo": {
                        "ammKey": "HJPjoWUrhoZzkNfRpHuieeFk9WcZWjwy6PBjZ81ngndJ",
                        "label": "Whirlpool",
                        "inputMint": WSOL,
                        "outputMint": USDC,
                        "inAmount": "1000000",
                        "outAmount": "148509",
                        "feeAmount": "400",
                        "feeMint": WSOL
                    },
                    "percent": 100
                }
            ],
            "contextSlot": 299_000_000u64,
            "timeTaken": 0.01
        });
        let raw = Bytes::from(serde_json::to_vec(&body).expect("encode"));
        let payload: QuoteResponsePayload = serde_json::from_slice(&raw).expect("decode");
        let quote = payload.into_aggregator_quote(&request(SwapMode::ExactIn), raw.clone());

        assert_eq!(quote.out_amount, 148_213);
        assert_eq!(quote.route_plan[0].label, "Whirlpool");
        assert_eq!(quote.route_plan[0].fee_mint, WSOL);
        let platform_fee = quote.platform_fee.expect("platform fee");
        assert_eq!(platform_fee.mint.as_deref(), Some(USDC));
        assert_eq!(platform_fee.fee_bps, 20);
        assert_eq!(quote.raw_payload, raw);
        assert!(quote.fee_mint_hint.is_none());
    }
}
