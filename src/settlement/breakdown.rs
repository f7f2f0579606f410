use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use rust_decimal::Decimal;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, warn};

use super::fee_mint::is_sol_like;
use super::types::{BuiltTransaction, Quote, SolFeeBreakdown};

pub const BASE_FEE_LAMPORTS: u64 = 5_000;
pub const DEFAULT_PRIORITY_FEE_LAMPORTS: u64 = 10_000;
/// 预估需要新建的账户数，并非从构建出的交易中解析得到。
pub const ESTIMATED_ACCOUNTS_TO_CREATE: u32 = 2;
pub const TOKEN_ACCOUNT_RENT_EXEMPT_LAMPORTS: u64 = 2_039_280;
pub const SOL_DECIMALS: u32 = 9;

/// 以 lamports 表示的费用拆分。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeeLamports {
    pub trading: u64,
    pub transaction: u64,
    pub account_creation: u64,
    pub priority: u64,
    pub accounts_to_create: u32,
}

impl FeeLamports {
    pub fn total(&self) -> Option<u64> {
        self.trading
            .checked_add(self.transaction)?
            .checked_add(self.account_creation)?
            .checked_add(self.priority)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FeeBreakdownCalculator {
    rent_exempt_lamports: u64,
    default_priority_fee: u64,
}

impl Default for FeeBreakdownCalculator {
    fn default() -> Self {
        Self {
            rent_exempt_lamports: TOKEN_ACCOUNT_RENT_EXEMPT_LAMPORTS,
            default_priority_fee: DEFAULT_PRIORITY_FEE_LAMPORTS,
        }
    }
}

impl FeeBreakdownCalculator {
    pub fn new(rent_exempt_lamports: u64, default_priority_fee: u64) -> Self {
        Self {
            rent_exempt_lamports,
            default_priority_fee,
        }
    }

    /// 计算失败时返回全零拆分并记录告警，不会阻断 prepare 流程。
    ///
    /// `priority_hint` 仅在构建结果没有给出优先费时使用。
    pub fn compute(
        &self,
        quote: &Quote,
        built: &BuiltTransaction,
        priority_hint: Option<u64>,
    ) -> SolFeeBreakdown {
        match self.compute_lamports(quote, built, priority_hint) {
            Ok(lamports) => match format_breakdown(&lamports) {
                Some(breakdown) => breakdown,
                None => {
                    warn!(
                        target: "settlement::breakdown",
                        ?lamports,
                        "费用合计溢出，返回零值拆分"
                    );
                    zeroed()
                }
            },
            Err(err) => {
                warn!(
                    target: "settlement::breakdown",
                    error = %format!("{err:#}"),
                    "费用拆分计算失败，返回零值拆分"
                );
                zeroed()
            }
        }
    }

    pub fn compute_lamports(
        &self,
        quote: &Quote,
        built: &BuiltTransaction,
        priority_hint: Option<u64>,
    ) -> Result<FeeLamports> {
        let trading = native_trading_fee(quote)?;
        let accounts_to_create = ESTIMATED_ACCOUNTS_TO_CREATE;
        let account_creation = self
            .rent_exempt_lamports
            .checked_mul(u64::from(accounts_to_create))
            .ok_or_else(|| anyhow!("账户租金计算溢出"))?;

        let sub_transactions = built.sub_transaction_count();
        let transaction = sub_transactions
            .checked_mul(BASE_FEE_LAMPORTS)
            .ok_or_else(|| anyhow!("基础手续费计算溢出"))?;

        let per_transaction_priority = built
            .prioritization_fee_lamports
            .or(priority_hint)
            .unwrap_or(self.default_priority_fee);
        let priority = sub_transactions
            .checked_mul(per_transaction_priority)
            .ok_or_else(|| anyhow!("优先费计算溢出"))?;

        let lamports = FeeLamports {
            trading,
            transaction,
            account_creation,
            priority,
            accounts_to_create,
        };
        debug!(
            target: "settlement::breakdown",
            trading,
            transaction,
            account_creation,
            priority,
            sub_transactions,
            "费用拆分（lamports）"
        );
        Ok(lamports)
    }
}

/// 从原始报价中累加以 SOL 计价的路由费与平台费。
fn native_trading_fee(quote: &Quote) -> Result<u64> {
    if quote.raw_payload.is_empty() {
        return Err(anyhow!("报价缺少原始载荷"));
    }
    let payload: Value =
        serde_json::from_slice(&quote.raw_payload).context("解析原始报价载荷失败")?;

    let mut total: u64 = 0;
    if let Some(legs) = payload.get("routePlan").and_then(Value::as_array) {
        for (index, leg) in legs.iter().enumerate() {
            let Some(info) = leg.get("swapInfo") else {
                continue;
            };
            let mint = info.get("feeMint").and_then(Value::as_str);
            if !mint.is_some_and(is_native_mint) {
                continue;
            }
            let amount = parse_lamports(info.get("feeAmount"))
                .with_context(|| format!("routePlan[{index}] feeAmount 非法"))?;
            total = total
                .checked_add(amount)
                .ok_or_else(|| anyhow!("路由费累加溢出"))?;
        }
    }

    if let Some(platform_fee) = payload.get("platformFee").filter(|fee| !fee.is_null()) {
        let mint = platform_fee
            .get("feeMint")
            .or_else(|| platform_fee.get("mint"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| {
                quote
                    .platform_fee
                    .as_ref()
                    .and_then(|fee| fee.mint.clone())
            });
        if mint.as_deref().is_some_and(is_native_mint) {
            let amount =
                parse_lamports(platform_fee.get("amount")).context("platformFee amount 非法")?;
            total = total
                .checked_add(amount)
                .ok_or_else(|| anyhow!("平台费累加溢出"))?;
        }
    }

    Ok(total)
}

fn is_native_mint(mint: &str) -> bool {
    Pubkey::from_str(mint.trim()).is_ok_and(|mint| is_sol_like(&mint))
}

/// 金额可能是字符串或数字。
fn parse_lamports(value: Option<&Value>) -> Result<u64> {
    match value {
        Some(Value::String(text)) => text
            .trim()
            .parse::<u64>()
            .with_context(|| format!("无法解析金额 `{text}`")),
        Some(Value::Number(number)) => number
            .as_u64()
            .ok_or_else(|| anyhow!("金额不是非负整数: {number}")),
        Some(other) => Err(anyhow!("金额类型非法: {other}")),
        None => Err(anyhow!("缺少金额字段")),
    }
}

fn format_breakdown(lamports: &FeeLamports) -> Option<SolFeeBreakdown> {
    let total = lamports.total()?;
    Some(SolFeeBreakdown {
        trading_fee: format_lamports(lamports.trading),
        transaction_fee: format_lamports(lamports.transaction),
        account_creation_fee: format_lamports(lamports.account_creation),
        priority_fee: format_lamports(lamports.priority),
        total: format_lamports(total),
        accounts_to_create: lamports.accounts_to_create,
    })
}

fn zeroed() -> SolFeeBreakdown {
    let zero = format_lamports(0);
    SolFeeBreakdown {
        trading_fee: zero.clone(),
        transaction_fee: zero.clone(),
        account_creation_fee: zero.clone(),
        priority_fee: zero.clone(),
        total: zero,
        accounts_to_create: 0,
    }
}

/// lamports 转为固定 9 位小数的 SOL 字符串。
pub fn format_lamports(lamports: u64) -> String {
    Decimal::from_i128_with_scale(i128::from(lamports), SOL_DECIMALS).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::types::SwapMode;
    use bytes::Bytes;
    use serde_json::json;

    const WSOL: &str = "So11111111111111111111111111111111111111112";
    const USDC: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn quote_with_payload(payload: Value) -> Quote {
        Quote {
            input_mint: WSOL.to_string(),
            output_mint: USDC.to_string(),
            swap_mode: SwapMode::ExactIn,
            in_amount: 1_000_000,
            out_amount: 150_000,
            estimated_amount: Decimal::ZERO,
            exchange_rate: Decimal::ZERO,
            aggregate_fee: Decimal::ZERO,
            fee_usd: Decimal::ZERO,
            price_impact: "0.000000".to_string(),
            route_summary: Vec::new(),
            platform_fee: None,
            fee_mint_hint: None,
            raw_payload: Bytes::from(serde_json::to_vec(&payload).expect("payload")),
        }
    }

    fn built(setup: bool, cleanup: bool, priority: Option<u64>) -> BuiltTransaction {
        BuiltTransaction {
            unsigned_transaction: "AQ==".to_string(),
            setup_transaction: setup.then(|| "AQ==".to_string()),
            cleanup_transaction: cleanup.then(|| "AQ==".to_string()),
            prioritization_fee_lamports: priority,
        }
    }

    #[test]
    fn only_native_denominated_fees_count_as_trading_fee() {
        let quote = quote_with_payload(json!({
            "routePlan": [
                { "swapInfo": { "label": "Whirlpool", "feeAmount": "2500", "feeMint": WSOL } },
                { "swapInfo": { "label": "Phoenix", "feeAmount": "40", "feeMint": USDC } },
                { "swapInfo": { "label": "Raydium", "feeAmount": 1500, "feeMint": WSOL } }
            ],
            "platformFee": { "amount": "300", "feeBps": 20, "feeMint": WSOL }
        }));
        let lamports = FeeBreakdownCalculator::default()
            .compute_lamports(&quote, &built(false, false, None), None)
            .expect("lamports");
        assert_eq!(lamports.trading, 4_300);
        assert_eq!(lamports.transaction, BASE_FEE_LAMPORTS);
        assert_eq!(lamports.priority, DEFAULT_PRIORITY_FEE_LAMPORTS);
        assert_eq!(
            lamports.account_creation,
            TOKEN_ACCOUNT_RENT_EXEMPT_LAMPORTS * u64::from(ESTIMATED_ACCOUNTS_TO_CREATE)
        );
    }

    #[test]
    fn sub_transactions_scale_base_and_priority_fees() {
        let quote = quote_with_payload(json!({ "routePlan": [] }));
        let calculator = FeeBreakdownCalculator::default();

        let lamports = calculator
            .compute_lamports(&quote, &built(true, true, Some(7_000)), Some(99))
            .expect("lamports");
        assert_eq!(lamports.transaction, 3 * BASE_FEE_LAMPORTS);
        assert_eq!(lamports.priority, 3 * 7_000);

        let hinted = calculator
            .compute_lamports(&quote, &built(true, false, None), Some(1_234))
            .expect("lamports");
        assert_eq!(hinted.priority, 2 * 1_234);
    }

    #[test]
    fn total_matches_component_sum_exactly() {
        let quote = quote_with_payload(json!({
            "routePlan": [
                { "swapInfo": { "label": "A", "feeAmount": "123456789", "feeMint": WSOL } }
            ]
        }));
        let breakdown = FeeBreakdownCalculator::default().compute(
            &quote,
            &built(true, false, Some(3_333)),
            None,
        );

        let sum: Decimal = [
            &breakdown.trading_fee,
            &breakdown.transaction_fee,
            &breakdown.account_creation_fee,
            &breakdown.priority_fee,
        ]
        .iter()
        .map(|value| value.parse::<Decimal>().expect("decimal"))
        .sum();
        assert_eq!(sum, breakdown.total.parse::<Decimal>().expect("decimal"));
        assert_eq!(breakdown.trading_fee, "0.123456789");
        assert_eq!(breakdown.account_creation_fee, "0.004078560");
    }

    #[test]
    fn malformed_payload_falls_back_to_zero() {
        let mut quote = quote_with_payload(json!({}));
        quote.raw_payload = Bytes::from_static(b"not json");
        let breakdown = FeeBreakdownCalculator::default().compute(&quote, &built(false, false, None), None);
        assert_eq!(breakdown.total, "0.000000000");
        assert_eq!(breakdown.accounts_to_create, 0);
    }

    #[test]
    fn formats_with_nine_fraction_digits() {
        assert_eq!(format_lamports(0), "0.000000000");
        assert_eq!(format_lamports(1), "0.000000001");
        assert_eq!(format_lamports(1_500_000_000), "1.500000000");
    }
}
