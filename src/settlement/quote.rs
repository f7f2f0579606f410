use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use rust_decimal::Decimal;
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, warn};

use super::error::{SettlementError, SettlementResult};
use super::ports::{CoinResolver, PriceOracle, QuoteAggregator};
use super::types::{AggregatorQuote, AggregatorQuoteRequest, CoinInfo, Quote, SwapMode};
use super::validation;

/// USD 手续费总额的定点缩放位数（10^9）。
pub const USD_FEE_SCALE: u32 = 9;
pub const PRICE_IMPACT_DIGITS: usize = 6;

#[derive(Debug, Clone)]
pub struct QuoteParams {
    pub from_mint: String,
    pub to_mint: String,
    pub amount: String,
    pub slippage_bps: u32,
    pub swap_mode: SwapMode,
}

/// 校验通过后的报价意图。
#[derive(Debug, Clone)]
pub(crate) struct QuoteIntent {
    pub from_mint: Pubkey,
    pub to_mint: Pubkey,
    pub from_text: String,
    pub to_text: String,
    pub amount: u64,
    pub slippage_bps: u16,
    pub swap_mode: SwapMode,
}

impl QuoteIntent {
    pub(crate) fn validate(params: &QuoteParams) -> SettlementResult<Self> {
        let from_mint = validation::parse_address("fromMint", &params.from_mint)?;
        let to_mint = validation::parse_address("toMint", &params.to_mint)?;
        let amount = validation::parse_amount(&params.amount)?;
        let slippage_bps = validation::check_slippage(params.slippage_bps)?;
        Ok(Self {
            from_mint,
            to_mint,
            from_text: params.from_mint.trim().to_string(),
            to_text: params.to_mint.trim().to_string(),
            amount,
            slippage_bps,
            swap_mode: params.swap_mode,
        })
    }
}

#[derive(Clone)]
pub struct QuoteAssembler {
    aggregator: Arc<dyn QuoteAggregator>,
    coins: Arc<dyn CoinResolver>,
    prices: Arc<dyn PriceOracle>,
    platform_fee_bps: u16,
}

impl QuoteAssembler {
    pub fn new(
        aggregator: Arc<dyn QuoteAggregator>,
        coins: Arc<dyn CoinResolver>,
        prices: Arc<dyn PriceOracle>,
        platform_fee_bps: u16,
    ) -> Self {
        Self {
            aggregator,
            coins,
            prices,
            platform_fee_bps,
        }
    }

    pub async fn get_quote(&self, params: &QuoteParams) -> SettlementResult<Quote> {
        let intent = QuoteIntent::validate(params)?;
        let (_, to_coin) = self.resolve_pair(&intent).await?;
        self.assemble(&intent, &to_coin).await
    }

    pub(crate) async fn resolve_pair(
        &self,
        intent: &QuoteIntent,
    ) -> SettlementResult<(CoinInfo, CoinInfo)> {
        let from = self.resolve_coin(&intent.from_text).await?;
        let to = self.resolve_coin(&intent.to_text).await?;
        Ok((from, to))
    }

    async fn resolve_coin(&self, mint: &str) -> SettlementResult<CoinInfo> {
        self.coins
            .resolve(mint)
            .await
            .map_err(|err| SettlementError::upstream("查询币种信息", &err))?
            .ok_or_else(|| SettlementError::not_found(format!("未知币种 {mint}")))
    }

    pub(crate) async fn assemble(
        &self,
        intent: &QuoteIntent,
        destination: &CoinInfo,
    ) -> SettlementResult<Quote> {
        let request = AggregatorQuoteRequest {
            input_mint: intent.from_mint,
            output_mint: intent.to_mint,
            amount: intent.amount,
            slippage_bps: intent.slippage_bps,
            platform_fee_bps: self.platform_fee_bps,
            swap_mode: intent.swap_mode,
        };
        let upstream = self
            .aggregator
            .quote(&request)
            .await
            .map_err(|err| SettlementError::upstream("聚合器报价", &err))?;

        let fee_mints = collect_fee_mints(&upstream);
        let prices = if fee_mints.is_empty() {
            HashMap::new()
        } else {
            self.prices
                .batch_price(&fee_mints)
                .await
                .map_err(|err| SettlementError::upstream("批量查询价格", &err))?
        };

        let fee_usd = aggregate_fee_usd(&upstream, &prices);
        let aggregate_fee = fee_usd / Decimal::from(10u64.pow(USD_FEE_SCALE));

        let estimated_amount = Decimal::try_from_i128_with_scale(
            i128::from(upstream.out_amount),
            u32::from(destination.decimals),
        )
        .map_err(|err| {
            SettlementError::validation(format!(
                "币种 {} 的精度 {} 无法表示: {err}",
                destination.symbol, destination.decimals
            ))
        })?;
        let exchange_rate = Decimal::from(upstream.out_amount)
            .checked_div(Decimal::from(intent.amount))
            .unwrap_or(Decimal::ZERO);

        let quote = Quote {
            input_mint: intent.from_text.clone(),
            output_mint: intent.to_text.clone(),
            swap_mode: intent.swap_mode,
            in_amount: upstream.in_amount,
            out_amount: upstream.out_amount,
            estimated_amount,
            exchange_rate,
            aggregate_fee,
            fee_usd,
            price_impact: truncate_fraction(&upstream.price_impact_pct, PRICE_IMPACT_DIGITS),
            route_summary: upstream
                .route_plan
                .iter()
                .map(|leg| leg.label.clone())
                .collect(),
            platform_fee: upstream.platform_fee.clone(),
            fee_mint_hint: upstream.fee_mint_hint.clone(),
            raw_payload: upstream.raw_payload.clone(),
        };

        info!(
            target: "settlement::quote",
            input_mint = %quote.input_mint,
            output_mint = %quote.output_mint,
            in_amount = quote.in_amount,
            out_amount = quote.out_amount,
            fee_usd = %quote.fee_usd,
            price_impact = %quote.price_impact,
            legs = quote.route_summary.len(),
            "报价组装完成"
        );
        Ok(quote)
    }
}

fn collect_fee_mints(quote: &AggregatorQuote) -> Vec<String> {
    let mut mints: BTreeSet<String> = quote
        .route_plan
        .iter()
        .map(|leg| leg.fee_mint.trim().to_string())
        .filter(|mint| !mint.is_empty())
        .collect();
    if let Some(mint) = quote
        .platform_fee
        .as_ref()
        .and_then(|fee| fee.mint.as_deref())
        .map(str::trim)
        .filter(|mint| !mint.is_empty())
    {
        mints.insert(mint.to_string());
    }
    mints.into_iter().collect()
}

/// 逐 leg 累加 `feeAmount × USD 单价`；无法解析或未定价的 leg 跳过。
fn aggregate_fee_usd(quote: &AggregatorQuote, prices: &HashMap<String, Decimal>) -> Decimal {
    let mut total = Decimal::ZERO;

    for (index, leg) in quote.route_plan.iter().enumerate() {
        let amount = match leg.fee_amount.trim().parse::<Decimal>() {
            Ok(amount) => amount,
            Err(err) => {
                warn!(
                    target: "settlement::quote",
                    leg = index,
                    label = %leg.label,
                    fee_amount = %leg.fee_amount,
                    error = %err,
                    "leg 手续费无法解析，跳过"
                );
                continue;
            }
        };
        let Some(price) = prices.get(leg.fee_mint.trim()) else {
            warn!(
                target: "settlement::quote",
                leg = index,
                label = %leg.label,
                fee_mint = %leg.fee_mint,
                "leg 手续费币种缺少价格，跳过"
            );
            continue;
        };
        total = accumulate(total, amount, *price, index);
    }

    if let Some(fee) = quote.platform_fee.as_ref() {
        let parsed = fee.amount.trim().parse::<Decimal>();
        let price = fee
            .mint
            .as_deref()
            .and_then(|mint| prices.get(mint.trim()));
        match (parsed, price) {
            (Ok(amount), Some(price)) => {
                total = accumulate(total, amount, *price, quote.route_plan.len());
            }
            (Err(err), _) => {
                warn!(
                    target: "settlement::quote",
                    amount = %fee.amount,
                    error = %err,
                    "平台费金额无法解析，跳过"
                );
            }
            (Ok(_), None) => {
                debug!(
                    target: "settlement::quote",
                    mint = ?fee.mint,
                    "平台费币种缺少价格，跳过"
                );
            }
        }
    }

    total
}

fn accumulate(total: Decimal, amount: Decimal, price: Decimal, index: usize) -> Decimal {
    match amount
        .checked_mul(price)
        .and_then(|value| total.checked_add(value))
    {
        Some(next) => next,
        None => {
            warn!(
                target: "settlement::quote",
                leg = index,
                "手续费累加溢出，跳过"
            );
            total
        }
    }
}

/// 按字符串截断小数位（不四舍五入），不足位数补零。
pub fn truncate_fraction(raw: &str, digits: usize) -> String {
    let zero = || format!("0.{}", "0".repeat(digits));
    let trimmed = raw.trim();
    let normalized = if trimmed.contains(['e', 'E']) {
        match Decimal::from_scientific(trimmed) {
            Ok(value) => value.to_string(),
            Err(_) => return zero(),
        }
    } else {
        trimmed.to_string()
    };
    if normalized.is_empty() {
        return zero();
    }

    let (integer, fraction) = match normalized.split_once('.') {
        Some((integer, fraction)) => (integer, fraction),
        None => (normalized.as_str(), ""),
    };
    let unsigned = integer.strip_prefix('-').unwrap_or(integer);
    let all_digits = |part: &str| part.bytes().all(|byte| byte.is_ascii_digit());
    if !all_digits(unsigned)
        || !all_digits(fraction)
        || (unsigned.is_empty() && fraction.is_empty())
    {
        return zero();
    }
    let integer = if integer.is_empty() || integer == "-" {
        format!("{integer}0")
    } else {
        integer.to_string()
    };
    let mut kept: String = fraction.chars().take(digits).collect();
    while kept.len() < digits {
        kept.push('0');
    }
    format!("{integer}.{kept}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::types::{PlatformFeeQuote, RouteLeg};
    use bytes::Bytes;

    fn leg(label: &str, fee_amount: &str, fee_mint: &str) -> RouteLeg {
        RouteLeg {
            label: label.to_string(),
            fee_amount: fee_amount.to_string(),
            fee_mint: fee_mint.to_string(),
        }
    }

    fn sample_quote(route_plan: Vec<RouteLeg>, platform_fee: Option<PlatformFeeQuote>) -> AggregatorQuote {
        AggregatorQuote {
            in_amount: 1_000_000,
            out_amount: 150_000,
            route_plan,
            platform_fee,
            price_impact_pct: "0".to_string(),
            fee_mint_hint: None,
            raw_payload: Bytes::new(),
        }
    }

    #[test]
    fn truncates_without_rounding() {
        assert_eq!(truncate_fraction("0.123456789", 6), "0.123456");
        assert_eq!(truncate_fraction("0.9999999", 6), "0.999999");
        assert_eq!(truncate_fraction("0.1", 6), "0.100000");
        assert_eq!(truncate_fraction("12", 6), "12.000000");
        assert_eq!(truncate_fraction("", 6), "0.000000");
        assert_eq!(truncate_fraction(".5", 6), "0.500000");
        assert_eq!(truncate_fraction("1.23456789e-3", 6), "0.001234");
        assert_eq!(truncate_fraction("-0.25", 6), "-0.250000");
    }

    #[test]
    fn non_numeric_input_truncates_to_zero() {
        assert_eq!(truncate_fraction("abc", 6), "0.000000");
        assert_eq!(truncate_fraction("1.2x", 6), "0.000000");
        assert_eq!(truncate_fraction("NaN", 4), "0.0000");
        assert_eq!(truncate_fraction("-", 6), "0.000000");
        assert_eq!(truncate_fraction("1.2.3", 6), "0.000000");
    }

    #[test]
    fn unparsable_and_unpriced_legs_are_skipped() {
        let quote = sample_quote(
            vec![
                leg("Whirlpool", "5000", "So11111111111111111111111111111111111111112"),
                leg("Raydium", "not-a-number", "So11111111111111111111111111111111111111112"),
                leg("Meteora", "10", "UnpricedMint1111111111111111111111111111111"),
            ],
            Some(PlatformFeeQuote {
                amount: "200".to_string(),
                fee_bps: 20,
                mint: Some("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string()),
            }),
        );
        let mut prices = HashMap::new();
        prices.insert(
            "So11111111111111111111111111111111111111112".to_string(),
            Decimal::new(150, 0),
        );
        prices.insert(
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".to_string(),
            Decimal::ONE,
        );

        let total = aggregate_fee_usd(&quote, &prices);
        assert_eq!(total, Decimal::new(750_200, 0));
    }

    #[test]
    fn fee_mint_set_is_deduplicated() {
        let quote = sample_quote(
            vec![
                leg("A", "1", "MintA"),
                leg("B", "1", "MintA"),
                leg("C", "1", ""),
            ],
            Some(PlatformFeeQuote {
                amount: "1".to_string(),
                fee_bps: 10,
                mint: Some("MintB".to_string()),
            }),
        );
        assert_eq!(collect_fee_mints(&quote), vec!["MintA".to_string(), "MintB".to_string()]);
    }
}
