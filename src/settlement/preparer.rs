use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use time::OffsetDateTime;
use tracing::{info, warn};

use super::breakdown::FeeBreakdownCalculator;
use super::error::{SettlementError, SettlementResult};
use super::fee_mint::FeeMintSelector;
use super::ports::{FeeEstimator, QuoteAggregator, TradeStore};
use super::quote::{QuoteAssembler, QuoteIntent, QuoteParams};
use super::types::{
    BuildTransactionRequest, CoinInfo, FeeMintSelection, Quote, SolFeeBreakdown, SwapMode, Trade,
    TradeStatus,
};
use super::validation;

#[derive(Debug, Clone)]
pub struct PrepareRequest {
    pub user_address: String,
    pub from_mint: String,
    pub to_mint: String,
    pub amount: String,
    pub slippage_bps: u32,
    pub swap_mode: SwapMode,
}

impl PrepareRequest {
    fn quote_params(&self) -> QuoteParams {
        QuoteParams {
            from_mint: self.from_mint.clone(),
            to_mint: self.to_mint.clone(),
            amount: self.amount.clone(),
            slippage_bps: self.slippage_bps,
            swap_mode: self.swap_mode,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedSwap {
    pub trade: Trade,
    pub unsigned_transaction: String,
    pub breakdown: SolFeeBreakdown,
    pub fee_mint: String,
}

/// 报价未携带平台费信息时使用的静态配置。
#[derive(Debug, Clone, Default)]
pub struct PlatformFeeDefaults {
    pub fee_bps: u16,
    pub destination: Option<Pubkey>,
}

pub struct SwapPreparer {
    quotes: QuoteAssembler,
    aggregator: Arc<dyn QuoteAggregator>,
    fee_mints: FeeMintSelector,
    calculator: FeeBreakdownCalculator,
    fee_estimator: Option<Arc<dyn FeeEstimator>>,
    store: Arc<dyn TradeStore>,
    defaults: PlatformFeeDefaults,
}

impl SwapPreparer {
    pub fn new(
        quotes: QuoteAssembler,
        aggregator: Arc<dyn QuoteAggregator>,
        fee_mints: FeeMintSelector,
        calculator: FeeBreakdownCalculator,
        fee_estimator: Option<Arc<dyn FeeEstimator>>,
        store: Arc<dyn TradeStore>,
        defaults: PlatformFeeDefaults,
    ) -> Self {
        Self {
            quotes,
            aggregator,
            fee_mints,
            calculator,
            fee_estimator,
            store,
            defaults,
        }
    }

    pub async fn prepare(&self, request: &PrepareRequest) -> SettlementResult<PreparedSwap> {
        let user = validation::parse_address("userAddress", &request.user_address)?;
        let intent = QuoteIntent::validate(&request.quote_params())?;

        let (from_coin, to_coin) = self.quotes.resolve_pair(&intent).await?;
        let quote = self.quotes.assemble(&intent, &to_coin).await?;

        let selection = self
            .fee_mints
            .select(
                &intent.from_mint,
                &intent.to_mint,
                intent.swap_mode,
                quote.fee_mint_hint.as_deref(),
            )
            .await?;

        let built = self
            .aggregator
            .build_transaction(&BuildTransactionRequest {
                raw_payload: quote.raw_payload.clone(),
                user_public_key: user,
                fee_account: Some(selection.fee_account),
            })
            .await
            .map_err(|err| SettlementError::upstream("构建 swap 交易", &err))?;

        let priority_hint = if built.prioritization_fee_lamports.is_some() {
            None
        } else {
            self.estimate_priority_fee().await
        };
        let breakdown = self.calculator.compute(&quote, &built, priority_hint);

        let draft = self.draft_trade(
            &request.user_address,
            intent.amount,
            &quote,
            &from_coin,
            &to_coin,
            &selection,
            &built.unsigned_transaction,
        );
        let trade = self.store.create(draft).await.map_err(|err| {
            warn!(
                target: "settlement::preparer",
                user = %user,
                error = %err,
                "prepared 交易记录写入失败，不返回未签名交易"
            );
            SettlementError::Persistence(err)
        })?;

        info!(
            target: "settlement::preparer",
            trade_id = %trade.id,
            user = %trade.user_address,
            symbol = %trade.symbol,
            amount = %trade.amount,
            fee_mint = %selection.selected_mint,
            fee_account = %selection.fee_account,
            total_fee_sol = %breakdown.total,
            "swap 已准备"
        );

        Ok(PreparedSwap {
            unsigned_transaction: trade.unsigned_transaction.clone(),
            fee_mint: selection.selected_mint.to_string(),
            trade,
            breakdown,
        })
    }

    async fn estimate_priority_fee(&self) -> Option<u64> {
        let estimator = self.fee_estimator.as_ref()?;
        match estimator.estimate_priority_fee_lamports().await {
            Ok(lamports) => Some(lamports),
            Err(err) => {
                warn!(
                    target: "settlement::preparer",
                    error = %format!("{err:#}"),
                    "优先费估算失败，使用默认值"
                );
                None
            }
        }
    }

    fn draft_trade(
        &self,
        user_address: &str,
        amount: u64,
        quote: &Quote,
        from_coin: &CoinInfo,
        to_coin: &CoinInfo,
        selection: &FeeMintSelection,
        unsigned_transaction: &str,
    ) -> Trade {
        let (fee_bps, platform_fee_amount) = match quote.platform_fee.as_ref() {
            Some(fee) => (
                fee.fee_bps,
                fee.amount.trim().parse::<u64>().unwrap_or_else(|err| {
                    warn!(
                        target: "settlement::preparer",
                        amount = %fee.amount,
                        error = %err,
                        "平台费金额无法解析，按 0 记录"
                    );
                    0
                }),
            ),
            None => (self.defaults.fee_bps, 0),
        };
        let destination = if quote.platform_fee.is_some() {
            selection.fee_account
        } else {
            self.defaults.destination.unwrap_or(selection.fee_account)
        };

        Trade {
            id: String::new(),
            user_address: user_address.trim().to_string(),
            from_mint: quote.input_mint.clone(),
            to_mint: quote.output_mint.clone(),
            from_coin_id: from_coin.internal_id.clone(),
            to_coin_id: to_coin.internal_id.clone(),
            symbol: from_coin.symbol.clone(),
            amount: amount.to_string(),
            price: quote.exchange_rate,
            fee: quote.aggregate_fee,
            platform_fee_amount,
            // bps -> 百分比
            platform_fee_percent: Decimal::new(i64::from(fee_bps), 2),
            platform_fee_destination: destination.to_string(),
            platform_fee_mint: selection.selected_mint.to_string(),
            status: TradeStatus::Prepared,
            unsigned_transaction: unsigned_transaction.to_string(),
            transaction_hash: None,
            confirmations: 0,
            finalized: false,
            error: None,
            created_at: OffsetDateTime::now_utc(),
            completed_at: None,
        }
    }
}
