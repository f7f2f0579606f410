use std::sync::Arc;

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use tracing::debug;

use super::breakdown::FeeBreakdownCalculator;
use super::error::{SettlementError, SettlementResult};
use super::executor::TradeExecutor;
use super::fee_mint::FeeMintSelector;
use super::ports::{
    AccountProvisioner, ChainClient, CoinResolver, FeeEstimator, PriceOracle, QuoteAggregator,
    TradeStore,
};
use super::preparer::{PlatformFeeDefaults, PrepareRequest, PreparedSwap, SwapPreparer};
use super::quote::{QuoteAssembler, QuoteParams};
use super::reconciler::{FINALITY_THRESHOLD, StatusReconciler};
use super::types::{ListOptions, Page, Quote, Trade};

/// 组装服务所需的全部外部协作方。
#[derive(Clone)]
pub struct Collaborators {
    pub chain: Arc<dyn ChainClient>,
    pub fee_estimator: Option<Arc<dyn FeeEstimator>>,
    pub aggregator: Arc<dyn QuoteAggregator>,
    pub coins: Arc<dyn CoinResolver>,
    pub prices: Arc<dyn PriceOracle>,
    pub store: Arc<dyn TradeStore>,
    pub provisioner: Arc<dyn AccountProvisioner>,
}

#[derive(Debug, Clone)]
pub struct SettlementSettings {
    pub platform_fee_bps: u16,
    pub fee_owner: Pubkey,
    pub fallback_destination: Option<Pubkey>,
    pub finality_threshold: u64,
    pub calculator: FeeBreakdownCalculator,
}

impl SettlementSettings {
    pub fn new(platform_fee_bps: u16, fee_owner: Pubkey) -> Self {
        Self {
            platform_fee_bps,
            fee_owner,
            fallback_destination: None,
            finality_threshold: FINALITY_THRESHOLD,
            calculator: FeeBreakdownCalculator::default(),
        }
    }
}

pub struct SettlementService {
    quotes: QuoteAssembler,
    preparer: SwapPreparer,
    executor: TradeExecutor,
    reconciler: StatusReconciler,
    store: Arc<dyn TradeStore>,
}

impl SettlementService {
    pub fn new(
        collaborators: Collaborators,
        settings: SettlementSettings,
        signer: Option<Arc<Keypair>>,
    ) -> Self {
        let Collaborators {
            chain,
            fee_estimator,
            aggregator,
            coins,
            prices,
            store,
            provisioner,
        } = collaborators;

        let quotes = QuoteAssembler::new(
            aggregator.clone(),
            coins,
            prices,
            settings.platform_fee_bps,
        );
        let preparer = SwapPreparer::new(
            quotes.clone(),
            aggregator,
            FeeMintSelector::new(provisioner, settings.fee_owner, signer),
            settings.calculator,
            fee_estimator,
            store.clone(),
            PlatformFeeDefaults {
                fee_bps: settings.platform_fee_bps,
                destination: settings.fallback_destination,
            },
        );
        let executor = TradeExecutor::new(chain.clone(), store.clone());
        let reconciler = StatusReconciler::new(chain, store.clone(), settings.finality_threshold);

        Self {
            quotes,
            preparer,
            executor,
            reconciler,
            store,
        }
    }

    pub async fn get_quote(&self, params: &QuoteParams) -> SettlementResult<Quote> {
        self.quotes.get_quote(params).await
    }

    pub async fn prepare_swap(&self, request: &PrepareRequest) -> SettlementResult<PreparedSwap> {
        self.preparer.prepare(request).await
    }

    pub async fn execute_trade(
        &self,
        unsigned_transaction: &str,
        signed_transaction: &str,
    ) -> SettlementResult<Trade> {
        self.executor
            .execute(unsigned_transaction, signed_transaction)
            .await
    }

    pub async fn reconcile(&self, transaction_hash: &str) -> SettlementResult<Trade> {
        self.reconciler.reconcile(transaction_hash).await
    }

    pub async fn get_trade(&self, id: &str) -> SettlementResult<Trade> {
        let id = id.trim();
        if id.is_empty() {
            return Err(SettlementError::validation("trade id 不能为空"));
        }
        self.store
            .get(id)
            .await?
            .ok_or_else(|| SettlementError::not_found(format!("交易记录 {id}")))
    }

    pub async fn list_trades(&self, options: &ListOptions) -> SettlementResult<Page<Trade>> {
        let page = self.store.list(options).await?;
        debug!(
            target: "settlement::service",
            total = page.total,
            returned = page.items.len(),
            offset = options.offset,
            limit = options.effective_limit(),
            "查询交易列表"
        );
        Ok(page)
    }
}
