//! swap 结算核心：报价、准备、提交与链上状态同步。

pub mod breakdown;
pub mod error;
pub mod executor;
pub mod fee_mint;
pub mod ports;
pub mod preparer;
pub mod quote;
pub mod reconciler;
pub mod service;
pub mod types;
pub mod validation;


pub use breakdown::FeeBreakdownCalculator;
pub use error::{SettlementError, SettlementResult, StoreError};
pub use executor::TradeExecutor;
pub use fee_mint::{FeeMintSelector, NATIVE_SOL_SENTINEL, WRAPPED_SOL_MINT};
pub use ports::{
    AccountProvisioner, ChainClient, CoinResolver, FeeEstimator, PriceOracle, QuoteAggregator,
    TradeStore,
};
pub use preparer::{PlatformFeeDefaults, PrepareRequest, PreparedSwap, SwapPreparer};
pub use quote::{QuoteAssembler, QuoteParams};
pub use reconciler::{FINALITY_THRESHOLD, StatusReconciler};
pub use service::{Collaborators, SettlementService, SettlementSettings};
pub use types::*;
