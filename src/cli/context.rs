use std::env;
use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_commitment_config::CommitmentConfig;
use solana_sdk::signature::{Keypair, Signer};
use time::macros::format_description;
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::{EnvFilter, fmt};

use swap_settler::api::{JupiterApiClient, PriceApiClient, build_http_client};
use swap_settler::chain::{AtaProvisioner, RpcChainClient};
use swap_settler::coins::CoinRegistry;
use swap_settler::config::wallet::load_signer;
use swap_settler::config::{GlobalConfig, LoggingConfig, SettlerConfig};
use swap_settler::settlement::{
    Collaborators, FeeEstimator, SettlementService, SettlementSettings, TradeStore,
};
use swap_settler::store::MemoryTradeStore;

use crate::cli::args::InitCmd;

const CONFIG_TEMPLATE: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/config/swap-settler.example.toml"
));

/// 初始化 tracing，兼顾 JSON 与文本输出模式。
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let mut filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    const QUIET_TARGETS: &[(&str, &str)] = &[
        ("hyper", "warn"),
        ("hyper_util::client::legacy", "warn"),
        ("reqwest", "info"),
    ];
    for (module, level) in QUIET_TARGETS {
        if !config.level.contains(module) {
            if let Ok(directive) = format!("{module}={level}").parse() {
                filter = filter.add_directive(directive);
            }
        }
    }

    let time_format =
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:3]");
    let base = fmt()
        .with_timer(UtcTime::new(time_format))
        .with_writer(std::io::stderr)
        .with_file(false)
        .with_line_number(false)
        .with_target(true)
        .with_level(true);

    if config.json {
        base.json()
            .with_current_span(false)
            .with_span_list(false)
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    } else {
        base.with_env_filter(filter)
            .event_format(fmt::format().compact())
            .try_init()
            .map_err(|err| anyhow!(err.to_string()))?;
    }
    Ok(())
}

pub fn resolve_rpc_client(global: &GlobalConfig) -> Arc<RpcClient> {
    let url = env::var("SWAP_SETTLER_RPC_URL")
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| global.rpc_url.trim().to_string());
    Arc::new(RpcClient::new_with_commitment(
        url,
        CommitmentConfig::confirmed(),
    ))
}

async fn open_store(config: &SettlerConfig) -> Result<Arc<dyn TradeStore>> {
    let path = config
        .store
        .snapshot_path
        .as_deref()
        .map(str::trim)
        .filter(|path| !path.is_empty());
    let store = match path {
        Some(path) => MemoryTradeStore::open(path).await?,
        None => MemoryTradeStore::new(),
    };
    Ok(Arc::new(store))
}

/// 按配置组装全部协作方；平台费 owner 缺省时使用签名钱包地址。
pub async fn build_service(config: &SettlerConfig) -> Result<SettlementService> {
    let signer: Option<Arc<Keypair>> = load_signer(&config.wallet)?.map(Arc::new);
    let fee_owner = match config.platform_fee.fee_owner_pubkey()? {
        Some(owner) => owner,
        None => signer.as_ref().map(|signer| signer.pubkey()).ok_or_else(|| {
            anyhow!("需要配置 platform_fee.fee_owner 或 wallet.private_key 以确定平台费收款 owner")
        })?,
    };

    let rpc = resolve_rpc_client(&config.global);
    let chain = Arc::new(RpcChainClient::new(rpc.clone()));
    let http = build_http_client(Duration::from_millis(config.jupiter.timeout_ms))?;
    let fee_estimator: Arc<dyn FeeEstimator> = chain.clone();

    let collaborators = Collaborators {
        chain,
        fee_estimator: Some(fee_estimator),
        aggregator: Arc::new(JupiterApiClient::new(http.clone(), &config.jupiter)),
        coins: Arc::new(CoinRegistry::from_config(&config.coins)),
        prices: Arc::new(PriceApiClient::new(http, &config.jupiter)),
        store: open_store(config).await?,
        provisioner: Arc::new(AtaProvisioner::new(rpc)),
    };

    let mut settings = SettlementSettings::new(config.platform_fee.fee_bps, fee_owner);
    settings.fallback_destination = config.platform_fee.fallback_destination_pubkey()?;
    settings.finality_threshold = config.reconcile.finality_threshold;

    info!(
        target: "cli",
        rpc = %config.global.rpc_url,
        fee_bps = settings.platform_fee_bps,
        %fee_owner,
        signer = signer.is_some(),
        "结算服务已初始化"
    );
    Ok(SettlementService::new(collaborators, settings, signer))
}

pub fn init_configs(args: InitCmd) -> Result<()> {
    let output_dir = match args.output {
        Some(dir) => dir,
        None => env::current_dir()?,
    };

    fs::create_dir_all(&output_dir)?;

    let target_path = output_dir.join("swap-settler.toml");
    if target_path.exists() && !args.force {
        println!(
            "跳过 {}（文件已存在，如需覆盖请加 --force）",
            target_path.display()
        );
        return Ok(());
    }

    fs::write(&target_path, CONFIG_TEMPLATE)?;
    println!("已写入 {}", target_path.display());
    Ok(())
}
