use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use swap_settler::settlement::{SwapMode, TradeStatus};

#[derive(Parser, Debug)]
#[command(name = "swap-settler", version, about = "Solana swap 结算服务")]
pub struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 swap-settler.toml 或 config/swap-settler.toml）"
    )]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// 查询报价（不落库）
    Quote(QuoteCmd),
    /// 准备待签名交易并记录 prepared 交易
    Prepare(PrepareCmd),
    /// 提交用户签名后的交易
    Execute(ExecuteCmd),
    /// 根据链上状态同步交易记录
    Reconcile(ReconcileCmd),
    /// 查询交易记录
    #[command(subcommand)]
    Trades(TradesCmd),
    /// 初始化配置模版文件
    Init(InitCmd),
}

#[derive(Args, Debug)]
pub struct PairArgs {
    #[arg(long, help = "输入代币的 Mint 地址（原生 SOL 可用 1111...1111）")]
    pub from: String,
    #[arg(long, help = "输出代币的 Mint 地址")]
    pub to: String,
    #[arg(long, help = "最小单位数量")]
    pub amount: String,
    #[arg(long, default_value_t = 50u32, help = "滑点（bps）")]
    pub slippage_bps: u32,
    #[arg(long, default_value_t = SwapMode::ExactIn, help = "ExactIn 或 ExactOut")]
    pub swap_mode: SwapMode,
}

#[derive(Args, Debug)]
pub struct QuoteCmd {
    #[command(flatten)]
    pub pair: PairArgs,
}

#[derive(Args, Debug)]
pub struct PrepareCmd {
    #[arg(long, help = "发起 swap 的用户钱包地址")]
    pub user: String,
    #[command(flatten)]
    pub pair: PairArgs,
}

#[derive(Args, Debug)]
pub struct ExecuteCmd {
    #[arg(long, help = "prepare 返回的待签名交易（base64）")]
    pub unsigned: String,
    #[arg(long, help = "用户签名后的交易（base64）")]
    pub signed: String,
}

#[derive(Args, Debug)]
pub struct ReconcileCmd {
    #[arg(long, help = "交易签名")]
    pub hash: String,
}

#[derive(Subcommand, Debug)]
pub enum TradesCmd {
    /// 按创建时间倒序列出交易
    List {
        #[arg(long, help = "按用户地址过滤")]
        user: Option<String>,
        #[arg(long, help = "按状态过滤")]
        status: Option<TradeStatus>,
        #[arg(long, default_value_t = 0usize)]
        offset: usize,
        #[arg(long, default_value_t = 20usize, help = "每页条数（1-100）")]
        limit: usize,
    },
    /// 按 id 查询单笔交易
    Get {
        #[arg(long)]
        id: String,
    },
}

#[derive(Args, Debug)]
pub struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    pub output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    pub force: bool,
}
