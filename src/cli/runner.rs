use anyhow::Result;
use serde::Serialize;
use tracing::info;

use swap_settler::config::SettlerConfig;
use swap_settler::settlement::{ListOptions, PrepareRequest, QuoteParams};

use crate::cli::args::{Cli, Command, PairArgs, TradesCmd};
use crate::cli::context::{build_service, init_configs};

pub async fn run(cli: Cli, config: SettlerConfig) -> Result<()> {
    let command = match cli.command {
        Command::Init(args) => return init_configs(args),
        command => command,
    };

    let service = build_service(&config).await?;
    match command {
        Command::Quote(cmd) => {
            let quote = service.get_quote(&quote_params(cmd.pair)).await?;
            print_json(&quote)?;
        }
        Command::Prepare(cmd) => {
            let request = PrepareRequest {
                user_address: cmd.user,
                from_mint: cmd.pair.from,
                to_mint: cmd.pair.to,
                amount: cmd.pair.amount,
                slippage_bps: cmd.pair.slippage_bps,
                swap_mode: cmd.pair.swap_mode,
            };
            let prepared = service.prepare_swap(&request).await?;
            info!(
                target: "cli",
                trade_id = %prepared.trade.id,
                fee_mint = %prepared.fee_mint,
                "交易已准备，待用户签名"
            );
            print_json(&prepared)?;
        }
        Command::Execute(cmd) => {
            let trade = service.execute_trade(&cmd.unsigned, &cmd.signed).await?;
            print_json(&trade)?;
        }
        Command::Reconcile(cmd) => {
            let trade = service.reconcile(&cmd.hash).await?;
            print_json(&trade)?;
        }
        Command::Trades(TradesCmd::List {
            user,
            status,
            offset,
            limit,
        }) => {
            let options = ListOptions {
                user_address: user,
                status,
                offset,
                limit,
            };
            let page = service.list_trades(&options).await?;
            print_json(&page)?;
        }
        Command::Trades(TradesCmd::Get { id }) => {
            let trade = service.get_trade(&id).await?;
            print_json(&trade)?;
        }
        Command::Init(_) => {}
    }

    Ok(())
}

fn quote_params(pair: PairArgs) -> QuoteParams {
    QuoteParams {
        from_mint: pair.from,
        to_mint: pair.to,
        amount: pair.amount,
        slippage_bps: pair.slippage_bps,
        swap_mode: pair.swap_mode,
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
