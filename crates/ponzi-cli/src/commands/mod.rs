mod chart;
mod metrics;
mod quote;
mod serve;

use std::sync::Arc;

use ponzi_core::{
    CacheClient, ClientConfig, HttpClient, RemoteClient, ReqwestHttpClient, StockClient, Symbol,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// What a command produced.
pub enum Outcome {
    /// JSON to print on stdout.
    Json(Value),
    /// The command ran to completion without output.
    Done,
}

pub async fn run(cli: &Cli, cancel: &CancellationToken) -> Result<Outcome, CliError> {
    match &cli.command {
        Command::Quote(args) => quote::run(cli, args, cancel).await.map(Outcome::Json),
        Command::Chart(args) => chart::run(cli, args, cancel).await.map(Outcome::Json),
        Command::Serve(args) => serve::run(cli, args, cancel).await.map(|()| Outcome::Done),
        Command::Metrics => metrics::run(cli).await.map(Outcome::Json),
    }
}

/// Resolve configuration from the environment and the global flags.
pub(crate) fn client_config(cli: &Cli) -> Result<ClientConfig, CliError> {
    Ok(apply_flags(ClientConfig::from_env()?, cli))
}

fn apply_flags(config: ClientConfig, cli: &Cli) -> ClientConfig {
    let mut config = config
        .with_quote_cache(cli.quote_cache.into())
        .with_chart_cache(cli.chart_cache.into())
        .with_dump_responses(cli.dump_responses || cli.dump_dir.is_some());
    if let Some(dir) = &cli.dump_dir {
        config = config.with_dump_dir(dir);
    }
    if let Some(timeout_ms) = cli.timeout_ms {
        config = config.with_timeout_ms(timeout_ms);
    }
    config
}

pub(crate) fn local_client(cli: &Cli) -> Result<CacheClient, CliError> {
    let config = client_config(cli)?;
    if config.token.is_empty() {
        warn!("no upstream token configured; set PONZI_IEX_TOKEN");
    }
    let http_client: Arc<dyn HttpClient> = Arc::new(ReqwestHttpClient::new());
    Ok(CacheClient::from_config(&config, http_client, config.clock())?)
}

/// Local planner, or a transport client when `--remote` is set.
pub(crate) fn stock_client(cli: &Cli) -> Result<Arc<dyn StockClient>, CliError> {
    match &cli.remote {
        Some(base_url) => {
            let mut client = RemoteClient::new(Arc::new(ReqwestHttpClient::new()), base_url);
            if let Some(timeout_ms) = cli.timeout_ms {
                client = client.with_timeout_ms(timeout_ms);
            }
            Ok(Arc::new(client))
        }
        None => Ok(Arc::new(local_client(cli)?)),
    }
}

/// Symbols from arguments that may each hold a comma separated list.
pub(crate) fn parse_symbols(raw: &[String]) -> Result<Vec<Symbol>, CliError> {
    let mut symbols = Vec::new();
    for value in raw {
        symbols.extend(Symbol::parse_list(value)?);
    }
    if symbols.is_empty() {
        return Err(CliError::Command(String::from("no symbols given")));
    }
    Ok(symbols)
}
