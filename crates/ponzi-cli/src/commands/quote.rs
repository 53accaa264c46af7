use ponzi_core::{Lookup, QuoteRequest};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::cli::{Cli, QuoteArgs};
use crate::error::CliError;

use super::{parse_symbols, stock_client};

pub async fn run(
    cli: &Cli,
    args: &QuoteArgs,
    cancel: &CancellationToken,
) -> Result<Value, CliError> {
    let symbols = parse_symbols(&args.symbols)?;
    let client = stock_client(cli)?;

    let batch = client
        .get_quotes(cancel, QuoteRequest::new(symbols))
        .await?;
    for entry in &batch.quotes {
        if let Lookup::NotFound { symbol } = entry {
            warn!(%symbol, "no quote returned");
        }
    }
    Ok(serde_json::to_value(batch)?)
}
