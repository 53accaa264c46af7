use ponzi_core::{HttpClient, HttpRequest, ReqwestHttpClient, StockError};
use serde_json::{json, Value};

use crate::cli::Cli;
use crate::error::CliError;

use super::local_client;

/// Metrics of the `--remote` server, or of a freshly opened local client.
pub async fn run(cli: &Cli) -> Result<Value, CliError> {
    match &cli.remote {
        Some(base_url) => remote_metrics(base_url).await,
        None => {
            let client = local_client(cli)?;
            Ok(json!({
                "metrics": client.metrics().snapshot(),
                "quote_cache_entries": client.quote_cache().len(),
                "chart_cache_entries": client.chart_cache().len(),
                "chart_snapshot": client.chart_cache().path(),
            }))
        }
    }
}

async fn remote_metrics(base_url: &str) -> Result<Value, CliError> {
    let url = format!("{}/metrics", base_url.trim_end_matches('/'));
    let response = ReqwestHttpClient::new()
        .execute(HttpRequest::get(url))
        .await
        .map_err(|e| StockError::upstream(format!("remote transport error: {}", e.message())))?;
    if !response.is_success() {
        return Err(StockError::upstream(format!(
            "remote server returned status {}: {}",
            response.status,
            response.text().trim()
        ))
        .into());
    }
    Ok(serde_json::from_slice(&response.body)?)
}
