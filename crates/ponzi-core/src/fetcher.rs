//! Stateless client for the IEX batch endpoint.
//!
//! One call issues at most one HTTP GET. Empty symbol lists return without
//! any I/O.

use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::codec::{decode_charts, decode_quotes};
use crate::http_client::{HttpClient, HttpRequest};
use crate::{Chart, Quote, Range, StockError, Symbol};

pub const IEX_BASE_URL: &str = "https://cloud.iexapis.com/stable/stock/market/batch";

const QUOTE_FILTER: &str = "companyName,latestPrice,latestSource,latestTime,latestUpdate,\
latestVolume,open,high,low,close,change,changePercent";
const CHART_FILTER: &str = "date,minute,open,high,low,close,volume,change,changePercent";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchQuotesRequest {
    pub token: String,
    pub symbols: Vec<Symbol>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchChartsRequest {
    pub token: String,
    pub symbols: Vec<Symbol>,
    pub range: Range,
    /// Trailing point count to request. Zero asks for the range default.
    pub chart_last: u32,
}

/// Upstream fetcher over an injectable [`HttpClient`].
#[derive(Clone)]
pub struct IexFetcher {
    http_client: Arc<dyn HttpClient>,
    clock: Clock,
    base_url: String,
    timeout_ms: u64,
    dump_dir: Option<PathBuf>,
}

impl IexFetcher {
    pub fn new(http_client: Arc<dyn HttpClient>, clock: Clock) -> Self {
        Self {
            http_client,
            clock,
            base_url: String::from(IEX_BASE_URL),
            timeout_ms: 10_000,
            dump_dir: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Tee every response body into `dir` before decoding it.
    pub fn with_dump_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.dump_dir = dir;
        self
    }

    pub fn quotes_url(&self, req: &FetchQuotesRequest) -> String {
        format!(
            "{}?token={}&symbols={}&types=quote&filter={QUOTE_FILTER}",
            self.base_url,
            urlencoding::encode(&req.token),
            join_symbols(&req.symbols),
        )
    }

    pub fn charts_url(&self, req: &FetchChartsRequest) -> Result<String, StockError> {
        let range = req.range.query_value().ok_or_else(|| {
            StockError::bad_request(format!("unsupported chart range '{}'", req.range))
        })?;
        let mut url = format!(
            "{}?token={}&symbols={}&types=chart&range={range}&filter={CHART_FILTER}",
            self.base_url,
            urlencoding::encode(&req.token),
            join_symbols(&req.symbols),
        );
        if req.chart_last > 0 {
            url.push_str(&format!("&chartLast={}", req.chart_last));
        }
        Ok(url)
    }

    /// Latest quotes for `req.symbols`, in no particular order.
    pub async fn fetch_quotes(
        &self,
        cancel: &CancellationToken,
        req: FetchQuotesRequest,
    ) -> Result<Vec<Quote>, StockError> {
        if req.symbols.is_empty() {
            return Ok(Vec::new());
        }
        let url = self.quotes_url(&req);
        let body = self
            .fetch(cancel, url, dump_file_name("quote", &req.symbols, None))
            .await?;
        decode_quotes(&body, &self.clock)
    }

    /// Charts for `req.symbols`, each sorted ascending by date.
    pub async fn fetch_charts(
        &self,
        cancel: &CancellationToken,
        req: FetchChartsRequest,
    ) -> Result<Vec<Chart>, StockError> {
        let url = self.charts_url(&req)?;
        if req.symbols.is_empty() {
            return Ok(Vec::new());
        }
        let body = self
            .fetch(
                cancel,
                url,
                dump_file_name("chart", &req.symbols, Some(req.range)),
            )
            .await?;
        decode_charts(&body, &self.clock)
    }

    async fn fetch(
        &self,
        cancel: &CancellationToken,
        url: String,
        dump_name: String,
    ) -> Result<Vec<u8>, StockError> {
        if cancel.is_cancelled() {
            return Err(StockError::cancelled());
        }
        debug!(file = %dump_name, "requesting upstream batch");

        let request = HttpRequest::get(url).with_timeout_ms(self.timeout_ms);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(StockError::cancelled()),
            outcome = self.http_client.execute(request) => outcome,
        };
        let response = outcome.map_err(|e| {
            StockError::upstream(format!("upstream transport error: {}", e.message()))
        })?;

        if !response.is_success() {
            return Err(StockError::upstream(format!(
                "upstream returned status {}: {}",
                response.status,
                response.text().trim()
            )));
        }

        if let Some(dir) = &self.dump_dir {
            let path = dir.join(&dump_name);
            if let Err(error) = tokio::fs::write(&path, &response.body).await {
                warn!(path = %path.display(), %error, "failed to dump upstream response");
            }
        }

        Ok(response.body)
    }
}

fn join_symbols(symbols: &[Symbol]) -> String {
    symbols
        .iter()
        .map(Symbol::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

/// `iex-<kind>-<sorted symbols>[-<range>].txt`
fn dump_file_name(kind: &str, symbols: &[Symbol], range: Option<Range>) -> String {
    let mut sorted: Vec<&str> = symbols.iter().map(Symbol::as_str).collect();
    sorted.sort_unstable();
    match range {
        Some(range) => format!("iex-{kind}-{}-{range}.txt", sorted.join("-")),
        None => format!("iex-{kind}-{}.txt", sorted.join("-")),
    }
}
