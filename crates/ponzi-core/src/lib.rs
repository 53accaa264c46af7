//! # Ponzi Core
//!
//! Cached, batched, incremental market-data client for the IEX batch API.
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Keyed quote/chart stores with on-disk snapshots |
//! | [`client`] | [`StockClient`] contract and request/batch types |
//! | [`clock`] | Injectable clock and business-day calendar |
//! | [`codec`] | Upstream JSON decoding and binary transport encoding |
//! | [`config`] | Environment-driven [`ClientConfig`] |
//! | [`domain`] | Symbols, ranges, quotes and charts |
//! | [`error`] | [`StockError`] and [`ValidationError`] |
//! | [`fetcher`] | Stateless upstream fetcher |
//! | [`http_client`] | HTTP abstraction with a reqwest implementation |
//! | [`metrics`] | Counters and timings |
//! | [`planner`] | [`CacheClient`], the incremental planner |
//! | [`remote`] | Binary HTTP transport server and client |
//! | [`task_group`] | Fail-fast concurrent task group |
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use ponzi_core::{CacheClient, ChartRequest, ClientConfig, Range, ReqwestHttpClient, StockClient, Symbol};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::from_env()?;
//!     let client = CacheClient::from_config(&config, Arc::new(ReqwestHttpClient::new()), config.clock())?;
//!
//!     let request = ChartRequest::new(vec![Symbol::parse("MSFT")?], Range::TwoYears);
//!     let batch = client.get_charts(&CancellationToken::new(), request).await?;
//!     for chart in batch.found() {
//!         println!("{}: {} points", chart.symbol, chart.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐      ┌──────────────┐
//! │ RemoteClient │─────▶│ remote serve │
//! └──────────────┘      └──────┬───────┘
//!                              │
//!                              ▼
//!                       ┌──────────────┐     ┌──────────────┐
//!                       │ CacheClient  │────▶│ Quote/Chart  │
//!                       │ (planner)    │     │ caches       │
//!                       └──────┬───────┘     └──────────────┘
//!                              │ TaskGroup
//!                              ▼
//!                       ┌──────────────┐     ┌──────────────┐
//!                       │ IexFetcher   │────▶│ HttpClient   │
//!                       └──────────────┘     └──────────────┘
//! ```

pub mod cache;
pub mod client;
pub mod clock;
pub mod codec;
pub mod config;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod metrics;
pub mod planner;
pub mod remote;
pub mod task_group;

pub use cache::{
    CacheMode, CacheValue, ChartCache, ChartCacheKey, QuoteCache, QuoteCacheKey,
    CHART_SNAPSHOT_FILE, QUOTE_SNAPSHOT_FILE,
};
pub use client::{ChartBatch, ChartRequest, QuoteBatch, QuoteRequest, StockClient};
pub use clock::{business_days_between, Clock, DEFAULT_TIMEZONE};
pub use config::{ClientConfig, ConfigError};
pub use domain::{
    canonical_date, Chart, ChartPoint, Interval, LatestTimeFormat, Lookup, Quote, Range, Source,
    Symbol,
};
pub use error::{ErrorKind, StockError, ValidationError};
pub use fetcher::{FetchChartsRequest, FetchQuotesRequest, IexFetcher, IEX_BASE_URL};
pub use http_client::{
    HttpClient, HttpError, HttpMethod, HttpRequest, HttpResponse, ReqwestHttpClient,
};
pub use metrics::{MetricValue, MetricsRegistry};
pub use planner::{CacheClient, ChartLast};
pub use remote::{RemoteClient, ServerState};
pub use task_group::TaskGroup;
