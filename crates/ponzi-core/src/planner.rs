//! Cache-backed [`StockClient`] that fetches only what the cache lacks.
//!
//! Chart calls classify every symbol by how far its cached series lags
//! behind today, group symbols with the same lag into one upstream batch,
//! run the batches concurrently and merge the answers into the cache.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::cache::{
    ensure_cache_dir, Cache, CacheKey, CacheMode, ChartCache, ChartCacheKey, QuoteCache,
    QuoteCacheKey, Snapshot,
};
use crate::client::{
    ChartBatch, ChartRequest, ClientFuture, QuoteBatch, QuoteRequest, StockClient,
};
use crate::clock::{business_days_between, Clock};
use crate::codec::WireMessage;
use crate::config::ClientConfig;
use crate::fetcher::{FetchChartsRequest, FetchQuotesRequest, IexFetcher};
use crate::http_client::HttpClient;
use crate::metrics::{Counter, MetricsRegistry};
use crate::task_group::TaskGroup;
use crate::{Chart, Interval, Lookup, Quote, Range, StockError, Symbol};

/// Smallest upstream call that brings one symbol's chart up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChartLast {
    /// The cached series already reaches today.
    CacheOnly,
    /// Nothing usable is cached; fetch the whole range.
    RangeDefault,
    /// Fetch only the trailing `n` points.
    Last(u32),
}

impl ChartLast {
    /// Classify a cached chart against `today` in the clock's timezone.
    pub fn classify(cached: Option<&Chart>, today: NaiveDate, clock: &Clock) -> Self {
        let Some(latest) = cached.and_then(Chart::latest) else {
            return Self::RangeDefault;
        };
        match business_days_between(clock.local_date(latest.date), today) {
            0 => Self::CacheOnly,
            lag => Self::Last(lag),
        }
    }

    /// `chartLast` to send upstream, or `None` when no call is needed.
    pub const fn upstream_value(self) -> Option<u32> {
        match self {
            Self::CacheOnly => None,
            Self::RangeDefault => Some(0),
            Self::Last(count) => Some(count),
        }
    }
}

/// Planner over an upstream fetcher and the two caches.
pub struct CacheClient {
    fetcher: Arc<IexFetcher>,
    token: String,
    clock: Clock,
    quote_cache: Arc<QuoteCache>,
    chart_cache: Arc<ChartCache>,
    metrics: MetricsRegistry,
    quote_requests: Arc<Counter>,
    chart_requests: Arc<Counter>,
}

impl CacheClient {
    pub fn new(
        fetcher: IexFetcher,
        token: impl Into<String>,
        clock: Clock,
        quote_cache: QuoteCache,
        chart_cache: ChartCache,
        metrics: MetricsRegistry,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            token: token.into(),
            clock,
            quote_cache: Arc::new(quote_cache),
            chart_cache: Arc::new(chart_cache),
            quote_requests: metrics.counter("get-quotes-requests"),
            chart_requests: metrics.counter("get-charts-requests"),
            metrics,
        }
    }

    /// Build the fetcher and open both caches as `config` describes.
    ///
    /// Persistent caches load their snapshots here; a corrupt snapshot fails
    /// construction with `CacheIo`.
    pub fn from_config(
        config: &ClientConfig,
        http_client: Arc<dyn HttpClient>,
        clock: Clock,
    ) -> Result<Self, StockError> {
        if config.quote_cache == CacheMode::Persistent || config.chart_cache == CacheMode::Persistent
        {
            ensure_cache_dir(&config.cache_dir)?;
        }
        let metrics = MetricsRegistry::new();
        let fetcher = IexFetcher::new(http_client, clock.clone())
            .with_base_url(config.base_url.clone())
            .with_timeout_ms(config.timeout_ms)
            .with_dump_dir(config.dump_responses.then(|| config.dump_dir.clone()));
        let quote_cache = Cache::open(
            "quote",
            config.quote_cache,
            Some(config.quote_snapshot_path()),
            clock.clone(),
            &metrics,
        )?;
        let chart_cache = Cache::open(
            "chart",
            config.chart_cache,
            Some(config.chart_snapshot_path()),
            clock.clone(),
            &metrics,
        )?;
        Ok(Self::new(
            fetcher,
            config.token.clone(),
            clock,
            quote_cache,
            chart_cache,
            metrics,
        ))
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    pub fn quote_cache(&self) -> &QuoteCache {
        &self.quote_cache
    }

    pub fn chart_cache(&self) -> &ChartCache {
        &self.chart_cache
    }

    async fn quotes(
        &self,
        cancel: &CancellationToken,
        req: QuoteRequest,
    ) -> Result<QuoteBatch, StockError> {
        self.quote_requests.incr();
        let now = self.clock.now();

        let mut quotes: BTreeMap<Symbol, Quote> = BTreeMap::new();
        let mut missing = Vec::new();
        for symbol in unique(&req.symbols) {
            let key = QuoteCacheKey {
                symbol: symbol.clone(),
            };
            match self.quote_cache.get(&key) {
                Some(cached) => {
                    quotes.insert(symbol, cached.value);
                }
                None => missing.push(symbol),
            }
        }

        if !missing.is_empty() {
            debug!(symbols = missing.len(), "fetching missing quotes");
            let requested: BTreeSet<Symbol> = missing.iter().cloned().collect();
            let fetched = self
                .fetcher
                .fetch_quotes(
                    cancel,
                    FetchQuotesRequest {
                        token: self.token.clone(),
                        symbols: missing,
                    },
                )
                .await?;
            let fetched: Vec<Quote> = fetched
                .into_iter()
                .filter(|quote| requested.contains(&quote.symbol))
                .collect();

            self.quote_cache.put_all(
                fetched.iter().map(|quote| {
                    (
                        QuoteCacheKey {
                            symbol: quote.symbol.clone(),
                        },
                        quote.clone(),
                    )
                }),
                now,
            );
            let wrote = !fetched.is_empty();
            quotes.extend(fetched.into_iter().map(|quote| (quote.symbol.clone(), quote)));
            if wrote {
                save(&self.quote_cache).await?;
            }
        }

        Ok(QuoteBatch {
            quotes: collect_in_order(&req.symbols, &quotes),
        })
    }

    async fn charts(
        &self,
        cancel: &CancellationToken,
        req: ChartRequest,
    ) -> Result<ChartBatch, StockError> {
        self.chart_requests.incr();
        let interval = self.chart_interval(req.range)?;
        let now = self.clock.now();
        let today = self.clock.local_date(now);

        let mut cached: BTreeMap<Symbol, Chart> = BTreeMap::new();
        let mut plan: BTreeMap<ChartLast, Vec<Symbol>> = BTreeMap::new();
        for symbol in unique(&req.symbols) {
            let key = ChartCacheKey {
                symbol: symbol.clone(),
                interval,
            };
            let entry = self.chart_cache.get(&key).map(|value| value.value);
            let chart_last = ChartLast::classify(entry.as_ref(), today, &self.clock);
            debug!(symbol = %symbol, ?chart_last, "classified chart request");
            if let Some(chart) = entry {
                cached.insert(symbol.clone(), chart);
            }
            plan.entry(chart_last).or_default().push(symbol);
        }

        let mut group = TaskGroup::new(cancel);
        let mut fetched_symbols = BTreeSet::new();
        for (chart_last, symbols) in &plan {
            let Some(chart_last) = chart_last.upstream_value() else {
                continue;
            };
            debug!(chart_last, symbols = symbols.len(), "dispatching chart batch");
            fetched_symbols.extend(symbols.iter().cloned());
            let fetcher = Arc::clone(&self.fetcher);
            let request = FetchChartsRequest {
                token: self.token.clone(),
                symbols: symbols.clone(),
                range: req.range,
                chart_last,
            };
            group.spawn(move |token| async move { fetcher.fetch_charts(&token, request).await });
        }
        debug!(batches = group.len(), "waiting for chart batches");
        let batches = group.wait().await?;

        let mut responses: BTreeMap<Symbol, Chart> = BTreeMap::new();
        for chart in batches.into_iter().flatten() {
            if fetched_symbols.contains(&chart.symbol) {
                responses.insert(chart.symbol.clone(), chart);
            }
        }

        let mut charts: BTreeMap<Symbol, Chart> = BTreeMap::new();
        let mut updates = Vec::new();
        for symbol in plan.values().flatten() {
            if !fetched_symbols.contains(symbol) {
                if let Some(chart) = cached.remove(symbol) {
                    charts.insert(symbol.clone(), chart);
                }
                continue;
            }
            let Some(response) = responses.remove(symbol) else {
                warn!(symbol = %symbol, "upstream omitted requested symbol");
                continue;
            };
            let merged = match cached.remove(symbol) {
                Some(previous) => previous.merged_with(&response),
                None => response,
            };
            updates.push((
                ChartCacheKey {
                    symbol: symbol.clone(),
                    interval,
                },
                merged.clone(),
            ));
            charts.insert(symbol.clone(), merged);
        }

        // Cache-only hits keep their write time; a batch served wholly from
        // cache writes nothing.
        if !updates.is_empty() {
            self.chart_cache.put_all(updates, now);
            save(&self.chart_cache).await?;
        }

        Ok(ChartBatch {
            charts: collect_in_order(&req.symbols, &charts),
        })
    }

    /// Cache resolution for `range`. Cache-backed calls only serve two years
    /// of daily bars; bypass mode forwards any range the upstream knows.
    fn chart_interval(&self, range: Range) -> Result<Interval, StockError> {
        let interval = range.interval().ok_or_else(|| {
            StockError::bad_request(format!("unsupported chart range '{range}'"))
        })?;
        if self.chart_cache.mode() != CacheMode::Bypass && range != Range::TwoYears {
            return Err(StockError::bad_request(format!(
                "cached charts only support range 2y, got '{range}'"
            )));
        }
        Ok(interval)
    }
}

impl StockClient for CacheClient {
    fn get_quotes<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        req: QuoteRequest,
    ) -> ClientFuture<'a, QuoteBatch> {
        Box::pin(self.quotes(cancel, req))
    }

    fn get_charts<'a>(
        &'a self,
        cancel: &'a CancellationToken,
        req: ChartRequest,
    ) -> ClientFuture<'a, ChartBatch> {
        Box::pin(self.charts(cancel, req))
    }
}

/// Write a cache snapshot off the async runtime.
async fn save<K, V>(cache: &Arc<Cache<K, V>>) -> Result<(), StockError>
where
    K: CacheKey,
    V: Clone + Send + Sync + 'static,
    Snapshot<K, V>: WireMessage,
{
    if cache.mode() != CacheMode::Persistent {
        return Ok(());
    }
    let cache = Arc::clone(cache);
    let saved = tokio::task::spawn_blocking(move || cache.save())
        .await
        .map_err(|e| StockError::cache_io(format!("snapshot writer failed: {e}")))?;
    if let Err(error) = &saved {
        warn!(%error, "cache snapshot not written; in-memory cache is still current");
    }
    saved
}

/// Symbols in first-seen order without repeats.
fn unique(symbols: &[Symbol]) -> Vec<Symbol> {
    let mut seen = BTreeSet::new();
    symbols
        .iter()
        .filter(|symbol| seen.insert((*symbol).clone()))
        .cloned()
        .collect()
}

fn collect_in_order<T: Clone>(symbols: &[Symbol], found: &BTreeMap<Symbol, T>) -> Vec<Lookup<T>> {
    symbols
        .iter()
        .map(|symbol| match found.get(symbol) {
            Some(value) => Lookup::Found(value.clone()),
            None => Lookup::NotFound {
                symbol: symbol.clone(),
            },
        })
        .collect()
}
