//! Recording fake upstream, fixed clock and planner harnesses over
//! temporary cache directories.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::America::New_York;
use ponzi_core::{
    CacheClient, CacheMode, Chart, ChartCache, ChartCacheKey, ChartPoint, Clock, HttpClient,
    HttpError, HttpRequest, HttpResponse, IexFetcher, Interval, MetricsRegistry, QuoteCache,
    Symbol, CHART_SNAPSHOT_FILE, QUOTE_SNAPSHOT_FILE,
};
use serde_json::{json, Map, Value};
use tempfile::TempDir;

type Responder = dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync;

/// Fake upstream that records every request and answers through a closure.
pub struct FakeUpstream {
    responder: Box<Responder>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeUpstream {
    pub fn new(responder: impl Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static) -> Self {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serves `charts` the way the batch endpoint does: only requested
    /// symbols, trimmed to `chartLast` when present.
    pub fn charts(charts: Vec<(&str, Vec<Value>)>) -> Self {
        let fixture = chart_fixture(charts);
        Self::new(move |request| serve_charts(&fixture, request))
    }

    pub fn quotes(quotes: Vec<(&str, Value)>) -> Self {
        let fixture: Vec<(String, Value)> = quotes
            .into_iter()
            .map(|(symbol, quote)| (symbol.to_owned(), quote))
            .collect();
        Self::new(move |request| serve_quotes(&fixture, request))
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

impl HttpClient for FakeUpstream {
    fn execute<'a>(
        &'a self,
        request: HttpRequest,
    ) -> Pin<Box<dyn Future<Output = Result<HttpResponse, HttpError>> + Send + 'a>> {
        let response = (self.responder)(&request);
        self.requests.lock().expect("requests lock").push(request);
        Box::pin(async move { Ok(response) })
    }
}

pub type ChartFixture = Vec<(String, Vec<Value>)>;

pub fn chart_fixture(charts: Vec<(&str, Vec<Value>)>) -> ChartFixture {
    charts
        .into_iter()
        .map(|(symbol, points)| (symbol.to_owned(), points))
        .collect()
}

pub fn serve_charts(fixture: &ChartFixture, request: &HttpRequest) -> HttpResponse {
    let requested = requested_symbols(&request.url);
    let chart_last = query_param(&request.url, "chartLast").and_then(|v| v.parse::<usize>().ok());

    let mut body = Map::new();
    for (symbol, points) in fixture {
        if !requested.contains(symbol) {
            continue;
        }
        let start = chart_last.map_or(0, |n| points.len().saturating_sub(n));
        body.insert(symbol.clone(), json!({ "chart": points[start..].to_vec() }));
    }
    HttpResponse::ok(Value::Object(body).to_string())
}

pub fn serve_quotes(fixture: &[(String, Value)], request: &HttpRequest) -> HttpResponse {
    let requested = requested_symbols(&request.url);
    let mut body = Map::new();
    for (symbol, quote) in fixture {
        if requested.contains(symbol) {
            body.insert(symbol.clone(), json!({ "quote": quote }));
        }
    }
    HttpResponse::ok(Value::Object(body).to_string())
}

pub fn query_param(url: &str, name: &str) -> Option<String> {
    let (_, query) = url.split_once('?')?;
    query.split('&').find_map(|pair| {
        let (key, value) = pair.split_once('=')?;
        (key == name).then(|| value.to_owned())
    })
}

pub fn requested_symbols(url: &str) -> Vec<String> {
    query_param(url, "symbols")
        .map(|list| list.split(',').map(str::to_owned).collect())
        .unwrap_or_default()
}

/// Raw upstream chart point for a trading day.
pub fn daily(date: &str, close: f64) -> Value {
    json!({
        "date": date,
        "open": close - 1.0,
        "high": close + 1.0,
        "low": close - 2.0,
        "close": close,
        "volume": 1_000,
        "change": 0.5,
        "changePercent": 0.01,
    })
}

/// Raw upstream quote.
pub fn quote(company: &str, price: f64) -> Value {
    json!({
        "companyName": company,
        "latestPrice": price,
        "latestSource": "Close",
        "latestTime": "July 5, 2017",
        "latestUpdate": 1_499_284_800_000_i64,
        "latestVolume": 1_000_000,
        "open": price - 1.0,
        "high": price + 1.0,
        "low": price - 2.0,
        "close": price,
        "change": 1.0,
        "changePercent": 0.01,
    })
}

pub fn symbol(raw: &str) -> Symbol {
    Symbol::parse(raw).expect("valid symbol")
}

/// New York wall-clock instant on `date` (YYYY-MM-DD) at `hour`:00.
pub fn new_york(date: &str, hour: u32) -> DateTime<Utc> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("valid date");
    New_York
        .from_local_datetime(&day.and_hms_opt(hour, 0, 0).expect("valid hour"))
        .single()
        .expect("unambiguous time")
        .with_timezone(&Utc)
}

pub fn fixed_clock(now: DateTime<Utc>) -> Clock {
    Clock::fixed(New_York, now)
}

/// Daily point as the decoder would produce it.
pub fn point(date: &str, close: f32) -> ChartPoint {
    ChartPoint {
        date: new_york(date, 0),
        open: close - 1.0,
        high: close + 1.0,
        low: close - 2.0,
        close,
        volume: 1_000,
        change: 0.5,
        change_percent: 0.01,
    }
}

pub fn chart(raw: &str, points: &[(&str, f32)]) -> Chart {
    Chart::new(
        symbol(raw),
        points
            .iter()
            .map(|(date, close)| point(date, *close))
            .collect(),
    )
}

pub fn daily_key(raw: &str) -> ChartCacheKey {
    ChartCacheKey {
        symbol: symbol(raw),
        interval: Interval::Daily,
    }
}

/// A planner over a fake upstream with its caches in a temp directory.
pub struct Harness {
    pub client: CacheClient,
    pub upstream: Arc<FakeUpstream>,
    pub clock: Clock,
    pub dir: TempDir,
}

impl Harness {
    pub fn new(now: DateTime<Utc>, upstream: FakeUpstream) -> Self {
        Self::with_modes(now, upstream, CacheMode::Memory, CacheMode::Persistent)
    }

    pub fn with_modes(
        now: DateTime<Utc>,
        upstream: FakeUpstream,
        quote_mode: CacheMode,
        chart_mode: CacheMode,
    ) -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let chart_path = dir.path().join(CHART_SNAPSHOT_FILE);
        Self::with_chart_path(now, upstream, quote_mode, chart_mode, chart_path, dir)
    }

    pub fn with_chart_path(
        now: DateTime<Utc>,
        upstream: FakeUpstream,
        quote_mode: CacheMode,
        chart_mode: CacheMode,
        chart_path: PathBuf,
        dir: TempDir,
    ) -> Self {
        let clock = fixed_clock(now);
        let upstream = Arc::new(upstream);
        let metrics = MetricsRegistry::new();
        let fetcher = IexFetcher::new(upstream.clone(), clock.clone());
        let quote_cache = QuoteCache::new(
            "quote",
            quote_mode,
            Some(dir.path().join(QUOTE_SNAPSHOT_FILE)),
            clock.clone(),
            &metrics,
        );
        let chart_cache = ChartCache::new(
            "chart",
            chart_mode,
            Some(chart_path),
            clock.clone(),
            &metrics,
        );
        let client = CacheClient::new(
            fetcher,
            "pk_test",
            clock.clone(),
            quote_cache,
            chart_cache,
            metrics,
        );
        Self {
            client,
            upstream,
            clock,
            dir,
        }
    }

    pub fn chart_snapshot_path(&self) -> PathBuf {
        self.dir.path().join(CHART_SNAPSHOT_FILE)
    }

    /// Seed the chart cache without writing a snapshot.
    pub fn seed_chart(&self, chart: Chart, at: DateTime<Utc>) {
        let key = ChartCacheKey {
            symbol: chart.symbol.clone(),
            interval: Interval::Daily,
        };
        self.client.chart_cache().put_at(key, &chart, at);
    }

    /// A second cache instance reading the snapshot from disk.
    pub fn reopen_chart_cache(&self) -> ChartCache {
        ChartCache::open(
            "chart",
            CacheMode::Persistent,
            Some(self.chart_snapshot_path()),
            self.clock.clone(),
            &MetricsRegistry::new(),
        )
        .expect("snapshot should load")
    }
}
