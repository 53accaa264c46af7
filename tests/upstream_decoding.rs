//! Behavior-driven tests for upstream payload handling.
//!
//! Realistic batch responses go through the fetcher and the planner to
//! check how quotes and charts are decoded and what reaches the cache.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use ponzi_core::{
    ChartRequest, ErrorKind, FetchChartsRequest, HttpResponse, IexFetcher, QuoteRequest, Range,
    Source, StockClient,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use ponzi_tests::support::{
    daily, fixed_clock, new_york, query_param, symbol, FakeUpstream, Harness,
};

fn raw(body: serde_json::Value) -> FakeUpstream {
    let body = body.to_string();
    FakeUpstream::new(move |_| HttpResponse::ok(body.clone()))
}

// =============================================================================
// Upstream: Quotes
// =============================================================================

#[tokio::test]
async fn when_quote_is_delayed_system_places_time_of_day_on_the_current_date() {
    // Given: A fifteen-minute delayed quote reported at 3:45:12 PM
    let upstream = raw(json!({
        "MSFT": {
            "quote": {
                "companyName": "Microsoft Corporation",
                "latestPrice": 69.985,
                "latestSource": "15 minute delayed price",
                "latestTime": "3:45:12 PM",
                "latestUpdate": 1_499_283_912_000_i64,
                "latestVolume": 14_582_000,
                "open": 69.33,
                "high": 70.1,
                "low": 68.96,
                "close": 68.17,
                "change": 1.815,
                "changePercent": 0.02663
            }
        }
    }));
    let harness = Harness::new(new_york("2017-07-05", 16), upstream);

    // When: The quote is requested
    let batch = harness
        .client
        .get_quotes(
            &CancellationToken::new(),
            QuoteRequest::new(vec![symbol("MSFT")]),
        )
        .await
        .expect("quote decodes");

    // Then: Source, time and narrowed numbers are decoded
    let msft = batch.quotes[0].found().expect("MSFT found");
    assert_eq!(msft.latest_source, Source::FifteenMinuteDelayed);
    assert_eq!(
        msft.latest_time,
        Some(Utc.with_ymd_and_hms(2017, 7, 5, 19, 45, 12).unwrap())
    );
    assert_eq!(
        msft.latest_update,
        Some(Utc.with_ymd_and_hms(2017, 7, 5, 19, 45, 12).unwrap())
    );
    assert_eq!(msft.latest_volume, 14_582_000);
    assert!((msft.latest_price - 69.985).abs() < 1e-4);
    assert!((msft.change_percent - 0.02663).abs() < 1e-6);
}

#[tokio::test]
async fn when_quote_source_is_unknown_system_fails_and_caches_nothing() {
    // Given: A quote with a source the client does not recognize
    let upstream = raw(json!({
        "AAPL": {
            "quote": {
                "companyName": "Apple Inc.",
                "latestPrice": 144.0,
                "latestSource": "Dark pool",
                "latestTime": "July 5, 2017"
            }
        }
    }));
    let harness = Harness::new(new_york("2017-07-05", 16), upstream);

    // When: The quote is requested
    let error = harness
        .client
        .get_quotes(
            &CancellationToken::new(),
            QuoteRequest::new(vec![symbol("AAPL")]),
        )
        .await
        .expect_err("unknown source is rejected");

    // Then: The payload is reported malformed and the cache stays empty
    assert_eq!(error.kind(), ErrorKind::MalformedResponse);
    assert!(error.message().contains("Dark pool"));
    assert!(harness.client.quote_cache().is_empty());
}

#[tokio::test]
async fn when_upstream_sends_invalid_json_system_reports_malformed_response() {
    // Given: An upstream answering 200 with HTML
    let upstream = FakeUpstream::new(|_| HttpResponse::ok("<html>maintenance</html>"));
    let harness = Harness::new(new_york("2017-07-05", 16), upstream);

    // When: Quotes are requested
    let error = harness
        .client
        .get_quotes(
            &CancellationToken::new(),
            QuoteRequest::new(vec![symbol("AAPL")]),
        )
        .await
        .expect_err("html is not a batch payload");

    // Then: MalformedResponse
    assert_eq!(error.kind(), ErrorKind::MalformedResponse);
}

// =============================================================================
// Upstream: Charts
// =============================================================================

#[tokio::test]
async fn when_chart_date_is_malformed_system_fails_without_touching_the_cache() {
    // Given: A chart whose second point has an unparseable date
    let upstream = raw(json!({
        "SPY": {
            "chart": [
                daily("2017-07-03", 242.1),
                {"date": "07/05/2017", "close": 242.5}
            ]
        }
    }));
    let harness = Harness::new(new_york("2017-07-05", 16), upstream);

    // When: The chart is requested
    let error = harness
        .client
        .get_charts(
            &CancellationToken::new(),
            ChartRequest::new(vec![symbol("SPY")], Range::TwoYears),
        )
        .await
        .expect_err("bad date is rejected");

    // Then: MalformedDate and no cache write
    assert_eq!(error.kind(), ErrorKind::MalformedDate);
    assert!(harness.client.chart_cache().is_empty());
    assert!(!harness.chart_snapshot_path().exists());
}

#[tokio::test]
async fn when_chart_arrives_out_of_order_with_duplicates_system_stores_a_clean_series() {
    // Given: Points out of order with one date repeated
    let upstream = raw(json!({
        "QQQ": {
            "chart": [
                daily("2017-07-05", 140.0),
                daily("2017-06-30", 138.0),
                daily("2017-07-03", 139.0),
                daily("2017-07-05", 140.5)
            ]
        }
    }));
    let harness = Harness::new(new_york("2017-07-05", 16), upstream);

    // When: The chart is requested
    let batch = harness
        .client
        .get_charts(
            &CancellationToken::new(),
            ChartRequest::new(vec![symbol("QQQ")], Range::TwoYears),
        )
        .await
        .expect("chart decodes");

    // Then: Dates are strictly ascending and unique
    let qqq = batch.charts[0].found().expect("QQQ found");
    assert_eq!(qqq.len(), 3);
    assert!(qqq.points().windows(2).all(|w| w[0].date < w[1].date));
    assert_eq!(qqq.latest().map(|p| p.date), Some(new_york("2017-07-05", 0)));
}

#[tokio::test]
async fn when_responses_are_dumped_system_writes_the_raw_body_beside_the_call() {
    // Given: A fetcher that tees bodies into a temp directory
    let dir = tempfile::tempdir().expect("temp dir");
    let body = json!({"SPY": {"chart": [daily("2017-07-05", 242.0)]}, "QQQ": {"chart": []}})
        .to_string();
    let served = body.clone();
    let upstream = Arc::new(FakeUpstream::new(move |_| HttpResponse::ok(served.clone())));
    let fetcher = IexFetcher::new(upstream.clone(), fixed_clock(new_york("2017-07-05", 16)))
        .with_base_url("https://sandbox.example/stable/stock/market/batch")
        .with_dump_dir(Some(dir.path().to_path_buf()));

    // When: A chart batch is fetched
    let charts = fetcher
        .fetch_charts(
            &CancellationToken::new(),
            FetchChartsRequest {
                token: String::from("pk test/1"),
                symbols: vec![symbol("SPY"), symbol("QQQ")],
                range: Range::TwoYears,
                chart_last: 0,
            },
        )
        .await
        .expect("fetch succeeds");

    // Then: The body lands in a file named after the sorted symbols and range
    assert_eq!(charts.len(), 2);
    let dumped = std::fs::read_to_string(dir.path().join("iex-chart-QQQ-SPY-2y.txt"))
        .expect("dump file written");
    assert_eq!(dumped, body);

    // And: The request used the configured base URL with an encoded token
    let url = &upstream.requests()[0].url;
    assert!(url.starts_with("https://sandbox.example/stable/stock/market/batch?"));
    assert_eq!(query_param(url, "token").as_deref(), Some("pk%20test%2F1"));
    assert_eq!(query_param(url, "symbols").as_deref(), Some("SPY,QQQ"));
}
