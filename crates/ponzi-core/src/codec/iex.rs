//! Decoding of the upstream batch endpoint's JSON payload.
//!
//! The payload is an object keyed by symbol. Each value may carry a `quote`
//! object and/or a `chart` array, restricted to the fields named in the
//! request's `filter` parameter.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::clock::Clock;
use crate::{Chart, ChartPoint, LatestTimeFormat, Quote, Source, StockError, Symbol};

#[derive(Debug, Deserialize)]
struct IexStock {
    #[serde(default)]
    quote: Option<IexQuote>,
    #[serde(default)]
    chart: Option<Vec<IexChartPoint>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IexQuote {
    company_name: Option<String>,
    latest_price: Option<f64>,
    latest_source: Option<String>,
    latest_time: Option<String>,
    latest_update: Option<i64>,
    latest_volume: Option<i64>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    change: Option<f64>,
    change_percent: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IexChartPoint {
    date: String,
    minute: Option<String>,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: Option<f64>,
    volume: Option<i64>,
    change: Option<f64>,
    change_percent: Option<f64>,
}

fn parse_batch(body: &[u8]) -> Result<BTreeMap<String, IexStock>, StockError> {
    serde_json::from_slice(body).map_err(|e| {
        StockError::malformed_response(format!("failed to parse upstream response: {e}"))
    })
}

fn parse_symbol(raw: &str) -> Result<Symbol, StockError> {
    Symbol::parse(raw).map_err(|e| {
        StockError::malformed_response(format!("upstream returned invalid symbol '{raw}': {e}"))
    })
}

fn narrow(value: Option<f64>) -> f32 {
    value.unwrap_or(0.0) as f32
}

/// Decode every `quote` object in a batch response.
///
/// Time-of-day `latestTime` values are placed on the current date of `clock`.
pub fn decode_quotes(body: &[u8], clock: &Clock) -> Result<Vec<Quote>, StockError> {
    let mut quotes = Vec::new();
    for (raw_symbol, stock) in parse_batch(body)? {
        let Some(raw) = stock.quote else {
            continue;
        };
        let symbol = parse_symbol(&raw_symbol)?;

        let latest_source = Source::from_upstream(raw.latest_source.as_deref().unwrap_or(""))
            .map_err(|e| StockError::malformed_response(format!("{symbol}: {e}")))?;
        let latest_time = match raw.latest_time.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => {
                Some(parse_latest_time(text, latest_source, clock)?)
            }
            _ => None,
        };
        let latest_update = raw
            .latest_update
            .map(|millis| {
                DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
                    StockError::malformed_date(format!(
                        "{symbol}: latestUpdate {millis} is out of range"
                    ))
                })
            })
            .transpose()?;

        quotes.push(Quote {
            symbol,
            company_name: raw.company_name.unwrap_or_default(),
            latest_price: narrow(raw.latest_price),
            latest_source,
            latest_time,
            latest_update,
            latest_volume: raw.latest_volume.unwrap_or(0),
            open: narrow(raw.open),
            high: narrow(raw.high),
            low: narrow(raw.low),
            close: narrow(raw.close),
            change: narrow(raw.change),
            change_percent: narrow(raw.change_percent),
        });
    }
    Ok(quotes)
}

/// Decode every `chart` array in a batch response. Points come back sorted.
pub fn decode_charts(body: &[u8], clock: &Clock) -> Result<Vec<Chart>, StockError> {
    let mut charts = Vec::new();
    for (raw_symbol, stock) in parse_batch(body)? {
        let Some(raw_points) = stock.chart else {
            continue;
        };
        let symbol = parse_symbol(&raw_symbol)?;

        let points = raw_points
            .into_iter()
            .map(|raw| {
                Ok(ChartPoint {
                    date: parse_point_date(&raw.date, raw.minute.as_deref(), clock)?,
                    open: narrow(raw.open),
                    high: narrow(raw.high),
                    low: narrow(raw.low),
                    close: narrow(raw.close),
                    volume: raw.volume.unwrap_or(0),
                    change: narrow(raw.change),
                    change_percent: narrow(raw.change_percent),
                })
            })
            .collect::<Result<Vec<_>, StockError>>()?;

        charts.push(Chart::new(symbol, points));
    }
    Ok(charts)
}

fn parse_latest_time(
    text: &str,
    source: Source,
    clock: &Clock,
) -> Result<DateTime<Utc>, StockError> {
    match source.latest_time_format() {
        Some(LatestTimeFormat::TimeOfDay) => {
            let time = NaiveTime::parse_from_str(text, "%I:%M:%S %p").map_err(|e| {
                StockError::malformed_date(format!("latestTime '{text}' is not a time: {e}"))
            })?;
            let today = clock.local_date(clock.now());
            clock.localize(today.and_time(time))
        }
        Some(LatestTimeFormat::CalendarDate) => {
            let date = NaiveDate::parse_from_str(text, "%B %d, %Y").map_err(|e| {
                StockError::malformed_date(format!("latestTime '{text}' is not a date: {e}"))
            })?;
            clock.midnight(date)
        }
        None => Err(StockError::malformed_response(format!(
            "latestTime '{text}' sent without a latestSource"
        ))),
    }
}

fn parse_point_date(
    date: &str,
    minute: Option<&str>,
    clock: &Clock,
) -> Result<DateTime<Utc>, StockError> {
    let day = NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(date, "%Y%m%d"))
        .map_err(|e| StockError::malformed_date(format!("chart date '{date}': {e}")))?;

    let time = match minute.map(str::trim) {
        Some(text) if !text.is_empty() => NaiveTime::parse_from_str(text, "%H:%M")
            .map_err(|e| StockError::malformed_date(format!("chart minute '{text}': {e}")))?,
        _ => NaiveTime::MIN,
    };

    clock.localize(day.and_time(time))
}
