//! Binary encoding for the remote transport and cache snapshots.
//!
//! Each domain type has a tagged `prost` message twin. Decoding re-validates
//! symbols and enumerations, so a payload that decodes is a valid domain
//! value.

use chrono::{DateTime, Utc};
use prost::Message;

use crate::cache::{CacheValue, ChartCacheKey, QuoteCacheKey, Snapshot};
use crate::client::{ChartBatch, ChartRequest, QuoteBatch, QuoteRequest};
use crate::{Chart, ChartPoint, Interval, Lookup, Quote, Range, Source, StockError, Symbol};

/// Domain type with a binary wire representation.
pub trait WireMessage: Sized {
    type Message: Message + Default;

    fn to_message(&self) -> Self::Message;

    fn from_message(message: Self::Message) -> Result<Self, StockError>;
}

pub fn encode<T: WireMessage>(value: &T) -> Vec<u8> {
    value.to_message().encode_to_vec()
}

pub fn decode<T: WireMessage>(bytes: &[u8]) -> Result<T, StockError> {
    let message = T::Message::decode(bytes)
        .map_err(|e| StockError::malformed_response(format!("failed to decode payload: {e}")))?;
    T::from_message(message)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum RangeMessage {
    Unspecified = 0,
    OneDay = 1,
    TwoYears = 2,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum IntervalMessage {
    Minute = 0,
    Daily = 1,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum SourceMessage {
    Unspecified = 0,
    RealTime = 1,
    FifteenMinuteDelayed = 2,
    Close = 3,
    PreviousClose = 4,
    Price = 5,
    LastTrade = 6,
}

#[derive(Clone, PartialEq, Message)]
pub struct QuoteMessage {
    #[prost(string, tag = "1")]
    pub symbol: String,
    #[prost(string, tag = "2")]
    pub company_name: String,
    #[prost(float, tag = "3")]
    pub latest_price: f32,
    #[prost(enumeration = "SourceMessage", tag = "4")]
    pub latest_source: i32,
    #[prost(int64, optional, tag = "5")]
    pub latest_time_ms: Option<i64>,
    #[prost(int64, optional, tag = "6")]
    pub latest_update_ms: Option<i64>,
    #[prost(int64, tag = "7")]
    pub latest_volume: i64,
    #[prost(float, tag = "8")]
    pub open: f32,
    #[prost(float, tag = "9")]
    pub high: f32,
    #[prost(float, tag = "10")]
    pub low: f32,
    #[prost(float, tag = "11")]
    pub close: f32,
    #[prost(float, tag = "12")]
    pub change: f32,
    #[prost(float, tag = "13")]
    pub change_percent: f32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChartPointMessage {
    #[prost(int64, tag = "1")]
    pub date_ms: i64,
    #[prost(float, tag = "2")]
    pub open: f32,
    #[prost(float, tag = "3")]
    pub high: f32,
    #[prost(float, tag = "4")]
    pub low: f32,
    #[prost(float, tag = "5")]
    pub close: f32,
    #[prost(int64, tag = "6")]
    pub volume: i64,
    #[prost(float, tag = "7")]
    pub change: f32,
    #[prost(float, tag = "8")]
    pub change_percent: f32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChartMessage {
    #[prost(string, tag = "1")]
    pub symbol: String,
    #[prost(message, repeated, tag = "2")]
    pub points: Vec<ChartPointMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QuoteRequestMessage {
    #[prost(string, repeated, tag = "1")]
    pub symbols: Vec<String>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChartRequestMessage {
    #[prost(string, repeated, tag = "1")]
    pub symbols: Vec<String>,
    #[prost(enumeration = "RangeMessage", tag = "2")]
    pub range: i32,
}

#[derive(Clone, PartialEq, Message)]
pub struct QuoteEntryMessage {
    #[prost(string, tag = "1")]
    pub symbol: String,
    #[prost(message, optional, tag = "2")]
    pub quote: Option<QuoteMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QuoteBatchMessage {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<QuoteEntryMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChartEntryMessage {
    #[prost(string, tag = "1")]
    pub symbol: String,
    #[prost(message, optional, tag = "2")]
    pub chart: Option<ChartMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChartBatchMessage {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<ChartEntryMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct QuoteCacheEntryMessage {
    #[prost(string, tag = "1")]
    pub symbol: String,
    #[prost(message, optional, tag = "2")]
    pub quote: Option<QuoteMessage>,
    #[prost(int64, tag = "3")]
    pub last_update_ms: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct QuoteSnapshotMessage {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<QuoteCacheEntryMessage>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChartCacheEntryMessage {
    #[prost(string, tag = "1")]
    pub symbol: String,
    #[prost(enumeration = "IntervalMessage", tag = "2")]
    pub interval: i32,
    #[prost(message, optional, tag = "3")]
    pub chart: Option<ChartMessage>,
    #[prost(int64, tag = "4")]
    pub last_update_ms: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct ChartSnapshotMessage {
    #[prost(message, repeated, tag = "1")]
    pub entries: Vec<ChartCacheEntryMessage>,
}

fn symbol_from(raw: &str) -> Result<Symbol, StockError> {
    Symbol::parse(raw)
        .map_err(|e| StockError::malformed_response(format!("invalid symbol '{raw}': {e}")))
}

fn symbols_from(raw: Vec<String>) -> Result<Vec<Symbol>, StockError> {
    raw.iter().map(|value| symbol_from(value)).collect()
}

fn millis(value: DateTime<Utc>) -> i64 {
    value.timestamp_millis()
}

fn instant_from(millis: i64) -> Result<DateTime<Utc>, StockError> {
    DateTime::<Utc>::from_timestamp_millis(millis)
        .ok_or_else(|| StockError::malformed_date(format!("timestamp {millis}ms is out of range")))
}

fn unknown_enum(name: &str, value: i32) -> StockError {
    StockError::malformed_response(format!("unknown {name} value {value}"))
}

fn range_to_message(range: Range) -> RangeMessage {
    match range {
        Range::Unspecified => RangeMessage::Unspecified,
        Range::OneDay => RangeMessage::OneDay,
        Range::TwoYears => RangeMessage::TwoYears,
    }
}

fn range_from(value: i32) -> Result<Range, StockError> {
    match RangeMessage::try_from(value).map_err(|_| unknown_enum("range", value))? {
        RangeMessage::Unspecified => Ok(Range::Unspecified),
        RangeMessage::OneDay => Ok(Range::OneDay),
        RangeMessage::TwoYears => Ok(Range::TwoYears),
    }
}

fn interval_to_message(interval: Interval) -> IntervalMessage {
    match interval {
        Interval::Minute => IntervalMessage::Minute,
        Interval::Daily => IntervalMessage::Daily,
    }
}

fn interval_from(value: i32) -> Result<Interval, StockError> {
    match IntervalMessage::try_from(value).map_err(|_| unknown_enum("interval", value))? {
        IntervalMessage::Minute => Ok(Interval::Minute),
        IntervalMessage::Daily => Ok(Interval::Daily),
    }
}

fn source_to_message(source: Source) -> SourceMessage {
    match source {
        Source::Unspecified => SourceMessage::Unspecified,
        Source::RealTime => SourceMessage::RealTime,
        Source::FifteenMinuteDelayed => SourceMessage::FifteenMinuteDelayed,
        Source::Close => SourceMessage::Close,
        Source::PreviousClose => SourceMessage::PreviousClose,
        Source::Price => SourceMessage::Price,
        Source::LastTrade => SourceMessage::LastTrade,
    }
}

fn source_from(value: i32) -> Result<Source, StockError> {
    Ok(
        match SourceMessage::try_from(value).map_err(|_| unknown_enum("source", value))? {
            SourceMessage::Unspecified => Source::Unspecified,
            SourceMessage::RealTime => Source::RealTime,
            SourceMessage::FifteenMinuteDelayed => Source::FifteenMinuteDelayed,
            SourceMessage::Close => Source::Close,
            SourceMessage::PreviousClose => Source::PreviousClose,
            SourceMessage::Price => Source::Price,
            SourceMessage::LastTrade => Source::LastTrade,
        },
    )
}

impl WireMessage for Quote {
    type Message = QuoteMessage;

    fn to_message(&self) -> QuoteMessage {
        QuoteMessage {
            symbol: self.symbol.to_string(),
            company_name: self.company_name.clone(),
            latest_price: self.latest_price,
            latest_source: source_to_message(self.latest_source) as i32,
            latest_time_ms: self.latest_time.map(millis),
            latest_update_ms: self.latest_update.map(millis),
            latest_volume: self.latest_volume,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            change: self.change,
            change_percent: self.change_percent,
        }
    }

    fn from_message(message: QuoteMessage) -> Result<Self, StockError> {
        Ok(Self {
            symbol: symbol_from(&message.symbol)?,
            company_name: message.company_name,
            latest_price: message.latest_price,
            latest_source: source_from(message.latest_source)?,
            latest_time: message.latest_time_ms.map(instant_from).transpose()?,
            latest_update: message.latest_update_ms.map(instant_from).transpose()?,
            latest_volume: message.latest_volume,
            open: message.open,
            high: message.high,
            low: message.low,
            close: message.close,
            change: message.change,
            change_percent: message.change_percent,
        })
    }
}

impl WireMessage for Chart {
    type Message = ChartMessage;

    fn to_message(&self) -> ChartMessage {
        ChartMessage {
            symbol: self.symbol.to_string(),
            points: self
                .points()
                .iter()
                .map(|point| ChartPointMessage {
                    date_ms: millis(point.date),
                    open: point.open,
                    high: point.high,
                    low: point.low,
                    close: point.close,
                    volume: point.volume,
                    change: point.change,
                    change_percent: point.change_percent,
                })
                .collect(),
        }
    }

    fn from_message(message: ChartMessage) -> Result<Self, StockError> {
        let points = message
            .points
            .into_iter()
            .map(|point| {
                Ok(ChartPoint {
                    date: instant_from(point.date_ms)?,
                    open: point.open,
                    high: point.high,
                    low: point.low,
                    close: point.close,
                    volume: point.volume,
                    change: point.change,
                    change_percent: point.change_percent,
                })
            })
            .collect::<Result<Vec<_>, StockError>>()?;
        Ok(Chart::new(symbol_from(&message.symbol)?, points))
    }
}

impl WireMessage for QuoteRequest {
    type Message = QuoteRequestMessage;

    fn to_message(&self) -> QuoteRequestMessage {
        QuoteRequestMessage {
            symbols: self.symbols.iter().map(Symbol::to_string).collect(),
        }
    }

    fn from_message(message: QuoteRequestMessage) -> Result<Self, StockError> {
        Ok(Self::new(symbols_from(message.symbols)?))
    }
}

impl WireMessage for ChartRequest {
    type Message = ChartRequestMessage;

    fn to_message(&self) -> ChartRequestMessage {
        ChartRequestMessage {
            symbols: self.symbols.iter().map(Symbol::to_string).collect(),
            range: range_to_message(self.range) as i32,
        }
    }

    fn from_message(message: ChartRequestMessage) -> Result<Self, StockError> {
        Ok(Self::new(
            symbols_from(message.symbols)?,
            range_from(message.range)?,
        ))
    }
}

impl WireMessage for QuoteBatch {
    type Message = QuoteBatchMessage;

    fn to_message(&self) -> QuoteBatchMessage {
        QuoteBatchMessage {
            entries: self
                .quotes
                .iter()
                .map(|entry| match entry {
                    Lookup::Found(quote) => QuoteEntryMessage {
                        symbol: quote.symbol.to_string(),
                        quote: Some(quote.to_message()),
                    },
                    Lookup::NotFound { symbol } => QuoteEntryMessage {
                        symbol: symbol.to_string(),
                        quote: None,
                    },
                })
                .collect(),
        }
    }

    fn from_message(message: QuoteBatchMessage) -> Result<Self, StockError> {
        let quotes = message
            .entries
            .into_iter()
            .map(|entry| match entry.quote {
                Some(quote) => Quote::from_message(quote).map(Lookup::Found),
                None => Ok(Lookup::NotFound {
                    symbol: symbol_from(&entry.symbol)?,
                }),
            })
            .collect::<Result<Vec<_>, StockError>>()?;
        Ok(Self { quotes })
    }
}

impl WireMessage for ChartBatch {
    type Message = ChartBatchMessage;

    fn to_message(&self) -> ChartBatchMessage {
        ChartBatchMessage {
            entries: self
                .charts
                .iter()
                .map(|entry| match entry {
                    Lookup::Found(chart) => ChartEntryMessage {
                        symbol: chart.symbol.to_string(),
                        chart: Some(chart.to_message()),
                    },
                    Lookup::NotFound { symbol } => ChartEntryMessage {
                        symbol: symbol.to_string(),
                        chart: None,
                    },
                })
                .collect(),
        }
    }

    fn from_message(message: ChartBatchMessage) -> Result<Self, StockError> {
        let charts = message
            .entries
            .into_iter()
            .map(|entry| match entry.chart {
                Some(chart) => Chart::from_message(chart).map(Lookup::Found),
                None => Ok(Lookup::NotFound {
                    symbol: symbol_from(&entry.symbol)?,
                }),
            })
            .collect::<Result<Vec<_>, StockError>>()?;
        Ok(Self { charts })
    }
}

impl WireMessage for Snapshot<QuoteCacheKey, Quote> {
    type Message = QuoteSnapshotMessage;

    fn to_message(&self) -> QuoteSnapshotMessage {
        QuoteSnapshotMessage {
            entries: self
                .entries
                .iter()
                .map(|(key, value)| QuoteCacheEntryMessage {
                    symbol: key.symbol.to_string(),
                    quote: Some(value.value.to_message()),
                    last_update_ms: millis(value.last_update_time),
                })
                .collect(),
        }
    }

    fn from_message(message: QuoteSnapshotMessage) -> Result<Self, StockError> {
        let entries = message
            .entries
            .into_iter()
            .map(|entry| {
                let symbol = symbol_from(&entry.symbol)?;
                let quote = entry.quote.ok_or_else(|| {
                    StockError::malformed_response(format!("snapshot entry {symbol} has no quote"))
                })?;
                Ok((
                    QuoteCacheKey { symbol },
                    CacheValue {
                        value: Quote::from_message(quote)?,
                        last_update_time: instant_from(entry.last_update_ms)?,
                    },
                ))
            })
            .collect::<Result<Vec<_>, StockError>>()?;
        Ok(Self { entries })
    }
}

impl WireMessage for Snapshot<ChartCacheKey, Chart> {
    type Message = ChartSnapshotMessage;

    fn to_message(&self) -> ChartSnapshotMessage {
        ChartSnapshotMessage {
            entries: self
                .entries
                .iter()
                .map(|(key, value)| ChartCacheEntryMessage {
                    symbol: key.symbol.to_string(),
                    interval: interval_to_message(key.interval) as i32,
                    chart: Some(value.value.to_message()),
                    last_update_ms: millis(value.last_update_time),
                })
                .collect(),
        }
    }

    fn from_message(message: ChartSnapshotMessage) -> Result<Self, StockError> {
        let entries = message
            .entries
            .into_iter()
            .map(|entry| {
                let symbol = symbol_from(&entry.symbol)?;
                let chart = entry.chart.ok_or_else(|| {
                    StockError::malformed_response(format!("snapshot entry {symbol} has no chart"))
                })?;
                Ok((
                    ChartCacheKey {
                        symbol,
                        interval: interval_from(entry.interval)?,
                    },
                    CacheValue {
                        value: Chart::from_message(chart)?,
                        last_update_time: instant_from(entry.last_update_ms)?,
                    },
                ))
            })
            .collect::<Result<Vec<_>, StockError>>()?;
        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::ErrorKind;

    fn symbol(raw: &str) -> Symbol {
        Symbol::parse(raw).unwrap()
    }

    fn sample_quote() -> Quote {
        Quote {
            symbol: symbol("AAPL"),
            company_name: String::from("Apple Inc."),
            latest_price: 150.25,
            latest_source: Source::FifteenMinuteDelayed,
            latest_time: Some(Utc.with_ymd_and_hms(2017, 7, 7, 17, 5, 9).unwrap()),
            latest_update: DateTime::<Utc>::from_timestamp_millis(1_499_447_109_123),
            latest_volume: 1_234_567,
            open: 149.5,
            high: 151.0,
            low: 148.75,
            close: 150.0,
            change: 0.25,
            change_percent: 0.0017,
        }
    }

    fn sample_chart() -> Chart {
        let points = (5..=7)
            .map(|day| ChartPoint {
                date: Utc.with_ymd_and_hms(2017, 7, day, 4, 0, 0).unwrap(),
                open: day as f32,
                high: day as f32 + 1.0,
                low: day as f32 - 1.0,
                close: day as f32 + 0.5,
                volume: i64::from(day) * 1_000,
                change: 0.5,
                change_percent: 0.1,
            })
            .collect();
        Chart::new(symbol("MSFT"), points)
    }

    #[test]
    fn requests_round_trip() {
        let quotes = QuoteRequest::new(vec![symbol("AAPL"), symbol("MSFT")]);
        assert_eq!(decode::<QuoteRequest>(&encode(&quotes)).unwrap(), quotes);

        let charts = ChartRequest::new(vec![symbol("SPY")], Range::TwoYears);
        assert_eq!(decode::<ChartRequest>(&encode(&charts)).unwrap(), charts);

        let unspecified = ChartRequest::new(Vec::new(), Range::Unspecified);
        assert_eq!(
            decode::<ChartRequest>(&encode(&unspecified)).unwrap(),
            unspecified
        );
    }

    #[test]
    fn batches_round_trip_including_not_found_entries() {
        let quotes = QuoteBatch {
            quotes: vec![
                Lookup::Found(sample_quote()),
                Lookup::NotFound {
                    symbol: symbol("ZZZZ"),
                },
            ],
        };
        assert_eq!(decode::<QuoteBatch>(&encode(&quotes)).unwrap(), quotes);

        let charts = ChartBatch {
            charts: vec![
                Lookup::NotFound {
                    symbol: symbol("ZZZZ"),
                },
                Lookup::Found(sample_chart()),
                Lookup::Found(Chart::empty(symbol("QQQ"))),
            ],
        };
        assert_eq!(decode::<ChartBatch>(&encode(&charts)).unwrap(), charts);
    }

    #[test]
    fn snapshots_round_trip() {
        let stamped = Utc.with_ymd_and_hms(2017, 7, 7, 20, 0, 0).unwrap();
        let snapshot = Snapshot {
            entries: vec![(
                ChartCacheKey {
                    symbol: symbol("MSFT"),
                    interval: Interval::Daily,
                },
                CacheValue {
                    value: sample_chart(),
                    last_update_time: stamped,
                },
            )],
        };
        let decoded: Snapshot<ChartCacheKey, Chart> = decode(&encode(&snapshot)).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn rejects_invalid_symbols_and_enums() {
        let message = QuoteRequestMessage {
            symbols: vec![String::from("lower1")],
        };
        let error = decode::<QuoteRequest>(&message.encode_to_vec()).expect_err("must fail");
        assert_eq!(error.kind(), ErrorKind::MalformedResponse);

        let message = ChartRequestMessage {
            symbols: vec![String::from("SPY")],
            range: 42,
        };
        let error = decode::<ChartRequest>(&message.encode_to_vec()).expect_err("must fail");
        assert_eq!(error.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn rejects_garbage_bytes() {
        let error = decode::<ChartBatch>(&[0xff, 0xff, 0xff]).expect_err("must fail");
        assert_eq!(error.kind(), ErrorKind::MalformedResponse);
    }
}
