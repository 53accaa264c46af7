use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::Serialize;

use crate::{Source, Symbol};

/// Latest quote for one symbol.
///
/// `latest_time` is what the upstream reports for humans (a time of day or a
/// calendar date depending on `latest_source`), while `latest_update` is the
/// upstream's millisecond epoch. Both are kept as reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub symbol: Symbol,
    pub company_name: String,
    pub latest_price: f32,
    pub latest_source: Source,
    pub latest_time: Option<DateTime<Utc>>,
    pub latest_update: Option<DateTime<Utc>>,
    pub latest_volume: i64,
    pub open: f32,
    pub high: f32,
    pub low: f32,
    pub close: f32,
    pub change: f32,
    pub change_percent: f32,
}

impl Quote {
    /// A quote carrying only a symbol, every other field zeroed.
    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            company_name: String::new(),
            latest_price: 0.0,
            latest_source: Source::Unspecified,
            latest_time: None,
            latest_update: None,
            latest_volume: 0,
            open: 0.0,
            high: 0.0,
            low: 0.0,
            close: 0.0,
            change: 0.0,
            change_percent: 0.0,
        }
    }
}

/// One OHLCV bar.
///
/// `date` is the instant whose wall-clock in the reference timezone is the
/// bar's session date (daily bars) or minute (intraday bars).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub date: DateTime<Utc>,
    pub open: f32,
    pub high: f32,
    pub low: f32,
    pub close: f32,
    pub volume: i64,
    pub change: f32,
    pub change_percent: f32,
}

/// Canonical form used to compare bar dates.
pub fn canonical_date(date: DateTime<Utc>) -> DateTime<Utc> {
    date.trunc_subsecs(0)
}

/// Time series for one symbol. Points are strictly ascending by date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub symbol: Symbol,
    points: Vec<ChartPoint>,
}

impl Chart {
    /// Build a chart, sorting points and keeping the last point seen for a date.
    pub fn new(symbol: Symbol, points: Vec<ChartPoint>) -> Self {
        let mut by_date = BTreeMap::new();
        insert_points(&mut by_date, points);
        Self {
            symbol,
            points: by_date.into_values().collect(),
        }
    }

    pub fn empty(symbol: Symbol) -> Self {
        Self {
            symbol,
            points: Vec::new(),
        }
    }

    pub fn points(&self) -> &[ChartPoint] {
        &self.points
    }

    pub fn into_points(self) -> Vec<ChartPoint> {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn latest(&self) -> Option<&ChartPoint> {
        self.points.last()
    }

    /// The last `count` points.
    pub fn tail(&self, count: usize) -> &[ChartPoint] {
        let start = self.points.len().saturating_sub(count);
        &self.points[start..]
    }

    /// Union of both charts by date; `newer` wins on collision.
    pub fn merged_with(&self, newer: &Chart) -> Chart {
        let mut by_date = BTreeMap::new();
        insert_points(&mut by_date, self.points.iter().cloned());
        insert_points(&mut by_date, newer.points.iter().cloned());
        Chart {
            symbol: self.symbol.clone(),
            points: by_date.into_values().collect(),
        }
    }
}

fn insert_points(
    by_date: &mut BTreeMap<DateTime<Utc>, ChartPoint>,
    points: impl IntoIterator<Item = ChartPoint>,
) {
    for mut point in points {
        point.date = canonical_date(point.date);
        by_date.insert(point.date, point);
    }
}

/// Per-symbol outcome inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Lookup<T> {
    Found(T),
    NotFound { symbol: Symbol },
}

impl<T> Lookup<T> {
    pub fn found(&self) -> Option<&T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn point(day: u32, close: f32) -> ChartPoint {
        ChartPoint {
            date: Utc.with_ymd_and_hms(2017, 7, day, 4, 0, 0).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 100,
            change: 0.0,
            change_percent: 0.0,
        }
    }

    #[test]
    fn new_chart_sorts_and_deduplicates_points() {
        let symbol = Symbol::parse("MSFT").unwrap();
        let chart = Chart::new(symbol, vec![point(7, 3.0), point(5, 1.0), point(7, 4.0)]);

        let closes: Vec<_> = chart.points().iter().map(|p| p.close).collect();
        assert_eq!(closes, [1.0, 4.0]);
    }

    #[test]
    fn merge_prefers_newer_points_on_collision() {
        let symbol = Symbol::parse("MSFT").unwrap();
        let cached = Chart::new(symbol.clone(), vec![point(5, 1.0), point(6, 2.0)]);
        let fresh = Chart::new(symbol, vec![point(6, 20.0), point(7, 3.0)]);

        let merged = cached.merged_with(&fresh);
        let closes: Vec<_> = merged.points().iter().map(|p| p.close).collect();
        assert_eq!(closes, [1.0, 20.0, 3.0]);
    }

    #[test]
    fn merge_treats_subsecond_differences_as_same_date() {
        let symbol = Symbol::parse("MSFT").unwrap();
        let mut jittered = point(5, 9.0);
        jittered.date += chrono::Duration::milliseconds(250);
        let merged = Chart::new(symbol.clone(), vec![point(5, 1.0)])
            .merged_with(&Chart::new(symbol, vec![jittered]));

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.points()[0].close, 9.0);
    }

    #[test]
    fn tail_returns_last_points() {
        let symbol = Symbol::parse("MSFT").unwrap();
        let chart = Chart::new(symbol, vec![point(5, 1.0), point(6, 2.0), point(7, 3.0)]);
        assert_eq!(chart.tail(2).len(), 2);
        assert_eq!(chart.tail(10).len(), 3);
        assert_eq!(chart.tail(2)[0].close, 2.0);
    }
}
