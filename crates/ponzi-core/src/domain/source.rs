use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Freshness classification of a quote's latest price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    #[default]
    Unspecified,
    RealTime,
    FifteenMinuteDelayed,
    Close,
    PreviousClose,
    Price,
    LastTrade,
}

/// Upstream wording for each source. Anything else is rejected.
const UPSTREAM_NAMES: [(&str, Source); 6] = [
    ("IEX real time price", Source::RealTime),
    ("15 minute delayed price", Source::FifteenMinuteDelayed),
    ("Close", Source::Close),
    ("Previous close", Source::PreviousClose),
    ("IEX price", Source::Price),
    ("Last trade", Source::LastTrade),
];

/// How the upstream reports `latestTime` for a given source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatestTimeFormat {
    /// `3:04:05 PM`, a wall-clock time on the current trading day.
    TimeOfDay,
    /// `January 2, 2006`, a calendar date.
    CalendarDate,
}

impl Source {
    /// Map the upstream's textual source. Empty means the field was not sent.
    pub fn from_upstream(value: &str) -> Result<Self, ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Ok(Self::Unspecified);
        }
        UPSTREAM_NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(trimmed))
            .map(|(_, source)| *source)
            .ok_or_else(|| ValidationError::UnknownSource {
                value: trimmed.to_owned(),
            })
    }

    pub const fn latest_time_format(self) -> Option<LatestTimeFormat> {
        match self {
            Self::Unspecified => None,
            Self::RealTime | Self::FifteenMinuteDelayed | Self::Price | Self::LastTrade => {
                Some(LatestTimeFormat::TimeOfDay)
            }
            Self::Close | Self::PreviousClose => Some(LatestTimeFormat::CalendarDate),
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unspecified => "unspecified",
            Self::RealTime => "real_time",
            Self::FifteenMinuteDelayed => "fifteen_minute_delayed",
            Self::Close => "close",
            Self::PreviousClose => "previous_close",
            Self::Price => "price",
            Self::LastTrade => "last_trade",
        }
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_upstream_sources() {
        assert_eq!(
            Source::from_upstream("IEX real time price"),
            Ok(Source::RealTime)
        );
        assert_eq!(Source::from_upstream("Previous close"), Ok(Source::PreviousClose));
        assert_eq!(Source::from_upstream(""), Ok(Source::Unspecified));
    }

    #[test]
    fn rejects_unknown_upstream_source() {
        assert!(matches!(
            Source::from_upstream("Carrier pigeon"),
            Err(ValidationError::UnknownSource { .. })
        ));
    }

    #[test]
    fn close_sources_report_calendar_dates() {
        assert_eq!(
            Source::Close.latest_time_format(),
            Some(LatestTimeFormat::CalendarDate)
        );
        assert_eq!(
            Source::FifteenMinuteDelayed.latest_time_format(),
            Some(LatestTimeFormat::TimeOfDay)
        );
    }
}
