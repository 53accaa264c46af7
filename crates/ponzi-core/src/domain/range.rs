use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Upstream window tag for chart requests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Range {
    #[default]
    #[serde(rename = "unspecified")]
    Unspecified,
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "2y")]
    TwoYears,
}

impl Range {
    /// Query value understood by the upstream, if the range is usable.
    pub const fn query_value(self) -> Option<&'static str> {
        match self {
            Self::Unspecified => None,
            Self::OneDay => Some("1d"),
            Self::TwoYears => Some("2y"),
        }
    }

    /// Storage resolution used for cache keys.
    pub const fn interval(self) -> Option<Interval> {
        match self {
            Self::Unspecified => None,
            Self::OneDay => Some(Interval::Minute),
            Self::TwoYears => Some(Interval::Daily),
        }
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.query_value().unwrap_or("unspecified"))
    }
}

impl FromStr for Range {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "1d" => Ok(Self::OneDay),
            "2y" => Ok(Self::TwoYears),
            other => Err(ValidationError::InvalidRange {
                value: other.to_owned(),
            }),
        }
    }
}

/// Storage-side resolution, part of the chart cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interval {
    Minute,
    Daily,
}

impl Interval {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Daily => "daily",
        }
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
