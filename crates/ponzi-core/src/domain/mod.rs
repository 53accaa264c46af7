//! # Domain Models
//!
//! Canonical market-data types shared by the codec, caches and planner.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Symbol`] | Validated ticker (`^[A-Z]{1,5}$`) |
//! | [`Range`] | Upstream chart window (`1d`, `2y`) |
//! | [`Interval`] | Cache resolution (minute, daily) |
//! | [`Source`] | Quote freshness classification |
//! | [`Quote`] | Latest quote for a symbol |
//! | [`ChartPoint`] / [`Chart`] | OHLCV bars, ascending by date |
//! | [`Lookup`] | Per-symbol found / not-found outcome |

mod models;
mod range;
mod source;
mod symbol;

pub use models::{canonical_date, Chart, ChartPoint, Lookup, Quote};
pub use range::{Interval, Range};
pub use source::{LatestTimeFormat, Source};
pub use symbol::Symbol;
