//! Injectable wall clock and the business-day calendar.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;

use crate::StockError;

/// Default reference timezone for all upstream dates.
pub const DEFAULT_TIMEZONE: &str = "America/New_York";

type NowFn = dyn Fn() -> DateTime<Utc> + Send + Sync;

/// Source of "now" plus the reference timezone used for date arithmetic.
#[derive(Clone)]
pub struct Clock {
    tz: Tz,
    now: Arc<NowFn>,
}

impl Clock {
    /// Clock backed by the system time.
    pub fn system(tz: Tz) -> Self {
        Self {
            tz,
            now: Arc::new(Utc::now),
        }
    }

    /// Clock frozen at `instant`.
    pub fn fixed(tz: Tz, instant: DateTime<Utc>) -> Self {
        Self {
            tz,
            now: Arc::new(move || instant),
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now)()
    }

    /// Calendar date of `instant` in the reference timezone.
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Interpret a wall-clock date-time in the reference timezone.
    ///
    /// Times skipped by a DST transition are rejected; repeated times resolve
    /// to the earlier instant.
    pub fn localize(&self, local: NaiveDateTime) -> Result<DateTime<Utc>, StockError> {
        self.tz
            .from_local_datetime(&local)
            .earliest()
            .map(|value| value.with_timezone(&Utc))
            .ok_or_else(|| {
                StockError::malformed_date(format!(
                    "{local} does not exist in timezone {}",
                    self.tz
                ))
            })
    }

    /// Midnight of `date` in the reference timezone.
    pub fn midnight(&self, date: NaiveDate) -> Result<DateTime<Utc>, StockError> {
        self.localize(date.and_time(chrono::NaiveTime::MIN))
    }
}

impl Debug for Clock {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock").field("tz", &self.tz).finish_non_exhaustive()
    }
}

/// Parse a timezone name such as `America/New_York`.
pub fn parse_timezone(name: &str) -> Result<Tz, String> {
    name.trim()
        .parse::<Tz>()
        .map_err(|error| format!("unknown timezone '{name}': {error}"))
}

pub fn is_business_day(date: NaiveDate) -> bool {
    !matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// Number of weekdays `d` with `from < d <= to`. Zero when `from >= to`.
///
/// Exchange holidays are not consulted.
pub fn business_days_between(from: NaiveDate, to: NaiveDate) -> u32 {
    from.iter_days()
        .skip(1)
        .take_while(|day| *day <= to)
        .filter(|day| is_business_day(*day))
        .fold(0, |count, _| count + 1)
}
