//! Calendar-month windows used by the revenue and unpaid-item queries.

use crate::error::{CoreError, CoreResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One calendar month (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub year: i32,
    pub month: u32,
}

impl BillingPeriod {
    /// Validates `month` in `1..=12` and that the month is representable.
    pub fn new(year: i32, month: u32) -> CoreResult<Self> {
        if !(1..=12).contains(&month) {
            return Err(CoreError::validation(format!(
                "month must be between 1 and 12, got {month}"
            )));
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            return Err(CoreError::validation(format!("year out of range: {year}")));
        }
        Ok(Self { year, month })
    }

    /// Half-open `[start, end)` epoch-millisecond bounds of the month.
    pub fn bounds_ms(&self) -> CoreResult<(i64, i64)> {
        let start = first_day_ms(self.year, self.month)?;
        let end = if self.month == 12 {
            first_day_ms(self.year + 1, 1)?
        } else {
            first_day_ms(self.year, self.month + 1)?
        };
        Ok((start, end))
    }
}

impl std::fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

fn first_day_ms(year: i32, month: u32) -> CoreResult<i64> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| datetime.and_utc().timestamp_millis())
        .ok_or_else(|| CoreError::validation(format!("year out of range: {year}")))
}

#[cfg(test)]
mod tests {
    use super::BillingPeriod;
    use crate::error::ErrorKind;

    #[test]
    fn rejects_month_outside_calendar() {
        assert_eq!(
            BillingPeriod::new(2026, 0).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            BillingPeriod::new(2026, 13).unwrap_err().kind(),
            ErrorKind::Validation
        );
    }

    #[test]
    fn march_bounds_cover_whole_month() {
        let (start, end) = BillingPeriod::new(2026, 3).unwrap().bounds_ms().unwrap();
        // 2026-03-01T00:00:00Z and 2026-04-01T00:00:00Z
        assert_eq!(start, 1_772_323_200_000);
        assert_eq!(end, 1_775_001_600_000);
    }

    #[test]
    fn december_rolls_into_next_year() {
        let (start, end) = BillingPeriod::new(2025, 12).unwrap().bounds_ms().unwrap();
        assert_eq!(end - start, 31 * 24 * 60 * 60 * 1000);
    }
}
