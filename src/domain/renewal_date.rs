//! Calendar arithmetic for renewal dates.
//!
//! Renewal dates are plain calendar days. Instants are brought down to a day in
//! the operational timezone with [`normalize_to_day`] before any comparison.

use chrono::{DateTime, Months, NaiveDate, TimeZone, Utc};

use crate::domain::entities::billing_cycle::BillingCycle;

/// Next renewal date one billing cycle after `current`.
///
/// Month arithmetic clamps to the last day of the target month, so Jan 31
/// becomes Feb 28 (or Feb 29) and a yearly Feb 29 becomes Feb 28 on a
/// non-leap year. Saturates at `NaiveDate::MAX`.
pub fn advance_renewal_date(current: NaiveDate, cycle: BillingCycle) -> NaiveDate {
    current
        .checked_add_months(Months::new(cycle.months()))
        .unwrap_or(NaiveDate::MAX)
}

/// Calendar day of `instant` in `tz`, i.e. the instant truncated to local midnight.
pub fn normalize_to_day<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> NaiveDate {
    instant.with_timezone(tz).date_naive()
}
