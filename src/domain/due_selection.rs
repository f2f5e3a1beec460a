use chrono::{Days, NaiveDate};

use crate::domain::entities::subscription::SubscriptionRecord;

/// How a renewal date is compared against the reference day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueComparator {
    /// Renewal pass: renewal date strictly before the reference day.
    LessThan,
    /// Reminder pass: renewal date on the day after the reference day.
    EqualTo,
}

impl DueComparator {
    pub fn matches(&self, renewal_date: NaiveDate, reference: NaiveDate) -> bool {
        match self {
            DueComparator::LessThan => renewal_date < reference,
            DueComparator::EqualTo => Some(renewal_date) == day_after(reference),
        }
    }
}

/// The calendar day after `day`, if representable.
pub fn day_after(day: NaiveDate) -> Option<NaiveDate> {
    day.checked_add_days(Days::new(1))
}

/// Active records whose renewal date matches `reference` under `comparator`.
///
/// Input order is kept. An empty result is a normal outcome.
pub fn select_due(
    records: Vec<SubscriptionRecord>,
    reference: NaiveDate,
    comparator: DueComparator,
) -> Vec<SubscriptionRecord> {
    records
        .into_iter()
        .filter(|r| r.status.is_active())
        .filter(|r| comparator.matches(r.next_renewal_date, reference))
        .collect()
}
