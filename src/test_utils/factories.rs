//! Test data factories for creating valid test fixtures.
//!
//! Each factory function creates a complete, valid object with sensible defaults.
//! Use the closure parameter to override specific fields as needed.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::entities::{
    billing_cycle::BillingCycle, subscription::SubscriptionRecord,
    subscription_status::SubscriptionStatus,
};

/// Create an active monthly subscription with sensible defaults.
pub fn create_test_subscription(
    overrides: impl FnOnce(&mut SubscriptionRecord),
) -> SubscriptionRecord {
    let mut sub = SubscriptionRecord {
        id: Uuid::new_v4(),
        owner_id: Uuid::new_v4(),
        service_name: "Streaming Plus".to_string(),
        cost: dec("9.99"),
        billing_cycle: BillingCycle::Monthly,
        status: SubscriptionStatus::Active,
        next_renewal_date: date(2025, 3, 1),
        updated_at: test_datetime(),
        created_at: test_datetime(),
    };
    overrides(&mut sub);
    sub
}

/// Fixed timestamp well in the past, so store-assigned timestamps compare greater.
pub fn test_datetime() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}
