use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::{billing_cycle::BillingCycle, subscription_status::SubscriptionStatus};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub service_name: String,
    pub cost: Decimal,
    pub billing_cycle: BillingCycle,
    pub status: SubscriptionStatus,
    pub next_renewal_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    /// Cost spread over one month. Yearly subscriptions count a twelfth.
    pub fn monthly_cost(&self) -> Decimal {
        match self.billing_cycle {
            BillingCycle::Monthly => self.cost,
            BillingCycle::Yearly => self.cost / Decimal::from(12),
        }
    }
}

/// Subscription as stored, before validation.
///
/// Status and billing cycle are free text in storage; a row only becomes a
/// `SubscriptionRecord` once both parse and the cost is non-negative.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredSubscription {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub service_name: String,
    pub cost: Decimal,
    pub billing_cycle: String,
    pub status: String,
    pub next_renewal_date: NaiveDate,
    pub updated_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<StoredSubscription> for SubscriptionRecord {
    type Error = String;

    fn try_from(stored: StoredSubscription) -> Result<Self, Self::Error> {
        let billing_cycle: BillingCycle = stored.billing_cycle.parse()?;
        let status: SubscriptionStatus = stored.status.parse()?;
        if stored.cost < Decimal::ZERO {
            return Err(format!("Negative cost: {}", stored.cost));
        }

        Ok(SubscriptionRecord {
            id: stored.id,
            owner_id: stored.owner_id,
            service_name: stored.service_name,
            cost: stored.cost,
            billing_cycle,
            status,
            next_renewal_date: stored.next_renewal_date,
            updated_at: stored.updated_at,
            created_at: stored.created_at,
        })
    }
}

/// One staged renewal: the only field change the engine ever makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalUpdate {
    pub id: Uuid,
    pub previous_renewal_date: NaiveDate,
    pub next_renewal_date: NaiveDate,
}
