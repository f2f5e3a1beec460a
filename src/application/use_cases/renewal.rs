use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    app_error::AppResult,
    domain::{
        due_selection::{DueComparator, select_due},
        entities::subscription::{RenewalUpdate, SubscriptionRecord},
        renewal_date::advance_renewal_date,
    },
};

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    /// All active subscriptions that passed validation.
    async fn list_active(&self) -> AppResult<Vec<SubscriptionRecord>>;

    async fn list_active_for_owner(&self, owner_id: Uuid) -> AppResult<Vec<SubscriptionRecord>>;

    /// Active subscriptions with a renewal date strictly before `cutoff`.
    ///
    /// Stores that can filter on their side override this; the default filters
    /// the full active set.
    async fn list_active_due_before(&self, cutoff: NaiveDate) -> AppResult<Vec<SubscriptionRecord>> {
        let active = self.list_active().await?;
        Ok(active
            .into_iter()
            .filter(|s| s.next_renewal_date < cutoff)
            .collect())
    }

    /// Active subscriptions renewing exactly on `day`.
    async fn list_active_renewing_on(&self, day: NaiveDate) -> AppResult<Vec<SubscriptionRecord>> {
        let active = self.list_active().await?;
        Ok(active
            .into_iter()
            .filter(|s| s.next_renewal_date == day)
            .collect())
    }

    /// Applies every update or none of them, stamping `updated_at` with the
    /// store's clock. An update whose stored date no longer equals
    /// `previous_renewal_date` is left alone. Returns the number of rows changed.
    async fn commit_renewals(&self, updates: &[RenewalUpdate]) -> AppResult<u64>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenewalOutcome {
    pub updated_count: u64,
}

#[derive(Clone)]
pub struct RenewalUseCases {
    repo: Arc<dyn SubscriptionRepo>,
}

impl RenewalUseCases {
    pub fn new(repo: Arc<dyn SubscriptionRepo>) -> Self {
        Self { repo }
    }

    /// Advances every active subscription due before `today` by one billing
    /// cycle in a single atomic commit.
    ///
    /// A commit failure is returned as is and nothing is applied, so the pass
    /// can simply run again.
    #[instrument(skip(self))]
    pub async fn run_renewal_pass(&self, today: NaiveDate) -> AppResult<RenewalOutcome> {
        let candidates = self.repo.list_active_due_before(today).await?;
        let due = select_due(candidates, today, DueComparator::LessThan);

        let updates = stage_renewals(&due);
        if updates.is_empty() {
            info!("No subscriptions due for renewal");
            return Ok(RenewalOutcome { updated_count: 0 });
        }

        let updated_count = self.repo.commit_renewals(&updates).await?;
        if updated_count < updates.len() as u64 {
            tracing::warn!(
                staged = updates.len(),
                updated = updated_count,
                "Some subscriptions changed since they were read and were not renewed"
            );
        }

        info!(count = updated_count, "Updated subscriptions");
        Ok(RenewalOutcome { updated_count })
    }
}

fn stage_renewals(due: &[SubscriptionRecord]) -> Vec<RenewalUpdate> {
    due.iter()
        .map(|s| RenewalUpdate {
            id: s.id,
            previous_renewal_date: s.next_renewal_date,
            next_renewal_date: advance_renewal_date(s.next_renewal_date, s.billing_cycle),
        })
        .collect()
}
