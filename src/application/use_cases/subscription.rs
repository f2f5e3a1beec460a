use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    app_error::AppResult, domain::entities::subscription::SubscriptionRecord,
    use_cases::renewal::SubscriptionRepo,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpendSummary {
    pub active_count: usize,
    /// Monthly-equivalent spend, rounded to cents.
    pub monthly_total: Decimal,
}

#[derive(Clone)]
pub struct SubscriptionUseCases {
    repo: Arc<dyn SubscriptionRepo>,
}

impl SubscriptionUseCases {
    pub fn new(repo: Arc<dyn SubscriptionRepo>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self))]
    pub async fn spend_summary(&self, owner_id: Uuid) -> AppResult<SpendSummary> {
        self.spend_summary_for_owners(&[owner_id]).await
    }

    /// Combined summary for several owners, e.g. everyone reached at one address.
    #[instrument(skip(self))]
    pub async fn spend_summary_for_owners(&self, owner_ids: &[Uuid]) -> AppResult<SpendSummary> {
        let mut active = Vec::new();
        for owner_id in owner_ids {
            active.extend(self.repo.list_active_for_owner(*owner_id).await?);
        }
        Ok(summarize(&active))
    }
}

/// Sums monthly-equivalent costs before rounding, so twelve yearly plans at
/// 1.00 add up to exactly 1.00 a month.
pub fn summarize(subscriptions: &[SubscriptionRecord]) -> SpendSummary {
    let active: Vec<&SubscriptionRecord> =
        subscriptions.iter().filter(|s| s.status.is_active()).collect();
    let total: Decimal = active.iter().map(|s| s.monthly_cost()).sum();

    SpendSummary {
        active_count: active.len(),
        monthly_total: total.round_dp(2),
    }
}
