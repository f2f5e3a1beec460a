use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    domain::entities::subscription::{RenewalUpdate, StoredSubscription, SubscriptionRecord},
    use_cases::renewal::SubscriptionRepo,
};

const SELECT_COLS: &str = r#"
    id, owner_id, service_name, cost, billing_cycle, status,
    next_renewal_date, updated_at, created_at
"#;

/// Validates rows at the boundary. Malformed rows are logged and left out.
fn into_records(rows: Vec<StoredSubscription>) -> Vec<SubscriptionRecord> {
    rows.into_iter()
        .filter_map(|row| {
            let id = row.id;
            match SubscriptionRecord::try_from(row) {
                Ok(record) => Some(record),
                Err(reason) => {
                    tracing::warn!(
                        entity_type = "subscription",
                        entity_id = %id,
                        reason = %reason,
                        "Skipping malformed subscription row"
                    );
                    None
                }
            }
        })
        .collect()
}

#[async_trait]
impl SubscriptionRepo for PostgresPersistence {
    async fn list_active(&self) -> AppResult<Vec<SubscriptionRecord>> {
        let rows = sqlx::query_as::<_, StoredSubscription>(&format!(
            "SELECT {} FROM subscriptions WHERE lower(status) = 'active'",
            SELECT_COLS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(into_records(rows))
    }

    async fn list_active_for_owner(&self, owner_id: Uuid) -> AppResult<Vec<SubscriptionRecord>> {
        let rows = sqlx::query_as::<_, StoredSubscription>(&format!(
            "SELECT {} FROM subscriptions WHERE owner_id = $1 AND lower(status) = 'active'",
            SELECT_COLS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(into_records(rows))
    }

    async fn list_active_due_before(&self, cutoff: NaiveDate) -> AppResult<Vec<SubscriptionRecord>> {
        let rows = sqlx::query_as::<_, StoredSubscription>(&format!(
            "SELECT {} FROM subscriptions WHERE lower(status) = 'active' AND next_renewal_date < $1",
            SELECT_COLS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(into_records(rows))
    }

    async fn list_active_renewing_on(&self, day: NaiveDate) -> AppResult<Vec<SubscriptionRecord>> {
        let rows = sqlx::query_as::<_, StoredSubscription>(&format!(
            "SELECT {} FROM subscriptions WHERE lower(status) = 'active' AND next_renewal_date = $1",
            SELECT_COLS
        ))
        .bind(day)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(into_records(rows))
    }

    async fn commit_renewals(&self, updates: &[RenewalUpdate]) -> AppResult<u64> {
        if updates.is_empty() {
            return Ok(0);
        }

        let ids: Vec<Uuid> = updates.iter().map(|u| u.id).collect();
        let next_dates: Vec<NaiveDate> = updates.iter().map(|u| u.next_renewal_date).collect();
        let previous_dates: Vec<NaiveDate> =
            updates.iter().map(|u| u.previous_renewal_date).collect();

        let mut tx = self.pool.begin().await.map_err(AppError::from)?;

        // Rows whose date moved since they were read don't match and stay untouched.
        let result = sqlx::query(
            r#"
            UPDATE subscriptions AS s
            SET next_renewal_date = u.next_date, updated_at = now()
            FROM UNNEST($1::uuid[], $2::date[], $3::date[]) AS u(id, next_date, previous_date)
            WHERE s.id = u.id
              AND s.next_renewal_date = u.previous_date
              AND lower(s.status) = 'active'
            "#,
        )
        .bind(ids)
        .bind(next_dates)
        .bind(previous_dates)
        .execute(&mut *tx)
        .await
        .map_err(AppError::from)?;

        tx.commit().await.map_err(AppError::from)?;
        Ok(result.rows_affected())
    }
}
