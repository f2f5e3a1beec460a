use std::collections::HashSet;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    use_cases::reminder::{ReminderLogEntry, ReminderLogRepo},
};

#[async_trait]
impl ReminderLogRepo for PostgresPersistence {
    async fn owners_notified_on(&self, day: NaiveDate) -> AppResult<HashSet<Uuid>> {
        let owners: Vec<Uuid> = sqlx::query_scalar(
            "SELECT DISTINCT owner_id FROM reminder_notifications WHERE sent_on = $1",
        )
        .bind(day)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::from)?;
        Ok(owners.into_iter().collect())
    }

    async fn record_sent(&self, entries: &[ReminderLogEntry]) -> AppResult<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let owner_ids: Vec<Uuid> = entries.iter().map(|e| e.owner_id).collect();
        let emails: Vec<String> = entries.iter().map(|e| e.contact.clone()).collect();
        let subscription_ids: Vec<Uuid> = entries.iter().map(|e| e.subscription_id).collect();
        let names: Vec<String> = entries.iter().map(|e| e.service_name.clone()).collect();
        let renewal_dates: Vec<NaiveDate> = entries.iter().map(|e| e.renewal_date).collect();
        let amounts: Vec<Decimal> = entries.iter().map(|e| e.amount).collect();
        let sent_on: Vec<NaiveDate> = entries.iter().map(|e| e.sent_on).collect();

        sqlx::query(
            r#"
            INSERT INTO reminder_notifications
                (owner_id, email, subscription_id, subscription_name, renewal_date, amount, sent_on)
            SELECT * FROM UNNEST(
                $1::uuid[], $2::text[], $3::uuid[], $4::text[], $5::date[], $6::numeric[], $7::date[]
            )
            "#,
        )
        .bind(owner_ids)
        .bind(emails)
        .bind(subscription_ids)
        .bind(names)
        .bind(renewal_dates)
        .bind(amounts)
        .bind(sent_on)
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;

        Ok(())
    }
}
