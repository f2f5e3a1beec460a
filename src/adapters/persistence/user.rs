use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

use crate::{
    adapters::persistence::PostgresPersistence,
    app_error::{AppError, AppResult},
    use_cases::reminder::UserDirectory,
};

#[async_trait]
impl UserDirectory for PostgresPersistence {
    async fn get_email_by_id(&self, user_id: Uuid) -> AppResult<Option<String>> {
        let row = sqlx::query("SELECT email FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::from)?;
        Ok(row.and_then(|r| r.get::<Option<String>, _>("email")))
    }
}
