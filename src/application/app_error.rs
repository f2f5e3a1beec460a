use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Email delivery failed: {0}")]
    Email(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Failures a later attempt may not hit again (store connectivity, mail API hiccups).
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Database(_) | AppError::Email(_))
    }
}

pub type AppResult<T> = Result<T, AppError>;
