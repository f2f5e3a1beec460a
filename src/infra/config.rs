use std::{str::FromStr, time::Duration};

use chrono_tz::Tz;
use env_helpers::get_env_default;
use secrecy::SecretString;

use crate::{
    app_error::{AppError, AppResult},
    infra::schedule::DailySchedule,
};

pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub resend_api_key: SecretString,
    pub email_from: String,
    /// Zone whose calendar day is "today" for both jobs.
    pub timezone: Tz,
    pub renewal_schedule: DailySchedule,
    pub reminder_schedule: DailySchedule,
    pub job_max_attempts: u32,
    pub job_retry_base: Duration,
    pub max_concurrent_emails: usize,
    /// Run both jobs once at startup before waiting for the first firing.
    pub run_on_startup: bool,
}

impl AppConfig {
    pub fn from_env() -> AppResult<Self> {
        let database_url = required("DATABASE_URL")?;
        let resend_api_key = SecretString::new(required("RESEND_API_KEY")?.into());
        let email_from: String =
            get_env_default("EMAIL_FROM", "noreply@subtrack.com".to_string());

        let timezone: Tz = parsed("RENEWAL_TIMEZONE", "UTC")?;
        let renewal_schedule: DailySchedule = parsed("RENEWAL_SCHEDULE", "0 0 * * *")?;
        let reminder_schedule: DailySchedule = parsed("REMINDER_SCHEDULE", "0 9 * * *")?;

        let database_max_connections: u32 = parsed("DATABASE_MAX_CONNECTIONS", "5")?;
        let job_max_attempts: u32 = parsed("JOB_MAX_ATTEMPTS", "3")?;
        let job_retry_base_secs: u64 = parsed("JOB_RETRY_BASE_SECS", "30")?;
        let max_concurrent_emails: usize = parsed("MAX_CONCURRENT_EMAILS", "10")?;
        let run_on_startup: bool = parsed("RUN_ON_STARTUP", "false")?;

        let config = Self {
            database_url,
            database_max_connections,
            resend_api_key,
            email_from,
            timezone,
            renewal_schedule,
            reminder_schedule,
            job_max_attempts,
            job_retry_base: Duration::from_secs(job_retry_base_secs),
            max_concurrent_emails,
            run_on_startup,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.database_max_connections == 0 {
            return Err(AppError::Config(
                "DATABASE_MAX_CONNECTIONS must be at least 1".into(),
            ));
        }
        if self.job_max_attempts == 0 {
            return Err(AppError::Config("JOB_MAX_ATTEMPTS must be at least 1".into()));
        }
        if self.max_concurrent_emails == 0 {
            return Err(AppError::Config(
                "MAX_CONCURRENT_EMAILS must be at least 1".into(),
            ));
        }
        if self.email_from.trim().is_empty() {
            return Err(AppError::Config("EMAIL_FROM must not be empty".into()));
        }
        Ok(())
    }
}

/// `env_helpers::get_env` panics on a missing variable; this reports it as a config error.
fn required(name: &str) -> AppResult<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(AppError::Config(format!("{name} must be set"))),
    }
}

/// Reads `name` (or `default`) and parses it, reporting a bad value as a
/// configuration error instead of panicking.
fn parsed<T>(name: &'static str, default: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw: String = get_env_default(name, default.to_string());
    parse_value(name, &raw)
}

fn parse_value<T>(name: &str, raw: &str) -> AppResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| AppError::Config(format!("{name}='{raw}' is invalid: {e}")))
}
