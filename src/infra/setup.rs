use crate::{
    adapters::email::resend::ResendEmailSender,
    app_error::AppError,
    infra::{
        config::AppConfig,
        http_client::try_build_client,
        postgres_persistence,
        schedule::DailySchedule,
        scheduler::{JobSchedule, RetryPolicy},
    },
    use_cases::{
        reminder::{EmailSender, ReminderLogRepo, ReminderUseCases, UserDirectory},
        renewal::{RenewalUseCases, SubscriptionRepo},
    },
};
use std::fs::File;
use std::sync::Arc;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub renewal_use_cases: Arc<RenewalUseCases>,
    pub reminder_use_cases: Arc<ReminderUseCases>,
}

impl AppState {
    pub fn renewal_plan(&self) -> JobSchedule {
        self.plan(self.config.renewal_schedule)
    }

    pub fn reminder_plan(&self) -> JobSchedule {
        self.plan(self.config.reminder_schedule)
    }

    fn plan(&self, schedule: DailySchedule) -> JobSchedule {
        JobSchedule {
            schedule,
            timezone: self.config.timezone,
            retry: RetryPolicy::new(self.config.job_max_attempts, self.config.job_retry_base),
            run_on_startup: self.config.run_on_startup,
        }
    }
}

pub async fn init_app_state() -> anyhow::Result<AppState> {
    let config = AppConfig::from_env()?;

    let postgres_arc = Arc::new(
        postgres_persistence(&config.database_url, config.database_max_connections).await?,
    );

    let http_client = try_build_client()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;
    let email: Arc<dyn EmailSender> = Arc::new(ResendEmailSender::new(
        http_client,
        config.resend_api_key.clone(),
        config.email_from.clone(),
    ));

    let subscription_repo_arc = postgres_arc.clone() as Arc<dyn SubscriptionRepo>;
    let user_directory_arc = postgres_arc.clone() as Arc<dyn UserDirectory>;
    let reminder_log_arc = postgres_arc.clone() as Arc<dyn ReminderLogRepo>;

    let renewal_use_cases = RenewalUseCases::new(subscription_repo_arc.clone());
    let reminder_use_cases = ReminderUseCases::new(
        subscription_repo_arc,
        user_directory_arc,
        email,
        reminder_log_arc,
        config.max_concurrent_emails,
    );

    Ok(AppState {
        config: Arc::new(config),
        renewal_use_cases: Arc::new(renewal_use_cases),
        reminder_use_cases: Arc::new(reminder_use_cases),
    })
}

pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "subtrack=info".into());

    // Console (pretty logs)
    let console_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .pretty();

    // File (structured JSON logs), only when LOG_FILE is set
    let log_file = std::env::var("LOG_FILE").ok().filter(|p| !p.trim().is_empty());
    let mut file_error = None;
    let json_layer = log_file.and_then(|path| match File::create(&path) {
        Ok(file) => Some(
            fmt::layer()
                .json()
                .with_writer(file)
                .with_current_span(true)
                .with_span_list(true)
                .boxed(),
        ),
        Err(e) => {
            file_error = Some(format!("cannot create log file {path}: {e}"));
            None
        }
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(json_layer)
        .try_init()
        .ok();

    if let Some(e) = file_error {
        tracing::warn!(error = %e, "JSON file logging disabled");
    }
}
