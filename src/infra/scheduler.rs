//! Daily job driver: waits for each firing, runs the job with bounded retries
//! and stops on SIGINT/SIGTERM.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use tokio::{signal, sync::watch};
use tracing::{error, info, warn};

use crate::{
    app_error::AppResult,
    domain::renewal_date::normalize_to_day,
    infra::schedule::DailySchedule,
    use_cases::{reminder::ReminderUseCases, renewal::RenewalUseCases},
};

const MAX_RETRY_DELAY: Duration = Duration::from_secs(15 * 60);

#[async_trait]
pub trait ScheduledJob: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, today: NaiveDate) -> AppResult<()>;
}

#[async_trait]
impl ScheduledJob for RenewalUseCases {
    fn name(&self) -> &'static str {
        "renewal"
    }

    async fn run(&self, today: NaiveDate) -> AppResult<()> {
        self.run_renewal_pass(today).await.map(|_| ())
    }
}

#[async_trait]
impl ScheduledJob for ReminderUseCases {
    fn name(&self) -> &'static str {
        "reminder"
    }

    async fn run(&self, today: NaiveDate) -> AppResult<()> {
        // Per-recipient failures are logged by the pass and don't fail the job.
        self.run_reminder_pass(today).await.map(|_| ())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: MAX_RETRY_DELAY.max(base_delay),
        }
    }

    /// Delay after the `failed_attempts`-th failure: `base * 2^(n-1)`, capped,
    /// plus up to 10% jitter.
    pub fn backoff_delay(&self, failed_attempts: u32) -> Duration {
        let factor = 2u32.saturating_pow(failed_attempts.saturating_sub(1));
        let capped = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_cap_ms = (capped.as_millis() / 10) as u64;
        let jitter_ms = if jitter_cap_ms == 0 {
            0
        } else {
            rand::random::<u64>() % (jitter_cap_ms + 1)
        };
        capped + Duration::from_millis(jitter_ms)
    }
}

/// Runs `op` until it succeeds, fails with a non-transient error, or runs out
/// of attempts. No new attempt starts once shutdown has been requested, and a
/// pending backoff wait ends early with the last error.
pub async fn run_with_retry<T, F, Fut>(
    job: &str,
    policy: &RetryPolicy,
    shutdown: &watch::Receiver<bool>,
    mut op: F,
) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut stop_requested = shutdown.clone();
    let mut attempt = 0;
    loop {
        attempt += 1;
        let result = op().await;
        let stopping = *shutdown.borrow();
        match result {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_attempts && !stopping => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    job,
                    attempt,
                    max_attempts = policy.max_attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %e,
                    "Job attempt failed, retrying"
                );
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = stop_requested.changed() => {
                        info!(job, attempt, "Shutdown requested, abandoning retries");
                        return Err(e);
                    }
                }
            }
            Err(e) => return Err(e),
        }
    }
}

pub struct JobSchedule {
    pub schedule: DailySchedule,
    pub timezone: Tz,
    pub retry: RetryPolicy,
    pub run_on_startup: bool,
}

pub async fn run_job_loop(
    job: Arc<dyn ScheduledJob>,
    plan: JobSchedule,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        job = job.name(),
        schedule = %plan.schedule,
        timezone = %plan.timezone,
        "Job scheduler started"
    );

    if plan.run_on_startup {
        let today = normalize_to_day(Utc::now(), &plan.timezone);
        fire(job.as_ref(), today, &plan.retry, &shutdown).await;
    }

    loop {
        let stopping = *shutdown.borrow();
        if stopping {
            break;
        }

        let now = Utc::now();
        let next = plan.schedule.next_after(now, &plan.timezone);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(job = job.name(), next_run = %next, "Next run scheduled");

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            // A dropped sender also means nobody can ask us to keep going.
            _ = shutdown.changed() => break,
        }

        // The day of the slot, not of whenever the timer actually woke us.
        let today = normalize_to_day(next, &plan.timezone);
        fire(job.as_ref(), today, &plan.retry, &shutdown).await;
    }

    info!(job = job.name(), "Job scheduler stopped");
}

async fn fire(
    job: &dyn ScheduledJob,
    today: NaiveDate,
    retry: &RetryPolicy,
    shutdown: &watch::Receiver<bool>,
) {
    info!(job = job.name(), %today, "Running job");
    if let Err(e) = run_with_retry(job.name(), retry, shutdown, || job.run(today)).await {
        error!(job = job.name(), %today, error = %e, "Job failed, waiting for next run");
    }
}

/// Flips the returned receiver to `true` on Ctrl+C or SIGTERM.
pub fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C handler");
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
            _ = terminate => info!("Received SIGTERM"),
        }

        let _ = tx.send(true);
    });

    rx
}
