use std::sync::Arc;

use dotenvy::dotenv;
use tracing::{error, info};

use subtrack::infra::{
    scheduler::{ScheduledJob, run_job_loop, shutdown_signal},
    setup::{init_app_state, init_tracing},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    init_tracing();

    let app_state = match init_app_state().await {
        Ok(state) => state,
        Err(e) => {
            error!(error = %e, "Startup failed");
            return Err(e);
        }
    };

    info!(
        timezone = %app_state.config.timezone,
        renewal_schedule = %app_state.config.renewal_schedule,
        reminder_schedule = %app_state.config.reminder_schedule,
        "Subscription jobs starting"
    );

    let shutdown = shutdown_signal();

    let renewal_job: Arc<dyn ScheduledJob> = app_state.renewal_use_cases.clone();
    let reminder_job: Arc<dyn ScheduledJob> = app_state.reminder_use_cases.clone();

    let renewal = tokio::spawn(run_job_loop(
        renewal_job,
        app_state.renewal_plan(),
        shutdown.clone(),
    ));
    let reminder = tokio::spawn(run_job_loop(
        reminder_job,
        app_state.reminder_plan(),
        shutdown,
    ));

    let (renewal, reminder) = tokio::join!(renewal, reminder);
    renewal?;
    reminder?;

    info!("Shut down cleanly");
    Ok(())
}
