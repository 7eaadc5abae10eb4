use std::sync::Arc;
use std::time::Duration;

use scribe_services::Dispatcher;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::info;

/// Starts the periodic maintenance tick (job GC plus health metrics).
///
/// The returned scheduler must be kept alive for the tick to keep firing.
pub async fn start_maintenance(
    dispatcher: Arc<Dispatcher>,
    every: Duration,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    let job = Job::new_repeated_async(every, move |_id, _scheduler| {
        let dispatcher = Arc::clone(&dispatcher);
        Box::pin(async move {
            dispatcher.maintenance_tick().await;
        })
    })?;

    scheduler.add(job).await?;
    scheduler.start().await?;
    info!(interval_secs = every.as_secs(), "Maintenance scheduler started");

    Ok(scheduler)
}
