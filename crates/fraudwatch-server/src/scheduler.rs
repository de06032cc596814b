//! Background notification worker for the server process
//!
//! `fraudwatch serve --with-worker` runs the queue poller next to the API so a
//! single process covers the whole demo. The worker is stopped once the HTTP
//! server has shut down.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use fraudwatch_core::{Database, NotificationWorker, Notifier, WorkerConfig};

/// How long `stop` waits for an in-flight cycle
const STOP_TIMEOUT: Duration = Duration::from_secs(10);

/// Running worker task and its shutdown switch
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    /// Signal shutdown and wait for the current cycle to finish
    pub async fn stop(self) {
        let _ = self.shutdown.send(true);
        match tokio::time::timeout(STOP_TIMEOUT, self.task).await {
            Ok(Ok(())) => info!("Notification worker shut down"),
            Ok(Err(e)) => warn!("Notification worker task failed: {}", e),
            Err(_) => warn!(
                "Notification worker did not stop within {}s",
                STOP_TIMEOUT.as_secs()
            ),
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Start the notification worker as a background task
pub fn start_notification_worker(
    db: Database,
    notifier: Arc<dyn Notifier>,
    config: WorkerConfig,
) -> WorkerHandle {
    info!(
        "Starting notification worker: every {}s via {}",
        config.interval.as_secs(),
        notifier.describe()
    );

    let (shutdown, rx) = watch::channel(false);
    let task = NotificationWorker::new(db, notifier, config).spawn(rx);
    WorkerHandle { shutdown, task }
}
