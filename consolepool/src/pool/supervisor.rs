//! Periodic health and idle sweep.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::registry::ProcessPool;
use crate::session::SessionManager;

/// Background sweeper for a pool and, optionally, its sessions.
pub struct Supervisor;

impl Supervisor {
    /// Start sweeping every `interval`. The first sweep runs one interval
    /// after start.
    ///
    /// Each tick expires idle sessions (cascading to their processes), then
    /// evicts dead or idle processes. Nothing a sweep does is reported back
    /// to callers; outcomes go to the log.
    pub fn spawn(
        pool: Arc<ProcessPool>,
        sessions: Option<Arc<SessionManager>>,
        interval: Duration,
    ) -> SupervisorHandle {
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let expired = match &sessions {
                            Some(sessions) => sessions.expire_idle().await,
                            None => 0,
                        };
                        let report = pool.sweep().await;
                        if expired > 0 || report.evicted() > 0 {
                            info!(
                                "sweep: {} sessions expired, {} unhealthy and {} idle processes evicted",
                                expired, report.unhealthy, report.idle
                            );
                        } else {
                            debug!("sweep: nothing to evict ({} processes)", pool.len());
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }
            debug!("supervisor stopped");
        });

        SupervisorHandle {
            stop: stop_tx,
            task: Some(task),
        }
    }
}

/// Stops the supervisor when asked or when dropped.
#[derive(Debug)]
pub struct SupervisorHandle {
    stop: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl SupervisorHandle {
    /// Signal the supervisor and wait up to `timeout` for an in-flight
    /// sweep to finish, aborting it otherwise.
    pub async fn stop(mut self, timeout: Duration) {
        let _ = self.stop.send(true);
        let Some(mut task) = self.task.take() else {
            return;
        };
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("supervisor task failed: {}", e),
            Err(_) => {
                warn!("supervisor did not stop within {:?}, aborting", timeout);
                task.abort();
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }
}

impl Drop for SupervisorHandle {
    fn drop(&mut self) {
        let _ = self.stop.send(true);
    }
}
