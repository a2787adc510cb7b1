//! Periodic backup task
//!
//! Runs [`BackupManager`] on a fixed cadence in a tokio task. The first
//! backup happens one full period after start. Cancellation goes through a
//! watch channel so shutdown is deterministic: [`BackupScheduler::shutdown`]
//! returns only after the task has exited, and a backup already in progress
//! is allowed to finish.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::audit::{AuditAction, AuditLogger};

use super::manager::BackupManager;

/// Handle to the running backup task
pub struct BackupScheduler {
    cancel: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl BackupScheduler {
    /// Spawn the backup task on the current tokio runtime
    pub fn start(manager: BackupManager, period: Duration, audit: Arc<AuditLogger>) -> Self {
        let (cancel, cancel_rx) = watch::channel(false);
        let manager = Arc::new(manager);
        let handle = tokio::spawn(backup_loop(manager, period, audit, cancel_rx));

        info!(period_secs = period.as_secs(), "backup scheduler started");
        Self {
            cancel,
            handle: Some(handle),
        }
    }

    /// Whether the task is still running
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the task and wait for it to exit
    pub async fn shutdown(mut self) {
        let _ = self.cancel.send(true);
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!(error = %e, "backup task ended abnormally");
            }
        }
        info!("backup scheduler stopped");
    }
}

impl Drop for BackupScheduler {
    fn drop(&mut self) {
        // Without an explicit shutdown the task still sees the signal and exits
        let _ = self.cancel.send(true);
    }
}

async fn backup_loop(
    manager: Arc<BackupManager>,
    period: Duration,
    audit: Arc<AuditLogger>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                run_backup(&manager, &audit).await;
            }
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    debug!("backup task cancelled");
                    break;
                }
            }
        }
    }
}

/// One backup pass; failures are logged and never end the task
async fn run_backup(manager: &Arc<BackupManager>, audit: &AuditLogger) {
    let manager = Arc::clone(manager);
    let result = tokio::task::spawn_blocking(move || manager.create_backup_with_retention()).await;

    match result {
        Ok(Ok((set, deleted))) => {
            debug!(stamp = %set.stamp, files = set.files.len(), pruned = deleted.len(), "backup complete");
            audit.info(
                AuditAction::Backup,
                None,
                format!("stamp={} files={} pruned={}", set.stamp, set.files.len(), deleted.len()),
            );
        }
        Ok(Err(e)) => {
            warn!(error = %e, "periodic backup failed");
            audit.error(AuditAction::Backup, None, e.to_string());
        }
        Err(e) => {
            warn!(error = %e, "backup worker panicked");
        }
    }
}
