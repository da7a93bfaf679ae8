//! TTL Reaper
//!
//! Background task that periodically sweeps expired buckets out of the
//! engine.

use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::Engine;

/// Handle to a running reaper task.
#[derive(Debug)]
pub(crate) struct ReaperHandle {
    stop: watch::Sender<()>,
    task: JoinHandle<()>,
}

impl ReaperHandle {
    /// Signal the reaper to stop and wait for it to exit.
    pub(crate) async fn stop(self) {
        drop(self.stop);
        if let Err(e) = self.task.await {
            warn!(error = %e, "ttl reaper task failed");
        }
    }
}

/// Spawn the reaper loop. The first sweep runs one full period after start;
/// the stop signal is honored immediately.
pub(crate) fn spawn(engine: Engine, period: Duration) -> ReaperHandle {
    let (stop, mut stopped) = watch::channel(());
    let task = tokio::spawn(async move {
        info!(?period, "ttl reaper started");
        let mut ticker = tokio::time::interval(period);
        // An interval fires immediately; swallow that tick so the first
        // sweep happens a full period after start.
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = stopped.changed() => {
                    info!("ttl reaper stopped");
                    return;
                }
                _ = ticker.tick() => engine.clear_expired(),
            }
        }
    });
    ReaperHandle { stop, task }
}
