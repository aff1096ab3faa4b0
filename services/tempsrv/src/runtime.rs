//! Background maintenance tasks

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::actor::{Command, TrackerHandle};
use crate::clock::Clock;

/// Start the periodic liveness sweep
///
/// Every `period` a `Sweep { now }` command stamped by `clock` is queued behind
/// the packets already received, so the sweep never overtakes a frame that
/// arrived before it.
///
/// # Returns
///
/// - `JoinHandle<()>` - The task handle to await completion
/// - `CancellationToken` - Child of `parent`; cancel to stop only this task
pub fn start_sweep_task(
    tracker: TrackerHandle,
    clock: Arc<dyn Clock>,
    period: Duration,
    parent: &CancellationToken,
) -> (tokio::task::JoinHandle<()>, CancellationToken) {
    let token = parent.child_token();
    let task_token = token.clone();

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let now = clock.now();
                    debug!("Liveness sweep at {}", now);
                    if let Err(e) = tracker.send(Command::Sweep { now }).await {
                        warn!("Sweep task stopping: {}", e);
                        break;
                    }
                }
                () = task_token.cancelled() => {
                    info!("Sweep task received cancellation signal, shutting down");
                    break;
                }
            }
        }

        info!("Sweep task terminated");
    });

    (handle, token)
}
