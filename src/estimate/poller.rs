// src/estimate/poller.rs

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, warn};

use super::RuntimeEstimator;

/// Resync `estimator` every `period` until the returned handle is aborted.
///
/// The first resync happens one period after spawning. Each resync runs on
/// the blocking pool since stores may do synchronous IO. A slow resync delays
/// the next tick instead of stacking up.
pub fn spawn_resync_loop(estimator: Arc<RuntimeEstimator>, period: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let est = Arc::clone(&estimator);
            match tokio::task::spawn_blocking(move || est.resync()).await {
                Ok(Ok(summary)) => debug!(?summary, "periodic resync finished"),
                Ok(Err(e)) => warn!(error = %e, "periodic resync failed; keeping previous estimates"),
                Err(e) => warn!(error = %e, "periodic resync task panicked"),
            }
        }
    })
}
