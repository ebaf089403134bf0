pub mod builders;
pub mod fake_cluster;

use std::sync::Once;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};
use wfsched::engine::ClusterEvent;

static INIT: Once = Once::new();

/// Room for a whole burst of fake grants and completions; see
/// [`fake_cluster::FakeCluster`].
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Install a test-writer subscriber once per test binary.
///
/// Output only shows for failing tests unless run with `--nocapture`.
/// `RUST_LOG=wfsched::logs=debug cargo test` narrows it to one module.
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("wfsched=info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Channel feeding cluster events into a [`wfsched::engine::Runtime`].
pub fn event_channel() -> (mpsc::Sender<ClusterEvent>, mpsc::Receiver<ClusterEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Fail the test if `f` does not finish within five seconds.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, f)
        .await
        .expect("test timed out after 5 seconds")
}
