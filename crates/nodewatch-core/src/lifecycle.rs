//! Node process lifecycle as an injected capability.
//!
//! The engine never installs or supervises a node itself. Operators plug in an
//! implementation (systemd unit, launchd plist, container runtime) that knows
//! how to do it on their platform.

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::api::NodeApi;
use crate::error::WatchError;
use crate::status::{Status, StatusTracker};

/// Install, start and stop the node service.
pub trait NodeLifecycle: Send + Sync {
    fn install(&self) -> impl Future<Output = Result<(), WatchError>> + Send;

    fn start(&self) -> impl Future<Output = Result<(), WatchError>> + Send;

    fn stop(&self) -> impl Future<Output = Result<(), WatchError>> + Send;

    /// Whether the service process is running. Says nothing about API readiness.
    fn is_running(&self) -> impl Future<Output = Result<bool, WatchError>> + Send;
}

/// Start the node if needed and wait until its status endpoint answers.
///
/// Polls every `poll` until `deadline` elapses, then fails with
/// [`WatchError::Timeout`].
pub async fn ensure_running<L, C>(
    lifecycle: &L,
    tracker: &StatusTracker<C>,
    deadline: Duration,
    poll: Duration,
) -> Result<Status, WatchError>
where
    L: NodeLifecycle,
    C: NodeApi,
{
    if !lifecycle.is_running().await? {
        tracing::info!("Node not running, starting service");
        lifecycle.start().await?;
    }

    let until = Instant::now() + deadline;
    loop {
        match tracker.fetch(&Status::default()).await {
            Ok(status) => return Ok(status),
            Err(e) => {
                tracing::debug!(error = %e, "Node not answering yet");
            }
        }
        let now = Instant::now();
        if now >= until {
            return Err(WatchError::Timeout {
                op: "node startup",
                after: deadline,
            });
        }
        tokio::time::sleep(poll.min(until - now)).await;
    }
}
