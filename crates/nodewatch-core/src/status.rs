//! StatusTracker: normalizes raw status payloads into an [`OperationalState`].

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::api::{NodeApi, NodeStatus};
use crate::config::WatchConfig;
use crate::error::{bounded, WatchError};
use crate::release::{needs_update, ReleaseSource};

/// Operational state of the node as seen by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationalState {
    /// Caught up and following the chain.
    #[default]
    #[serde(rename = "RUNNING")]
    Stable,
    /// Replaying history; catch-up time is non-zero.
    #[serde(rename = "SYNCING")]
    Syncing,
    /// Restoring from a catchpoint snapshot.
    #[serde(rename = "FAST-CATCHUP")]
    FastCatchup,
    /// Local marker set while a progress-wait error is being reported.
    /// Never produced by [`merge`].
    #[serde(rename = "DOWN")]
    Down,
}

impl OperationalState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationalState::Stable => "RUNNING",
            OperationalState::Syncing => "SYNCING",
            OperationalState::FastCatchup => "FAST-CATCHUP",
            OperationalState::Down => "DOWN",
        }
    }
}

impl std::fmt::Display for OperationalState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized node status. Replaced wholesale on every successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    pub state: OperationalState,
    pub version: String,
    pub network: String,
    pub voting_open_for_upgrade: bool,
    pub needs_update: bool,
    pub last_round: u64,
}

/// Apply a raw status payload to the previous status.
///
/// A non-empty catchpoint wins over catch-up time, and the upgrade vote flag
/// is only overwritten when the payload carries one.
pub fn merge(prev: &Status, raw: &NodeStatus) -> Status {
    let mut next = prev.clone();
    next.last_round = raw.last_round;

    let catching_up = raw.catchpoint.as_deref().is_some_and(|c| !c.is_empty());
    next.state = if catching_up {
        OperationalState::FastCatchup
    } else if raw.catchup_time > 0 {
        OperationalState::Syncing
    } else {
        OperationalState::Stable
    };

    if let Some(vote) = raw.upgrade_node_vote {
        next.voting_open_for_upgrade = vote;
    }
    next
}

/// Fetches and merges node status. Performs no retries.
pub struct StatusTracker<C> {
    client: Arc<C>,
    call_timeout: Duration,
    wait_timeout: Duration,
}

impl<C> Clone for StatusTracker<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            call_timeout: self.call_timeout,
            wait_timeout: self.wait_timeout,
        }
    }
}

impl<C: NodeApi> StatusTracker<C> {
    pub fn new(client: Arc<C>, config: &WatchConfig) -> Self {
        Self {
            client,
            call_timeout: config.call_timeout,
            wait_timeout: config.wait_timeout,
        }
    }

    /// Fetch the current status and merge it into `prev`.
    pub async fn fetch(&self, prev: &Status) -> Result<Status, WatchError> {
        let raw = bounded("get status", self.call_timeout, self.client.get_status()).await?;
        Ok(merge(prev, &raw))
    }

    /// Long-poll for a round after `prev.last_round`, then merge.
    ///
    /// Blocks server-side until progress or the server's own timeout.
    pub async fn wait_for_next_round(&self, prev: &Status) -> Result<Status, WatchError> {
        let raw = bounded(
            "wait for block",
            self.wait_timeout,
            self.client.wait_for_block(prev.last_round),
        )
        .await?;
        Ok(merge(prev, &raw))
    }

    /// Status seeded with version metadata, plus the node's release channel.
    async fn versioned(&self) -> Result<(Status, String), WatchError> {
        let version = bounded("get version", self.call_timeout, self.client.get_version()).await?;
        let status = Status {
            version: version.version_string(),
            network: version.genesis_id,
            ..Status::default()
        };
        Ok((status, version.build.channel))
    }

    /// Fetch version metadata, then the current status.
    pub async fn fetch_with_version(&self) -> Result<Status, WatchError> {
        let (status, _) = self.versioned().await?;
        self.fetch(&status).await
    }

    /// One-time bootstrap: [`fetch_with_version`](Self::fetch_with_version)
    /// plus the update check against the release channel.
    ///
    /// The release lookup is best-effort: on failure `needs_update` stays false.
    pub async fn bootstrap<R: ReleaseSource>(&self, releases: &R) -> Result<Status, WatchError> {
        let (mut status, channel) = self.versioned().await?;
        let channel = channel.as_str();
        match tokio::time::timeout(self.call_timeout, releases.latest_release(channel)).await {
            Ok(Ok(latest)) => {
                status.needs_update = needs_update(&status.version, &latest);
                tracing::info!(
                    version = %status.version,
                    latest = %latest,
                    needs_update = status.needs_update,
                    "Checked node release channel"
                );
            }
            Ok(Err(e)) => {
                tracing::warn!(channel, error = %e, "Release lookup failed, skipping update check");
            }
            Err(_) => {
                tracing::warn!(channel, "Release lookup timed out, skipping update check");
            }
        }

        self.fetch(&status).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(catchpoint: Option<&str>, catchup_time: u64, last_round: u64) -> NodeStatus {
        NodeStatus {
            catchpoint: catchpoint.map(str::to_string),
            catchup_time,
            last_round,
            upgrade_node_vote: None,
        }
    }

    #[test]
    fn test_merge_state_sequence() {
        let status = merge(&Status::default(), &raw(Some(""), 10, 5));
        assert_eq!(status.state, OperationalState::Syncing);
        assert_eq!(status.last_round, 5);

        let status = merge(&status, &raw(Some(""), 0, 10));
        assert_eq!(status.state, OperationalState::Stable);
        assert_eq!(status.last_round, 10);

        let status = merge(&status, &raw(Some("X"), 0, 10));
        assert_eq!(status.state, OperationalState::FastCatchup);
    }

    #[test]
    fn test_catchpoint_wins_over_catchup_time() {
        for catchup_time in [0, 1, 10_000] {
            let status = merge(&Status::default(), &raw(Some("1000#ABC"), catchup_time, 1));
            assert_eq!(status.state, OperationalState::FastCatchup);
        }
    }

    #[test]
    fn test_missing_catchpoint_is_empty() {
        let status = merge(&Status::default(), &raw(None, 0, 3));
        assert_eq!(status.state, OperationalState::Stable);
        let status = merge(&Status::default(), &raw(None, 7, 3));
        assert_eq!(status.state, OperationalState::Syncing);
    }

    #[test]
    fn test_merge_clears_down_marker() {
        let prev = Status {
            state: OperationalState::Down,
            ..Status::default()
        };
        assert_eq!(merge(&prev, &raw(None, 0, 1)).state, OperationalState::Stable);
    }

    #[test]
    fn test_vote_flag_only_overwritten_when_present() {
        let prev = Status {
            voting_open_for_upgrade: true,
            ..Status::default()
        };
        let status = merge(&prev, &raw(None, 0, 1));
        assert!(status.voting_open_for_upgrade);

        let mut payload = raw(None, 0, 2);
        payload.upgrade_node_vote = Some(false);
        let status = merge(&status, &payload);
        assert!(!status.voting_open_for_upgrade);
    }

    #[test]
    fn test_merge_keeps_version_metadata() {
        let prev = Status {
            version: "v3.26.0-stable".into(),
            network: "mainnet-v1.0".into(),
            needs_update: true,
            ..Status::default()
        };
        let status = merge(&prev, &raw(None, 0, 9));
        assert_eq!(status.version, "v3.26.0-stable");
        assert_eq!(status.network, "mainnet-v1.0");
        assert!(status.needs_update);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(OperationalState::FastCatchup.to_string(), "FAST-CATCHUP");
        assert_eq!(
            serde_json::to_string(&OperationalState::Stable).unwrap(),
            "\"RUNNING\""
        );
    }
}
