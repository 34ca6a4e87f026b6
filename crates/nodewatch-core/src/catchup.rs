//! Fast-catchup control and the public "latest catchpoint" feeds.

use std::future::Future;
use std::time::Duration;

use crate::api::NodeApi;
use crate::error::{bounded, WatchError};
use crate::status::{OperationalState, Status};

const FNET_CATCHPOINT: &str = "https://fnet-catchpoints.algorand.green/latest";
const BETANET_CATCHPOINT: &str =
    "https://algorand-catchpoints.s3.us-east-2.amazonaws.com/channel/betanet/latest.catchpoint";
const TESTNET_CATCHPOINT: &str =
    "https://algorand-catchpoints.s3.us-east-2.amazonaws.com/channel/testnet/latest.catchpoint";
const MAINNET_CATCHPOINT: &str =
    "https://algorand-catchpoints.s3.us-east-2.amazonaws.com/channel/mainnet/latest.catchpoint";

/// Feed URL for a genesis id (`mainnet-v1.0`) or short network name (`mainnet`).
///
/// Networks without a public feed (localnets, private networks) return `None`.
pub fn catchpoint_source(network: &str) -> Option<&'static str> {
    match network {
        "fnet" | "fnet-v1" => Some(FNET_CATCHPOINT),
        "betanet" | "betanet-v1.0" => Some(BETANET_CATCHPOINT),
        "testnet" | "testnet-v1.0" => Some(TESTNET_CATCHPOINT),
        "mainnet" | "mainnet-v1.0" => Some(MAINNET_CATCHPOINT),
        _ => None,
    }
}

/// Resolves the latest published catchpoint for a network.
pub trait CatchpointSource: Send + Sync {
    fn latest_catchpoint(&self, network: &str)
        -> impl Future<Output = Result<String, WatchError>> + Send;
}

/// Ask the node to fast-catchup to `catchpoint`. Returns the node's message.
pub async fn start_catchup<C: NodeApi>(
    client: &C,
    catchpoint: &str,
    min_rounds: Option<u64>,
    timeout: Duration,
) -> Result<String, WatchError> {
    bounded("start catchup", timeout, client.start_catchup(catchpoint, min_rounds)).await
}

pub async fn abort_catchup<C: NodeApi>(
    client: &C,
    catchpoint: &str,
    timeout: Duration,
) -> Result<String, WatchError> {
    bounded("abort catchup", timeout, client.abort_catchup(catchpoint)).await
}

/// Start a fast-catchup to the network's latest catchpoint.
///
/// Refuses with [`WatchError::NodeBusy`] while a catchup is already running.
/// Returns the catchpoint used and the node's message.
pub async fn catchup_to_latest<C: NodeApi, S: CatchpointSource>(
    client: &C,
    status: &Status,
    source: &S,
    timeout: Duration,
) -> Result<(String, String), WatchError> {
    if status.state == OperationalState::FastCatchup {
        return Err(WatchError::NodeBusy("fast-catchup already in progress".into()));
    }
    let catchpoint = source.latest_catchpoint(&status.network).await?;
    tracing::info!(network = %status.network, catchpoint = %catchpoint, "Starting fast-catchup");
    let message = start_catchup(client, &catchpoint, None, timeout).await?;
    Ok((catchpoint, message))
}
