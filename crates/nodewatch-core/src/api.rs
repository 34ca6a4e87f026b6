//! The node API collaborator: trait, wire types, and the single error shape.
//!
//! Every endpoint returns `Result<T, ApiError>`, so the engine depends on one
//! error type rather than one response wrapper per endpoint. Wire types mirror
//! the node's JSON (kebab-case keys, base64 key material).

use serde::{Deserialize, Serialize};
use std::future::Future;

/// Normalized transport/HTTP failure returned by a [`NodeApi`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Connection refused, DNS failure, reset, client-side timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with a non-2xx status.
    #[error("HTTP {code}: {message}")]
    Status { code: u16, message: String },

    /// The body could not be decoded into the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiError {
    /// HTTP status code, if the node answered at all.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ApiError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Raw status payload shared by `GET status` and `wait-for-block`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct NodeStatus {
    #[serde(default)]
    pub catchpoint: Option<String>,
    /// Nanoseconds spent catching up; non-zero while syncing.
    #[serde(default)]
    pub catchup_time: u64,
    pub last_round: u64,
    #[serde(default)]
    pub upgrade_node_vote: Option<bool>,
}

/// Build metadata reported by the node's version endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildVersion {
    pub major: u64,
    pub minor: u64,
    pub build_number: u64,
    pub channel: String,
    #[serde(default)]
    pub commit_hash: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
}

/// Version endpoint payload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub build: BuildVersion,
    pub genesis_id: String,
}

impl VersionInfo {
    /// Formats the build as `v{major}.{minor}.{build}-{channel}`, matching release tags.
    pub fn version_string(&self) -> String {
        format!(
            "v{}.{}.{}-{}",
            self.build.major, self.build.minor, self.build.build_number, self.build.channel
        )
    }
}

/// The subset of a block header used for timing statistics.
///
/// Both fields may be absent; some block formats carry no timing data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Block timestamp in unix seconds.
    #[serde(rename = "ts", default)]
    pub timestamp: Option<i64>,
    /// Cumulative transaction counter.
    #[serde(rename = "tc", default)]
    pub txn_counter: Option<u64>,
}

/// Participation key material registered on-chain, or held locally.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AccountParticipation {
    #[serde(with = "b64", default)]
    pub selection_participation_key: Vec<u8>,
    #[serde(with = "b64_opt", default, skip_serializing_if = "Option::is_none")]
    pub state_proof_key: Option<Vec<u8>>,
    pub vote_first_valid: u64,
    pub vote_key_dilution: u64,
    pub vote_last_valid: u64,
    #[serde(with = "b64", default)]
    pub vote_participation_key: Vec<u8>,
}

/// A participation key held by the node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ParticipationKey {
    pub id: String,
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_first_valid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_last_valid: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_vote: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_block_proposal: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_state_proof: Option<u64>,
    pub key: AccountParticipation,
}

/// On-chain account record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OnChainAccount {
    pub address: String,
    /// Balance in micro-units.
    pub amount: u64,
    pub status: String,
    #[serde(default)]
    pub incentive_eligible: Option<bool>,
    #[serde(default)]
    pub participation: Option<AccountParticipation>,
}

/// Typed calls against the node's REST surface.
///
/// Implementations must be safe for concurrent use: the watch loop and one-shot
/// commands may share a client.
pub trait NodeApi: Send + Sync {
    fn get_status(&self) -> impl Future<Output = Result<NodeStatus, ApiError>> + Send;

    /// Long-poll until a round after `round` is available or the server times out.
    fn wait_for_block(&self, round: u64)
        -> impl Future<Output = Result<NodeStatus, ApiError>> + Send;

    fn get_version(&self) -> impl Future<Output = Result<VersionInfo, ApiError>> + Send;

    /// Raw plaintext metrics exposition.
    fn get_metrics_text(&self) -> impl Future<Output = Result<String, ApiError>> + Send;

    fn get_block(&self, round: u64) -> impl Future<Output = Result<BlockHeader, ApiError>> + Send;

    fn get_account(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<OnChainAccount, ApiError>> + Send;

    /// Privileged: requires an admin token.
    fn list_participation_keys(
        &self,
    ) -> impl Future<Output = Result<Vec<ParticipationKey>, ApiError>> + Send;

    /// Start key generation. Completes asynchronously on the node.
    fn generate_participation_key(
        &self,
        address: &str,
        first_valid: u64,
        last_valid: u64,
        dilution: Option<u64>,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;

    fn delete_participation_key(&self, id: &str)
        -> impl Future<Output = Result<(), ApiError>> + Send;

    fn start_catchup(
        &self,
        catchpoint: &str,
        min_rounds: Option<u64>,
    ) -> impl Future<Output = Result<String, ApiError>> + Send;

    fn abort_catchup(&self, catchpoint: &str)
        -> impl Future<Output = Result<String, ApiError>> + Send;
}

mod b64 {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let encoded = Option::<String>::deserialize(d)?.unwrap_or_default();
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)
    }
}

mod b64_opt {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Option<Vec<u8>>, s: S) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => s.serialize_some(&base64::engine::general_purpose::STANDARD.encode(b)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Vec<u8>>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|encoded| {
                base64::engine::general_purpose::STANDARD
                    .decode(encoded)
                    .map_err(serde::de::Error::custom)
            })
            .transpose()
    }
}
