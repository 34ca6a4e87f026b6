//! Scripted in-memory node shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use nodewatch::api::BuildVersion;
use nodewatch::{
    AccountParticipation, ApiError, BlockHeader, CatchpointSource, NodeApi, NodeStatus,
    OnChainAccount, ParticipationKey, ReleaseSource, VersionInfo, WatchError,
};

/// Mutable script behind [`FakeNode`]. Edit it through [`FakeNode::edit`].
pub struct Script {
    pub status: NodeStatus,
    /// Popped one per `get_status` call before answering.
    pub status_errors: VecDeque<ApiError>,
    /// Popped one per `wait_for_block` call before advancing.
    pub wait_errors: VecDeque<ApiError>,
    /// Simulated long-poll duration for one round.
    pub round_time: Duration,
    pub version: VersionInfo,
    pub metrics_text: Result<String, ApiError>,
    pub blocks: HashMap<u64, BlockHeader>,
    pub accounts: HashMap<String, OnChainAccount>,
    pub failing_accounts: HashSet<String>,
    pub keys: Vec<ParticipationKey>,
    pub keys_error: Option<ApiError>,
    /// Key to publish once generation is requested, after this many listings.
    pub generated: Option<(usize, ParticipationKey)>,
    pub catchup_requests: Vec<String>,
    calls: HashMap<&'static str, usize>,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            status: NodeStatus {
                last_round: 10,
                ..NodeStatus::default()
            },
            status_errors: VecDeque::new(),
            wait_errors: VecDeque::new(),
            round_time: Duration::from_secs(1),
            version: VersionInfo {
                build: BuildVersion {
                    major: 3,
                    minor: 26,
                    build_number: 0,
                    channel: "stable".into(),
                    ..BuildVersion::default()
                },
                genesis_id: "tuinet-v1".into(),
            },
            metrics_text: Ok("# HELP x\nalgod_network_sent_bytes_total 100\nalgod_network_received_bytes_total 200\n".into()),
            blocks: HashMap::new(),
            accounts: HashMap::new(),
            failing_accounts: HashSet::new(),
            keys: Vec::new(),
            keys_error: None,
            generated: None,
            catchup_requests: Vec::new(),
            calls: HashMap::new(),
        }
    }
}

#[derive(Default)]
pub struct FakeNode {
    script: Mutex<Script>,
}

pub fn unavailable() -> ApiError {
    ApiError::Transport("connection refused".into())
}

pub fn not_found() -> ApiError {
    ApiError::Status {
        code: 404,
        message: "not found".into(),
    }
}

impl FakeNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edit(&self, f: impl FnOnce(&mut Script)) {
        f(&mut self.script.lock().unwrap());
    }

    pub fn read<T>(&self, f: impl FnOnce(&Script) -> T) -> T {
        f(&self.script.lock().unwrap())
    }

    pub fn calls(&self, op: &str) -> usize {
        self.read(|s| s.calls.get(op).copied().unwrap_or(0))
    }

    fn record(&self, op: &'static str) -> std::sync::MutexGuard<'_, Script> {
        let mut script = self.script.lock().unwrap();
        *script.calls.entry(op).or_insert(0) += 1;
        script
    }
}

impl NodeApi for FakeNode {
    async fn get_status(&self) -> Result<NodeStatus, ApiError> {
        let mut script = self.record("status");
        match script.status_errors.pop_front() {
            Some(e) => Err(e),
            None => Ok(script.status.clone()),
        }
    }

    async fn wait_for_block(&self, round: u64) -> Result<NodeStatus, ApiError> {
        let round_time = {
            let mut script = self.record("wait");
            if let Some(e) = script.wait_errors.pop_front() {
                return Err(e);
            }
            script.round_time
        };
        tokio::time::sleep(round_time).await;
        let mut script = self.script.lock().unwrap();
        script.status.last_round = script.status.last_round.max(round) + 1;
        Ok(script.status.clone())
    }

    async fn get_version(&self) -> Result<VersionInfo, ApiError> {
        Ok(self.record("version").version.clone())
    }

    async fn get_metrics_text(&self) -> Result<String, ApiError> {
        self.record("metrics").metrics_text.clone()
    }

    async fn get_block(&self, round: u64) -> Result<BlockHeader, ApiError> {
        let script = self.record("block");
        script.blocks.get(&round).copied().ok_or_else(not_found)
    }

    async fn get_account(&self, address: &str) -> Result<OnChainAccount, ApiError> {
        let script = self.record("account");
        if script.failing_accounts.contains(address) {
            return Err(unavailable());
        }
        script.accounts.get(address).cloned().ok_or_else(not_found)
    }

    async fn list_participation_keys(&self) -> Result<Vec<ParticipationKey>, ApiError> {
        let mut script = self.record("keys");
        if let Some(e) = script.keys_error.clone() {
            return Err(e);
        }
        if let Some((remaining, key)) = script.generated.take() {
            if remaining <= 1 {
                script.keys.push(key);
            } else {
                script.generated = Some((remaining - 1, key));
            }
        }
        Ok(script.keys.clone())
    }

    async fn generate_participation_key(
        &self,
        _address: &str,
        _first_valid: u64,
        _last_valid: u64,
        _dilution: Option<u64>,
    ) -> Result<String, ApiError> {
        self.record("generate");
        Ok("generating".into())
    }

    async fn delete_participation_key(&self, id: &str) -> Result<(), ApiError> {
        let mut script = self.record("delete");
        let before = script.keys.len();
        script.keys.retain(|k| k.id != id);
        if script.keys.len() == before {
            return Err(not_found());
        }
        Ok(())
    }

    async fn start_catchup(
        &self,
        catchpoint: &str,
        _min_rounds: Option<u64>,
    ) -> Result<String, ApiError> {
        let mut script = self.record("start_catchup");
        script.catchup_requests.push(catchpoint.to_string());
        script.status.catchpoint = Some(catchpoint.to_string());
        Ok(format!("Catchup {catchpoint} started"))
    }

    async fn abort_catchup(&self, catchpoint: &str) -> Result<String, ApiError> {
        let mut script = self.record("abort_catchup");
        script.status.catchpoint = None;
        Ok(format!("Catchup {catchpoint} aborted"))
    }
}

/// Release feed answering with a fixed result.
pub struct StaticRelease(pub Option<String>);

impl ReleaseSource for StaticRelease {
    async fn latest_release(&self, channel: &str) -> Result<String, WatchError> {
        self.0
            .clone()
            .ok_or_else(|| WatchError::Release(format!("feed unavailable for {channel}")))
    }
}

pub struct StaticCatchpoint(pub &'static str);

impl CatchpointSource for StaticCatchpoint {
    async fn latest_catchpoint(&self, _network: &str) -> Result<String, WatchError> {
        Ok(self.0.to_string())
    }
}

pub fn participation(vote_key: &[u8], first: u64, last: u64) -> AccountParticipation {
    AccountParticipation {
        selection_participation_key: b"SELECTION".to_vec(),
        state_proof_key: Some(b"STATEPROOF".to_vec()),
        vote_first_valid: first,
        vote_key_dilution: 100,
        vote_last_valid: last,
        vote_participation_key: vote_key.to_vec(),
    }
}

pub fn key(id: &str, address: &str, vote_key: &[u8], first: u64, last: u64) -> ParticipationKey {
    ParticipationKey {
        id: id.into(),
        address: address.into(),
        key: participation(vote_key, first, last),
        ..ParticipationKey::default()
    }
}

pub fn online(address: &str, amount: u64, registered: AccountParticipation) -> OnChainAccount {
    OnChainAccount {
        address: address.into(),
        amount,
        status: "Online".into(),
        incentive_eligible: Some(true),
        participation: Some(registered),
    }
}
