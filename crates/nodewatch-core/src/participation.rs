//! Participation-key management: inventory, generation, deletion, and the
//! key-registration deep link.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use data_encoding::BASE32_NOPAD;
use sha2::{Digest, Sha512_256};
use std::time::Duration;
use tokio::time::Instant;

use crate::api::{AccountParticipation, NodeApi, ParticipationKey};
use crate::config::WatchConfig;
use crate::error::{bounded, WatchError};
use crate::signal::StopSignal;

const WIZARD_BASE: &str = "https://lora.algokit.io";

const ADDRESS_LEN: usize = 58;
const PUBLIC_KEY_LEN: usize = 32;
const CHECKSUM_LEN: usize = 4;

/// True for a 58-character base32 account address whose last 4 bytes are
/// the tail of the SHA-512/256 digest of the 32-byte public key.
pub fn validate_address(address: &str) -> bool {
    if address.len() != ADDRESS_LEN {
        return false;
    }
    let Ok(decoded) = BASE32_NOPAD.decode(address.as_bytes()) else {
        return false;
    };
    if decoded.len() != PUBLIC_KEY_LEN + CHECKSUM_LEN {
        return false;
    }
    let (public_key, checksum) = decoded.split_at(PUBLIC_KEY_LEN);
    let digest = Sha512_256::digest(public_key);
    digest[digest.len() - CHECKSUM_LEN..] == *checksum
}

/// A local key is active when it is the key registered on-chain.
pub fn is_key_active(local: &AccountParticipation, on_chain: &AccountParticipation) -> bool {
    local.vote_participation_key == on_chain.vote_participation_key
        && local.vote_first_valid == on_chain.vote_first_valid
        && local.vote_last_valid == on_chain.vote_last_valid
}

pub async fn list_keys<C: NodeApi>(
    client: &C,
    timeout: Duration,
) -> Result<Vec<ParticipationKey>, WatchError> {
    bounded("list participation keys", timeout, client.list_participation_keys()).await
}

/// Parameters for a key generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerateKeyRequest {
    pub address: String,
    pub first_valid: u64,
    pub last_valid: u64,
    /// Node picks a dilution when absent.
    pub dilution: Option<u64>,
}

impl GenerateKeyRequest {
    fn matches(&self, key: &ParticipationKey) -> bool {
        key.address == self.address
            && key.key.vote_first_valid == self.first_valid
            && key.key.vote_last_valid == self.last_valid
    }
}

/// Polling schedule for a generated key to appear.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPoll {
    pub interval: Duration,
    pub deadline: Duration,
    pub call_timeout: Duration,
}

impl From<&WatchConfig> for KeyPoll {
    fn from(config: &WatchConfig) -> Self {
        Self {
            interval: config.key_poll_interval,
            deadline: config.key_timeout,
            call_timeout: config.call_timeout,
        }
    }
}

/// Request key generation and wait until the node lists the new key.
///
/// Generation runs in the background on the node and can take minutes, so the
/// key inventory is polled until a key with the requested address and validity
/// range appears, the deadline passes, or `stop` fires. A malformed address
/// is rejected before the node is contacted.
pub async fn generate_key<C: NodeApi>(
    client: &C,
    request: &GenerateKeyRequest,
    poll: &KeyPoll,
    stop: &StopSignal,
) -> Result<ParticipationKey, WatchError> {
    if !validate_address(&request.address) {
        return Err(WatchError::InvalidAddress(request.address.clone()));
    }
    bounded(
        "generate participation key",
        poll.call_timeout,
        client.generate_participation_key(
            &request.address,
            request.first_valid,
            request.last_valid,
            request.dilution,
        ),
    )
    .await?;
    tracing::info!(
        address = %request.address,
        first_valid = request.first_valid,
        last_valid = request.last_valid,
        "Participation key generation requested"
    );

    let deadline = Instant::now() + poll.deadline;
    loop {
        let now = Instant::now();
        if now >= deadline {
            return Err(WatchError::KeyGenerationTimeout {
                address: request.address.clone(),
            });
        }
        if !stop.sleep(poll.interval.min(deadline - now)).await {
            return Err(WatchError::Cancelled);
        }

        let keys = list_keys(client, poll.call_timeout).await?;
        if let Some(key) = keys.into_iter().find(|k| request.matches(k)) {
            tracing::info!(address = %request.address, id = %key.id, "Participation key ready");
            return Ok(key);
        }
    }
}

pub async fn delete_key<C: NodeApi>(
    client: &C,
    id: &str,
    timeout: Duration,
) -> Result<(), WatchError> {
    bounded("delete participation key", timeout, client.delete_participation_key(id)).await
}

/// Remove the first key with `id`. Returns whether one was removed.
pub fn remove_key_by_id(keys: &mut Vec<ParticipationKey>, id: &str) -> bool {
    match keys.iter().position(|k| k.id == id) {
        Some(index) => {
            keys.remove(index);
            true
        }
        None => false,
    }
}

pub fn find_id_for_vote_key<'a>(keys: &'a [ParticipationKey], vote_key: &[u8]) -> Option<&'a str> {
    keys.iter()
        .find(|k| k.key.vote_participation_key == vote_key)
        .map(|k| k.id.as_str())
}

/// Short network name used by the transaction wizard.
fn wizard_network(network: &str) -> String {
    let short = network.replacen("-v1.0", "", 1).replacen("-v1", "", 1);
    match short.as_str() {
        "dockernet" | "tuinet" => "localnet".to_string(),
        _ => short,
    }
}

/// Transaction-wizard link that registers `key` online, or its account offline.
pub fn keyreg_deep_link(network: &str, offline: bool, key: &ParticipationKey) -> String {
    let mut params: Vec<(&str, String)> = vec![
        ("type", "keyreg".to_string()),
        ("sender", key.address.clone()),
    ];
    if !offline {
        let material = &key.key;
        let state_proof = material.state_proof_key.as_deref().unwrap_or_default();
        params.extend([
            ("selkey", URL_SAFE_NO_PAD.encode(&material.selection_participation_key)),
            ("sprfkey", URL_SAFE_NO_PAD.encode(state_proof)),
            ("votekey", URL_SAFE_NO_PAD.encode(&material.vote_participation_key)),
            ("votefst", material.vote_first_valid.to_string()),
            ("votelst", material.vote_last_valid.to_string()),
            ("votekd", material.vote_key_dilution.to_string()),
        ]);
    }

    let query = params
        .iter()
        .map(|(name, value)| {
            format!(
                "{}={}",
                urlencoding::encode(&format!("{name}[0]")),
                urlencoding::encode(value)
            )
        })
        .collect::<Vec<_>>()
        .join("&");

    format!(
        "{WIZARD_BASE}/{}/transaction-wizard?{query}",
        wizard_network(network)
    )
}
