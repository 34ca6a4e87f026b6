//! Account view derived from participation keys plus on-chain lookups.
//!
//! Keys are the only account-discovery mechanism: an address with no locally
//! held key never appears in the map.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::api::{AccountParticipation, NodeApi, OnChainAccount, ParticipationKey};
use crate::clock::Clock;
use crate::error::bounded;
use crate::participation::is_key_active;
use crate::state::StateModel;
use crate::status::OperationalState;

const MICRO_UNITS: u64 = 1_000_000;

/// Participation status of an account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccountStatus {
    Online,
    Offline,
    /// Reward pool, fee sink and similar special addresses.
    #[serde(rename = "Not Participating")]
    NotParticipating,
    /// Not yet looked up on-chain.
    #[default]
    #[serde(other)]
    Unknown,
}

impl AccountStatus {
    /// Map the node's status string. Unrecognized values become `Unknown`.
    pub fn from_chain(status: &str) -> Self {
        match status {
            "Online" => AccountStatus::Online,
            "Offline" => AccountStatus::Offline,
            "Not Participating" => AccountStatus::NotParticipating,
            _ => AccountStatus::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountStatus::Online => "Online",
            AccountStatus::Offline => "Offline",
            AccountStatus::NotParticipating => "Not Participating",
            AccountStatus::Unknown => "Unknown",
        }
    }

    /// Whether participation health (residency) is meaningful for this status.
    fn is_judged(&self) -> bool {
        !matches!(self, AccountStatus::Offline | AccountStatus::NotParticipating)
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An account the node holds at least one participation key for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: String,
    pub status: AccountStatus,
    /// Balance in whole units (micro-units / 1,000,000, truncated).
    pub balance: u64,
    /// Number of locally held keys for this address.
    pub key_count: usize,
    pub incentive_eligible: bool,
    /// Online on-chain, but no local key matches the registered participation.
    pub non_resident_key: bool,
    /// Estimated wall-clock expiry of the registered key. Approximate.
    pub expires_at: Option<DateTime<Utc>>,
    pub participation: Option<AccountParticipation>,
}

/// Group keys by address, counting keys per address.
pub fn keys_to_accounts(keys: &[ParticipationKey]) -> BTreeMap<String, Account> {
    let mut accounts: BTreeMap<String, Account> = BTreeMap::new();
    for key in keys {
        accounts
            .entry(key.address.clone())
            .and_modify(|acct| acct.key_count += 1)
            .or_insert_with(|| Account {
                address: key.address.clone(),
                key_count: 1,
                ..Account::default()
            });
    }
    accounts
}

/// Project the wall-clock expiry of a registered key.
///
/// Returns `None` without participation data, or while `round_time` or
/// `last_round` is still zero (no estimate yet).
pub fn estimate_expiry(
    now: DateTime<Utc>,
    last_round: u64,
    round_time: Duration,
    participation: Option<&AccountParticipation>,
) -> Option<DateTime<Utc>> {
    let participation = participation?;
    if last_round == 0 || round_time.is_zero() {
        return None;
    }
    let remaining = participation.vote_last_valid.saturating_sub(last_round);
    let nanos = round_time.as_nanos().checked_mul(u128::from(remaining))?;
    let delta = chrono::Duration::nanoseconds(i64::try_from(nanos).ok()?);
    now.checked_add_signed(delta)
}

impl Account {
    /// Overlay an on-chain record.
    pub fn merge_on_chain(mut self, rpc: &OnChainAccount) -> Self {
        self.status = AccountStatus::from_chain(&rpc.status);
        self.balance = rpc.amount / MICRO_UNITS;
        self.incentive_eligible = rpc.incentive_eligible.unwrap_or(false);
        self.participation = rpc.participation.clone();
        self
    }

    /// Flag an account whose registered key is not held locally.
    pub fn update_residency(mut self, keys: &[ParticipationKey]) -> Self {
        let resident = !self.status.is_judged()
            || self.participation.as_ref().is_some_and(|registered| {
                keys.iter()
                    .filter(|key| key.address == self.address)
                    .any(|key| is_key_active(&key.key, registered))
            });
        self.non_resident_key = !resident;
        self
    }

    pub fn update_expiry(mut self, now: DateTime<Utc>, last_round: u64, round_time: Duration) -> Self {
        self.expires_at = estimate_expiry(now, last_round, round_time, self.participation.as_ref());
        self
    }

    /// Copy the on-chain view from a previous tick, keeping the current key count.
    fn carry_forward(mut self, previous: &Account) -> Self {
        self.status = previous.status;
        self.balance = previous.balance;
        self.incentive_eligible = previous.incentive_eligible;
        self.non_resident_key = previous.non_resident_key;
        self.expires_at = previous.expires_at;
        self.participation = previous.participation.clone();
        self
    }
}

/// Rebuild `model.accounts` from its key inventory and refresh each account
/// from the chain.
///
/// On-chain lookups only run while the node is `Stable`. A failed lookup is
/// logged and that account keeps its previous values; the others proceed.
pub async fn reconcile<C: NodeApi, K: Clock + ?Sized>(
    client: &C,
    model: &mut StateModel,
    clock: &K,
    timeout: Duration,
) {
    let previous = std::mem::take(&mut model.accounts);
    let mut accounts = keys_to_accounts(&model.participation_keys);
    for (address, account) in accounts.iter_mut() {
        if let Some(prev) = previous.get(address) {
            *account = std::mem::take(account).carry_forward(prev);
        }
    }

    if model.status.state == OperationalState::Stable {
        let last_round = model.status.last_round;
        let round_time = model.metrics.round_time;
        for (address, account) in accounts.iter_mut() {
            let rpc = match bounded("get account", timeout, client.get_account(address)).await {
                Ok(rpc) => rpc,
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "Skipping account refresh");
                    continue;
                }
            };
            *account = std::mem::take(account)
                .merge_on_chain(&rpc)
                .update_residency(&model.participation_keys)
                .update_expiry(clock.now(), last_round, round_time);
        }
    }

    model.accounts = accounts;
}
