//! The aggregate state published to subscribers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::accounts::{keys_to_accounts, reconcile, Account};
use crate::api::{NodeApi, ParticipationKey};
use crate::clock::Clock;
use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::metrics::Metrics;
use crate::participation::list_keys;
use crate::release::ReleaseSource;
use crate::status::{Status, StatusTracker};

/// Snapshot of everything the engine knows about one node.
///
/// Plain data: the watch loop owns the live copy and hands clones to
/// subscribers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateModel {
    pub status: Status,
    pub metrics: Metrics,
    pub accounts: BTreeMap<String, Account>,
    pub participation_keys: Vec<ParticipationKey>,
    /// The configured token can list participation keys.
    pub admin: bool,
    pub watching: bool,
}

impl StateModel {
    /// Build the initial model: status with version metadata, one metrics
    /// sample taken at `clock.now()`, and the key inventory.
    ///
    /// Only a version or status failure is fatal. A metrics failure leaves
    /// metrics disabled and a key-list failure leaves `admin` false.
    pub async fn bootstrap<C, R>(
        client: &Arc<C>,
        releases: &R,
        clock: &dyn Clock,
        config: &WatchConfig,
    ) -> Result<Self, WatchError>
    where
        C: NodeApi,
        R: ReleaseSource,
    {
        let tracker = StatusTracker::new(client.clone(), config);
        let status = tracker.bootstrap(releases).await?;

        let mut metrics = Metrics::new(config.window);
        if let Err(e) = metrics
            .refresh(client.as_ref(), status.last_round, clock.now(), config.call_timeout)
            .await
        {
            tracing::warn!(error = %e, "Initial metrics sample failed");
        }

        let (participation_keys, admin) = match list_keys(client.as_ref(), config.call_timeout).await {
            Ok(keys) => (keys, true),
            Err(e) => {
                tracing::warn!(error = %e, "Participation keys unavailable, continuing without admin");
                (Vec::new(), false)
            }
        };
        let accounts = keys_to_accounts(&participation_keys);

        tracing::info!(
            network = %status.network,
            version = %status.version,
            state = %status.state,
            last_round = status.last_round,
            admin,
            accounts = accounts.len(),
            "Node state initialized"
        );

        Ok(Self {
            status,
            metrics,
            accounts,
            participation_keys,
            admin,
            watching: true,
        })
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn accounts(&self) -> &BTreeMap<String, Account> {
        &self.accounts
    }

    pub fn account(&self, address: &str) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Accounts online on-chain whose registered key is not held locally.
    pub fn non_resident_count(&self) -> usize {
        self.accounts.values().filter(|a| a.non_resident_key).count()
    }

    /// Refresh the key inventory, then reconcile accounts against the chain.
    ///
    /// A failed listing clears `admin` and keeps the previous keys;
    /// reconciliation still runs on them and the listing error is returned.
    pub async fn update_keys<C, K>(
        &mut self,
        client: &C,
        clock: &K,
        timeout: Duration,
    ) -> Result<(), WatchError>
    where
        C: NodeApi,
        K: Clock + ?Sized,
    {
        let listed = match list_keys(client, timeout).await {
            Ok(keys) => {
                self.participation_keys = keys;
                self.admin = true;
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Participation key listing failed");
                self.admin = false;
                Err(e)
            }
        };
        reconcile(client, self, clock, timeout).await;
        listed
    }
}
