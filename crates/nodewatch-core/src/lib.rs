//! nodewatch: telemetry and state-synchronization engine for a blockchain node.
//!
//! Repeatedly queries a node's status and metrics endpoints, derives a
//! normalized [`OperationalState`], computes throughput and block-time
//! statistics from rate-based samples, and reconciles locally held
//! participation keys against on-chain account records.
//!
//! # Layers
//!
//! - **StatusTracker** ([`StatusTracker`]): status merge rule and the long-poll wait
//! - **MetricsSampler** ([`Metrics`]): exposition parsing, byte rates, block averages
//! - **ParticipationReconciler** ([`accounts`], [`participation`]): key inventory vs. chain
//! - **WatchLoop** ([`watch()`]): owns a [`StateModel`] and publishes snapshots
//!
//! The engine never talks HTTP itself; it drives any [`NodeApi`] implementation
//! (see the `nodewatch-algod` crate for the REST binding).
//!
//! # Quick example
//!
//! ```no_run
//! use std::sync::Arc;
//! use nodewatch::{watch, NodeApi, ReleaseSource, StateModel, SystemClock, WatchConfig};
//!
//! # async fn run<C: NodeApi + 'static, R: ReleaseSource>(client: Arc<C>, releases: R) {
//! let config = WatchConfig::default();
//! let model = StateModel::bootstrap(&client, &releases, &SystemClock, &config)
//!     .await
//!     .unwrap();
//!
//! let watcher = watch(model, client, Arc::new(SystemClock), config, |update| match update {
//!     Ok(state) => println!("round {}", state.status().last_round),
//!     Err(e) => eprintln!("node unavailable: {e}"),
//! })
//! .unwrap();
//! watcher.stop();
//! # }
//! ```

pub mod accounts;
pub mod api;
pub mod catchup;
pub mod clock;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod participation;
pub mod release;
pub mod signal;
pub mod state;
pub mod status;
pub mod telemetry;
pub mod watch;

pub use accounts::{Account, AccountStatus};
pub use api::{
    AccountParticipation, ApiError, BlockHeader, NodeApi, NodeStatus, OnChainAccount,
    ParticipationKey, VersionInfo,
};
pub use catchup::CatchpointSource;
pub use clock::{Clock, SystemClock};
pub use config::WatchConfig;
pub use error::WatchError;
pub use lifecycle::NodeLifecycle;
pub use metrics::{BlockMetrics, Metrics};
pub use release::ReleaseSource;
pub use signal::StopSignal;
pub use state::StateModel;
pub use status::{OperationalState, Status, StatusTracker};
pub use watch::{watch, Watcher};
