//! Algod REST binding for the nodewatch engine.
//!
//! [`AlgodClient`] implements [`nodewatch::NodeApi`] over algod's v2 REST
//! API. [`GithubReleases`] and [`HttpCatchpoints`] implement the engine's
//! release and catchpoint lookups against their public feeds.
//!
//! ```no_run
//! use nodewatch_algod::{AlgodClient, AlgodConfig};
//! use nodewatch::NodeApi;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AlgodClient::new(&AlgodConfig::from_env()?)?;
//! let status = client.get_status().await?;
//! println!("last round {}", status.last_round);
//! # Ok(())
//! # }
//! ```

mod catchpoint;
mod client;
pub mod config;
mod github;

pub use catchpoint::HttpCatchpoints;
pub use client::AlgodClient;
pub use config::{AlgodConfig, ConfigError};
pub use github::GithubReleases;

#[derive(Debug, thiserror::Error)]
pub enum AlgodError {
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
