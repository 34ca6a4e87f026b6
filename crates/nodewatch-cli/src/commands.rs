//! Command implementations.

use std::path::PathBuf;
use std::sync::Arc;

use nodewatch::participation::{
    delete_key, generate_key, keyreg_deep_link, list_keys, GenerateKeyRequest, KeyPoll,
};
use nodewatch::{
    catchup, telemetry, watch, NodeApi, StateModel, StatusTracker, StopSignal, SystemClock,
    WatchConfig,
};
use nodewatch_algod::{AlgodClient, AlgodConfig, GithubReleases, HttpCatchpoints};

use crate::cli::{CatchupCommand, Command, KeysCommand};
use crate::error::CliError;

pub struct Context {
    client: Arc<AlgodClient>,
    http: reqwest::Client,
    config: WatchConfig,
}

impl Context {
    pub fn from_env() -> Result<Self, CliError> {
        let algod = AlgodConfig::from_env()?;
        let config = WatchConfig::from_env()?;
        let http = reqwest::Client::builder()
            .timeout(algod.http_timeout)
            .build()
            .map_err(nodewatch_algod::AlgodError::from)?;
        tracing::debug!(?algod, "Loaded algod configuration");

        Ok(Self {
            client: Arc::new(AlgodClient::with_client(http.clone(), &algod)),
            http,
            config,
        })
    }

    fn tracker(&self) -> StatusTracker<AlgodClient> {
        StatusTracker::new(self.client.clone(), &self.config)
    }
}

pub async fn run(ctx: Context, command: Command) -> Result<(), CliError> {
    match command {
        Command::Status => status(&ctx).await,
        Command::Watch { metrics_file } => follow(ctx, metrics_file).await,
        Command::Keys { command } => match command {
            KeysCommand::List => keys(&ctx).await,
            KeysCommand::Generate {
                address,
                first,
                last,
                dilution,
            } => {
                let request = GenerateKeyRequest {
                    address,
                    first_valid: first,
                    last_valid: last,
                    dilution,
                };
                generate(&ctx, request).await
            }
            KeysCommand::Delete { id } => {
                delete_key(ctx.client.as_ref(), &id, ctx.config.call_timeout).await?;
                println!("Deleted participation key {id}");
                Ok(())
            }
            KeysCommand::Link { id, offline } => link(&ctx, &id, offline).await,
        },
        Command::Catchup { command } => match command {
            CatchupCommand::Start => start_catchup(&ctx).await,
            CatchupCommand::Abort => abort_catchup(&ctx).await,
        },
    }
}

async fn bootstrap(ctx: &Context) -> Result<StateModel, CliError> {
    let releases = GithubReleases::new(ctx.http.clone());
    Ok(StateModel::bootstrap(&ctx.client, &releases, &SystemClock, &ctx.config).await?)
}

async fn status(ctx: &Context) -> Result<(), CliError> {
    let mut model = bootstrap(ctx).await?;
    if let Err(e) = model
        .update_keys(ctx.client.as_ref(), &SystemClock, ctx.config.call_timeout)
        .await
    {
        tracing::debug!(error = %e, "Accounts reflect the bootstrap key inventory");
    }
    println!("{}", serde_json::to_string_pretty(&model)?);
    Ok(())
}

fn summary(state: &StateModel) -> String {
    let metrics = state.metrics();
    format!(
        "round={} state={} tps={:.2} round_time={:.2}s rx={}B/s tx={}B/s accounts={} non_resident={}",
        state.status().last_round,
        state.status().state,
        metrics.tps,
        metrics.round_time.as_secs_f64(),
        metrics.rx_bytes_per_sec,
        metrics.tx_bytes_per_sec,
        state.accounts().len(),
        state.non_resident_count(),
    )
}

async fn follow(ctx: Context, metrics_file: Option<PathBuf>) -> Result<(), CliError> {
    let model = bootstrap(&ctx).await?;
    if model.status().needs_update {
        tracing::warn!(version = %model.status().version, "Node software is not the latest release");
    }

    let watcher = watch(
        model,
        ctx.client.clone(),
        Arc::new(SystemClock),
        ctx.config.clone(),
        move |update| match update {
            Ok(state) => {
                println!("{}", summary(&state));
                if let Some(path) = &metrics_file {
                    if let Err(e) = std::fs::write(path, telemetry::render()) {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to write metrics file");
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "Node unavailable"),
        },
    )?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Interrupt received, stopping watcher");
    watcher.stop();
    watcher.join().await;
    Ok(())
}

async fn keys(ctx: &Context) -> Result<(), CliError> {
    let keys = list_keys(ctx.client.as_ref(), ctx.config.call_timeout).await?;
    if keys.is_empty() {
        println!("No participation keys");
    }
    for key in keys {
        println!(
            "{}  {}  rounds {}..{}  last vote {}",
            key.id,
            key.address,
            key.key.vote_first_valid,
            key.key.vote_last_valid,
            key.last_vote.map_or_else(|| "-".to_string(), |r| r.to_string()),
        );
    }
    Ok(())
}

async fn generate(ctx: &Context, request: GenerateKeyRequest) -> Result<(), CliError> {
    let stop = StopSignal::new();
    let on_interrupt = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.stop();
        }
    });

    println!("Generating participation key for {}, this can take several minutes", request.address);
    let poll = KeyPoll::from(&ctx.config);
    let key = generate_key(ctx.client.as_ref(), &request, &poll, &stop).await?;

    let network = ctx.client.get_version().await?.genesis_id;
    println!("Participation key {} ready", key.id);
    println!("Register online: {}", keyreg_deep_link(&network, false, &key));
    Ok(())
}

async fn link(ctx: &Context, id: &str, offline: bool) -> Result<(), CliError> {
    let keys = list_keys(ctx.client.as_ref(), ctx.config.call_timeout).await?;
    let key = keys
        .iter()
        .find(|k| k.id == id)
        .ok_or_else(|| CliError::Usage(format!("no participation key with id {id}")))?;
    let network = ctx.client.get_version().await?.genesis_id;
    println!("{}", keyreg_deep_link(&network, offline, key));
    Ok(())
}

async fn start_catchup(ctx: &Context) -> Result<(), CliError> {
    let status = ctx.tracker().fetch_with_version().await?;
    let source = HttpCatchpoints::new(ctx.http.clone());
    let (catchpoint, message) =
        catchup::catchup_to_latest(ctx.client.as_ref(), &status, &source, ctx.config.call_timeout)
            .await?;
    println!("Latest catchpoint: {catchpoint}");
    println!("{message}");
    Ok(())
}

async fn abort_catchup(ctx: &Context) -> Result<(), CliError> {
    let raw = ctx.client.get_status().await?;
    match raw.catchpoint.filter(|c| !c.is_empty()) {
        Some(catchpoint) => {
            let message =
                catchup::abort_catchup(ctx.client.as_ref(), &catchpoint, ctx.config.call_timeout)
                    .await?;
            println!("{message}");
        }
        None => println!("Node is not running a fast-catchup"),
    }
    Ok(())
}
