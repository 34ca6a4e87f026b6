//! WatchLoop: drives one node's [`StateModel`] and publishes snapshots.

use std::sync::Arc;
use tokio::task::JoinHandle;

use crate::api::NodeApi;
use crate::clock::Clock;
use crate::config::WatchConfig;
use crate::error::WatchError;
use crate::signal::StopSignal;
use crate::state::StateModel;
use crate::status::{OperationalState, StatusTracker};
use crate::telemetry;

const DEFAULT_WINDOW: u64 = 100;

/// Handle to a running watch loop.
pub struct Watcher {
    stop: StopSignal,
    handle: JoinHandle<()>,
}

impl Watcher {
    /// Ask the loop to exit. In-flight node calls run to completion, but no
    /// callback fires after this returns.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// The loop's stop flag, for cancelling related work together with it.
    pub fn signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Wait for the loop task to finish.
    pub async fn join(self) {
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Watch task ended abnormally");
        }
    }
}

/// Spawn the watch loop for `model` on the current tokio runtime.
///
/// `on_update` runs on the loop's task with an owned snapshot after every
/// completed tick, or with the error that interrupted one. Fails without
/// spawning when `config` does not pass [`WatchConfig::validate`].
pub fn watch<C, F>(
    model: StateModel,
    client: Arc<C>,
    clock: Arc<dyn Clock>,
    config: WatchConfig,
    on_update: F,
) -> Result<Watcher, WatchError>
where
    C: NodeApi + 'static,
    F: FnMut(Result<StateModel, WatchError>) + Send + 'static,
{
    config.validate()?;

    let stop = StopSignal::new();
    let watch_loop = WatchLoop {
        tracker: StatusTracker::new(client.clone(), &config),
        client,
        clock,
        config,
        model,
        stop: stop.clone(),
        on_update,
    };
    let handle = tokio::spawn(async move {
        watch_loop.run().await;
    });
    Ok(Watcher { stop, handle })
}

struct WatchLoop<C, F> {
    tracker: StatusTracker<C>,
    client: Arc<C>,
    clock: Arc<dyn Clock>,
    config: WatchConfig,
    model: StateModel,
    stop: StopSignal,
    on_update: F,
}

impl<C, F> WatchLoop<C, F>
where
    C: NodeApi + 'static,
    F: FnMut(Result<StateModel, WatchError>) + Send + 'static,
{
    async fn run(mut self) {
        if self.model.metrics.window == 0 {
            self.model.metrics.window = DEFAULT_WINDOW;
        }
        tracing::info!(
            network = %self.model.status.network,
            window = self.model.metrics.window,
            metrics_every = self.config.metrics_every,
            "Watch loop started"
        );

        match self.tracker.fetch(&self.model.status).await {
            Ok(status) => self.model.status = status,
            Err(e) => self.fail("status", e),
        }

        while !self.stop.is_stopped() {
            self.tick().await;
        }

        self.model.watching = false;
        tracing::info!(last_round = self.model.status.last_round, "Watch loop stopped");
    }

    async fn tick(&mut self) {
        if self.model.status.state == OperationalState::FastCatchup {
            if !self.stop.sleep(self.config.catchup_poll_interval).await {
                return;
            }
            match self.tracker.fetch(&self.model.status).await {
                Ok(status) => self.model.status = status,
                Err(e) => self.fail("status", e),
            }
            return;
        }

        match self.tracker.wait_for_next_round(&self.model.status).await {
            Ok(status) => self.model.status = status,
            Err(e) => {
                self.fail("wait", e);
                self.model.status.state = OperationalState::Down;
                self.stop.sleep(self.config.error_backoff).await;
                return;
            }
        }
        tracing::debug!(
            round = self.model.status.last_round,
            state = %self.model.status.state,
            "New round"
        );

        if self
            .model
            .update_keys(self.client.as_ref(), self.clock.as_ref(), self.config.call_timeout)
            .await
            .is_err()
        {
            telemetry::record_error("keys");
        }

        if self.model.status.state != OperationalState::Syncing
            && self.model.status.last_round % self.config.metrics_every == 0
        {
            let round = self.model.status.last_round;
            let now = self.clock.now();
            if let Err(e) = self
                .model
                .metrics
                .refresh(self.client.as_ref(), round, now, self.config.call_timeout)
                .await
            {
                tracing::warn!(round, error = %e, "Metrics refresh failed");
                telemetry::record_error("metrics");
            }
        }

        self.publish();
    }

    fn publish(&mut self) {
        if self.stop.is_stopped() {
            return;
        }
        telemetry::observe(&self.model);
        (self.on_update)(Ok(self.model.clone()));
    }

    fn fail(&mut self, stage: &str, error: WatchError) {
        telemetry::record_error(stage);
        if self.stop.is_stopped() {
            return;
        }
        (self.on_update)(Err(error));
    }
}
