use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::PollingConfig;
use crate::models::{Chain, ProgressRecord};

use super::{Aggregator, SweepPlan};

/// Latest published progress of every chain
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Sequence number of the sweep that produced the records, 0 before the first one
    pub sweep: u64,
    pub completed_at: Option<DateTime<Utc>>,
    pub config: PollingConfig,
    pub records: Vec<ProgressRecord>,
}

impl Snapshot {
    fn empty(config: PollingConfig) -> Self {
        Self {
            sweep: 0,
            completed_at: None,
            config,
            records: Vec::new(),
        }
    }
}

/// Live edits accepted by a running scheduler
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetIndexerUrl(String),
    SetRefreshInterval(u64),
    OverrideRpc { chain_id: u64, rpc_url: String },
}

#[derive(Error, Debug)]
#[error("Scheduler is not running")]
pub struct SchedulerStopped;

/// Cloneable sender of live edits
#[derive(Clone)]
pub struct SchedulerCommands {
    tx: mpsc::UnboundedSender<Command>,
}

impl SchedulerCommands {
    #[cfg(test)]
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, command: Command) -> Result<(), SchedulerStopped> {
        self.tx.send(command).map_err(|_| SchedulerStopped)
    }

}

/// Owner-side handle of a spawned scheduler
pub struct SchedulerHandle {
    commands: SchedulerCommands,
    snapshots: watch::Receiver<Snapshot>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    pub fn commands(&self) -> SchedulerCommands {
        self.commands.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    #[cfg(test)]
    pub fn latest(&self) -> Snapshot {
        self.snapshots.borrow().clone()
    }

    /// Stop the timer and the loop. Sweeps still in flight finish but are never published.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.task.await {
            error!("Scheduler task failed: {}", e);
        }
    }
}

struct SweepOutcome {
    plan: SweepPlan,
    records: Vec<ProgressRecord>,
    completed_at: DateTime<Utc>,
}

/// Runs a sweep over all chains at a fixed rate and publishes each completed one.
///
/// The scheduler task is the only writer of the polling config and the chain
/// list. Each sweep runs as its own task on a cloned [`SweepPlan`], so sweeps
/// may overlap when one takes longer than the refresh interval. A finished
/// sweep is published only if no reconfiguration happened since it started
/// and no later sweep has been published already.
pub struct Scheduler {
    aggregator: Aggregator,
    config: PollingConfig,
    chains: Vec<Chain>,
    epoch: u64,
    last_started: u64,
    last_published: u64,
    snapshots: watch::Sender<Snapshot>,
    outcomes: mpsc::UnboundedSender<SweepOutcome>,
}

impl Scheduler {
    /// Start polling `chains` right away and return the handle controlling it
    pub fn spawn(aggregator: Aggregator, chains: Vec<Chain>, config: PollingConfig) -> SchedulerHandle {
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot::empty(config.clone()));
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let scheduler = Self {
            aggregator,
            config,
            chains,
            epoch: 0,
            last_started: 0,
            last_published: 0,
            snapshots: snapshot_tx,
            outcomes: outcome_tx,
        };
        let task = tokio::spawn(scheduler.run(command_rx, outcome_rx, shutdown.clone()));

        SchedulerHandle {
            commands: SchedulerCommands { tx: command_tx },
            snapshots: snapshot_rx,
            shutdown,
            task,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut outcomes: mpsc::UnboundedReceiver<SweepOutcome>,
        shutdown: CancellationToken,
    ) {
        info!(
            "Polling {} chains every {}s against {}",
            self.chains.len(),
            self.config.refresh_interval_secs(),
            self.config.indexer_url()
        );
        let mut ticker = self.restart();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,

                command = commands.recv() => match command {
                    Some(command) => {
                        if self.apply(command) {
                            // dropping the previous interval cancels the pending tick
                            ticker = self.restart();
                        }
                    }
                    None => break,
                },

                _ = ticker.tick() => self.start_sweep(),

                Some(outcome) = outcomes.recv() => self.publish(outcome),
            }
        }

        info!("Scheduler stopped after {} sweeps", self.last_started);
    }

    /// Sweep now and arm a fresh fixed-rate timer measured from this sweep
    fn restart(&mut self) -> Interval {
        self.start_sweep();
        let period = self.config.refresh_interval();
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker
    }

    fn start_sweep(&mut self) {
        self.last_started += 1;
        let plan = SweepPlan {
            sequence: self.last_started,
            epoch: self.epoch,
            config: self.config.clone(),
            chains: self.chains.clone(),
        };
        let aggregator = self.aggregator.clone();
        let outcomes = self.outcomes.clone();

        tokio::spawn(async move {
            let records = aggregator.sweep(&plan).await;
            // receiver is gone once the scheduler stopped
            let _ = outcomes.send(SweepOutcome {
                plan,
                records,
                completed_at: Utc::now(),
            });
        });
    }

    /// Apply a live edit. Returns true when the timer must restart.
    fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::SetIndexerUrl(indexer_url) => {
                let updated = self.config.with_indexer_url(&indexer_url);
                self.reconfigure(updated)
            }
            Command::SetRefreshInterval(secs) => {
                let updated = self.config.with_refresh_interval(secs);
                self.reconfigure(updated)
            }
            Command::OverrideRpc { chain_id, rpc_url } => {
                self.override_rpc(chain_id, rpc_url.trim());
                false
            }
        }
    }

    fn reconfigure(&mut self, updated: PollingConfig) -> bool {
        if updated == self.config {
            debug!("Polling config unchanged, keeping current timer");
            return false;
        }
        info!(
            "Polling config changed: indexer {} every {}s",
            updated.indexer_url(),
            updated.refresh_interval_secs()
        );
        self.config = updated;
        self.epoch += 1;
        true
    }

    fn override_rpc(&mut self, chain_id: u64, rpc_url: &str) {
        let Some(chain) = self.chains.iter_mut().find(|c| c.chain_id == chain_id) else {
            warn!("Ignoring RPC override for unknown chain {}", chain_id);
            return;
        };
        info!("RPC for {} ({}) set to {}", chain.name, chain_id, rpc_url);
        chain.rpc_url = rpc_url.to_string();
        self.epoch += 1;

        // show the new endpoint without its old error until the next sweep settles
        self.snapshots.send_modify(|snapshot| {
            if let Some(record) = snapshot.records.iter_mut().find(|r| r.chain_id == chain_id) {
                record.rpc_url = rpc_url.to_string();
                record.rpc_error = None;
            }
        });

        self.start_sweep();
    }

    fn publish(&mut self, outcome: SweepOutcome) {
        let sequence = outcome.plan.sequence;
        if outcome.plan.epoch != self.epoch {
            debug!("Discarding sweep {} started before the last reconfiguration", sequence);
            return;
        }
        if sequence <= self.last_published {
            debug!("Discarding sweep {}, sweep {} already published", sequence, self.last_published);
            return;
        }

        let failing = outcome
            .records
            .iter()
            .filter(|r| r.rpc_error.is_some() || r.indexer_error.is_some())
            .count();
        debug!(
            "Sweep {} finished: {} chains, {} with errors",
            sequence,
            outcome.records.len(),
            failing
        );

        self.last_published = sequence;
        self.snapshots.send_replace(Snapshot {
            sweep: sequence,
            completed_at: Some(outcome.completed_at),
            config: outcome.plan.config,
            records: outcome.records,
        });
    }
}
