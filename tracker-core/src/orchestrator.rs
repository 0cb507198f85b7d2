//! Orchestrator: owns the ordered list of source-specific miners (files,
//! applications), runs them sequentially, and exposes a pause/stop control
//! surface plus a lifecycle/status event stream.

use crate::scheduler::{PauseCookies, PauseReason};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MinerSummary {
    pub processed: u64,
    pub indexed: u64,
}

/// One source-specific miner (the files miner, the applications miner, …).
#[async_trait]
pub trait Miner: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, cancel: CancellationToken) -> crate::error::Result<MinerSummary>;
}

#[derive(Debug, Clone, Default)]
pub struct Status {
    pub elapsed: Duration,
    pub module: String,
    pub processed: u64,
    pub indexed: u64,
    pub remaining: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    Started,
    Paused(Vec<&'static str>),
    Continued,
    ModuleStarted(String),
    ModuleFinished(String),
    Finished {
        processed: u64,
        indexed: u64,
        interrupted: bool,
    },
}

pub struct Orchestrator {
    miners: Vec<Arc<dyn Miner>>,
    pause: Mutex<PauseCookies>,
    cancel: CancellationToken,
    status_tx: watch::Sender<Status>,
    events_tx: tokio::sync::broadcast::Sender<LifecycleEvent>,
}

impl Orchestrator {
    pub fn new(miners: Vec<Arc<dyn Miner>>) -> Self {
        let (status_tx, _) = watch::channel(Status::default());
        let (events_tx, _) = tokio::sync::broadcast::channel(32);
        Self {
            miners,
            pause: Mutex::new(PauseCookies::new()),
            cancel: CancellationToken::new(),
            status_tx,
            events_tx,
        }
    }

    pub fn status(&self) -> watch::Receiver<Status> {
        self.status_tx.subscribe()
    }

    pub fn events(&self) -> tokio::sync::broadcast::Receiver<LifecycleEvent> {
        self.events_tx.subscribe()
    }

    fn emit(&self, event: LifecycleEvent) {
        let _ = self.events_tx.send(event);
    }

    /// Runs every miner to completion, one at a time, in registration
    /// order. Stops early (reporting `interrupted: true`) if `stop()` was
    /// called.
    pub async fn start(&self) -> MinerSummary {
        self.emit(LifecycleEvent::Started);
        let start = Instant::now();
        let mut total = MinerSummary::default();
        let mut interrupted = false;

        for miner in &self.miners {
            if self.cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            self.wait_while_paused().await;

            self.emit(LifecycleEvent::ModuleStarted(miner.name().to_string()));
            let span = info_span!("miner_run", name = miner.name());
            let result = miner
                .run(self.cancel.clone())
                .instrument(span)
                .await;
            match result {
                Ok(summary) => {
                    total.processed += summary.processed;
                    total.indexed += summary.indexed;
                }
                Err(err) => {
                    tracing::error!(miner = miner.name(), %err, "miner run failed");
                }
            }
            self.emit(LifecycleEvent::ModuleFinished(miner.name().to_string()));

            let _ = self.status_tx.send(Status {
                elapsed: start.elapsed(),
                module: miner.name().to_string(),
                processed: total.processed,
                indexed: total.indexed,
                remaining: 0,
            });
        }

        self.emit(LifecycleEvent::Finished {
            processed: total.processed,
            indexed: total.indexed,
            interrupted,
        });
        total
    }

    pub async fn pause(&self, reason: PauseReason) {
        let mut cookies = self.pause.lock().await;
        cookies.pause(reason);
        self.emit(LifecycleEvent::Paused(reasons_as_str(&cookies.reasons())));
    }

    pub async fn continue_(&self, reason: PauseReason) {
        let mut cookies = self.pause.lock().await;
        if cookies.unpause(reason) {
            self.emit(LifecycleEvent::Continued);
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    async fn wait_while_paused(&self) {
        loop {
            let paused = self.pause.lock().await.is_paused();
            if !paused || self.cancel.is_cancelled() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

fn reasons_as_str(reasons: &[PauseReason]) -> Vec<&'static str> {
    reasons
        .iter()
        .map(|r| match r {
            PauseReason::LowBattery => "low-battery",
            PauseReason::LowDisk => "low-disk",
            PauseReason::UserRequest => "user-request",
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingMiner {
        name: &'static str,
        processed: u64,
    }

    #[async_trait]
    impl Miner for CountingMiner {
        fn name(&self) -> &str {
            self.name
        }
        async fn run(&self, _cancel: CancellationToken) -> crate::error::Result<MinerSummary> {
            Ok(MinerSummary {
                processed: self.processed,
                indexed: self.processed,
            })
        }
    }

    #[tokio::test]
    async fn runs_miners_sequentially_and_sums_totals() {
        let orchestrator = Orchestrator::new(vec![
            Arc::new(CountingMiner { name: "files", processed: 3 }),
            Arc::new(CountingMiner { name: "applications", processed: 2 }),
        ]);
        let summary = orchestrator.start().await;
        assert_eq!(summary.processed, 5);
    }

    #[tokio::test]
    async fn stop_prevents_later_miners_from_running() {
        let orchestrator = Arc::new(Orchestrator::new(vec![
            Arc::new(CountingMiner { name: "files", processed: 3 }),
        ]));
        orchestrator.stop();
        let summary = orchestrator.start().await;
        assert_eq!(summary.processed, 0);
    }
}
