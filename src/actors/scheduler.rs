//! SchedulerActor - Drives the alert evaluator on a fixed interval
//!
//! ## Message Flow
//!
//! ```text
//! Timer tick → MetricsSource::snapshot → AlertEvaluator::evaluate → AlertHandler::handle(batch)
//!     ↑
//!     └─── Commands (TickNow, Shutdown)
//! ```
//!
//! The actor is the only owner of the evaluator, so cooldown state is never
//! shared. Ticks run one at a time inside the actor loop: a slow tick pushes
//! the next one back instead of overlapping with it.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error, instrument, trace, warn};

use crate::config::{AlertConfig, MAX_INTERVAL};
use crate::monitors::evaluator::{AlertBatch, AlertEvaluator};
use crate::monitors::source::{CollectionError, MetricsSource};

use super::messages::{SchedulerCommand, TickOutcome};

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Receives every non-empty batch of alerts, once per tick.
#[async_trait]
pub trait AlertHandler: Send + Sync {
    async fn handle(&self, batch: AlertBatch);
}

/// Source of "now" for cooldown bookkeeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Time between the start of two ticks
    pub interval: Duration,

    /// Upper bound for a single snapshot
    pub snapshot_timeout: Duration,
}

impl From<&AlertConfig> for SchedulerSettings {
    fn from(config: &AlertConfig) -> Self {
        Self {
            interval: config.interval,
            snapshot_timeout: config.snapshot_timeout,
        }
    }
}

pub struct SchedulerActor {
    evaluator: AlertEvaluator,

    source: Arc<dyn MetricsSource>,

    handler: Arc<dyn AlertHandler>,

    clock: Arc<dyn Clock>,

    command_rx: mpsc::Receiver<SchedulerCommand>,

    settings: SchedulerSettings,
}

impl SchedulerActor {
    pub fn new(
        evaluator: AlertEvaluator,
        source: Arc<dyn MetricsSource>,
        handler: Arc<dyn AlertHandler>,
        clock: Arc<dyn Clock>,
        command_rx: mpsc::Receiver<SchedulerCommand>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            evaluator,
            source,
            handler,
            clock,
            command_rx,
            settings,
        }
    }

    /// Run until a Shutdown command arrives or every handle is dropped.
    #[instrument(skip(self), fields(interval = ?self.settings.interval))]
    pub async fn run(mut self) {
        let thresholds = self.evaluator.policy();
        debug!(
            "alert monitoring started: CPU temp > {:.0}°C, CPU > {:.0}%, RAM > {:.0}%, disk > {:.0}%",
            thresholds.cpu_temperature,
            thresholds.cpu_usage,
            thresholds.memory_usage,
            thresholds.disk_usage,
        );

        let period = self.period();
        // first tick one full interval after start
        let start = Instant::now().checked_add(period).unwrap_or_else(Instant::now);
        let mut ticker = interval_at(start, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.tick().await;
                }

                cmd = self.command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::TickNow { respond_to }) => {
                            debug!("received TickNow command");
                            let outcome = self.tick().await;
                            let _ = respond_to.send(outcome);
                        }

                        Some(SchedulerCommand::Shutdown) => {
                            debug!("received shutdown command");
                            break;
                        }

                        None => {
                            warn!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
            }
        }

        debug!("scheduler stopped");
    }

    /// The configured interval, kept within what the timer can schedule.
    fn period(&self) -> Duration {
        let interval = self.settings.interval;
        let period = interval.clamp(MIN_INTERVAL, MAX_INTERVAL);
        if period != interval {
            warn!("interval {interval:?} out of range, using {period:?}");
        }
        period
    }

    /// One monitoring cycle. Collection failures skip the cycle without
    /// touching the evaluator.
    async fn tick(&mut self) -> TickOutcome {
        let snapshot = match tokio::time::timeout(
            self.settings.snapshot_timeout,
            self.source.snapshot(),
        )
        .await
        {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                error!("error checking system: {e}");
                return TickOutcome::Skipped;
            }
            Err(_) => {
                error!("error checking system: {}", CollectionError::Timeout);
                return TickOutcome::Skipped;
            }
        };

        let now = self.clock.now();
        let alerts = self.evaluator.evaluate(&snapshot, now);

        let Some(batch) = AlertBatch::new(alerts) else {
            trace!("no thresholds exceeded");
            return TickOutcome::Quiet;
        };

        let count = batch.alerts().len();
        warn!("found {count} alert(s): {:?}", batch.kinds());
        self.handler.handle(batch).await;

        TickOutcome::Alerted(count)
    }
}

/// Handle for controlling the SchedulerActor
#[derive(Clone)]
pub struct SchedulerHandle {
    sender: mpsc::Sender<SchedulerCommand>,
}

impl SchedulerHandle {
    /// Spawn a scheduler using the system clock.
    pub fn spawn(
        evaluator: AlertEvaluator,
        source: Arc<dyn MetricsSource>,
        handler: Arc<dyn AlertHandler>,
        settings: SchedulerSettings,
    ) -> Self {
        Self::spawn_with_clock(evaluator, source, handler, Arc::new(SystemClock), settings)
    }

    pub fn spawn_with_clock(
        evaluator: AlertEvaluator,
        source: Arc<dyn MetricsSource>,
        handler: Arc<dyn AlertHandler>,
        clock: Arc<dyn Clock>,
        settings: SchedulerSettings,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = SchedulerActor::new(evaluator, source, handler, clock, cmd_rx, settings);
        tokio::spawn(actor.run());

        Self { sender: cmd_tx }
    }

    /// Run a tick immediately and wait for its outcome.
    pub async fn tick_now(&self) -> Result<TickOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(SchedulerCommand::TickNow { respond_to: tx })
            .await
            .context("failed to send TickNow command")?;

        rx.await.context("failed to receive tick outcome")
    }

    /// Stop the scheduler and wait until its task has exited.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(SchedulerCommand::Shutdown).await;
        self.sender.closed().await;
    }

    pub fn is_stopped(&self) -> bool {
        self.sender.is_closed()
    }
}
