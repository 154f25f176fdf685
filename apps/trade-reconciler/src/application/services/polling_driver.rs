//! Polling Driver
//!
//! The single cooperative loop that keeps trade groups in step with the
//! broker. Each cycle:
//!
//! 1. Connectivity check (`get_account`), recorded as a heartbeat. A failed
//!    check skips the rest of the cycle and backs off exponentially.
//! 2. Broker snapshot and reconciliation of every open group.
//! 3. Drain pending entry signals and propose each one. A signal is settled
//!    as decided once accepted or rejected, and kept aside when the proposal
//!    itself fails.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rand::Rng;
use tokio_util::sync::CancellationToken;

use crate::application::dto::{EntryDecision, ReconcileReport};
use crate::application::ports::{BrokerPort, Clock, SignalDisposition, SignalSourcePort};
use crate::application::use_cases::{ProposeEntryUseCase, ReconcileUseCase};
use crate::domain::health::{HeartbeatRepository, NewHeartbeat};
use crate::domain::trade_group::TradeGroupStore;
use crate::error::ReconcilerError;

/// Polling cadence and connectivity backoff.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    /// Delay between healthy cycles.
    pub interval: Duration,
    /// First delay after a failed connectivity check.
    pub initial_backoff: Duration,
    /// Cap on the connectivity backoff.
    pub max_backoff: Duration,
    /// Spread backoff delays by up to ±10%.
    pub jitter: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            jitter: true,
        }
    }
}

/// Exponential backoff for broker outages: initial, doubling, capped.
#[derive(Debug, Clone)]
pub struct ConnectivityBackoff {
    initial: Duration,
    max: Duration,
    current: Duration,
    jitter: bool,
    failures: u32,
}

impl ConnectivityBackoff {
    /// Create a backoff starting at `initial` and capped at `max`.
    #[must_use]
    pub fn new(initial: Duration, max: Duration, jitter: bool) -> Self {
        Self {
            initial,
            max,
            current: initial.min(max),
            jitter,
            failures: 0,
        }
    }

    /// Delay to wait after one more consecutive failure.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        self.failures += 1;
        if self.jitter {
            let factor = rand::rng().random_range(0.9..=1.1);
            delay.mul_f64(factor)
        } else {
            delay
        }
    }

    /// Consecutive failures since the last reset.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures
    }

    /// Back to the initial delay after a success.
    pub fn reset(&mut self) {
        self.current = self.initial.min(self.max);
        self.failures = 0;
    }
}

/// What one healthy cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleSummary {
    /// Reconciliation result, absent if the snapshot could not be taken.
    pub report: Option<ReconcileReport>,
    /// Decisions for the signals drained this cycle.
    pub entries: Vec<EntryDecision>,
}

/// Result of [`PollingDriver::run_cycle`].
#[derive(Debug, Clone)]
pub enum CycleOutcome {
    /// Broker unreachable; wait `retry_in` before the next cycle.
    Offline {
        /// Backoff delay.
        retry_in: Duration,
    },
    /// Cycle ran to completion.
    Completed(CycleSummary),
}

/// The polling loop.
pub struct PollingDriver<B, S, H>
where
    B: BrokerPort,
    S: TradeGroupStore,
    H: HeartbeatRepository,
{
    broker: Arc<B>,
    heartbeats: Arc<H>,
    signals: Arc<dyn SignalSourcePort>,
    clock: Arc<dyn Clock>,
    reconcile: ReconcileUseCase<B, S>,
    propose: ProposeEntryUseCase<B, S>,
    config: PollingConfig,
    backoff: Mutex<ConnectivityBackoff>,
}

impl<B, S, H> PollingDriver<B, S, H>
where
    B: BrokerPort,
    S: TradeGroupStore,
    H: HeartbeatRepository,
{
    /// Create a driver.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        broker: Arc<B>,
        heartbeats: Arc<H>,
        signals: Arc<dyn SignalSourcePort>,
        clock: Arc<dyn Clock>,
        reconcile: ReconcileUseCase<B, S>,
        propose: ProposeEntryUseCase<B, S>,
        config: PollingConfig,
    ) -> Self {
        let backoff =
            ConnectivityBackoff::new(config.initial_backoff, config.max_backoff, config.jitter);
        Self {
            broker,
            heartbeats,
            signals,
            clock,
            reconcile,
            propose,
            config,
            backoff: Mutex::new(backoff),
        }
    }

    /// Run cycles until `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            interval_secs = self.config.interval.as_secs(),
            "Polling driver started"
        );

        loop {
            let delay = match self.run_cycle().await {
                CycleOutcome::Offline { retry_in } => retry_in,
                CycleOutcome::Completed(_) => self.config.interval,
            };

            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = shutdown.cancelled() => {
                    tracing::info!("Polling driver shutting down");
                    break;
                }
            }
        }
    }

    /// Run a single cycle.
    pub async fn run_cycle(&self) -> CycleOutcome {
        // 1. Connectivity check
        let started = Instant::now();
        let account = self.broker.get_account().await;
        let latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let now = self.clock.now();

        let prior_failures = self.backoff.lock().failures();
        let beat = match &account {
            Ok(_) if prior_failures > 0 => NewHeartbeat::ok(now, latency_ms)
                .with_note(format!("recovered after {prior_failures} failed checks")),
            Ok(_) => NewHeartbeat::ok(now, latency_ms),
            Err(e) => NewHeartbeat::failed(now, latency_ms, e.http_status(), e.to_string()),
        };
        if let Err(e) = self.heartbeats.record_heartbeat(beat).await {
            ReconcilerError::from(e).log("Failed to record heartbeat");
        }

        if let Err(e) = account {
            let (retry_in, failures) = {
                let mut backoff = self.backoff.lock();
                (backoff.next_delay(), backoff.failures())
            };
            tracing::warn!(
                error = %e,
                consecutive_failures = failures,
                retry_in_ms = retry_in.as_millis() as u64,
                "Broker unreachable, skipping cycle"
            );
            return CycleOutcome::Offline { retry_in };
        }
        self.backoff.lock().reset();

        // 2. Snapshot and reconcile
        let report = match self.reconcile.fetch_snapshot().await {
            Ok(snapshot) => match self.reconcile.reconcile(&snapshot).await {
                Ok(report) => {
                    log_report(&report);
                    Some(report)
                }
                Err(e) => {
                    e.log("Reconciliation pass failed");
                    None
                }
            },
            Err(e) => {
                e.log("Broker snapshot failed");
                None
            }
        };

        // 3. New entries
        let mut entries = Vec::new();
        match self.signals.drain().await {
            Ok(signals) => {
                for received in signals {
                    let signal = received.signal;
                    let symbol = signal.symbol.clone();
                    let disposition = match self
                        .propose
                        .propose_entry(signal.symbol, signal.side, signal.candidate)
                        .await
                    {
                        Ok(decision) => {
                            entries.push(decision);
                            SignalDisposition::Decided
                        }
                        Err(e) => {
                            e.with_context("symbol", symbol.as_str())
                                .with_context("signal", received.receipt.as_str())
                                .log("Entry proposal failed");
                            SignalDisposition::Failed
                        }
                    };
                    if let Err(e) = self.signals.settle(&received.receipt, disposition).await {
                        ReconcilerError::from(e)
                            .with_context("signal", received.receipt.as_str())
                            .log("Failed to settle signal");
                    }
                }
            }
            Err(e) => ReconcilerError::from(e).log("Signal source unavailable"),
        }

        CycleOutcome::Completed(CycleSummary { report, entries })
    }
}

fn log_report(report: &ReconcileReport) {
    if report.is_quiet() {
        tracing::debug!(groups = report.groups_examined, "Reconcile pass quiet");
    } else {
        tracing::info!(
            groups = report.groups_examined,
            transitions = report.transitions.len(),
            errors = report.errors.len(),
            stray_legs = report.stray_legs.len(),
            "Reconcile pass complete"
        );
    }
}
