//! Background scheduler for refresh cycles.
//!
//! The first cycle runs as soon as the scheduler starts; later cycles run on
//! a fixed interval. A cycle that overruns the interval delays the next tick
//! instead of causing a burst of catch-up cycles.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::merge::CycleReport;

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Time between the starts of two cycles.
    pub refresh_interval: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(300), // 5 minutes
        }
    }
}

impl SchedulerConfig {
    /// Creates a new scheduler config with the given interval.
    pub fn new(refresh_interval: Duration) -> Self {
        Self { refresh_interval }
    }
}

/// Commands that can be sent to the scheduler.
#[derive(Debug, Clone)]
pub enum SchedulerCommand {
    /// Run a cycle now and restart the interval.
    RefreshNow,
    /// Stop the scheduler.
    Stop,
}

/// Where the refresh state machine currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePhase {
    #[default]
    Idle,
    Fetching,
    Merging,
    Swapped,
    SkippedOnTotalFailure,
}

/// How a cycle ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A new entry was installed.
    Swapped { events: usize, failed_sources: usize },
    /// Every source failed; the previous entry was kept.
    SkippedOnTotalFailure,
}

/// Scheduler state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerState {
    pub phase: CyclePhase,
    pub cycles_started: u64,
    pub cycles_swapped: u64,
    pub cycles_failed: u64,
    /// Start of the most recent cycle.
    pub last_attempt: Option<DateTime<Utc>>,
    /// End of the most recent cycle that replaced the cache.
    pub last_swap: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    /// Per-source outcome of the most recent completed cycle.
    pub last_report: Option<CycleReport>,
}

impl SchedulerState {
    /// Creates a new scheduler state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the start of a cycle.
    pub fn record_start(&mut self) {
        self.cycles_started += 1;
        self.last_attempt = Some(Utc::now());
        self.phase = CyclePhase::Fetching;
    }

    /// Records a cycle that replaced the cache.
    pub fn record_swap(&mut self, report: CycleReport) {
        self.cycles_swapped += 1;
        self.last_swap = Some(Utc::now());
        self.last_error = None;
        self.last_report = Some(report);
        self.phase = CyclePhase::Swapped;
    }

    /// Records a cycle in which every source failed.
    pub fn record_total_failure(&mut self, report: CycleReport, error: impl Into<String>) {
        self.cycles_failed += 1;
        self.last_error = Some(error.into());
        self.last_report = Some(report);
        self.phase = CyclePhase::SkippedOnTotalFailure;
    }
}

/// Shared scheduler state.
pub type SharedSchedulerState = Arc<RwLock<SchedulerState>>;

/// Creates a new shared scheduler state.
pub fn new_scheduler_state() -> SharedSchedulerState {
    Arc::new(RwLock::new(SchedulerState::new()))
}

/// The scheduler drives refresh cycles.
pub struct Scheduler {
    config: SchedulerConfig,
    state: SharedSchedulerState,
    command_tx: mpsc::Sender<SchedulerCommand>,
    command_rx: mpsc::Receiver<SchedulerCommand>,
}

impl Scheduler {
    /// Creates a new scheduler with the given configuration.
    pub fn new(config: SchedulerConfig) -> Self {
        Self::with_state(config, new_scheduler_state())
    }

    /// Creates a scheduler that reports into an existing state.
    pub fn with_state(config: SchedulerConfig, state: SharedSchedulerState) -> Self {
        let (command_tx, command_rx) = mpsc::channel(16);
        Self {
            config,
            state,
            command_tx,
            command_rx,
        }
    }

    /// Returns a handle for sending commands to the scheduler.
    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            command_tx: self.command_tx.clone(),
            state: self.state.clone(),
        }
    }

    /// Returns the shared state.
    pub fn state(&self) -> SharedSchedulerState {
        self.state.clone()
    }

    /// Runs the scheduler loop with the given cycle function.
    ///
    /// Returns after a `Stop` command or once every handle is dropped. A
    /// command that arrives during a cycle is handled after it completes.
    pub async fn run<F, Fut>(self, cycle_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = CycleOutcome> + Send,
    {
        let Self {
            config,
            state,
            command_tx,
            mut command_rx,
        } = self;
        // Only handles keep the channel open.
        drop(command_tx);

        info!(
            interval_secs = config.refresh_interval.as_secs(),
            "Scheduler started"
        );

        let mut ticker = tokio::time::interval(config.refresh_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    do_cycle(&state, &cycle_fn).await;
                }
                cmd = command_rx.recv() => {
                    match cmd {
                        Some(SchedulerCommand::RefreshNow) => {
                            debug!("Received RefreshNow command");
                            do_cycle(&state, &cycle_fn).await;
                            ticker.reset();
                        }
                        Some(SchedulerCommand::Stop) | None => {
                            info!("Scheduler stopping");
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn do_cycle<F, Fut>(state: &SharedSchedulerState, cycle_fn: &F)
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = CycleOutcome>,
{
    debug!("Starting refresh cycle");
    match cycle_fn().await {
        CycleOutcome::Swapped {
            events,
            failed_sources,
        } => {
            info!(events, failed_sources, "Refresh cycle completed");
        }
        CycleOutcome::SkippedOnTotalFailure => {
            error!("Refresh cycle failed for every source, keeping previous calendar");
        }
    }
    state.write().await.phase = CyclePhase::Idle;
}

/// Handle for sending commands to a running scheduler.
#[derive(Clone, Debug)]
pub struct SchedulerHandle {
    command_tx: mpsc::Sender<SchedulerCommand>,
    state: SharedSchedulerState,
}

impl SchedulerHandle {
    /// Triggers an immediate cycle.
    pub async fn refresh_now(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::RefreshNow).await
    }

    /// Stops the scheduler.
    pub async fn stop(&self) -> Result<(), mpsc::error::SendError<SchedulerCommand>> {
        self.command_tx.send(SchedulerCommand::Stop).await
    }

    /// Returns a copy of the current scheduler state.
    pub async fn state(&self) -> SchedulerState {
        self.state.read().await.clone()
    }
}
