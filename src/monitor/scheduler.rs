//! Fixed-period trigger for poll cycles.

use super::{CycleReport, CycleRunner, ShutdownSignal, wait_for_shutdown};
use crate::error::{Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Counters of scheduler activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Cycles started.
    pub fired: usize,
    /// Triggers dropped because a cycle was still running.
    pub skipped: usize,
}

#[derive(Default)]
struct Counters {
    fired: AtomicUsize,
    skipped: AtomicUsize,
}

/// In-flight flag plus a wakeup for tasks waiting on it to clear.
#[derive(Default)]
struct InFlight {
    running: AtomicBool,
    idle: Notify,
}

/// Clears the in-flight flag when a cycle task ends, even by panic.
struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.running.store(false, Ordering::Release);
        self.0.idle.notify_waiters();
    }
}

/// Runs a [`CycleRunner`] every `period`, starting one period after [`Scheduler::start`].
///
/// At most one cycle runs at a time: a trigger that arrives while a cycle
/// is in flight is skipped, not queued.
pub struct Scheduler {
    runner: Arc<dyn CycleRunner>,
    period: Duration,
    shutdown: ShutdownSignal,
    in_flight: Arc<InFlight>,
    counters: Arc<Counters>,
    timer: Option<JoinHandle<()>>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn CycleRunner>, period: Duration, shutdown: ShutdownSignal) -> Self {
        Self {
            runner,
            period,
            shutdown,
            in_flight: Arc::default(),
            counters: Arc::default(),
            timer: None,
        }
    }

    /// Arm the recurring timer, replacing any existing one.
    pub fn start(&mut self) {
        self.stop();

        let runner = self.runner.clone();
        let in_flight = self.in_flight.clone();
        let counters = self.counters.clone();
        let period = self.period;
        let mut shutdown = self.shutdown.clone();

        self.timer = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        // The timer never waits on its own cycles.
                        drop(fire(&runner, &in_flight, &counters, &shutdown));
                    }
                    _ = wait_for_shutdown(&mut shutdown) => {
                        debug!("Scheduler timer stopped by shutdown");
                        break;
                    }
                }
            }
        }));

        info!(period_secs = self.period.as_secs(), "Price checks scheduled");
    }

    /// Disarm the timer. A cycle already running is left to finish.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            debug!("Previous schedule cleared");
        }
    }

    /// Run a cycle now under the same skip-if-running guard.
    ///
    /// Returns the cycle task, or `None` when a cycle was already running.
    pub fn trigger_now(&self) -> Option<JoinHandle<Result<CycleReport>>> {
        fire(&self.runner, &self.in_flight, &self.counters, &self.shutdown)
    }

    pub fn is_armed(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.running.load(Ordering::Acquire)
    }

    /// Wait until no cycle is in flight.
    pub async fn wait_idle(&self) {
        loop {
            let idle = self.in_flight.idle.notified();
            tokio::pin!(idle);
            // Register before checking the flag so a guard dropped in between still wakes us.
            idle.as_mut().enable();
            if !self.is_running() {
                return;
            }
            idle.await;
        }
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            fired: self.counters.fired.load(Ordering::Relaxed),
            skipped: self.counters.skipped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn fire(
    runner: &Arc<dyn CycleRunner>,
    in_flight: &Arc<InFlight>,
    counters: &Arc<Counters>,
    shutdown: &ShutdownSignal,
) -> Option<JoinHandle<Result<CycleReport>>> {
    if in_flight
        .running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        counters.skipped.fetch_add(1, Ordering::Relaxed);
        warn!("Previous price check still running, skipping this one");
        return None;
    }
    counters.fired.fetch_add(1, Ordering::Relaxed);

    let guard = InFlightGuard(in_flight.clone());
    let runner = runner.clone();
    let shutdown = shutdown.clone();
    Some(tokio::spawn(async move {
        let _guard = guard;
        let started = Instant::now();
        let outcome = runner.run_cycle(shutdown).await;
        match &outcome {
            Ok(report) => info!(
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Price check finished: {report}"
            ),
            Err(Error::Cancelled) => info!("Price check cancelled by shutdown"),
            Err(e) => error!(error = %e, "Price check failed"),
        }
        outcome
    }))
}
