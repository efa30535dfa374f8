//! Fixed-interval cycle scheduler
//!
//! Fires a cycle immediately on start and then once per interval. Each cycle
//! runs in its own task, so a slow cycle never delays the timer and stopping
//! the timer never cancels a cycle already running. A tick that fires while
//! the previous cycle is still in flight is skipped.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Shortest interval the scheduler will run at
pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Clears the in-flight flag when a cycle task ends, even by panic
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Periodic runner for reconciliation cycles
///
/// The in-flight flag belongs to the scheduler rather than to one run, so a
/// `stop()` followed by `start()` still waits out a cycle already running.
pub struct Scheduler {
    task: Option<JoinHandle<()>>,
    interval: Option<Duration>,
    in_flight: Arc<AtomicBool>,
    ticks_fired: Arc<AtomicU64>,
    ticks_skipped: Arc<AtomicU64>,
}

impl Scheduler {
    /// Create a stopped scheduler
    pub fn new() -> Self {
        Self {
            task: None,
            interval: None,
            in_flight: Arc::new(AtomicBool::new(false)),
            ticks_fired: Arc::new(AtomicU64::new(0)),
            ticks_skipped: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start invoking `cycle_fn` every `interval`, beginning immediately
    ///
    /// A running scheduler is stopped first. Must be called from within a
    /// Tokio runtime.
    pub fn start<F, Fut>(&mut self, interval: Duration, cycle_fn: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.stop();

        let interval = if interval < MIN_INTERVAL {
            warn!(
                "Scheduler interval {:?} too short, using {:?}",
                interval, MIN_INTERVAL
            );
            MIN_INTERVAL
        } else {
            interval
        };

        info!("Starting scheduler (interval: {}s)", interval.as_secs_f64());

        let in_flight = self.in_flight.clone();
        let ticks_fired = self.ticks_fired.clone();
        let ticks_skipped = self.ticks_skipped.clone();

        let cycle_fn = Arc::new(cycle_fn);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                if in_flight.swap(true, Ordering::AcqRel) {
                    ticks_skipped.fetch_add(1, Ordering::Relaxed);
                    debug!("Previous cycle still in flight, skipping tick");
                    continue;
                }

                ticks_fired.fetch_add(1, Ordering::Relaxed);
                let guard = InFlightGuard(in_flight.clone());
                let cycle_fn = cycle_fn.clone();
                // Build the cycle inside the task: a panic there must not reach the timer
                tokio::spawn(async move {
                    let _guard = guard;
                    cycle_fn().await;
                });
            }
        });

        self.task = Some(task);
        self.interval = Some(interval);
    }

    /// Cancel future cycles; a cycle already running is left to finish
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            info!("Scheduler stopped");
        }
        self.interval = None;
    }

    /// Check if the timer is running
    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Interval of the running timer
    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    /// Check if a cycle is currently running
    pub fn is_cycle_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Number of ticks that started a cycle
    pub fn ticks_fired(&self) -> u64 {
        self.ticks_fired.load(Ordering::Relaxed)
    }

    /// Number of ticks skipped because a cycle was still in flight
    pub fn ticks_skipped(&self) -> u64 {
        self.ticks_skipped.load(Ordering::Relaxed)
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
