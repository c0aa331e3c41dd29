//! Fixed-interval driver for a [`Checker`].
//!
//! The checker runs on a dedicated thread. Cycle starts are spaced by the
//! interval measured start-to-start; a cycle that overruns is followed
//! immediately by the next one, never by an overlapping one.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::checker::Checker;

/// Default spacing between cycle starts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

const THREAD_NAME: &str = "hostpulse-checker";

#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    interval: Duration,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL)
    }
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Spawn the cycle thread. The first cycle runs right away.
    pub fn start(self, checker: Checker) -> std::io::Result<SchedulerHandle> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let interval = self.interval;
        info!("starting checker every {interval:?}");

        let thread = thread::Builder::new()
            .name(THREAD_NAME.into())
            .spawn(move || {
                let mut checker = checker;
                loop {
                    let started = Instant::now();
                    let report = checker.check();
                    let elapsed = started.elapsed();
                    if elapsed > interval {
                        warn!(
                            "cycle {} took {elapsed:?}, longer than the {interval:?} interval",
                            report.cycle
                        );
                    }

                    let remaining = interval.saturating_sub(elapsed);
                    match stop_rx.recv_timeout(remaining) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("checker loop stopped after {} cycles", checker.cycles());
                checker.on_shutdown();
                checker
            })?;

        Ok(SchedulerHandle {
            stop_tx,
            thread,
        })
    }
}

/// Control handle for a running scheduler.
///
/// Dropping the handle without calling [`join`](Self::join) still stops the
/// loop; the thread finishes in the background.
pub struct SchedulerHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<Checker>,
}

impl SchedulerHandle {
    /// Ask the loop to stop. A cycle in progress completes first.
    pub fn stop(&self) {
        let _ = self.stop_tx.send(());
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Stop the loop and wait for it. Returns the checker, already shut down.
    pub fn join(self) -> thread::Result<Checker> {
        self.stop();
        self.thread.join()
    }
}
