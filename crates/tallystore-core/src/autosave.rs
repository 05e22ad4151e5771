//! Autosave: background thread committing a shared tracker on a cadence.
//!
//! Each cycle takes the tracker lock, calls `save()` (a no-op when the
//! store is clean) and releases the lock. On shutdown one final save runs
//! so counters recorded since the last cycle reach disk.
//!
//! The lock is held for the whole commit. With `durable_writes` that
//! includes the file and directory syncs, so an event hook arriving
//! mid-cycle waits until the write is on stable storage. Hosts that cannot
//! tolerate that stall on their event thread should disable durable writes.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{TrackerError, TrackerResult};
use crate::tracker::{SaveOutcome, SharedTracker};

/// Granularity of the shutdown check while sleeping
const SHUTDOWN_POLL: Duration = Duration::from_millis(100);

#[derive(Debug, Default)]
struct AutosaveCounters {
    cycles: AtomicU64,
    writes: AtomicU64,
}

/// Handle to a running autosave thread.
/// Dropping this handle stops the thread after its final save.
pub struct AutosaveHandle {
    shutdown: Arc<AtomicBool>,
    counters: Arc<AutosaveCounters>,
    thread: Option<thread::JoinHandle<()>>,
}

impl AutosaveHandle {
    /// Request shutdown and wait for the final save to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map_or(false, |h| !h.is_finished())
    }

    /// Save cycles completed, including clean no-op cycles.
    pub fn cycles(&self) -> u64 {
        self.counters.cycles.load(Ordering::Relaxed)
    }

    /// Cycles that actually wrote the file.
    pub fn writes(&self) -> u64 {
        self.counters.writes.load(Ordering::Relaxed)
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Release);
        if let Some(handle) = self.thread.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for AutosaveHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Start saving `tracker` every `cadence`.
pub fn start_autosave(tracker: SharedTracker, cadence: Duration) -> TrackerResult<AutosaveHandle> {
    if cadence.is_zero() {
        return Err(TrackerError::Config("autosave cadence must be > 0".into()));
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let counters = Arc::new(AutosaveCounters::default());

    let thread = {
        let shutdown = Arc::clone(&shutdown);
        let counters = Arc::clone(&counters);
        thread::Builder::new()
            .name("tallystore-autosave".to_string())
            .spawn(move || autosave_loop(tracker, cadence, shutdown, counters))
            .map_err(|e| TrackerError::Io {
                path: None,
                kind: e.kind(),
                message: format!("Failed to spawn autosave thread: {}", e),
            })?
    };

    Ok(AutosaveHandle {
        shutdown,
        counters,
        thread: Some(thread),
    })
}

fn autosave_loop(
    tracker: SharedTracker,
    cadence: Duration,
    shutdown: Arc<AtomicBool>,
    counters: Arc<AutosaveCounters>,
) {
    loop {
        let wake_time = Instant::now() + cadence;
        while Instant::now() < wake_time {
            if shutdown.load(Ordering::Acquire) {
                run_cycle(&tracker, &counters);
                debug!(cycles = counters.cycles.load(Ordering::Relaxed), "Autosave stopped");
                return;
            }
            thread::sleep(SHUTDOWN_POLL.min(wake_time.saturating_duration_since(Instant::now())));
        }
        run_cycle(&tracker, &counters);
    }
}

fn run_cycle(tracker: &SharedTracker, counters: &AutosaveCounters) {
    // Failures are already logged by the tracker and leave it dirty
    let outcome = tracker.lock().save();
    if let SaveOutcome::Written(_) = outcome {
        counters.writes.fetch_add(1, Ordering::Relaxed);
    }
    counters.cycles.fetch_add(1, Ordering::Relaxed);
}
