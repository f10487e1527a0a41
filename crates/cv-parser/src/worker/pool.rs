//! Bounded worker pool with caller-runs overflow.
//!
//! Each pool owns a fixed set of OS threads fed by a bounded crossbeam
//! channel. When the queue is full the submitting thread runs the task
//! itself instead of dropping it or blocking indefinitely. Submitters are
//! blocking-context threads, never async runtime threads, so running inline
//! only slows the saturating caller down.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::WorkerError;

type Task = Box<dyn FnOnce() + Send + 'static>;

/// How long an idle worker sleeps between shutdown-flag checks.
const IDLE_POLL: Duration = Duration::from_millis(100);
/// How often `drain` re-checks worker threads for completion.
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Outcome of draining one pool at shutdown.
#[derive(Debug, Clone, Copy)]
pub struct DrainReport {
    pub pool: &'static str,
    pub completed: u64,
    pub abandoned: usize,
}

pub struct WorkPool {
    name: &'static str,
    sender: Sender<Task>,
    receiver: Receiver<Task>,
    shutdown: Arc<AtomicBool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    completed: Arc<AtomicU64>,
    in_flight: Arc<AtomicUsize>,
    inline_runs: AtomicU64,
    drain_window: Duration,
}

impl WorkPool {
    pub fn new(name: &'static str, config: PoolConfig) -> Self {
        let (sender, receiver) = bounded::<Task>(config.queue_depth);
        let shutdown = Arc::new(AtomicBool::new(false));
        let completed = Arc::new(AtomicU64::new(0));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::with_capacity(config.workers);
        for index in 0..config.workers {
            let receiver = receiver.clone();
            let shutdown = Arc::clone(&shutdown);
            let completed = Arc::clone(&completed);
            let in_flight = Arc::clone(&in_flight);
            let handle = thread::Builder::new()
                .name(format!("{}-worker-{}", name, index))
                .spawn(move || {
                    worker_loop(receiver, shutdown, completed, in_flight);
                })
                .unwrap_or_else(|e| panic!("failed to spawn {} worker: {}", name, e));
            handles.push(handle);
        }

        info!(pool = name, workers = config.workers, queue = config.queue_depth, "pool started");

        Self {
            name,
            sender,
            receiver,
            shutdown,
            handles: Mutex::new(handles),
            completed,
            in_flight,
            inline_runs: AtomicU64::new(0),
            drain_window: Duration::from_secs(config.drain_seconds),
        }
    }

    /// Runs `f` on the pool and waits for its result.
    ///
    /// If the queue is full the task runs inline on the calling thread, so
    /// saturation slows producers down instead of losing work. Fails only
    /// when the pool is shutting down.
    pub fn execute<T, F>(&self, f: F) -> Result<T, WorkerError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        if self.shutdown.load(Ordering::SeqCst) {
            return Err(WorkerError::ShuttingDown(self.name));
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        let task: Task = Box::new(move || {
            let _ = tx.send(f());
        });

        match self.sender.try_send(task) {
            Ok(()) => {}
            Err(TrySendError::Full(task)) => {
                self.inline_runs.fetch_add(1, Ordering::Relaxed);
                warn!(pool = self.name, "queue full, running task on caller");
                task();
            }
            Err(TrySendError::Disconnected(_)) => {
                return Err(WorkerError::ShuttingDown(self.name));
            }
        }

        rx.blocking_recv()
            .map_err(|_| WorkerError::TaskLost(self.name))
    }

    /// Flips the shutdown flag. New submissions are rejected immediately;
    /// queued tasks keep running until `drain` gives up on them.
    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }

    /// Waits up to the configured drain window for workers to finish queued
    /// tasks. When the window expires, everything still queued is dropped so
    /// blocked submitters observe [`WorkerError::TaskLost`] instead of
    /// waiting on work that will never be scheduled.
    pub fn drain(&self) -> DrainReport {
        self.begin_shutdown();
        let deadline = Instant::now() + self.drain_window;

        while Instant::now() < deadline {
            if self.receiver.is_empty() && self.in_flight.load(Ordering::SeqCst) == 0 {
                break;
            }
            thread::sleep(DRAIN_POLL);
        }

        // Dropping a queued task drops its result sender, which unblocks the
        // submitter with TaskLost.
        let mut dropped = 0;
        while let Ok(task) = self.receiver.try_recv() {
            drop(task);
            dropped += 1;
        }

        // The queue is now empty, so idle workers exit on their next
        // shutdown check. Workers stuck inside a task stay detached and are
        // counted as abandoned along with the dropped queue.
        let mut handles = match self.handles.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let exit_deadline = Instant::now() + IDLE_POLL * 2;
        while Instant::now() < exit_deadline {
            if handles.iter().all(|h| h.is_finished()) {
                break;
            }
            thread::sleep(DRAIN_POLL);
        }
        let mut remaining = Vec::new();
        for handle in handles.drain(..) {
            if handle.is_finished() {
                let _ = handle.join();
            } else {
                remaining.push(handle);
            }
        }
        *handles = remaining;

        let abandoned = dropped + self.in_flight.load(Ordering::SeqCst);
        let report = DrainReport {
            pool: self.name,
            completed: self.completed.load(Ordering::SeqCst),
            abandoned,
        };
        if report.abandoned > 0 {
            warn!(pool = self.name, abandoned = report.abandoned, "drain window expired with work pending");
        } else {
            debug!(pool = self.name, completed = report.completed, "pool drained");
        }
        report
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn queued(&self) -> usize {
        self.receiver.len()
    }

    pub fn inline_runs(&self) -> u64 {
        self.inline_runs.load(Ordering::Relaxed)
    }
}

fn worker_loop(
    receiver: Receiver<Task>,
    shutdown: Arc<AtomicBool>,
    completed: Arc<AtomicU64>,
    in_flight: Arc<AtomicUsize>,
) {
    loop {
        match receiver.recv_timeout(IDLE_POLL) {
            Ok(task) => {
                in_flight.fetch_add(1, Ordering::SeqCst);
                task();
                in_flight.fetch_sub(1, Ordering::SeqCst);
                completed.fetch_add(1, Ordering::SeqCst);
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {
                // Exit only when idle: queued tasks still run during drain.
                if shutdown.load(Ordering::SeqCst) && receiver.is_empty() {
                    break;
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }
}
