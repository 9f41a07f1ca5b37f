//! Bounded worker pool with caller-runs backpressure.

use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, TrySendError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

/// A unit of work submitted to the pool.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Worker pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerPoolConfig {
    /// Thread name prefix, also used in logs
    pub name: String,
    /// Number of worker threads (minimum 1)
    pub workers: usize,
    /// Tasks that may wait for a free worker before callers run them inline
    pub queue_capacity: usize,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            name: "rendition-worker".to_string(),
            workers: 4,
            queue_capacity: 64,
        }
    }
}

impl WorkerPoolConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}

/// Pool runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub workers: usize,
    pub submitted: u64,
    pub executed_inline: u64,
    pub completed: u64,
    pub panicked: u64,
}

/// Fixed-size thread pool fed by a bounded channel.
///
/// - `submit` never blocks and never drops a task: when every worker is busy
///   and the queue is full, the task runs on the submitting thread
/// - a panicking task is caught and counted; the worker keeps running
/// - `shutdown` lets queued tasks finish, then joins the workers; tasks
///   submitted afterwards run inline
pub struct WorkerPool {
    name: String,
    sender: Mutex<Option<mpsc::SyncSender<Task>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    stats: Arc<Mutex<PoolStats>>,
}

impl core::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("name", &self.name)
            .field("stats", &self.stats())
            .finish()
    }
}

impl WorkerPool {
    /// Start the worker threads.
    pub fn spawn(config: WorkerPoolConfig) -> std::io::Result<Self> {
        let workers = config.workers.max(1);
        let (tx, rx) = mpsc::sync_channel::<Task>(config.queue_capacity);
        let rx = Arc::new(Mutex::new(rx));
        let stats = Arc::new(Mutex::new(PoolStats {
            workers,
            ..PoolStats::default()
        }));

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let rx = rx.clone();
            let stats = stats.clone();
            let name = config.name.clone();
            let handle = thread::Builder::new()
                .name(format!("{}-{index}", config.name))
                .spawn(move || worker_loop(&name, &rx, &stats))?;
            handles.push(handle);
        }

        info!(
            pool = %config.name,
            workers,
            queue_capacity = config.queue_capacity,
            "worker pool started"
        );

        Ok(Self {
            name: config.name,
            sender: Mutex::new(Some(tx)),
            workers: Mutex::new(handles),
            stats,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hand `task` to a worker, or run it on this thread if none can take it.
    pub fn submit(&self, task: Task) {
        record(&self.stats, |s| s.submitted += 1);

        let rejected = {
            let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
            match sender.as_ref() {
                Some(tx) => match tx.try_send(task) {
                    Ok(()) => None,
                    Err(TrySendError::Full(task)) | Err(TrySendError::Disconnected(task)) => {
                        Some(task)
                    }
                },
                None => Some(task),
            }
        };

        if let Some(task) = rejected {
            debug!(pool = %self.name, "pool saturated; running task on the calling thread");
            record(&self.stats, |s| s.executed_inline += 1);
            run_task(&self.name, task, &self.stats);
        }
    }

    /// Current statistics.
    pub fn stats(&self) -> PoolStats {
        self.stats
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop accepting queued work, drain the queue and join the workers.
    ///
    /// Idempotent.
    pub fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if sender.is_none() {
            return;
        }
        drop(sender);

        let handles = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in handles {
            let _ = handle.join();
        }
        info!(pool = %self.name, "worker pool stopped");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn record(stats: &Mutex<PoolStats>, update: impl FnOnce(&mut PoolStats)) {
    update(&mut stats.lock().unwrap_or_else(PoisonError::into_inner));
}

fn run_task(pool: &str, task: Task, stats: &Mutex<PoolStats>) {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(()) => record(stats, |s| s.completed += 1),
        Err(_) => {
            error!(pool, "pool task panicked");
            record(stats, |s| s.panicked += 1);
        }
    }
}

fn worker_loop(name: &str, rx: &Mutex<mpsc::Receiver<Task>>, stats: &Mutex<PoolStats>) {
    debug!(pool = name, "worker started");

    loop {
        let next = match rx.lock() {
            Ok(rx) => rx.recv(),
            Err(_) => break,
        };

        match next {
            Ok(task) => run_task(name, task, stats),
            // Sender dropped and queue drained: shutdown.
            Err(mpsc::RecvError) => break,
        }
    }

    debug!(pool = name, "worker stopped");
}
