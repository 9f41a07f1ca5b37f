use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use thiserror::Error;
use tracing::{debug, error, info, trace};

use rendition_core::{Job, NodeId, UnitOfWorkId};
use rendition_events::{TransactionListener, UnitOfWork, UnitOfWorkError};

use super::handler::{JobHandler, JobResult};
use super::pool::WorkerPool;

/// Listener key the queue binds under; one binding per unit of work.
pub const QUEUE_LISTENER_KEY: &str = "rendition.job-queue";

#[derive(Debug, Error)]
pub enum QueueError {
    #[error(transparent)]
    UnitOfWork(#[from] UnitOfWorkError),

    #[error("pending job registry poisoned")]
    Poisoned,
}

/// Job queue whose contents only become visible when a unit of work commits.
///
/// Jobs are buffered per unit of work and de-duplicated by `(parent, source)`.
/// On commit every buffered job is handed to the worker pool exactly once;
/// on rollback the buffer is dropped and nothing runs.
pub struct TransactionalJobQueue {
    pending: Mutex<HashMap<UnitOfWorkId, HashSet<Job>>>,
    pool: Arc<WorkerPool>,
    handler: Arc<dyn JobHandler>,
}

impl core::fmt::Debug for TransactionalJobQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransactionalJobQueue")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

impl TransactionalJobQueue {
    pub fn new(pool: Arc<WorkerPool>, handler: Arc<dyn JobHandler>) -> Arc<Self> {
        Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
            pool,
            handler,
        })
    }

    /// Buffer a job in `uow`.
    ///
    /// Returns `false` if the same job is already buffered there. Fails if
    /// `uow` is no longer active.
    pub fn enqueue(self: &Arc<Self>, uow: &UnitOfWork, parent: NodeId, source: NodeId) -> Result<bool, QueueError> {
        let job = Job::new(parent, source);
        uow.bind_listener(self.clone())?;

        let added = uow.with_active(|| -> Result<bool, QueueError> {
            let mut pending = self.pending.lock().map_err(|_| QueueError::Poisoned)?;
            Ok(pending.entry(uow.id()).or_default().insert(job))
        })??;

        trace!(uow = %uow.id(), job = %job, added, "job enqueued");
        Ok(added)
    }

    /// Number of jobs buffered in `uow`.
    pub fn pending_len(&self, uow: &UnitOfWork) -> usize {
        self.lock_pending()
            .get(&uow.id())
            .map_or(0, HashSet::len)
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, HashMap<UnitOfWorkId, HashSet<Job>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn drain(&self, uow: UnitOfWorkId) -> HashSet<Job> {
        self.lock_pending().remove(&uow).unwrap_or_default()
    }

    fn dispatch(&self, job: Job) {
        let handler = self.handler.clone();
        self.pool.submit(Box::new(move || run_job(handler.as_ref(), &job)));
    }
}

fn run_job(handler: &dyn JobHandler, job: &Job) {
    match handler.handle(job) {
        JobResult::Success => debug!(job = %job, "job completed"),
        JobResult::Skipped(reason) => debug!(job = %job, reason, "job skipped"),
        JobResult::Failure(err) => error!(job = %job, error = %err, "job failed; discarding"),
    }
}

impl TransactionListener for TransactionalJobQueue {
    fn key(&self) -> &str {
        QUEUE_LISTENER_KEY
    }

    fn after_commit(&self, uow: &UnitOfWork) {
        let jobs = self.drain(uow.id());
        if jobs.is_empty() {
            return;
        }

        info!(uow = %uow.id(), jobs = jobs.len(), "dispatching committed jobs");
        for job in jobs {
            self.dispatch(job);
        }
    }

    fn after_rollback(&self, uow: &UnitOfWork) {
        let jobs = self.drain(uow.id());
        if !jobs.is_empty() {
            debug!(uow = %uow.id(), discarded = jobs.len(), "rolled back; pending jobs discarded");
        }
    }
}
