use std::sync::Arc;

use tracing::info_span;

use rendition_auth::run_as_system;
use rendition_core::Job;

use crate::materializer::{ArtifactMaterializer, EnsureOutcome};
use crate::repository::RepositoryStore;
use crate::transaction::TransactionService;
use crate::transform::TransformService;

/// Result of handling one dispatched job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Success,
    /// Nothing to do (source gone, empty output, ...)
    Skipped(String),
    /// Failed for good; the job is discarded
    Failure(String),
}

/// Executes dispatched jobs on a pool thread.
pub trait JobHandler: Send + Sync {
    fn handle(&self, job: &Job) -> JobResult;
}

impl<F> JobHandler for F
where
    F: Fn(&Job) -> JobResult + Send + Sync,
{
    fn handle(&self, job: &Job) -> JobResult {
        self(job)
    }
}

/// Runs each job as the system principal, in its own retrying unit of work.
pub struct RenditionJobHandler<R, T> {
    transactions: TransactionService,
    materializer: Arc<ArtifactMaterializer<R, T>>,
}

impl<R, T> RenditionJobHandler<R, T>
where
    R: RepositoryStore,
    T: TransformService,
{
    pub fn new(transactions: TransactionService, materializer: Arc<ArtifactMaterializer<R, T>>) -> Self {
        Self {
            transactions,
            materializer,
        }
    }
}

impl<R, T> JobHandler for RenditionJobHandler<R, T>
where
    R: RepositoryStore,
    T: TransformService,
{
    fn handle(&self, job: &Job) -> JobResult {
        run_as_system(|_| {
            let _span = info_span!("rendition_job", parent = %job.parent, source = %job.source).entered();

            match self
                .transactions
                .run_in_transaction(|_uow| self.materializer.ensure(job))
            {
                Ok(EnsureOutcome::Skipped(reason)) => JobResult::Skipped(reason.to_string()),
                Ok(_) => JobResult::Success,
                Err(err) => JobResult::Failure(err.to_string()),
            }
        })
    }
}
