//! Wiring of the rendition pipeline.

use std::sync::Arc;

use tracing::info;

use rendition_events::{DocumentEvent, UnitOfWork, route};

use crate::config::RenditionConfig;
use crate::jobs::{RenditionJobHandler, TransactionalJobQueue, WorkerPool};
use crate::materializer::ArtifactMaterializer;
use crate::repository::RepositoryStore;
use crate::transaction::TransactionService;
use crate::triggers::{RenditionTriggers, TriggerError};
use crate::transform::TransformService;

/// Triggers, queue, pool and materializer sharing one repository.
///
/// Hosts feed events through [`RenditionPipeline::on_event`] from inside
/// their own units of work and call [`RenditionPipeline::shutdown`] to drain
/// outstanding jobs.
pub struct RenditionPipeline<R, T> {
    repository: Arc<R>,
    transactions: TransactionService,
    pool: Arc<WorkerPool>,
    queue: Arc<TransactionalJobQueue>,
    triggers: RenditionTriggers<Arc<R>>,
    materializer: Arc<ArtifactMaterializer<Arc<R>, T>>,
}

impl<R, T> RenditionPipeline<R, T>
where
    R: RepositoryStore + 'static,
    T: TransformService + 'static,
{
    pub fn build(config: RenditionConfig, repository: Arc<R>, transform: T) -> std::io::Result<Self> {
        let transactions = TransactionService::new(config.retry.clone());
        let materializer = Arc::new(ArtifactMaterializer::new(
            repository.clone(),
            transform,
            &config.transform,
        ));
        let pool = Arc::new(WorkerPool::spawn(config.pool.clone())?);
        let handler = Arc::new(RenditionJobHandler::new(
            transactions.clone(),
            materializer.clone(),
        ));
        let queue = TransactionalJobQueue::new(pool.clone(), handler);
        let triggers = RenditionTriggers::new(repository.clone(), queue.clone());

        info!(
            workers = config.pool.workers,
            queue_capacity = config.pool.queue_capacity,
            max_attempts = config.retry.max_attempts,
            "rendition pipeline ready"
        );

        Ok(Self {
            repository,
            transactions,
            pool,
            queue,
            triggers,
            materializer,
        })
    }

    /// Route a host event to the triggers.
    pub fn on_event(&self, uow: &UnitOfWork, event: &DocumentEvent) -> Result<(), TriggerError> {
        route(&self.triggers, uow, event)
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn transactions(&self) -> &TransactionService {
        &self.transactions
    }

    pub fn triggers(&self) -> &RenditionTriggers<Arc<R>> {
        &self.triggers
    }

    pub fn queue(&self) -> &Arc<TransactionalJobQueue> {
        &self.queue
    }

    pub fn pool(&self) -> &Arc<WorkerPool> {
        &self.pool
    }

    pub fn materializer(&self) -> &Arc<ArtifactMaterializer<Arc<R>, T>> {
        &self.materializer
    }

    /// Run every dispatched job to completion and stop the workers.
    pub fn shutdown(&self) {
        self.pool.shutdown();
    }
}
