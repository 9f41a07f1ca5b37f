//! Repository event hooks that enqueue rendition jobs.
//!
//! Two situations produce a job:
//!
//! - a plain content node holding a PDF is created or has its content
//!   written: the node is its own source
//! - a PDF rendition is linked under a document: the document is the parent,
//!   the PDF rendition the source, whatever the rendition's type or content
//!
//! The checks run inside the caller's unit of work; the job itself only runs
//! once that unit of work commits.

use std::sync::Arc;

use thiserror::Error;
use tracing::trace;

use rendition_core::model::is_convertible_mimetype;
use rendition_core::{ChildAssociation, NodeId, NodeType};
use rendition_events::{Trigger, UnitOfWork};

use crate::jobs::{QueueError, TransactionalJobQueue};
use crate::repository::{RepositoryError, RepositoryStore};

#[derive(Debug, Error)]
pub enum TriggerError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

pub struct RenditionTriggers<R> {
    repository: R,
    queue: Arc<TransactionalJobQueue>,
}

impl<R: RepositoryStore> RenditionTriggers<R> {
    pub fn new(repository: R, queue: Arc<TransactionalJobQueue>) -> Self {
        Self { repository, queue }
    }

    /// Whether `node` is a plain content node holding convertible content.
    ///
    /// A node deleted while the checks run is simply not convertible.
    fn is_convertible(&self, node: NodeId) -> Result<bool, TriggerError> {
        match self.inspect(node) {
            Err(RepositoryError::NodeNotFound(_)) => Ok(false),
            other => Ok(other?),
        }
    }

    fn inspect(&self, node: NodeId) -> Result<bool, RepositoryError> {
        if !self.repository.exists(node)? || self.repository.node_type(node)? != NodeType::Content {
            return Ok(false);
        }
        Ok(self
            .repository
            .open_reader(node)?
            .is_some_and(|reader| is_convertible_mimetype(reader.mimetype())))
    }

    fn enqueue_self(&self, uow: &UnitOfWork, node: NodeId) -> Result<(), TriggerError> {
        if self.is_convertible(node)? {
            self.queue.enqueue(uow, node, node)?;
        } else {
            trace!(node = %node, "not a convertible document; ignoring");
        }
        Ok(())
    }
}

impl<R: RepositoryStore> Trigger for RenditionTriggers<R> {
    type Error = TriggerError;

    fn on_content_written(&self, uow: &UnitOfWork, node: NodeId) -> Result<(), Self::Error> {
        self.enqueue_self(uow, node)
    }

    fn on_node_created(&self, uow: &UnitOfWork, association: &ChildAssociation) -> Result<(), Self::Error> {
        self.enqueue_self(uow, association.child)
    }

    fn on_child_association_created(
        &self,
        uow: &UnitOfWork,
        association: &ChildAssociation,
        _is_new_node: bool,
    ) -> Result<(), Self::Error> {
        // The link may precede the rendition's content; the job checks
        // content when it runs.
        if association.relation.is_pdf_rendition() {
            self.queue
                .enqueue(uow, association.parent, association.child)?;
        }
        Ok(())
    }
}
