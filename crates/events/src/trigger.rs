//! Trigger binding: the seam between the host's observers and this system.
//!
//! A host calls [`route`] (or the trait methods directly) from inside the
//! unit of work that caused the event. Implementations must only buffer;
//! they run inline with the host's own transactional work.

use tracing::trace;

use rendition_core::{ChildAssociation, NodeId};

use crate::event::{DocumentEvent, Event};
use crate::unit_of_work::UnitOfWork;

/// Reactions to document lifecycle events, one method per event kind.
pub trait Trigger: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    /// Content of `node` was written.
    fn on_content_written(&self, uow: &UnitOfWork, node: NodeId) -> Result<(), Self::Error>;

    /// A node was created as the child end of `association`.
    fn on_node_created(
        &self,
        uow: &UnitOfWork,
        association: &ChildAssociation,
    ) -> Result<(), Self::Error>;

    /// A child association was created.
    fn on_child_association_created(
        &self,
        uow: &UnitOfWork,
        association: &ChildAssociation,
        is_new_node: bool,
    ) -> Result<(), Self::Error>;
}

/// Dispatch `event` to the matching [`Trigger`] method.
pub fn route<T>(trigger: &T, uow: &UnitOfWork, event: &DocumentEvent) -> Result<(), T::Error>
where
    T: Trigger + ?Sized,
{
    trace!(uow = %uow.id(), event_type = event.event_type(), "routing document event");

    match event {
        DocumentEvent::ContentWritten { node, .. } => trigger.on_content_written(uow, *node),
        DocumentEvent::NodeCreated { association, .. } => trigger.on_node_created(uow, association),
        DocumentEvent::ChildAssociationCreated {
            association,
            is_new_node,
            ..
        } => trigger.on_child_association_created(uow, association, *is_new_node),
    }
}
