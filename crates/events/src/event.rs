use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rendition_core::{ChildAssociation, NodeId};

/// A repository lifecycle event.
///
/// Events are facts: immutable, timestamped, and named by a stable type
/// identifier suitable for logs.
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "document.content_written").
    fn event_type(&self) -> &'static str;

    /// When the event occurred.
    fn occurred_at(&self) -> DateTime<Utc>;
}

/// Something happened to a document inside a unit of work.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentEvent {
    /// Content of `node` was written.
    ContentWritten {
        node: NodeId,
        new_content: bool,
        occurred_at: DateTime<Utc>,
    },
    /// A node was created as the child end of `association`.
    NodeCreated {
        association: ChildAssociation,
        occurred_at: DateTime<Utc>,
    },
    /// A child association was created (for a new or an existing child).
    ChildAssociationCreated {
        association: ChildAssociation,
        is_new_node: bool,
        occurred_at: DateTime<Utc>,
    },
}

impl DocumentEvent {
    pub fn content_written(node: NodeId, new_content: bool) -> Self {
        Self::ContentWritten {
            node,
            new_content,
            occurred_at: Utc::now(),
        }
    }

    pub fn node_created(association: ChildAssociation) -> Self {
        Self::NodeCreated {
            association,
            occurred_at: Utc::now(),
        }
    }

    pub fn child_association_created(association: ChildAssociation, is_new_node: bool) -> Self {
        Self::ChildAssociationCreated {
            association,
            is_new_node,
            occurred_at: Utc::now(),
        }
    }
}

impl Event for DocumentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            DocumentEvent::ContentWritten { .. } => "document.content_written",
            DocumentEvent::NodeCreated { .. } => "document.node_created",
            DocumentEvent::ChildAssociationCreated { .. } => "document.child_association_created",
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            DocumentEvent::ContentWritten { occurred_at, .. }
            | DocumentEvent::NodeCreated { occurred_at, .. }
            | DocumentEvent::ChildAssociationCreated { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use rendition_core::RelationIdentity;

    use super::*;

    #[test]
    fn events_serialize_with_a_type_tag() {
        let event = DocumentEvent::content_written(NodeId::new(), true);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "content_written");
        assert_eq!(json["new_content"], true);
    }

    #[test]
    fn event_type_names_are_stable() {
        let association =
            ChildAssociation::new(NodeId::new(), NodeId::new(), RelationIdentity::markdown_rendition());
        let created = DocumentEvent::node_created(association.clone());
        let linked = DocumentEvent::child_association_created(association, false);

        assert_eq!(created.event_type(), "document.node_created");
        assert_eq!(linked.event_type(), "document.child_association_created");
    }
}
