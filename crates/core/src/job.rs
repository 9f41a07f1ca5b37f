//! The unit of deferred work: "make sure `parent` has a rendition of `source`".

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// A rendition job.
///
/// Equality and hashing cover both fields, so a set of jobs deduplicates
/// repeated triggers for the same pair. `parent` and `source` are the same
/// node when a document is its own source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Job {
    pub parent: NodeId,
    pub source: NodeId,
}

impl Job {
    pub fn new(parent: NodeId, source: NodeId) -> Self {
        Self { parent, source }
    }

    /// Job for a document that is converted from its own content.
    pub fn for_self(node: NodeId) -> Self {
        Self::new(node, node)
    }
}

impl core::fmt::Display for Job {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} <- {}", self.parent, self.source)
    }
}
