//! Repository store boundary.
//!
//! This module defines the infrastructure-facing contract the materializer and
//! triggers use to read and write nodes, associations and content, without
//! making any storage assumptions.

pub mod in_memory;

use std::sync::Arc;

use thiserror::Error;

use rendition_core::{ExpectedVersion, NodeId, NodeType, QName, RelationIdentity};

pub use in_memory::InMemoryRepository;

/// Repository operation error.
///
/// ## Error Categories
///
/// - **NodeNotFound**: the node was deleted (or never existed)
/// - **DuplicateChildName**: a sibling with the same relation name exists
/// - **VersionConflict**: optimistic check failed; transient, safe to retry
/// - **ContentExists**: a non-overwriting writer targeted existing content
/// - **ScratchWriter**: a scratch writer was used where a node writer was required
/// - **Storage**: anything else reported by the backend
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("duplicate child name {relation} under {parent}")]
    DuplicateChildName {
        parent: NodeId,
        relation: RelationIdentity,
    },

    #[error("version conflict on {node}: expected {expected:?}, found {actual}")]
    VersionConflict {
        node: NodeId,
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("content already exists on {0}")]
    ContentExists(NodeId),

    #[error("scratch writer has no target node")]
    ScratchWriter,

    #[error("storage error: {0}")]
    Storage(String),
}

impl RepositoryError {
    /// Whether the failure is a transient concurrency conflict that a fresh
    /// attempt of the surrounding unit of work may not hit again.
    pub fn is_transient(&self) -> bool {
        matches!(self, RepositoryError::VersionConflict { .. })
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Content read from a node (or from a scratch writer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentReader {
    mimetype: String,
    encoding: String,
    bytes: Arc<[u8]>,
}

impl ContentReader {
    pub fn new(mimetype: impl Into<String>, encoding: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            mimetype: mimetype.into(),
            encoding: encoding.into(),
            bytes: bytes.into(),
        }
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Buffered content writer.
///
/// A writer either targets a node (from [`RepositoryStore::open_writer`]) and
/// is persisted with [`RepositoryStore::put_content`], or is a scratch buffer
/// (from [`RepositoryStore::temp_writer`]) that is turned into a reader.
#[derive(Debug, Clone, Default)]
pub struct ContentWriter {
    target: Option<NodeId>,
    mimetype: String,
    encoding: String,
    buffer: Vec<u8>,
}

impl ContentWriter {
    /// Writer targeting `node`.
    pub fn for_node(node: NodeId) -> Self {
        Self {
            target: Some(node),
            ..Self::default()
        }
    }

    /// Scratch writer with no target node.
    pub fn scratch() -> Self {
        Self::default()
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn set_mimetype(&mut self, mimetype: impl Into<String>) {
        self.mimetype = mimetype.into();
    }

    pub fn set_encoding(&mut self, encoding: impl Into<String>) {
        self.encoding = encoding.into();
    }

    pub fn mimetype(&self) -> &str {
        &self.mimetype
    }

    pub fn encoding(&self) -> &str {
        &self.encoding
    }

    pub fn size(&self) -> usize {
        self.buffer.len()
    }

    /// Replace the buffered content with a copy of `reader`'s bytes.
    pub fn put_content(&mut self, reader: &ContentReader) {
        self.buffer.clear();
        self.buffer.extend_from_slice(reader.bytes());
    }

    /// Everything written so far, as a reader.
    pub fn into_reader(self) -> ContentReader {
        ContentReader::new(self.mimetype, self.encoding, self.buffer)
    }
}

impl std::io::Write for ContentWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Node, association and content store.
///
/// ## Design Principles
///
/// - **No storage assumptions**: in-memory implementation for tests/dev,
///   any real repository behind the same trait in production
/// - **Optimistic locking**: content writes carry an [`ExpectedVersion`];
///   a mismatch is a transient [`RepositoryError::VersionConflict`]
/// - **Unique names**: creating a second child with the same relation
///   identity under one parent fails with
///   [`RepositoryError::DuplicateChildName`]
///
/// ## Association Order
///
/// `children()` returns children in creation order, so the first element is
/// always the oldest.
pub trait RepositoryStore: Send + Sync {
    fn exists(&self, node: NodeId) -> RepositoryResult<bool>;

    fn node_type(&self, node: NodeId) -> RepositoryResult<NodeType>;

    /// Create a child of `parent` linked by `relation`.
    fn create_child(
        &self,
        parent: NodeId,
        relation: &RelationIdentity,
        node_type: NodeType,
    ) -> RepositoryResult<NodeId>;

    /// Children of `parent` linked by `relation`, oldest first.
    fn children(&self, parent: NodeId, relation: &RelationIdentity) -> RepositoryResult<Vec<NodeId>>;

    /// Delete `node` and everything below it.
    fn delete(&self, node: NodeId) -> RepositoryResult<()>;

    fn has_classification(&self, node: NodeId, classification: &QName) -> RepositoryResult<bool>;

    fn add_classification(&self, node: NodeId, classification: QName) -> RepositoryResult<()>;

    /// Current content version of `node` (bumped on every content write).
    fn version(&self, node: NodeId) -> RepositoryResult<u64>;

    /// Content of `node`, or `None` if it has none.
    fn open_reader(&self, node: NodeId) -> RepositoryResult<Option<ContentReader>>;

    /// Writer for `node`. Without `overwrite`, fails if content already exists.
    fn open_writer(&self, node: NodeId, overwrite: bool) -> RepositoryResult<ContentWriter>;

    /// Persist a node writer, checking the node's version first.
    fn put_content(&self, writer: ContentWriter, expected: ExpectedVersion) -> RepositoryResult<()>;

    /// Scratch writer for intermediate output.
    fn temp_writer(&self) -> ContentWriter {
        ContentWriter::scratch()
    }
}

impl<S> RepositoryStore for Arc<S>
where
    S: RepositoryStore + ?Sized,
{
    fn exists(&self, node: NodeId) -> RepositoryResult<bool> {
        (**self).exists(node)
    }

    fn node_type(&self, node: NodeId) -> RepositoryResult<NodeType> {
        (**self).node_type(node)
    }

    fn create_child(
        &self,
        parent: NodeId,
        relation: &RelationIdentity,
        node_type: NodeType,
    ) -> RepositoryResult<NodeId> {
        (**self).create_child(parent, relation, node_type)
    }

    fn children(&self, parent: NodeId, relation: &RelationIdentity) -> RepositoryResult<Vec<NodeId>> {
        (**self).children(parent, relation)
    }

    fn delete(&self, node: NodeId) -> RepositoryResult<()> {
        (**self).delete(node)
    }

    fn has_classification(&self, node: NodeId, classification: &QName) -> RepositoryResult<bool> {
        (**self).has_classification(node, classification)
    }

    fn add_classification(&self, node: NodeId, classification: QName) -> RepositoryResult<()> {
        (**self).add_classification(node, classification)
    }

    fn version(&self, node: NodeId) -> RepositoryResult<u64> {
        (**self).version(node)
    }

    fn open_reader(&self, node: NodeId) -> RepositoryResult<Option<ContentReader>> {
        (**self).open_reader(node)
    }

    fn open_writer(&self, node: NodeId, overwrite: bool) -> RepositoryResult<ContentWriter> {
        (**self).open_writer(node, overwrite)
    }

    fn put_content(&self, writer: ContentWriter, expected: ExpectedVersion) -> RepositoryResult<()> {
        (**self).put_content(writer, expected)
    }

    fn temp_writer(&self) -> ContentWriter {
        (**self).temp_writer()
    }
}
