use std::collections::{HashMap, HashSet};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::{DateTime, Utc};

use rendition_core::{ChildAssociation, ExpectedVersion, NodeId, NodeType, QName, RelationIdentity};

use super::{ContentReader, ContentWriter, RepositoryError, RepositoryResult, RepositoryStore};

#[derive(Debug, Clone)]
struct NodeRecord {
    node_type: NodeType,
    created_at: DateTime<Utc>,
    version: u64,
    classifications: HashSet<QName>,
    content: Option<ContentReader>,
}

#[derive(Debug, Default)]
struct State {
    nodes: HashMap<NodeId, NodeRecord>,
    /// Every association, in creation order.
    associations: Vec<ChildAssociation>,
}

impl State {
    fn node(&self, id: NodeId) -> RepositoryResult<&NodeRecord> {
        self.nodes.get(&id).ok_or(RepositoryError::NodeNotFound(id))
    }

    fn node_mut(&mut self, id: NodeId) -> RepositoryResult<&mut NodeRecord> {
        self.nodes
            .get_mut(&id)
            .ok_or(RepositoryError::NodeNotFound(id))
    }

    fn insert_child(&mut self, parent: NodeId, relation: &RelationIdentity, node_type: NodeType) -> NodeId {
        let id = NodeId::new();
        self.nodes.insert(id, NodeRecord::new(node_type));
        self.associations
            .push(ChildAssociation::new(parent, id, relation.clone()));
        id
    }
}

impl NodeRecord {
    fn new(node_type: NodeType) -> Self {
        Self {
            node_type,
            created_at: Utc::now(),
            version: 0,
            classifications: HashSet::new(),
            content: None,
        }
    }
}

/// In-memory repository store.
///
/// Intended for tests/dev. Every call applies immediately (there is no
/// transactional buffering), which is enough to exercise name uniqueness,
/// optimistic version checks and cascading deletes.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    state: RwLock<State>,
    injected_conflicts: AtomicU32,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RepositoryResult<std::sync::RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))
    }

    fn write(&self) -> RepositoryResult<std::sync::RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| RepositoryError::Storage("lock poisoned".to_string()))
    }

    /// Create a root node (no parent).
    pub fn create_node(&self, node_type: NodeType) -> RepositoryResult<NodeId> {
        let id = NodeId::new();
        self.write()?.nodes.insert(id, NodeRecord::new(node_type));
        Ok(id)
    }

    /// Create a content node holding `bytes`.
    pub fn create_document(
        &self,
        mimetype: &str,
        encoding: &str,
        bytes: impl Into<std::sync::Arc<[u8]>>,
    ) -> RepositoryResult<NodeId> {
        let id = self.create_node(NodeType::Content)?;
        let mut state = self.write()?;
        let record = state.node_mut(id)?;
        record.content = Some(ContentReader::new(mimetype, encoding, bytes));
        record.version += 1;
        Ok(id)
    }

    /// Create a child without the duplicate-name check.
    ///
    /// Reproduces structural drift left behind by historical races.
    pub fn seed_duplicate_child(
        &self,
        parent: NodeId,
        relation: &RelationIdentity,
        node_type: NodeType,
    ) -> RepositoryResult<NodeId> {
        let mut state = self.write()?;
        state.node(parent)?;
        Ok(state.insert_child(parent, relation, node_type))
    }

    /// Make the next `count` content writes fail with a version conflict.
    pub fn inject_version_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    /// Creation time of `node`.
    pub fn created_at(&self, node: NodeId) -> RepositoryResult<DateTime<Utc>> {
        Ok(self.read()?.node(node)?.created_at)
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl RepositoryStore for InMemoryRepository {
    fn exists(&self, node: NodeId) -> RepositoryResult<bool> {
        Ok(self.read()?.nodes.contains_key(&node))
    }

    fn node_type(&self, node: NodeId) -> RepositoryResult<NodeType> {
        Ok(self.read()?.node(node)?.node_type.clone())
    }

    fn create_child(
        &self,
        parent: NodeId,
        relation: &RelationIdentity,
        node_type: NodeType,
    ) -> RepositoryResult<NodeId> {
        let mut state = self.write()?;
        state.node(parent)?;

        let taken = state
            .associations
            .iter()
            .any(|a| a.parent == parent && &a.relation == relation);
        if taken {
            return Err(RepositoryError::DuplicateChildName {
                parent,
                relation: relation.clone(),
            });
        }

        Ok(state.insert_child(parent, relation, node_type))
    }

    fn children(&self, parent: NodeId, relation: &RelationIdentity) -> RepositoryResult<Vec<NodeId>> {
        let state = self.read()?;
        state.node(parent)?;
        Ok(state
            .associations
            .iter()
            .filter(|a| a.parent == parent && &a.relation == relation)
            .map(|a| a.child)
            .collect())
    }

    fn delete(&self, node: NodeId) -> RepositoryResult<()> {
        let mut state = self.write()?;
        state.node(node)?;

        // Collect the subtree breadth-first, then drop nodes and their links.
        let mut doomed = vec![node];
        let mut cursor = 0;
        while cursor < doomed.len() {
            let current = doomed[cursor];
            doomed.extend(
                state
                    .associations
                    .iter()
                    .filter(|a| a.parent == current)
                    .map(|a| a.child),
            );
            cursor += 1;
        }

        let doomed: HashSet<NodeId> = doomed.into_iter().collect();
        state
            .associations
            .retain(|a| !doomed.contains(&a.parent) && !doomed.contains(&a.child));
        state.nodes.retain(|id, _| !doomed.contains(id));
        Ok(())
    }

    fn has_classification(&self, node: NodeId, classification: &QName) -> RepositoryResult<bool> {
        Ok(self
            .read()?
            .node(node)?
            .classifications
            .contains(classification))
    }

    fn add_classification(&self, node: NodeId, classification: QName) -> RepositoryResult<()> {
        self.write()?
            .node_mut(node)?
            .classifications
            .insert(classification);
        Ok(())
    }

    fn version(&self, node: NodeId) -> RepositoryResult<u64> {
        Ok(self.read()?.node(node)?.version)
    }

    fn open_reader(&self, node: NodeId) -> RepositoryResult<Option<ContentReader>> {
        Ok(self.read()?.node(node)?.content.clone())
    }

    fn open_writer(&self, node: NodeId, overwrite: bool) -> RepositoryResult<ContentWriter> {
        let state = self.read()?;
        let record = state.node(node)?;
        if !overwrite && record.content.is_some() {
            return Err(RepositoryError::ContentExists(node));
        }
        Ok(ContentWriter::for_node(node))
    }

    fn put_content(&self, writer: ContentWriter, expected: ExpectedVersion) -> RepositoryResult<()> {
        let node = writer.target().ok_or(RepositoryError::ScratchWriter)?;
        let mut state = self.write()?;
        let record = state.node_mut(node)?;

        if self.take_injected_conflict() || !expected.matches(record.version) {
            return Err(RepositoryError::VersionConflict {
                node,
                expected,
                actual: record.version,
            });
        }

        record.content = Some(writer.into_reader());
        record.version += 1;
        Ok(())
    }
}
