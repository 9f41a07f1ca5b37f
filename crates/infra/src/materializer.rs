//! Idempotent creation and refresh of markdown renditions.
//!
//! `ensure` converges any starting state to exactly one rendition child
//! holding fresh content:
//!
//! | Matching children | Action |
//! |---|---|
//! | 0 | create one (adopting a concurrently created sibling on a name clash) |
//! | 1 | overwrite its content |
//! | n > 1 | keep the oldest, delete the rest, overwrite |
//!
//! Every step is safe to repeat, so a retried unit of work simply runs
//! `ensure` again from the top.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::{debug, error, info, warn};

use rendition_core::model::{MIMETYPE_MARKDOWN, rendition_marker};
use rendition_core::{ExpectedVersion, Job, NodeId, NodeType, RelationIdentity};
use rendition_events::UnitOfWorkError;

use crate::config::TransformConfig;
use crate::repository::{ContentReader, RepositoryError, RepositoryStore};
use crate::transaction::Retryable;
use crate::transform::TransformService;

/// Why `ensure` did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Parent or source node no longer exists
    MissingNode,
    /// Source has no content
    MissingSourceContent,
    /// Transform reported an error
    TransformFailed,
    /// Transform produced zero bytes
    EmptyOutput,
}

impl core::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let reason = match self {
            SkipReason::MissingNode => "node missing",
            SkipReason::MissingSourceContent => "source has no content",
            SkipReason::TransformFailed => "transform failed",
            SkipReason::EmptyOutput => "transform produced no output",
        };
        f.write_str(reason)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created(NodeId),
    Updated(NodeId),
    /// Duplicates were removed before the survivor was updated.
    Healed { kept: NodeId, removed: Vec<NodeId> },
    Skipped(SkipReason),
}

impl EnsureOutcome {
    /// The rendition node written, if any.
    pub fn rendition(&self) -> Option<NodeId> {
        match self {
            EnsureOutcome::Created(node) | EnsureOutcome::Updated(node) => Some(*node),
            EnsureOutcome::Healed { kept, .. } => Some(*kept),
            EnsureOutcome::Skipped(_) => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("no rendition node could be resolved under {parent}")]
    UnresolvableTarget { parent: NodeId },

    #[error(transparent)]
    UnitOfWork(#[from] UnitOfWorkError),
}

impl Retryable for MaterializeError {
    fn is_retryable(&self) -> bool {
        match self {
            MaterializeError::Repository(err) => err.is_transient(),
            MaterializeError::UnresolvableTarget { .. } | MaterializeError::UnitOfWork(_) => false,
        }
    }
}

enum Rendered {
    Content(ContentReader),
    Skipped(SkipReason),
}

/// Turns a job into an up-to-date markdown rendition under the job's parent.
pub struct ArtifactMaterializer<R, T> {
    repository: R,
    transform: T,
    options: BTreeMap<String, String>,
    relation: RelationIdentity,
}

impl<R, T> ArtifactMaterializer<R, T>
where
    R: RepositoryStore,
    T: TransformService,
{
    pub fn new(repository: R, transform: T, config: &TransformConfig) -> Self {
        Self {
            repository,
            transform,
            options: config.options(),
            relation: RelationIdentity::markdown_rendition(),
        }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Options passed to every transform call.
    pub fn options(&self) -> &BTreeMap<String, String> {
        &self.options
    }

    /// Create or refresh the markdown rendition for `job`.
    ///
    /// Missing nodes, missing content and transform problems are reported as
    /// [`EnsureOutcome::Skipped`]. Repository errors propagate; a transient
    /// one means the whole call should be retried in a fresh unit of work.
    pub fn ensure(&self, job: &Job) -> Result<EnsureOutcome, MaterializeError> {
        if !self.repository.exists(job.parent)? || !self.repository.exists(job.source)? {
            debug!(job = %job, "node missing; skipping");
            return Ok(EnsureOutcome::Skipped(SkipReason::MissingNode));
        }

        let content = match self.render(job.source)? {
            Rendered::Content(content) => content,
            Rendered::Skipped(reason) => return Ok(EnsureOutcome::Skipped(reason)),
        };

        let outcome = self.upsert(job.parent, &content)?;
        info!(job = %job, outcome = ?outcome, bytes = content.size(), "rendition ensured");
        Ok(outcome)
    }

    fn render(&self, source: NodeId) -> Result<Rendered, MaterializeError> {
        let reader = match self.repository.open_reader(source) {
            Ok(Some(reader)) => reader,
            Ok(None) => {
                warn!(source = %source, "source has no content; skipping");
                return Ok(Rendered::Skipped(SkipReason::MissingSourceContent));
            }
            Err(RepositoryError::NodeNotFound(_)) => {
                return Ok(Rendered::Skipped(SkipReason::MissingNode));
            }
            Err(err) => return Err(err.into()),
        };

        let mut scratch = self.repository.temp_writer();
        scratch.set_mimetype(MIMETYPE_MARKDOWN);
        scratch.set_encoding(reader.encoding());

        if let Err(err) = self
            .transform
            .transform(&reader, &mut scratch, &self.options, source)
        {
            error!(source = %source, error = ?err, "transform failed; skipping");
            return Ok(Rendered::Skipped(SkipReason::TransformFailed));
        }

        let rendered = scratch.into_reader();
        if rendered.size() == 0 {
            warn!(source = %source, "transform produced no output; skipping");
            return Ok(Rendered::Skipped(SkipReason::EmptyOutput));
        }
        Ok(Rendered::Content(rendered))
    }

    fn upsert(&self, parent: NodeId, content: &ContentReader) -> Result<EnsureOutcome, MaterializeError> {
        let existing = match self.repository.children(parent, &self.relation) {
            Ok(existing) => existing,
            Err(RepositoryError::NodeNotFound(_)) => {
                return Ok(EnsureOutcome::Skipped(SkipReason::MissingNode));
            }
            Err(err) => return Err(err.into()),
        };

        let outcome = match existing.as_slice() {
            [] => self.create(parent)?,
            [only] => EnsureOutcome::Updated(*only),
            [kept, duplicates @ ..] => {
                warn!(
                    parent = %parent,
                    kept = %kept,
                    duplicates = duplicates.len(),
                    "duplicate renditions found; removing extras"
                );
                for duplicate in duplicates {
                    match self.repository.delete(*duplicate) {
                        // Another healer got there first.
                        Ok(()) | Err(RepositoryError::NodeNotFound(_)) => {}
                        Err(err) => return Err(err.into()),
                    }
                }
                EnsureOutcome::Healed {
                    kept: *kept,
                    removed: duplicates.to_vec(),
                }
            }
        };

        let Some(target) = outcome.rendition() else {
            return Ok(outcome);
        };
        match self.write(target, content) {
            Ok(()) => Ok(outcome),
            Err(RepositoryError::NodeNotFound(node)) if node == target => self.vanished(parent),
            Err(err) => Err(err.into()),
        }
    }

    fn create(&self, parent: NodeId) -> Result<EnsureOutcome, MaterializeError> {
        let (node, outcome) = match self
            .repository
            .create_child(parent, &self.relation, NodeType::Content)
        {
            Ok(node) => {
                debug!(parent = %parent, rendition = %node, "rendition node created");
                (node, EnsureOutcome::Created(node))
            }
            Err(RepositoryError::DuplicateChildName { .. }) => {
                let Some(node) = self.repository.children(parent, &self.relation)?.first().copied() else {
                    return self.vanished(parent);
                };
                debug!(parent = %parent, rendition = %node, "adopted concurrently created rendition");
                (node, EnsureOutcome::Updated(node))
            }
            Err(RepositoryError::NodeNotFound(node)) if node == parent => {
                return Ok(EnsureOutcome::Skipped(SkipReason::MissingNode));
            }
            Err(err) => return Err(err.into()),
        };

        let marker = rendition_marker();
        if !self.repository.has_classification(node, &marker)? {
            self.repository.add_classification(node, marker)?;
        }
        Ok(outcome)
    }

    fn write(&self, target: NodeId, content: &ContentReader) -> Result<(), RepositoryError> {
        let version = self.repository.version(target)?;
        let mut writer = self.repository.open_writer(target, true)?;
        writer.set_mimetype(MIMETYPE_MARKDOWN);
        writer.set_encoding(content.encoding());
        writer.put_content(content);
        self.repository
            .put_content(writer, ExpectedVersion::Exact(version))
    }

    /// The rendition disappeared mid-upsert. Fine if the parent went with it.
    fn vanished(&self, parent: NodeId) -> Result<EnsureOutcome, MaterializeError> {
        if self.repository.exists(parent)? {
            warn!(parent = %parent, "rendition node vanished during upsert");
            Err(MaterializeError::UnresolvableTarget { parent })
        } else {
            Ok(EnsureOutcome::Skipped(SkipReason::MissingNode))
        }
    }
}
