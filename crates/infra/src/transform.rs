//! Transform service boundary (source bytes → derived bytes).
//!
//! The conversion algorithm lives outside this workspace. The materializer
//! only needs a synchronous call that reads a source, writes into a scratch
//! writer, and reports failure.

use std::collections::BTreeMap;
use std::io::Write;

use thiserror::Error;

use rendition_core::NodeId;

use crate::repository::{ContentReader, ContentWriter};

/// Option key selecting how embedded images are handled.
pub const OPTION_IMAGE: &str = "image";

/// Option key carrying the document language hint.
pub const OPTION_LANGUAGE: &str = "language";

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("no transformer for {source_mimetype} -> {target_mimetype}")]
    Unsupported {
        source_mimetype: String,
        target_mimetype: String,
    },

    #[error("transform of {node} failed")]
    Failed {
        node: NodeId,
        #[source]
        cause: anyhow::Error,
    },
}

/// Synchronous content transformer.
///
/// Implementations must be deterministic for identical input and options:
/// the surrounding transaction may run a transform more than once.
pub trait TransformService: Send + Sync {
    fn transform(
        &self,
        source: &ContentReader,
        dest: &mut ContentWriter,
        options: &BTreeMap<String, String>,
        source_node: NodeId,
    ) -> Result<(), TransformError>;
}

impl<T> TransformService for std::sync::Arc<T>
where
    T: TransformService + ?Sized,
{
    fn transform(
        &self,
        source: &ContentReader,
        dest: &mut ContentWriter,
        options: &BTreeMap<String, String>,
        source_node: NodeId,
    ) -> Result<(), TransformError> {
        (**self).transform(source, dest, options, source_node)
    }
}

/// Adapter for transform engines exposed as a plain byte function.
///
/// Options are not forwarded; use a full [`TransformService`] implementation
/// for engines that need them.
pub struct BytesTransform<F> {
    source_mimetype: String,
    convert: F,
}

impl<F> BytesTransform<F>
where
    F: Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    /// Accept sources of `source_mimetype` (case-insensitive) and run them
    /// through `convert`.
    pub fn new(source_mimetype: impl Into<String>, convert: F) -> Self {
        Self {
            source_mimetype: source_mimetype.into(),
            convert,
        }
    }
}

impl<F> TransformService for BytesTransform<F>
where
    F: Fn(&[u8]) -> anyhow::Result<Vec<u8>> + Send + Sync,
{
    fn transform(
        &self,
        source: &ContentReader,
        dest: &mut ContentWriter,
        _options: &BTreeMap<String, String>,
        source_node: NodeId,
    ) -> Result<(), TransformError> {
        if !source.mimetype().eq_ignore_ascii_case(&self.source_mimetype) {
            return Err(TransformError::Unsupported {
                source_mimetype: source.mimetype().to_string(),
                target_mimetype: dest.mimetype().to_string(),
            });
        }

        let output = (self.convert)(source.bytes()).map_err(|cause| TransformError::Failed {
            node: source_node,
            cause,
        })?;
        dest.write_all(&output).map_err(|e| TransformError::Failed {
            node: source_node,
            cause: e.into(),
        })
    }
}
