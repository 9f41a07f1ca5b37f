//! `rendition-core`: model building blocks shared by every layer.
//!
//! This crate contains **pure** primitives (no IO, no threads): identifiers,
//! qualified names, relation descriptors and the job value type.

pub mod error;
pub mod id;
pub mod job;
pub mod model;
pub mod version;

pub use error::{ModelError, ModelResult};
pub use id::{NodeId, UnitOfWorkId, UserId};
pub use job::Job;
pub use model::{ChildAssociation, NodeType, QName, RelationIdentity};
pub use version::ExpectedVersion;
