//! Infrastructure layer: repository store, transactions, deferred jobs and
//! the rendition materializer.

pub mod config;
pub mod jobs;
pub mod materializer;
pub mod pipeline;
pub mod repository;
pub mod transaction;
pub mod transform;
pub mod triggers;

#[cfg(test)]
mod integration_tests;

pub use config::{RenditionConfig, TransformConfig};
pub use materializer::{ArtifactMaterializer, EnsureOutcome, MaterializeError, SkipReason};
pub use pipeline::RenditionPipeline;
pub use triggers::{RenditionTriggers, TriggerError};
