//! `rendition-auth`: execution identity for decoupled work.
//!
//! Work dispatched after a commit no longer has a meaningful caller. It runs
//! under an explicit principal handed to the closure, never under ambient
//! (thread-local or global) identity state.

pub mod principal;
pub mod run_as;

pub use principal::Principal;
pub use run_as::{run_as, run_as_system};
