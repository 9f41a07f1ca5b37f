//! Retrying transactional scopes.
//!
//! ## Components
//!
//! - `RetryPolicy` / `with_retry`: bounded retry loop with backoff
//! - `TransactionService`: runs a body in a fresh unit of work per attempt,
//!   committing on success and rolling back on failure

pub mod retry;
pub mod service;

pub use retry::{BackoffStrategy, RetryPolicy, with_retry};
pub use service::{Retryable, TransactionService};
