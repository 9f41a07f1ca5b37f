//! Deferred rendition jobs.
//!
//! ## Components
//!
//! - `TransactionalJobQueue`: buffers jobs per unit of work, dispatches them after commit
//! - `WorkerPool`: bounded thread pool; a saturated pool runs tasks on the caller
//! - `JobHandler`: runs one dispatched job (`RenditionJobHandler` for renditions)

pub mod handler;
pub mod pool;
pub mod queue;

pub use handler::{JobHandler, JobResult, RenditionJobHandler};
pub use pool::{PoolStats, Task, WorkerPool, WorkerPoolConfig};
pub use queue::{QUEUE_LISTENER_KEY, QueueError, TransactionalJobQueue};
