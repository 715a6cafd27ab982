pub mod error;
pub mod job_queue;
pub mod worker;

pub use error::QueueError;
pub use job_queue::{Job, JobQueue};
pub use worker::{JobHandler, WorkerPool};
