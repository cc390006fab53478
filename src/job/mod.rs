//! Job lifecycle
//!
//! A job is one request to produce structured outputs from audio. It moves
//! QUEUED → PROCESSING → COMPLETED | FAILED (or QUEUED → FAILED), never backwards.
//!
//! - `JobStore` owns all jobs and runs them through a `ProcessingExecutor`
//! - `MockExecutor` is the reference content generator

mod executor;
mod model;
mod store;

pub use executor::{MockExecutor, ProcessingExecutor};
pub use model::{Content, Job, JobOutput, JobStatus, ResultMap};
pub use store::JobStore;
