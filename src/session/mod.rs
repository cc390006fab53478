//! Chunked upload sessions
//!
//! A session collects audio chunks for one request until it is committed,
//! at which point it turns into exactly one job:
//! - `create_session` captures the request
//! - `add_chunk` appends audio (rejected once committed)
//! - `commit_session` closes the session and creates the job

mod store;

pub use store::{SessionLimits, SessionStore, SessionSummary};
