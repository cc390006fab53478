pub mod audio;
pub mod config;
pub mod error;
pub mod http;
pub mod job;
pub mod protocol;
pub mod session;
pub mod worker;

mod ids;

pub use audio::AudioChunk;
pub use config::Config;
pub use error::{ProcessingFailure, Result, ScribeError};
pub use http::{create_router, AppState};
pub use job::{Content, Job, JobStatus, JobStore, MockExecutor, ProcessingExecutor, ResultMap};
pub use protocol::ScribeRequest;
pub use session::{SessionLimits, SessionStore, SessionSummary};
pub use worker::Dispatcher;
