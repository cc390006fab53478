//! HTTP API for the dictation protocol
//!
//! - GET /health - Health check
//! - GET /capabilities, POST /initialize - Discovery and handshake
//! - POST /process - Process audio and wait for the result
//! - POST /process/async - Queue audio, respond immediately
//! - POST /session, POST /session/:id/audio, POST /session/:id/commit - Chunked upload
//! - GET /session/:id - Session progress
//! - GET /jobs/:id - Poll a job

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ErrorResponse};
pub use handlers::{
    AsyncJobAccepted, ChunkReceived, HealthResponse, SessionCommitted, SessionCreated,
    SEQUENCE_HEADER,
};
pub use routes::create_router;
pub use state::AppState;
