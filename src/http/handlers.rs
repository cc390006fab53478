use super::error::ApiError;
use super::state::AppState;
use crate::audio::AudioChunk;
use crate::job::{Job, JobStatus};
use crate::protocol::{CapabilitiesResponse, InitializeRequest, InitializeResult, ScribeRequest};
use crate::session::SessionSummary;
use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Header carrying the client-assigned chunk sequence number
pub const SEQUENCE_HEADER: &str = "x-audio-sequence";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub jobs: usize,
    pub sessions: usize,
    pub pending: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AsyncJobAccepted {
    pub job_id: String,
    pub status: JobStatus,
    pub eta_seconds: Option<u64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCreated {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChunkReceived {
    pub status: String,
    pub size: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionCommitted {
    pub job_id: String,
}

/// Parts of a multipart submission this server understands
#[derive(Default)]
struct Upload {
    /// JSON text of a `ScribeRequest`
    request: Option<String>,
    file: Option<Vec<u8>>,
}

async fn read_upload(mut multipart: Multipart) -> Result<Upload, ApiError> {
    let mut upload = Upload::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Malformed multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "request" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Unreadable 'request' field: {}", e)))?;
                upload.request = Some(text);
            }
            "file" => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Unreadable 'file' field: {}", e)))?;
                upload.file = Some(bytes.to_vec());
            }
            _ => {}
        }
    }

    Ok(upload)
}

fn validate(request: &ScribeRequest) -> Result<(), ApiError> {
    if request.templates.is_empty() {
        return Err(ApiError::bad_request("At least one template must be requested"));
    }
    Ok(())
}

/// Split a multipart submission into a validated request and its audio
fn parse_submission(upload: Upload) -> Result<(ScribeRequest, Vec<u8>), ApiError> {
    let raw = upload
        .request
        .ok_or_else(|| ApiError::bad_request("Missing 'request' field"))?;
    let audio = upload
        .file
        .ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;

    let request: ScribeRequest = serde_json::from_str(&raw)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON in 'request' field: {}", e)))?;
    validate(&request)?;

    Ok((request, audio))
}

fn sequence_number(headers: &HeaderMap) -> Result<u64, ApiError> {
    match headers.get(SEQUENCE_HEADER) {
        None => Ok(0),
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse().ok())
            .ok_or_else(|| ApiError::bad_request(format!("Invalid {} header", SEQUENCE_HEADER))),
    }
}

/// Hand a queued job to the dispatcher.
///
/// A job the dispatcher refuses is failed on the spot so it never sits in
/// QUEUED with nothing left to run it.
async fn dispatch(state: &AppState, job: &Job) -> Result<(), ApiError> {
    if let Err(e) = state.dispatcher.submit(&job.job_id) {
        warn!("Job {} not dispatched: {}", job.job_id, e);
        state
            .jobs
            .fail_processing(&job.job_id, "dispatcher shut down")
            .await?;
        return Err(e.into());
    }
    Ok(())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
        jobs: state.jobs.job_count().await,
        sessions: state.sessions.session_count().await,
        pending: state.dispatcher.pending(),
    })
}

/// GET /capabilities
pub async fn capabilities() -> impl IntoResponse {
    Json(CapabilitiesResponse::default())
}

/// POST /initialize
/// Protocol handshake
pub async fn initialize(Json(req): Json<InitializeRequest>) -> impl IntoResponse {
    info!(
        "Initialize from {} {} (protocol {})",
        req.client_info.name, req.client_info.version, req.protocol_version
    );
    Json(InitializeResult::for_request(&req))
}

/// POST /process
/// Process audio and wait for the result
pub async fn process_sync(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<Job>, ApiError> {
    let (request, audio) = parse_submission(read_upload(multipart).await?)?;

    let job = state
        .jobs
        .create_job_with_audio(request, vec![AudioChunk::new(0, audio)])
        .await;
    let finished = state.jobs.run_processing(&job.job_id).await?;

    Ok(Json(finished))
}

/// POST /process/async
/// Queue audio for background processing
pub async fn process_async(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let (request, audio) = parse_submission(read_upload(multipart).await?)?;

    if request.webhook_url().is_none() {
        return Err(ApiError::bad_request(
            "Async requests must specify a webhook_url",
        ));
    }

    let job = state
        .jobs
        .create_job_with_audio(request, vec![AudioChunk::new(0, audio)])
        .await;
    dispatch(&state, &job).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(AsyncJobAccepted {
            job_id: job.job_id,
            status: job.status,
            eta_seconds: Some(state.eta_seconds),
        }),
    ))
}

/// POST /session
/// Open a chunked upload session
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<ScribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate(&request)?;

    let session_id = state.sessions.create_session(request).await;

    Ok((StatusCode::CREATED, Json(SessionCreated { session_id })))
}

/// GET /session/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>, ApiError> {
    Ok(Json(state.sessions.get_session(&session_id).await?))
}

/// POST /session/:session_id/audio
/// Append one audio chunk
pub async fn upload_chunk(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ChunkReceived>, ApiError> {
    let sequence = sequence_number(&headers)?;
    let audio = read_upload(multipart)
        .await?
        .file
        .ok_or_else(|| ApiError::bad_request("Missing 'file' field"))?;

    let size = state.sessions.add_chunk(&session_id, sequence, audio).await?;

    Ok(Json(ChunkReceived {
        status: "received".to_string(),
        size,
    }))
}

/// POST /session/:session_id/commit
/// Close the session and queue its job
pub async fn commit_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let job = state.sessions.commit_session(&session_id).await?;
    dispatch(&state, &job).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(SessionCommitted { job_id: job.job_id }),
    ))
}

/// GET /jobs/:job_id
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<Job>, ApiError> {
    Ok(Json(state.jobs.get_job(&job_id).await?))
}
