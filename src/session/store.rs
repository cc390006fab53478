use crate::audio::AudioChunk;
use crate::error::{Result, ScribeError};
use crate::ids::short_id;
use crate::job::{Job, JobStore};
use crate::protocol::ScribeRequest;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Bounds on what a single session may hold and how long it is kept
#[derive(Debug, Clone)]
pub struct SessionLimits {
    pub max_chunks: usize,
    pub max_bytes: usize,
    /// Idle time after which the sweeper expires a session
    pub ttl: Duration,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_chunks: 10_000,
            max_bytes: 512 * 1024 * 1024, // 512 MiB
            ttl: Duration::from_secs(3600),
        }
    }
}

/// Read-only view of a session
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub templates: Vec<String>,
    pub chunk_count: usize,
    pub bytes_received: usize,
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Mutable part of a session, guarded by the session's own lock
struct SessionState {
    /// Arrival order; moved into the job on commit
    chunks: Vec<AudioChunk>,
    chunk_count: usize,
    bytes_received: usize,
    /// Set exactly once, by the commit that created the job
    job_id: Option<String>,
    /// Creation or most recent chunk
    last_activity: Instant,
    /// Set by the sweeper before the slot leaves the table
    expired: bool,
}

impl SessionState {
    fn new() -> Self {
        Self {
            chunks: Vec::new(),
            chunk_count: 0,
            bytes_received: 0,
            job_id: None,
            last_activity: Instant::now(),
            expired: false,
        }
    }
}

struct SessionSlot {
    session_id: String,
    created_at: DateTime<Utc>,
    request: ScribeRequest,
    state: Mutex<SessionState>,
}

impl SessionSlot {
    fn summary(&self, state: &SessionState) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id.clone(),
            templates: self.request.templates.clone(),
            chunk_count: state.chunk_count,
            bytes_received: state.bytes_received,
            committed: state.job_id.is_some(),
            job_id: state.job_id.clone(),
            created_at: self.created_at,
        }
    }
}

/// Staging area for chunked uploads.
///
/// Chunks for one session are appended under that session's lock; different
/// sessions never wait on each other. Committing hands the request and its
/// chunks to the `JobStore` exactly once.
///
/// Expired sessions that were committed leave their final summary behind, so
/// late chunks and repeated commits keep getting the committed answers.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionSlot>>>,
    retired: RwLock<HashMap<String, SessionSummary>>,
    jobs: Arc<JobStore>,
    limits: SessionLimits,
}

impl SessionStore {
    pub fn new(jobs: Arc<JobStore>, limits: SessionLimits) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            retired: RwLock::new(HashMap::new()),
            jobs,
            limits,
        }
    }

    pub fn limits(&self) -> &SessionLimits {
        &self.limits
    }

    /// Open a new session for the given request
    pub async fn create_session(&self, request: ScribeRequest) -> String {
        let mut sessions = self.sessions.write().await;

        let session_id = loop {
            let candidate = short_id("sess");
            if !sessions.contains_key(&candidate)
                && !self.retired.read().await.contains_key(&candidate)
            {
                break candidate;
            }
        };

        info!(
            "Created session {} (templates: {})",
            session_id,
            request.templates.join(", ")
        );

        sessions.insert(
            session_id.clone(),
            Arc::new(SessionSlot {
                session_id: session_id.clone(),
                created_at: Utc::now(),
                request,
                state: Mutex::new(SessionState::new()),
            }),
        );

        session_id
    }

    async fn slot(&self, session_id: &str) -> Result<Arc<SessionSlot>> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| ScribeError::SessionNotFound(session_id.to_string()))
    }

    /// Job created by a session that has since expired, if any
    async fn retired_job(&self, session_id: &str) -> Option<String> {
        let retired = self.retired.read().await;
        retired.get(session_id).and_then(|s| s.job_id.clone())
    }

    /// Live slot, or the error a retired or unknown session answers with
    async fn open_slot(
        &self,
        session_id: &str,
        retired: impl FnOnce(String) -> ScribeError,
    ) -> Result<Arc<SessionSlot>> {
        match self.slot(session_id).await {
            Ok(slot) => Ok(slot),
            Err(not_found) => match self.retired_job(session_id).await {
                Some(job_id) => Err(retired(job_id)),
                None => Err(not_found),
            },
        }
    }

    /// Append a chunk and return the number of bytes received
    pub async fn add_chunk(&self, session_id: &str, sequence: u64, bytes: Vec<u8>) -> Result<usize> {
        let slot = self
            .open_slot(session_id, |_| ScribeError::SessionClosed(session_id.to_string()))
            .await?;
        let mut state = slot.state.lock().await;

        if state.job_id.is_some() {
            warn!("Rejected chunk {} for committed session {}", sequence, session_id);
            return Err(ScribeError::SessionClosed(session_id.to_string()));
        }
        if state.expired {
            return Err(ScribeError::SessionNotFound(session_id.to_string()));
        }

        let size = bytes.len();

        if state.chunk_count + 1 > self.limits.max_chunks {
            return Err(ScribeError::ChunkLimitExceeded {
                session_id: session_id.to_string(),
                limit: "chunk count",
            });
        }
        if state.bytes_received + size > self.limits.max_bytes {
            return Err(ScribeError::ChunkLimitExceeded {
                session_id: session_id.to_string(),
                limit: "byte size",
            });
        }

        state.chunks.push(AudioChunk::new(sequence, bytes));
        state.chunk_count += 1;
        state.bytes_received += size;
        state.last_activity = Instant::now();

        debug!(
            "Session {} received chunk {} ({} bytes, {} total)",
            session_id, sequence, size, state.bytes_received
        );

        Ok(size)
    }

    /// Close the session and materialize its job.
    ///
    /// Only the first commit creates a job; every later attempt fails with
    /// `AlreadyCommitted` naming that job. Processing is not started here.
    pub async fn commit_session(&self, session_id: &str) -> Result<Job> {
        let slot = self
            .open_slot(session_id, |job_id| ScribeError::AlreadyCommitted {
                session_id: session_id.to_string(),
                job_id,
            })
            .await?;
        let mut state = slot.state.lock().await;

        if let Some(job_id) = &state.job_id {
            warn!("Session {} already committed as {}", session_id, job_id);
            return Err(ScribeError::AlreadyCommitted {
                session_id: session_id.to_string(),
                job_id: job_id.clone(),
            });
        }
        if state.expired {
            return Err(ScribeError::SessionNotFound(session_id.to_string()));
        }

        let chunks = std::mem::take(&mut state.chunks);
        let job = self
            .jobs
            .create_job_with_audio(slot.request.clone(), chunks)
            .await;
        state.job_id = Some(job.job_id.clone());

        info!(
            "Committed session {} as job {} ({} chunks, {} bytes)",
            session_id, job.job_id, state.chunk_count, state.bytes_received
        );

        Ok(job)
    }

    pub async fn get_session(&self, session_id: &str) -> Result<SessionSummary> {
        if let Ok(slot) = self.slot(session_id).await {
            let state = slot.state.lock().await;
            if !state.expired {
                return Ok(slot.summary(&state));
            }
        }

        let retired = self.retired.read().await;
        retired
            .get(session_id)
            .cloned()
            .ok_or_else(|| ScribeError::SessionNotFound(session_id.to_string()))
    }

    /// Sequence numbers of the chunks currently held, in arrival order
    pub async fn chunk_sequences(&self, session_id: &str) -> Result<Vec<u64>> {
        let slot = self.slot(session_id).await?;
        let state = slot.state.lock().await;
        Ok(state.chunks.iter().map(|c| c.sequence).collect())
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Expire sessions idle for at least `age`; returns how many were removed.
    ///
    /// Uncommitted sessions are dropped with their chunks. Committed ones are
    /// reduced to their summary.
    pub async fn purge_older_than(&self, age: Duration) -> usize {
        let slots: Vec<Arc<SessionSlot>> = {
            let sessions = self.sessions.read().await;
            sessions.values().cloned().collect()
        };

        let mut expired = Vec::new();
        for slot in slots {
            let mut state = slot.state.lock().await;
            if state.expired || state.last_activity.elapsed() < age {
                continue;
            }

            // Marked under the slot lock so an in-flight append cannot land after this
            state.expired = true;
            state.chunks.clear();

            if state.job_id.is_some() {
                self.retired
                    .write()
                    .await
                    .insert(slot.session_id.clone(), slot.summary(&state));
            }
            expired.push(slot.session_id.clone());
        }

        let mut sessions = self.sessions.write().await;
        for session_id in &expired {
            sessions.remove(session_id);
        }
        expired.len()
    }

    /// Expire sessions idle past their TTL
    pub async fn purge_expired(&self) -> usize {
        self.purge_older_than(self.limits.ttl).await
    }

    /// Periodically purge expired sessions until the task is aborted
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let purged = self.purge_expired().await;
                if purged > 0 {
                    info!("Purged {} expired session(s)", purged);
                }
            }
        })
    }
}
