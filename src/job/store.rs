use super::executor::ProcessingExecutor;
use super::model::{Job, JobState, JobStatus, ResultMap};
use crate::audio::AudioChunk;
use crate::error::{ProcessingFailure, Result, ScribeError};
use crate::ids::short_id;
use crate::protocol::ScribeRequest;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// A job plus everything needed to process it
struct JobRecord {
    job_id: String,
    created_at: DateTime<Utc>,
    request: ScribeRequest,
    state: JobState,
    /// Uploaded audio; handed to the executor once and then dropped
    audio: Vec<AudioChunk>,
}

impl JobRecord {
    fn snapshot(&self) -> Job {
        Job::from_state(
            &self.job_id,
            self.created_at,
            &self.request.templates,
            &self.state,
        )
    }

    fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Apply a forward transition, rejecting anything the state machine forbids
    fn transition(&mut self, next: JobState) -> Result<()> {
        let from = self.status();
        let to = next.status();

        let allowed = matches!(
            (from, to),
            (JobStatus::Queued, JobStatus::Processing)
                | (JobStatus::Queued, JobStatus::Failed)
                | (JobStatus::Processing, JobStatus::Completed)
                | (JobStatus::Processing, JobStatus::Failed)
        );

        if !allowed {
            return Err(ScribeError::InvalidTransition {
                job_id: self.job_id.clone(),
                from,
                to,
            });
        }

        self.state = next;
        Ok(())
    }

    fn announce_terminal(&self) {
        info!("Job {} finished: {}", self.job_id, self.status());

        if let Some(url) = self.request.webhook_url() {
            // Delivery belongs to an external notifier; the server only records the target
            info!("Job {} terminal, webhook target {}", self.job_id, url);
        }
    }
}

/// Owns every job and drives each through its lifecycle.
///
/// The table lock is only held to insert or look up a record; every mutation
/// happens under that record's own lock, so jobs never contend with each other.
pub struct JobStore {
    jobs: RwLock<HashMap<String, Arc<Mutex<JobRecord>>>>,
    executor: Arc<dyn ProcessingExecutor>,
    timeout: Option<Duration>,
}

impl JobStore {
    pub fn new(executor: Arc<dyn ProcessingExecutor>) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            executor,
            timeout: None,
        }
    }

    /// Fail jobs whose executor runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Create a queued job with no audio attached
    pub async fn create_job(&self, request: ScribeRequest) -> Job {
        self.create_job_with_audio(request, Vec::new()).await
    }

    /// Create a queued job that owns the given audio
    pub async fn create_job_with_audio(
        &self,
        request: ScribeRequest,
        audio: Vec<AudioChunk>,
    ) -> Job {
        let mut jobs = self.jobs.write().await;

        let job_id = loop {
            let candidate = short_id("job");
            if !jobs.contains_key(&candidate) {
                break candidate;
            }
        };

        let record = JobRecord {
            job_id: job_id.clone(),
            created_at: Utc::now(),
            request,
            state: JobState::Queued,
            audio,
        };
        let job = record.snapshot();
        jobs.insert(job_id.clone(), Arc::new(Mutex::new(record)));

        info!(
            "Created job {} (templates: {})",
            job_id,
            job.requested_templates.join(", ")
        );

        job
    }

    async fn record(&self, job_id: &str) -> Result<Arc<Mutex<JobRecord>>> {
        let jobs = self.jobs.read().await;
        jobs.get(job_id)
            .cloned()
            .ok_or_else(|| ScribeError::JobNotFound(job_id.to_string()))
    }

    /// Latest committed state of a job
    pub async fn get_job(&self, job_id: &str) -> Result<Job> {
        let record = self.record(job_id).await?;
        let rec = record.lock().await;
        Ok(rec.snapshot())
    }

    /// Move a queued job to processing.
    ///
    /// Returns `false` without changing anything if the job is already past
    /// QUEUED, so duplicate scheduling is harmless.
    pub async fn begin_processing(&self, job_id: &str) -> Result<bool> {
        let record = self.record(job_id).await?;
        let mut rec = record.lock().await;

        if rec.status() != JobStatus::Queued {
            debug!("Job {} already {}, not starting again", job_id, rec.status());
            return Ok(false);
        }

        rec.transition(JobState::Processing)?;
        info!("Job {} processing", job_id);
        Ok(true)
    }

    /// Record the executor's output. Only valid while the job is processing.
    pub async fn complete_processing(&self, job_id: &str, output: ResultMap) -> Result<Job> {
        let record = self.record(job_id).await?;
        let mut rec = record.lock().await;

        rec.transition(JobState::Completed {
            output,
            completed_at: Utc::now(),
        })?;
        rec.announce_terminal();

        Ok(rec.snapshot())
    }

    /// Mark a queued or processing job as failed
    pub async fn fail_processing(&self, job_id: &str, error: impl Into<String>) -> Result<Job> {
        let record = self.record(job_id).await?;
        let mut rec = record.lock().await;

        rec.transition(JobState::Failed {
            error: error.into(),
            completed_at: Utc::now(),
        })?;
        rec.audio.clear();
        rec.announce_terminal();

        Ok(rec.snapshot())
    }

    /// Run a job to a terminal state.
    ///
    /// Executor failures end up on the job, not in the returned error; only
    /// structural problems (unknown job) are returned. If the job was already
    /// started elsewhere this is a no-op returning the current snapshot.
    pub async fn run_processing(&self, job_id: &str) -> Result<Job> {
        if !self.begin_processing(job_id).await? {
            return self.get_job(job_id).await;
        }

        let (templates, audio) = {
            let record = self.record(job_id).await?;
            let mut rec = record.lock().await;
            (
                rec.request.templates.clone(),
                std::mem::take(&mut rec.audio),
            )
        };

        match self.execute(&templates, &audio).await {
            Ok(output) => self.complete_processing(job_id, output).await,
            Err(failure) => {
                warn!("Job {} failed: {}", job_id, failure);
                self.fail_processing(job_id, failure.reason).await
            }
        }
    }

    async fn execute(
        &self,
        templates: &[String],
        audio: &[AudioChunk],
    ) -> std::result::Result<ResultMap, ProcessingFailure> {
        debug!(
            "Invoking {} executor for {} template(s)",
            self.executor.name(),
            templates.len()
        );

        let work = AssertUnwindSafe(self.executor.produce(templates, audio)).catch_unwind();

        let produced = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, work).await.map_err(|_| {
                ProcessingFailure::new(format!("processing timed out after {:?}", limit))
            })?,
            None => work.await,
        };

        let output = produced.map_err(|_| ProcessingFailure::new("executor panicked"))??;

        let missing: Vec<&str> = templates
            .iter()
            .filter(|t| !output.contains_key(t.as_str()))
            .map(String::as_str)
            .collect();

        if !missing.is_empty() {
            return Err(ProcessingFailure::new(format!(
                "executor produced no output for: {}",
                missing.join(", ")
            )));
        }

        Ok(output)
    }

    pub async fn job_count(&self) -> usize {
        self.jobs.read().await.len()
    }
}
