use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Produced content for one template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Free text, e.g. a transcript
    Text(String),
    /// A single structured document, e.g. a SOAP note
    Structured(serde_json::Map<String, serde_json::Value>),
    /// A list of structured entries, e.g. a coded problem list
    StructuredList(Vec<serde_json::Map<String, serde_json::Value>>),
}

/// Template ID → produced content
pub type ResultMap = BTreeMap<String, Content>;

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Current state of a job together with the data that only exists in that state.
///
/// Output and error live inside their terminal variants, so a completed job
/// always has output, a failed job always has an error, and no job has both.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum JobState {
    Queued,
    Processing,
    Completed {
        output: ResultMap,
        completed_at: DateTime<Utc>,
    },
    Failed {
        error: String,
        completed_at: DateTime<Utc>,
    },
}

impl JobState {
    pub(crate) fn status(&self) -> JobStatus {
        match self {
            JobState::Queued => JobStatus::Queued,
            JobState::Processing => JobStatus::Processing,
            JobState::Completed { .. } => JobStatus::Completed,
            JobState::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// Output envelope as it appears on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOutput {
    pub results: ResultMap,
}

/// Read-only snapshot of a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Templates captured at creation (not part of the wire result)
    #[serde(skip)]
    pub requested_templates: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JobOutput>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Job {
    pub(crate) fn from_state(
        job_id: &str,
        created_at: DateTime<Utc>,
        requested_templates: &[String],
        state: &JobState,
    ) -> Self {
        let (completed_at, output, error) = match state {
            JobState::Queued | JobState::Processing => (None, None, None),
            JobState::Completed {
                output,
                completed_at,
            } => (
                Some(*completed_at),
                Some(JobOutput {
                    results: output.clone(),
                }),
                None,
            ),
            JobState::Failed {
                error,
                completed_at,
            } => (Some(*completed_at), None, Some(error.clone())),
        };

        Self {
            job_id: job_id.to_string(),
            status: state.status(),
            created_at,
            completed_at,
            requested_templates: requested_templates.to_vec(),
            output,
            error,
        }
    }

    /// Produced results, if the job completed
    pub fn results(&self) -> Option<&ResultMap> {
        self.output.as_ref().map(|o| &o.results)
    }
}
