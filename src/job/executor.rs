use super::model::{Content, ResultMap};
use crate::audio::{total_bytes, AudioChunk};
use crate::error::ProcessingFailure;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

/// Turns audio plus requested templates into produced content.
///
/// Implementations:
/// - `MockExecutor`: canned clinical content for every template (reference server)
/// - A real transcription/structuring engine plugs in here
#[async_trait::async_trait]
pub trait ProcessingExecutor: Send + Sync {
    /// Produce one entry per requested template.
    ///
    /// May take arbitrarily long; the caller never holds a job lock while
    /// this runs.
    async fn produce(
        &self,
        templates: &[String],
        audio: &[AudioChunk],
    ) -> Result<ResultMap, ProcessingFailure>;

    /// Executor name for logging
    fn name(&self) -> &str;
}

/// Reference executor that fabricates plausible output after a fixed delay
#[derive(Debug, Clone, Default)]
pub struct MockExecutor {
    delay: Duration,
}

impl MockExecutor {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    fn content_for(template: &str) -> Content {
        if template.contains("soap") {
            Content::Structured(object(json!({
                "subjective": "Patient reports cough.",
                "objective": "Afebrile, lungs clear to auscultation.",
                "assessment": "Viral URI",
                "plan": "Supportive care, return if symptoms worsen."
            })))
        } else if template.contains("transcript") {
            Content::Text("Patient is a 45 year old male...".to_string())
        } else if template.contains("problem") || template.contains("codes") {
            Content::StructuredList(vec![
                object(json!({"code": "J06.9", "description": "Acute upper respiratory infection"})),
                object(json!({"code": "R05.9", "description": "Cough, unspecified"})),
            ])
        } else {
            Content::Structured(object(json!({"data": "Generic structured output"})))
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[async_trait::async_trait]
impl ProcessingExecutor for MockExecutor {
    async fn produce(
        &self,
        templates: &[String],
        audio: &[AudioChunk],
    ) -> Result<ResultMap, ProcessingFailure> {
        if templates.is_empty() {
            return Err(ProcessingFailure::new("no templates requested"));
        }

        debug!(
            "Mock processing {} template(s) over {} chunk(s), {} bytes",
            templates.len(),
            audio.len(),
            total_bytes(audio)
        );

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        Ok(templates
            .iter()
            .map(|t| (t.clone(), Self::content_for(t)))
            .collect())
    }

    fn name(&self) -> &str {
        "mock"
    }
}
