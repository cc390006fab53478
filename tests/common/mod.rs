// Executors shared by the integration tests

#![allow(dead_code)]

use scribe_server::{AudioChunk, Content, ProcessingExecutor, ProcessingFailure, ResultMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Always reports a processing failure
pub struct FailingExecutor;

#[async_trait::async_trait]
impl ProcessingExecutor for FailingExecutor {
    async fn produce(&self, _: &[String], _: &[AudioChunk]) -> Result<ResultMap, ProcessingFailure> {
        Err(ProcessingFailure::new("speech engine unavailable"))
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// Panics mid-processing
pub struct PanickingExecutor;

#[async_trait::async_trait]
impl ProcessingExecutor for PanickingExecutor {
    async fn produce(&self, _: &[String], _: &[AudioChunk]) -> Result<ResultMap, ProcessingFailure> {
        panic!("decoder crashed");
    }

    fn name(&self) -> &str {
        "panicking"
    }
}

/// Only ever produces a transcript, whatever was requested
pub struct PartialExecutor;

#[async_trait::async_trait]
impl ProcessingExecutor for PartialExecutor {
    async fn produce(&self, _: &[String], _: &[AudioChunk]) -> Result<ResultMap, ProcessingFailure> {
        let mut out = ResultMap::new();
        out.insert("transcript_v1".into(), Content::Text("partial".into()));
        Ok(out)
    }

    fn name(&self) -> &str {
        "partial"
    }
}

/// Records the audio it was given and tracks peak concurrency
#[derive(Default)]
pub struct RecordingExecutor {
    pub delay: Duration,
    pub seen: Mutex<Vec<Vec<AudioChunk>>>,
    running: AtomicUsize,
    pub peak: AtomicUsize,
}

impl RecordingExecutor {
    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> Vec<Vec<AudioChunk>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ProcessingExecutor for RecordingExecutor {
    async fn produce(
        &self,
        templates: &[String],
        audio: &[AudioChunk],
    ) -> Result<ResultMap, ProcessingFailure> {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        self.seen.lock().unwrap().push(audio.to_vec());
        tokio::time::sleep(self.delay).await;

        self.running.fetch_sub(1, Ordering::SeqCst);

        Ok(templates
            .iter()
            .map(|t| (t.clone(), Content::Text(format!("{} bytes", audio.len()))))
            .collect())
    }

    fn name(&self) -> &str {
        "recording"
    }
}
