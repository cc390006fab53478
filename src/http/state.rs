use crate::config::Config;
use crate::job::{JobStore, MockExecutor};
use crate::session::SessionStore;
use crate::worker::Dispatcher;
use std::sync::Arc;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<JobStore>,

    pub sessions: Arc<SessionStore>,

    /// Background processing for async submissions and committed sessions
    pub dispatcher: Dispatcher,

    /// Completion estimate reported to async submitters
    pub eta_seconds: u64,
}

impl AppState {
    pub fn new(
        jobs: Arc<JobStore>,
        sessions: Arc<SessionStore>,
        dispatcher: Dispatcher,
        eta_seconds: u64,
    ) -> Self {
        Self {
            jobs,
            sessions,
            dispatcher,
            eta_seconds,
        }
    }

    /// Wire up the stores and dispatcher from configuration, using the mock executor
    pub fn from_config(cfg: &Config) -> Self {
        let executor = Arc::new(MockExecutor::new(cfg.processing_delay()));
        let jobs = Arc::new(JobStore::new(executor).with_timeout(cfg.processing_timeout()));
        let sessions = Arc::new(SessionStore::new(Arc::clone(&jobs), cfg.session_limits()));
        let dispatcher = Dispatcher::new(Arc::clone(&jobs), cfg.processing.worker_concurrency);

        Self::new(jobs, sessions, dispatcher, cfg.processing.eta_seconds)
    }
}
