use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::session::SessionLimits;

/// Default configuration file, resolved relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config/scribe-server";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub processing: ProcessingConfig,
    pub sessions: SessionsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
    /// Largest accepted request body (audio uploads included)
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProcessingConfig {
    /// Simulated latency of the mock executor
    pub delay_ms: u64,
    /// Completion estimate reported to async submitters
    pub eta_seconds: u64,
    /// Executor deadline; unset means no deadline
    pub timeout_secs: Option<u64>,
    pub worker_concurrency: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    pub max_chunks_per_session: usize,
    pub max_bytes_per_session: usize,
    pub session_ttl_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Config {
    /// Load built-in defaults, then `path` (if present), then `SCRIBE__*`
    /// environment overrides, e.g. `SCRIBE__SERVICE__HTTP__PORT=9000`.
    pub fn load(path: &str) -> Result<Self> {
        let settings = Self::defaults()?
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SCRIBE").separator("__"))
            .build()
            .context("Failed to read configuration")?;

        let cfg: Self = settings
            .try_deserialize()
            .context("Invalid configuration")?;
        cfg.validate()?;

        Ok(cfg)
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(config::Config::builder()
            .set_default("service.name", "scribe-server")?
            .set_default("service.http.bind", "127.0.0.1")?
            .set_default("service.http.port", 8080)?
            .set_default("service.http.max_upload_bytes", 64 * 1024 * 1024)?
            .set_default("processing.delay_ms", 1000)?
            .set_default("processing.eta_seconds", 3)?
            .set_default("processing.worker_concurrency", 4)?
            .set_default("sessions.max_chunks_per_session", 10_000)?
            .set_default("sessions.max_bytes_per_session", 512 * 1024 * 1024)?
            .set_default("sessions.session_ttl_secs", 3600)?
            .set_default("sessions.sweep_interval_secs", 60)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.service.http.port == 0 {
            bail!("service.http.port cannot be 0");
        }
        if self.service.http.max_upload_bytes == 0 {
            bail!("service.http.max_upload_bytes must be greater than 0");
        }
        if self.processing.worker_concurrency == 0 {
            bail!("processing.worker_concurrency must be greater than 0");
        }
        if self.processing.timeout_secs == Some(0) {
            bail!("processing.timeout_secs must be greater than 0 when set");
        }
        if self.sessions.max_chunks_per_session == 0 || self.sessions.max_bytes_per_session == 0 {
            bail!("session chunk limits must be greater than 0");
        }
        if self.sessions.session_ttl_secs == 0 || self.sessions.sweep_interval_secs == 0 {
            bail!("session ttl and sweep interval must be greater than 0");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.service.http.bind, self.service.http.port)
    }

    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing.delay_ms)
    }

    pub fn processing_timeout(&self) -> Option<Duration> {
        self.processing.timeout_secs.map(Duration::from_secs)
    }

    pub fn session_limits(&self) -> SessionLimits {
        SessionLimits {
            max_chunks: self.sessions.max_chunks_per_session,
            max_bytes: self.sessions.max_bytes_per_session,
            ttl: Duration::from_secs(self.sessions.session_ttl_secs),
        }
    }
}
