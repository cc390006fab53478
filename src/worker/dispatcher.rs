use crate::error::{Result, ScribeError};
use crate::job::JobStore;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};
use tracing::{error, info};

/// Runs submitted jobs in the background with bounded concurrency.
///
/// `submit` returns immediately; the job is processed once one of the
/// `concurrency` slots frees up.
#[derive(Clone)]
pub struct Dispatcher {
    jobs: Arc<JobStore>,
    slots: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
    idle: Arc<Notify>,
    closed: Arc<AtomicBool>,
}

impl Dispatcher {
    pub fn new(jobs: Arc<JobStore>, concurrency: usize) -> Self {
        let concurrency = concurrency.max(1);

        info!("Processing dispatcher started ({} worker slots)", concurrency);

        Self {
            jobs,
            slots: Arc::new(Semaphore::new(concurrency)),
            pending: Arc::new(AtomicUsize::new(0)),
            idle: Arc::new(Notify::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedule `run_processing` for a job without waiting for it
    pub fn submit(&self, job_id: &str) -> Result<()> {
        // Counted before the closed check so a concurrent shutdown waits for it
        self.pending.fetch_add(1, Ordering::SeqCst);

        if self.closed.load(Ordering::SeqCst) {
            if self.pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.idle.notify_waiters();
            }
            return Err(ScribeError::DispatcherClosed);
        }

        let jobs = Arc::clone(&self.jobs);
        let slots = Arc::clone(&self.slots);
        let pending = Arc::clone(&self.pending);
        let idle = Arc::clone(&self.idle);
        let job_id = job_id.to_string();

        tokio::spawn(async move {
            match slots.acquire_owned().await {
                Ok(_permit) => {
                    if let Err(e) = jobs.run_processing(&job_id).await {
                        error!("Processing job {} failed to run: {}", job_id, e);
                    }
                }
                Err(e) => error!("No worker slot for job {}: {}", job_id, e),
            }

            if pending.fetch_sub(1, Ordering::SeqCst) == 1 {
                idle.notify_waiters();
            }
        });

        Ok(())
    }

    /// Jobs submitted but not yet finished
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Stop accepting work and wait for everything already submitted
    pub async fn shutdown(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        info!("Draining {} pending job(s)", self.pending());

        loop {
            // Register before checking so a wakeup between the two is not lost
            let notified = self.idle.notified();
            if self.pending() == 0 {
                break;
            }
            notified.await;
        }

        info!("Processing dispatcher stopped");
    }
}
