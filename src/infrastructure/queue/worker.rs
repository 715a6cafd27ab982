//! Worker teams draining the job queue
//!
//! One polling loop per topic; within a topic, at most `team_size` jobs run
//! concurrently. Handlers signal transient failure by returning Err (the job
//! is rescheduled with backoff) and definitive outcomes by returning Ok.

use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::config::QueueConfig;
use crate::infrastructure::queue::job_queue::{Job, JobQueue};
use crate::infrastructure::queue::error::QueueError;
use crate::utils::logging;

/// A handler for one queue topic
#[async_trait::async_trait]
pub trait JobHandler: Send + Sync {
    /// Topics this handler subscribes to
    fn topics(&self) -> Vec<String>;

    /// Execute one job; Err means transient failure and triggers a retry
    async fn handle(&self, job: &Job) -> Result<(), QueueError>;
}

/// Spawns and tracks the per-topic worker loops
pub struct WorkerPool {
    queue: JobQueue,
    config: QueueConfig,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Create a new worker pool
    pub fn new(queue: JobQueue, config: QueueConfig) -> Self {
        Self {
            queue,
            config,
            handles: Vec::new(),
        }
    }

    /// Start one worker loop per topic the handler subscribes to
    pub fn start(&mut self, handler: Arc<dyn JobHandler>) {
        for topic in handler.topics() {
            let queue = self.queue.clone();
            let handler = handler.clone();
            let team_size = self.config.team_size;
            let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

            let handle = tokio::spawn(async move {
                run_topic_loop(queue, handler, topic, team_size, poll_interval).await;
            });
            self.handles.push(handle);
        }
    }

    /// Abort all worker loops
    pub fn stop(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

async fn run_topic_loop(
    queue: JobQueue,
    handler: Arc<dyn JobHandler>,
    topic: String,
    team_size: usize,
    poll_interval: Duration,
) {
    let semaphore = Arc::new(Semaphore::new(team_size));
    logging::log_info(&format!(
        "Worker team started for topic '{}' (team size {})",
        topic, team_size
    ));

    loop {
        let batch = match queue.fetch(&topic, team_size as u64).await {
            Ok(batch) => batch,
            Err(e) => {
                logging::log_error(&format!("Failed to fetch jobs for '{}': {}", topic, e));
                sleep(poll_interval).await;
                continue;
            }
        };

        if batch.is_empty() {
            sleep(poll_interval).await;
            continue;
        }

        let mut tasks = Vec::with_capacity(batch.len());
        for job in batch {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            let queue = queue.clone();
            let handler = handler.clone();

            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                run_job(&queue, handler.as_ref(), &job).await;
            }));
        }

        for task in tasks {
            let _ = task.await;
        }
    }
}

async fn run_job(queue: &JobQueue, handler: &dyn JobHandler, job: &Job) {
    match handler.handle(job).await {
        Ok(()) => {
            if let Err(e) = queue.complete(job.id).await {
                logging::log_error(&format!("Failed to complete job {}: {}", job.id, e));
            }
        }
        Err(e) => {
            if let Err(fail_err) = queue.fail(job.id, &e.to_string()).await {
                logging::log_error(&format!("Failed to reschedule job {}: {}", job.id, fail_err));
            }
        }
    }
}

/// Periodic enqueue of a singleton cron job
///
/// Runs forever; each tick collapses with any still-unfinished previous tick
/// through the singleton key.
pub async fn run_cron(
    queue: JobQueue,
    topic: String,
    payload: serde_json::Value,
    interval: Duration,
) -> Result<(), QueueError> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match queue
            .send_singleton(&topic, payload.clone(), &format!("cron:{}", topic))
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                logging::log_debug(&format!("Cron '{}' still running, tick skipped", topic));
            }
            Err(e) => {
                logging::log_error(&format!("Failed to enqueue cron '{}': {}", topic, e));
            }
        }
    }
}
