use std::time::Duration;

use recap_queue::QueueSettings;

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Identifies this process in claimed job rows.
    pub worker_id: String,
    /// How often the queue is polled when idle (default: `1000` ms).
    pub poll_interval: Duration,
    /// Summarizer endpoint each job is posted to.
    pub summarizer_url: String,
    /// Request timeout for one summarizer call (default: `600` s).
    pub summarizer_timeout: Duration,
    pub queue: QueueSettings,
}

impl WorkerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                   | Default             |
    /// |---------------------------|---------------------|
    /// | `WORKER_ID`               | `worker-<uuid>`     |
    /// | `WORKER_POLL_INTERVAL_MS` | `1000`              |
    /// | `SUMMARIZER_URL`          | required            |
    /// | `SUMMARIZER_TIMEOUT_SECS` | `600`               |
    ///
    /// Queue settings are read by [`QueueSettings::from_env`].
    pub fn from_env() -> Self {
        let worker_id = std::env::var("WORKER_ID")
            .unwrap_or_else(|_| format!("worker-{}", uuid::Uuid::new_v4().simple()));

        let poll_interval_ms: u64 = std::env::var("WORKER_POLL_INTERVAL_MS")
            .unwrap_or_else(|_| "1000".into())
            .parse()
            .expect("WORKER_POLL_INTERVAL_MS must be a valid u64");

        let summarizer_url =
            std::env::var("SUMMARIZER_URL").expect("SUMMARIZER_URL must be set");

        let summarizer_timeout_secs: u64 = std::env::var("SUMMARIZER_TIMEOUT_SECS")
            .unwrap_or_else(|_| "600".into())
            .parse()
            .expect("SUMMARIZER_TIMEOUT_SECS must be a valid u64");

        Self {
            worker_id,
            poll_interval: Duration::from_millis(poll_interval_ms.max(1)),
            summarizer_url,
            summarizer_timeout: Duration::from_secs(summarizer_timeout_secs),
            queue: QueueSettings::from_env(),
        }
    }
}
