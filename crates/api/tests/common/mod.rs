//! Shared fixtures for API integration tests.
//!
//! The router is the production one from [`build_app_router`], wired to
//! in-memory collaborators so the tests need no database.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{Method, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use recap_api::auth::jwt::{generate_access_token, JwtConfig};
use recap_api::config::ServerConfig;
use recap_api::router::build_app_router;
use recap_api::state::AppState;
use recap_api::stream::StreamManager;
use recap_core::job::JobOutcome;
use recap_core::quota::UserTier;
use recap_core::types::{JobId, ResourceId, UserId};
use recap_db::memory::{MemoryJobBackend, MemoryQuotaLedger, MemoryRecordStore};
use recap_events::LocalEventBus;
use recap_queue::{
    AdmissionController, AttemptResult, JobQueue, JobService, OutcomeReporter, QueueSettings,
};
use serde_json::Value;
use tower::ServiceExt;

pub const ALICE: UserId = 1;
pub const BOB: UserId = 2;

/// How long a test waits for the next stream frame.
pub const FRAME_TIMEOUT: Duration = Duration::from_secs(2);

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        max_body_bytes: 64 * 1024,
        stream_keepalive: Duration::from_secs(30),
        jwt: JwtConfig {
            secret: "test-secret-that-is-long-enough-for-hmac".to_string(),
            access_token_expiry_mins: 15,
        },
        queue: QueueSettings::default(),
    }
}

/// The application plus handles on its collaborators.
pub struct TestApp {
    pub router: Router,
    pub config: ServerConfig,
    pub records: Arc<MemoryRecordStore>,
    pub queue: Arc<JobQueue>,
    pub bus: Arc<LocalEventBus>,
    pub streams: Arc<StreamManager>,
    pub reporter: OutcomeReporter,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: ServerConfig) -> Self {
        let records = Arc::new(MemoryRecordStore::new());
        let ledger = Arc::new(MemoryQuotaLedger::new());
        let bus = Arc::new(LocalEventBus::default());
        let queue = Arc::new(JobQueue::new(
            Arc::new(MemoryJobBackend::new()),
            config.queue.retry_policy(),
        ));
        let admission = Arc::new(AdmissionController::new(
            ledger.clone(),
            queue.clone(),
            config.queue.max_pending_per_user,
        ));
        let jobs = Arc::new(JobService::new(
            records.clone(),
            ledger,
            queue.clone(),
            admission,
        ));
        let streams = Arc::new(StreamManager::new());
        let reporter = OutcomeReporter::new(records.clone(), bus.clone());

        let state = AppState {
            pool: None,
            config: Arc::new(config.clone()),
            jobs,
            bus: bus.clone(),
            streams: streams.clone(),
        };
        let router = build_app_router(state, &config);

        Self {
            router,
            config,
            records,
            queue,
            bus,
            streams,
            reporter,
        }
    }

    pub fn token(&self, user_id: UserId, tier: UserTier) -> String {
        generate_access_token(user_id, tier, &self.config.jwt).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method(Method::GET).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, token: Option<&str>, body: Value) -> Response<Body> {
        let mut builder = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method(Method::POST).uri(uri);
        if let Some(token) = token {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    /// Submit a summary and return `(resource_id, job_id)`.
    pub async fn submit(&self, token: &str, n: i64) -> (ResourceId, JobId) {
        let response = self
            .post_json("/api/v1/summaries", Some(token), video(n))
            .await;
        assert_eq!(response.status(), 201, "submit {n} was not accepted");
        let json = body_json(response).await;
        (
            json["data"]["summary"]["id"].as_i64().unwrap(),
            json["data"]["job_id"].as_i64().unwrap(),
        )
    }

    /// Drive a submitted summary to `failed` the way a worker would.
    pub async fn fail(&self, resource_id: ResourceId, error: &str) {
        let claimed = self.queue.claim("test-worker").await.unwrap().unwrap();
        assert_eq!(claimed.descriptor.resource_id, resource_id);
        let job_id = claimed.descriptor.id;

        self.reporter
            .report_outcome(job_id, resource_id, JobOutcome::Started)
            .await
            .unwrap();
        self.queue
            .on_result(
                job_id,
                AttemptResult::Failed {
                    error: error.to_string(),
                    retryable: false,
                },
            )
            .await
            .unwrap();
        self.reporter
            .report_outcome(
                job_id,
                resource_id,
                JobOutcome::Failed {
                    error_message: error.to_string(),
                },
            )
            .await
            .unwrap();
    }
}

pub fn video(n: i64) -> Value {
    serde_json::json!({ "url": format!("https://www.youtube.com/watch?v=video{n}") })
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Read the next data frame of a streaming body as text.
///
/// Returns `None` when the stream ended. Panics if nothing arrives within
/// [`FRAME_TIMEOUT`].
pub async fn next_frame(body: &mut Body) -> Option<String> {
    let frame = tokio::time::timeout(FRAME_TIMEOUT, body.frame())
        .await
        .expect("timed out waiting for a stream frame")?
        .unwrap();
    let data = frame.into_data().unwrap();
    Some(String::from_utf8(data.to_vec()).unwrap())
}

/// Poll `check` until it holds or one second passes.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}
