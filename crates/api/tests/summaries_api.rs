//! Integration tests for summary submission, lookup, retry and quota.

mod common;

use axum::http::StatusCode;
use common::{body_json, video, TestApp, ALICE, BOB};
use recap_core::quota::UserTier;

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_returns_pending_summary() {
    let app = TestApp::new();
    let token = app.token(ALICE, UserTier::Registered);

    let response = app
        .post_json("/api/v1/summaries", Some(&token), video(1))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["summary"]["status"], "pending");
    assert_eq!(json["data"]["summary"]["owner_user_id"], ALICE);
    assert_eq!(
        json["data"]["summary"]["source"]["url"],
        "https://www.youtube.com/watch?v=video1"
    );
    assert!(json["data"]["job_id"].is_i64());
}

#[tokio::test]
async fn create_requires_a_token() {
    let app = TestApp::new();

    let response = app.post_json("/api/v1/summaries", None, video(1)).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .post_json("/api/v1/summaries", Some("not-a-jwt"), video(1))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_validates_the_url() {
    let app = TestApp::new();
    let token = app.token(ALICE, UserTier::Registered);

    let response = app
        .post_json(
            "/api/v1/summaries",
            Some(&token),
            serde_json::json!({ "url": "file:///etc/passwd" }),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn guest_quota_is_enforced() {
    let app = TestApp::new();
    let token = app.token(ALICE, UserTier::Guest);

    for n in 0..3 {
        app.submit(&token, n).await;
    }

    let response = app
        .post_json("/api/v1/summaries", Some(&token), video(3))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let json = body_json(response).await;
    assert_eq!(json["code"], "DAILY_QUOTA_EXCEEDED");
    assert_eq!(json["details"]["reason"], "daily_quota_exceeded");
    assert_eq!(json["details"]["used"], 3);
    assert_eq!(json["details"]["limit"], 3);
}

#[tokio::test]
async fn pending_cap_is_enforced() {
    let mut config = common::test_config();
    config.queue.max_pending_per_user = 2;
    let app = TestApp::with_config(config);
    let token = app.token(ALICE, UserTier::Registered);

    app.submit(&token, 0).await;
    app.submit(&token, 1).await;

    let response = app
        .post_json("/api/v1/summaries", Some(&token), video(2))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["code"], "PENDING_JOB_CAP_EXCEEDED");

    // Another user is unaffected.
    let other = app.token(BOB, UserTier::Registered);
    app.submit(&other, 3).await;
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn get_returns_own_summary() {
    let app = TestApp::new();
    let token = app.token(ALICE, UserTier::Registered);
    let (id, _) = app.submit(&token, 1).await;

    let response = app
        .get(&format!("/api/v1/summaries/{id}"), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["id"], id);
}

#[tokio::test]
async fn foreign_summary_is_not_found() {
    let app = TestApp::new();
    let alice = app.token(ALICE, UserTier::Registered);
    let bob = app.token(BOB, UserTier::Registered);
    let (id, _) = app.submit(&alice, 1).await;

    let response = app
        .get(&format!("/api/v1/summaries/{id}"), Some(&bob))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.get("/api/v1/summaries/9999", Some(&alice)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Retry
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retry_requeues_a_failed_summary() {
    let app = TestApp::new();
    let token = app.token(ALICE, UserTier::Registered);
    let (id, first_job) = app.submit(&token, 1).await;
    app.fail(id, "transcript unavailable").await;

    let response = app
        .post(&format!("/api/v1/summaries/{id}/retry"), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let json = body_json(response).await;
    assert_eq!(json["data"]["summary"]["status"], "pending");
    assert!(json["data"]["summary"]["error_message"].is_null());
    assert_ne!(json["data"]["job_id"], first_job);
    assert_eq!(app.queue.live_for_resource(id).await.unwrap(), 1);
}

#[tokio::test]
async fn retry_of_pending_summary_conflicts() {
    let app = TestApp::new();
    let token = app.token(ALICE, UserTier::Registered);
    let (id, _) = app.submit(&token, 1).await;

    let response = app
        .post(&format!("/api/v1/summaries/{id}/retry"), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(app.queue.live_for_resource(id).await.unwrap(), 1);
}

#[tokio::test]
async fn refused_retry_keeps_previous_error() {
    let app = TestApp::new();
    let token = app.token(ALICE, UserTier::Guest);
    let (id, _) = app.submit(&token, 0).await;
    app.submit(&token, 1).await;
    app.submit(&token, 2).await;
    app.fail(id, "transcript unavailable").await;

    let response = app
        .post(&format!("/api/v1/summaries/{id}/retry"), Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body_json(response).await["code"], "DAILY_QUOTA_EXCEEDED");

    let response = app
        .get(&format!("/api/v1/summaries/{id}"), Some(&token))
        .await;
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "failed");
    assert_eq!(json["data"]["error_message"], "transcript unavailable");
    assert_eq!(app.queue.live_for_resource(id).await.unwrap(), 0);
}

#[tokio::test]
async fn retry_of_foreign_summary_is_not_found() {
    let app = TestApp::new();
    let alice = app.token(ALICE, UserTier::Registered);
    let bob = app.token(BOB, UserTier::Registered);
    let (id, _) = app.submit(&alice, 1).await;
    app.fail(id, "boom").await;

    let response = app
        .post(&format!("/api/v1/summaries/{id}/retry"), Some(&bob))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Quota
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quota_reports_usage_and_live_jobs() {
    let app = TestApp::new();
    let token = app.token(ALICE, UserTier::Guest);
    app.submit(&token, 1).await;

    let response = app.get("/api/v1/quota", Some(&token)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["data"]["used"], 1);
    assert_eq!(json["data"]["limit"], 3);
    assert_eq!(json["data"]["remaining"], 2);
    assert_eq!(json["data"]["live_jobs"], 1);
    assert_eq!(json["data"]["max_pending"], 25);
    assert!(json["data"]["reset_at"].is_string());
}
