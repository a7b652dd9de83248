//! 管理入口测试

mod common;

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use assignment_engine::admin::{self, AdminState};
use assignment_engine::{BookFormat, InMemorySchedulingStore, JobKind, SchedulingStore};
use common::{GatedStore, Harness};

fn app<S: SchedulingStore + 'static>(h: &Harness<S>) -> Router {
    admin::router(AdminState {
        runner: h.runner.clone(),
        credits: h.credits.clone(),
    })
}

async fn send(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_health() {
    let h = Harness::new();
    let (status, body) = send(app(&h), "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_trigger_returns_report() {
    let h = Harness::new();
    let campaign = h.campaign(10, 10);
    h.apply(campaign.id, 1, BookFormat::Audiobook).await;

    let (status, body) = send(
        app(&h),
        "POST",
        "/admin/jobs/weekly-distribution/trigger",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["job"], "weeklyDistribution");
    assert_eq!(body["data"]["report"]["scheduledWeek"], 10);

    let (status, body) = send(app(&h), "POST", "/admin/jobs/daily-release/trigger", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["job"], "dailyRelease");
    assert_eq!(body["data"]["report"]["creditsDebited"], 2);
}

#[tokio::test]
async fn test_unknown_job_is_404() {
    let h = Harness::new();
    let (status, body) = send(app(&h), "POST", "/admin/jobs/monthly/trigger", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "UNKNOWN_JOB");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_trigger_while_running_is_409() {
    let memory = Arc::new(InMemorySchedulingStore::new());
    let gated = Arc::new(GatedStore::new(memory.clone()));
    let h = Harness::with_store(gated.clone(), memory);

    let runner = h.runner.clone();
    let running = tokio::spawn(async move { runner.trigger(JobKind::DailyRelease).await });
    while !h.runner.is_running(JobKind::DailyRelease) {
        tokio::task::yield_now().await;
    }

    let (status, body) = send(app(&h), "POST", "/admin/jobs/daily-release/trigger", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "JOB_ALREADY_RUNNING");

    gated.open();
    running.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_list_jobs() {
    let h = Harness::new();
    h.hourly().await;

    let (status, body) = send(app(&h), "GET", "/admin/jobs", None).await;
    assert_eq!(status, StatusCode::OK);
    let jobs = body["data"].as_array().unwrap();
    assert_eq!(jobs.len(), 3);
    assert_eq!(jobs[0]["job"], "weekly-distribution");
    assert_eq!(jobs[0]["running"], false);
    assert_eq!(jobs[2]["job"], "hourly-deadline");
    assert_eq!(jobs[2]["lastRun"]["status"], "success");
}

#[tokio::test]
async fn test_allocate_and_verify_credits() {
    let h = Harness::new();
    let campaign = h.campaign(10, 3);

    let (status, body) = send(
        app(&h),
        "POST",
        &format!("/admin/campaigns/{}/credits", campaign.id),
        Some(json!({ "amount": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_AMOUNT");

    let (status, body) = send(
        app(&h),
        "POST",
        &format!("/admin/campaigns/{}/credits", campaign.id),
        Some(json!({ "amount": 7, "description": "追加预算" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["creditsRemaining"], 10);
    assert_eq!(body["data"]["creditsAllocated"], 10);

    let (status, body) = send(
        app(&h),
        "GET",
        &format!("/admin/campaigns/{}/credits/verify", campaign.id),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["balanced"], true);

    let (status, body) = send(app(&h), "POST", "/admin/campaigns/999/credits", Some(json!({ "amount": 1 }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "CAMPAIGN_NOT_FOUND");
}
