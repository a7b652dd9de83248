//! 管理入口
//!
//! - `POST /admin/jobs/{job}/trigger`：手动触发作业，与定时触发共用同一个执行器
//! - `GET  /admin/jobs`：作业状态
//! - `POST /admin/campaigns/{id}/credits`：活动充值
//! - `GET  /admin/campaigns/{id}/credits/verify`：积分账户校验
//! - `GET  /health`：存活探针

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::Result;
use crate::models::Campaign;
use crate::repository::SchedulingStore;
use crate::service::{CreditService, JobReport};
use crate::worker::{JobKind, JobRunner, JobStatus};

/// 统一响应结构
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }
}

/// 管理入口共享状态
pub struct AdminState<S>
where
    S: SchedulingStore,
{
    pub runner: Arc<JobRunner<S>>,
    pub credits: Arc<CreditService<S>>,
}

impl<S> Clone for AdminState<S>
where
    S: SchedulingStore,
{
    fn clone(&self) -> Self {
        Self {
            runner: self.runner.clone(),
            credits: self.credits.clone(),
        }
    }
}

/// 充值请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateCreditsRequest {
    pub amount: i32,
    pub description: Option<String>,
}

/// 构建管理路由
pub fn router<S>(state: AdminState<S>) -> Router
where
    S: SchedulingStore + 'static,
{
    Router::new()
        .route("/health", get(health_check))
        .route("/admin/jobs", get(list_jobs::<S>))
        .route("/admin/jobs/{job}/trigger", post(trigger_job::<S>))
        .route("/admin/campaigns/{id}/credits", post(allocate_credits::<S>))
        .route(
            "/admin/campaigns/{id}/credits/verify",
            get(verify_credits::<S>),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "assignment-engine"
    }))
}

async fn list_jobs<S>(State(state): State<AdminState<S>>) -> Json<ApiResponse<Vec<JobStatus>>>
where
    S: SchedulingStore + 'static,
{
    Json(ApiResponse::success(state.runner.statuses()))
}

async fn trigger_job<S>(
    State(state): State<AdminState<S>>,
    Path(job): Path<String>,
) -> Result<Json<ApiResponse<JobReport>>>
where
    S: SchedulingStore + 'static,
{
    let kind: JobKind = job.parse()?;
    info!(job = kind.name(), "收到手动触发请求");

    let report = state.runner.trigger(kind).await?;
    Ok(Json(ApiResponse::success(report)))
}

async fn allocate_credits<S>(
    State(state): State<AdminState<S>>,
    Path(campaign_id): Path<i64>,
    Json(req): Json<AllocateCreditsRequest>,
) -> Result<Json<ApiResponse<Campaign>>>
where
    S: SchedulingStore + 'static,
{
    let campaign = state
        .credits
        .allocate_credits(campaign_id, req.amount, req.description)
        .await?;
    Ok(Json(ApiResponse::success(campaign)))
}

async fn verify_credits<S>(
    State(state): State<AdminState<S>>,
    Path(campaign_id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>>
where
    S: SchedulingStore + 'static,
{
    state.credits.verify_invariant(campaign_id).await?;
    Ok(Json(ApiResponse::success(serde_json::json!({
        "campaignId": campaign_id,
        "balanced": true
    }))))
}
