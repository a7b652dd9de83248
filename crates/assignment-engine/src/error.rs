//! 调度引擎错误类型
//!
//! 定义引擎的业务错误和系统错误

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::models::AssignmentStatus;

/// 调度引擎错误类型
#[derive(Debug, Error)]
pub enum EngineError {
    // === 活动相关错误 ===
    #[error("活动不存在: {0}")]
    CampaignNotFound(i64),

    #[error("活动积分不足: campaign_id={campaign_id}, 需要 {required}, 剩余 {available}")]
    InsufficientCredits {
        campaign_id: i64,
        required: i32,
        available: i32,
    },

    #[error("积分数量无效: {0}")]
    InvalidAmount(i32),

    // === 任务相关错误 ===
    #[error("任务不存在: {0}")]
    AssignmentNotFound(i64),

    #[error("任务状态不允许此操作: {from:?} -> {to:?}")]
    InvalidTransition {
        from: AssignmentStatus,
        to: AssignmentStatus,
    },

    #[error("读者已在该活动中持有未结束的任务: reader_id={reader_id}, campaign_id={campaign_id}")]
    DuplicateActiveAssignment { reader_id: i64, campaign_id: i64 },

    // === 作业相关错误 ===
    #[error("作业正在执行，跳过本次触发: {0}")]
    JobAlreadyRunning(String),

    #[error("未知作业: {0}")]
    UnknownJob(String),

    #[error("通知发送失败: {0}")]
    Notification(String),

    // === 系统错误 ===
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON 序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Redis 错误: {0}")]
    Redis(String),

    #[error("内部错误: {0}")]
    Internal(String),

    #[error("参数校验失败: {0}")]
    Validation(String),
}

/// 调度引擎 Result 类型别名
pub type Result<T> = std::result::Result<T, EngineError>;

impl EngineError {
    /// 检查是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database(_) | Self::Redis(_) | Self::Notification(_))
    }

    /// 检查是否为业务错误（非系统错误）
    pub fn is_business_error(&self) -> bool {
        !matches!(
            self,
            Self::Database(_)
                | Self::Serialization(_)
                | Self::Redis(_)
                | Self::Internal(_)
                | Self::Notification(_)
        )
    }

    /// 获取错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::CampaignNotFound(_) => "CAMPAIGN_NOT_FOUND",
            Self::InsufficientCredits { .. } => "INSUFFICIENT_CREDITS",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::AssignmentNotFound(_) => "ASSIGNMENT_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::DuplicateActiveAssignment { .. } => "DUPLICATE_ACTIVE_ASSIGNMENT",
            Self::JobAlreadyRunning(_) => "JOB_ALREADY_RUNNING",
            Self::UnknownJob(_) => "UNKNOWN_JOB",
            Self::Notification(_) => "NOTIFICATION_ERROR",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::Redis(_) => "REDIS_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

impl EngineError {
    /// 获取 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::CampaignNotFound(_) | Self::AssignmentNotFound(_) | Self::UnknownJob(_) => {
                StatusCode::NOT_FOUND
            }

            Self::Validation(_) | Self::InvalidAmount(_) => StatusCode::BAD_REQUEST,

            Self::JobAlreadyRunning(_)
            | Self::InvalidTransition { .. }
            | Self::DuplicateActiveAssignment { .. }
            | Self::InsufficientCredits { .. } => StatusCode::CONFLICT,

            Self::Notification(_)
            | Self::Database(_)
            | Self::Serialization(_)
            | Self::Redis(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = if self.is_business_error() {
            self.to_string()
        } else {
            tracing::error!(error = %self, code = self.error_code(), "请求处理失败");
            "服务内部错误，请稍后重试".to_string()
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

impl From<redis::RedisError> for EngineError {
    fn from(err: redis::RedisError) -> Self {
        Self::Redis(err.to_string())
    }
}
