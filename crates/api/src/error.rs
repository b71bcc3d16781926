//! # API 统一错误处理
//!
//! 将下层各 crate 的错误类型统一映射到 HTTP 状态码与 JSON 响应体。
//! `AlreadyProcessed` 与 `NotFound` 是预期中的业务结果：前者映射为
//! 409，后者映射为 404，都不会触发服务端错误日志。

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::types::ApiErrorResponse;
use vega_core::signal::error::SignalError;

/// API 层统一错误枚举
#[derive(Error, Debug)]
pub enum ApiError {
    /// 认证失败 (401)
    #[error("认证失败: {0}")]
    Unauthorized(String),

    /// 资源未找到 (404)
    #[error("资源未找到: {0}")]
    NotFound(String),

    /// 状态迁移竞争失败 (409)
    #[error("信号已处理: {0}")]
    Conflict(String),

    /// 请求参数错误 (400)
    #[error("请求参数错误: {0}")]
    BadRequest(String),

    /// 下层业务错误 (500)
    #[error("内部服务错误: {0}")]
    Internal(String),
}

/// 将 `ApiError` 转换为 axum 的 HTTP 响应
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Internal(msg) => {
                // 内部错误只记录日志，不向客户端透传细节
                tracing::error!("内部服务错误: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "服务器内部错误".to_string(),
                )
            }
        };

        let body = Json(ApiErrorResponse::from_msg(message));
        (status, body).into_response()
    }
}

/// 从 `SignalError` 转换
impl From<SignalError> for ApiError {
    fn from(err: SignalError) -> Self {
        match &err {
            SignalError::NotFound(id) => ApiError::NotFound(format!("Signal not found: {}", id)),
            SignalError::AlreadyProcessed(_) => {
                ApiError::Conflict("Signal not found or already processed".into())
            }
            SignalError::Validation(msg) => ApiError::BadRequest(msg.clone()),
            SignalError::Database(_) => ApiError::Internal(err.to_string()),
        }
    }
}
