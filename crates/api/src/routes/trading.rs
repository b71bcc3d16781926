//! # 交易控制路由控制器
//!
//! 暂停/恢复信号生成：写入/删除缓存中的暂停标志，
//! 信号生成方在出信号前读取该标志。

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::middleware::auth::CurrentActor;
use crate::server::AppState;
use crate::types::{TradingStatusResponse, TradingToggleRequest, TradingToggleResponse};

#[derive(Debug, Deserialize, IntoParams)]
pub struct StatusQuery {
    /// 目标用户；缺省取 JWT 主体
    pub user_id: Option<String>,
}

/// 暂停信号生成
#[utoipa::path(
    post,
    path = "/api/v1/trading/pause",
    tag = "交易控制 (Trading)",
    security(("bearer_jwt" = [])),
    request_body = TradingToggleRequest,
    responses(
        (status = 200, description = "已暂停", body = TradingToggleResponse)
    )
)]
pub async fn pause_trading(
    State(state): State<AppState>,
    CurrentActor(claims): CurrentActor,
    Json(req): Json<TradingToggleRequest>,
) -> Result<Json<TradingToggleResponse>, ApiError> {
    let user_id = req.user_id.unwrap_or(claims.sub);
    state.signal_service.pause_trading(&user_id).await?;
    Ok(Json(TradingToggleResponse {
        success: true,
        message: "Trading paused".to_string(),
    }))
}

/// 恢复信号生成
#[utoipa::path(
    post,
    path = "/api/v1/trading/resume",
    tag = "交易控制 (Trading)",
    security(("bearer_jwt" = [])),
    request_body = TradingToggleRequest,
    responses(
        (status = 200, description = "已恢复", body = TradingToggleResponse)
    )
)]
pub async fn resume_trading(
    State(state): State<AppState>,
    CurrentActor(claims): CurrentActor,
    Json(req): Json<TradingToggleRequest>,
) -> Result<Json<TradingToggleResponse>, ApiError> {
    let user_id = req.user_id.unwrap_or(claims.sub);
    state.signal_service.resume_trading(&user_id).await?;
    Ok(Json(TradingToggleResponse {
        success: true,
        message: "Trading resumed".to_string(),
    }))
}

/// 查询暂停状态
#[utoipa::path(
    get,
    path = "/api/v1/trading/status",
    tag = "交易控制 (Trading)",
    security(("bearer_jwt" = [])),
    params(StatusQuery),
    responses(
        (status = 200, description = "当前暂停状态", body = TradingStatusResponse)
    )
)]
pub async fn get_trading_status(
    State(state): State<AppState>,
    CurrentActor(claims): CurrentActor,
    Query(query): Query<StatusQuery>,
) -> Result<Json<TradingStatusResponse>, ApiError> {
    let user_id = query.user_id.unwrap_or(claims.sub);
    let is_paused = state.signal_service.is_paused(&user_id).await?;
    Ok(Json(TradingStatusResponse { user_id, is_paused }))
}
