//! # 信号路由控制器
//!
//! 信号的查询与确认/拒绝。确认/拒绝是聊天桥与浏览器前端共用的
//! 回写通道：竞争失败返回 409 + `{success:false}`，调用方据此渲染
//! "no longer available" 而不是错误页。

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::middleware::auth::CurrentActor;
use crate::server::AppState;
use crate::types::{SignalActionRequest, SignalActionResponse, SignalResponse};
use vega_core::common::ConfirmationSource;
use vega_core::signal::entity::SignalId;
use vega_core::signal::error::SignalError;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PendingQuery {
    /// 目标用户；缺省取 JWT 主体
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct HistoryQuery {
    pub user_id: Option<String>,
    /// 单页条数，缺省 50
    pub limit: Option<i64>,
    /// 偏移量，缺省 0
    pub offset: Option<i64>,
}

/// 查询 pending 信号列表
#[utoipa::path(
    get,
    path = "/api/v1/signals/pending",
    tag = "信号 (Signals)",
    security(("bearer_jwt" = [])),
    params(PendingQuery),
    responses(
        (status = 200, description = "pending 信号列表", body = Vec<SignalResponse>)
    )
)]
pub async fn get_pending(
    State(state): State<AppState>,
    CurrentActor(claims): CurrentActor,
    Query(query): Query<PendingQuery>,
) -> Result<Json<Vec<SignalResponse>>, ApiError> {
    let user_id = query.user_id.unwrap_or(claims.sub);
    let signals = state.signal_service.pending_for_user(&user_id).await?;
    Ok(Json(signals.iter().map(Into::into).collect()))
}

/// 查询信号历史 (含终态记录)
#[utoipa::path(
    get,
    path = "/api/v1/signals/history",
    tag = "信号 (Signals)",
    security(("bearer_jwt" = [])),
    params(HistoryQuery),
    responses(
        (status = 200, description = "历史信号列表", body = Vec<SignalResponse>)
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    CurrentActor(claims): CurrentActor,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<SignalResponse>>, ApiError> {
    let user_id = query.user_id.unwrap_or(claims.sub);
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);
    let signals = state.signal_service.history(&user_id, limit, offset).await?;
    Ok(Json(signals.iter().map(Into::into).collect()))
}

/// 查询单条信号
#[utoipa::path(
    get,
    path = "/api/v1/signals/{id}",
    tag = "信号 (Signals)",
    security(("bearer_jwt" = [])),
    params(
        ("id" = String, Path, description = "信号 ID")
    ),
    responses(
        (status = 200, description = "完整信号记录", body = SignalResponse),
        (status = 404, description = "信号不存在")
    )
)]
pub async fn get_signal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SignalResponse>, ApiError> {
    let signal = state
        .signal_service
        .get(&SignalId(id.clone()))
        .await?
        .ok_or(ApiError::NotFound(format!("Signal not found: {}", id)))?;
    Ok(Json(SignalResponse::from(&signal)))
}

/// 确认信号
///
/// 条件更新仲裁并发：赢家拿到 `{success:true, signal}`，
/// 竞争失败方拿到 409 + `{success:false}`。
#[utoipa::path(
    post,
    path = "/api/v1/signals/{id}/confirm",
    tag = "信号 (Signals)",
    security(("bearer_jwt" = [])),
    params(
        ("id" = String, Path, description = "信号 ID")
    ),
    request_body = SignalActionRequest,
    responses(
        (status = 200, description = "确认成功", body = SignalActionResponse),
        (status = 404, description = "信号不存在"),
        (status = 409, description = "信号已被处理", body = SignalActionResponse)
    )
)]
pub async fn confirm_signal(
    State(state): State<AppState>,
    CurrentActor(claims): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<SignalActionRequest>,
) -> Result<(StatusCode, Json<SignalActionResponse>), ApiError> {
    transition(state, claims.sub, id, req, true).await
}

/// 拒绝信号，与确认对称
#[utoipa::path(
    post,
    path = "/api/v1/signals/{id}/reject",
    tag = "信号 (Signals)",
    security(("bearer_jwt" = [])),
    params(
        ("id" = String, Path, description = "信号 ID")
    ),
    request_body = SignalActionRequest,
    responses(
        (status = 200, description = "拒绝成功", body = SignalActionResponse),
        (status = 404, description = "信号不存在"),
        (status = 409, description = "信号已被处理", body = SignalActionResponse)
    )
)]
pub async fn reject_signal(
    State(state): State<AppState>,
    CurrentActor(claims): CurrentActor,
    Path(id): Path<String>,
    Json(req): Json<SignalActionRequest>,
) -> Result<(StatusCode, Json<SignalActionResponse>), ApiError> {
    transition(state, claims.sub, id, req, false).await
}

/// 确认/拒绝的共用路径。
///
/// 操作者优先取请求体的 `user_id` (聊天桥代用户操作)，
/// 否则回落到 JWT 主体；来源缺省为 "web"。
async fn transition(
    state: AppState,
    jwt_sub: String,
    id: String,
    req: SignalActionRequest,
    confirm: bool,
) -> Result<(StatusCode, Json<SignalActionResponse>), ApiError> {
    let actor = req.user_id.unwrap_or(jwt_sub);
    let source: ConfirmationSource = req
        .source
        .as_deref()
        .unwrap_or("web")
        .parse()
        .map_err(|e: String| ApiError::BadRequest(e))?;

    let signal_id = SignalId(id);
    let result = if confirm {
        state.signal_service.confirm(&signal_id, &actor, source).await
    } else {
        state.signal_service.reject(&signal_id, &actor, source).await
    };

    match result {
        Ok(signal) => Ok((
            StatusCode::OK,
            Json(SignalActionResponse {
                success: true,
                signal: Some(SignalResponse::from(&signal)),
                error: None,
            }),
        )),
        // 竞争失败是预期结果：409 + success:false，绝不当作服务端错误
        Err(SignalError::AlreadyProcessed(_)) => Ok((
            StatusCode::CONFLICT,
            Json(SignalActionResponse {
                success: false,
                signal: None,
                error: Some("Signal not found or already processed".to_string()),
            }),
        )),
        Err(e) => Err(e.into()),
    }
}
