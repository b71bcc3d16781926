//! # 用户路由控制器
//!
//! Discord 身份映射的双向查询是聊天桥的解析依赖：
//! 正查 (`/users/{id}/discord`) 用于新信号投递，
//! 反查 (`/users/by-discord/{id}`) 用于把按钮点击归属到系统用户。

use axum::Json;
use axum::extract::{Path, State};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::{
    DiscordLinkResponse, LinkDiscordRequest, TradingConfigResponse, UserIdResponse,
};

/// 查询用户绑定的 Discord ID
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/discord",
    tag = "用户 (Users)",
    security(("bearer_jwt" = [])),
    params(
        ("id" = String, Path, description = "用户 ID")
    ),
    responses(
        (status = 200, description = "绑定的 Discord ID (未绑定为 null)", body = DiscordLinkResponse),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn get_discord_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DiscordLinkResponse>, ApiError> {
    state
        .user_store
        .get_user(&id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("User not found: {}", id)))?;

    let discord_user_id = state
        .user_store
        .discord_id_for(&id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(DiscordLinkResponse { discord_user_id }))
}

/// 按 Discord ID 反查用户
#[utoipa::path(
    get,
    path = "/api/v1/users/by-discord/{id}",
    tag = "用户 (Users)",
    security(("bearer_jwt" = [])),
    params(
        ("id" = String, Path, description = "Discord 用户 ID")
    ),
    responses(
        (status = 200, description = "归属的系统用户", body = UserIdResponse),
        (status = 404, description = "该 Discord 账号未绑定任何用户")
    )
)]
pub async fn get_user_by_discord(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserIdResponse>, ApiError> {
    let user = state
        .user_store
        .user_by_discord(&id)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::NotFound(format!("No user linked to Discord {}", id)))?;
    Ok(Json(UserIdResponse { user_id: user.id }))
}

/// 绑定用户与 Discord 账号
#[utoipa::path(
    post,
    path = "/api/v1/users/link-discord",
    tag = "用户 (Users)",
    security(("bearer_jwt" = [])),
    request_body = LinkDiscordRequest,
    responses(
        (status = 200, description = "绑定成功"),
        (status = 404, description = "用户不存在")
    )
)]
pub async fn link_discord(
    State(state): State<AppState>,
    Json(req): Json<LinkDiscordRequest>,
) -> Result<Json<DiscordLinkResponse>, ApiError> {
    state
        .user_store
        .link_discord(&req.user_id, &req.discord_user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(DiscordLinkResponse {
        discord_user_id: Some(req.discord_user_id),
    }))
}

/// 查询用户交易配置
#[utoipa::path(
    get,
    path = "/api/v1/users/{id}/config",
    tag = "用户 (Users)",
    security(("bearer_jwt" = [])),
    params(
        ("id" = String, Path, description = "用户 ID")
    ),
    responses(
        (status = 200, description = "交易配置 (未设置时为默认值)", body = TradingConfigResponse)
    )
)]
pub async fn get_trading_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TradingConfigResponse>, ApiError> {
    let config = state
        .config_store
        .trading_config(&id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(config.into()))
}
