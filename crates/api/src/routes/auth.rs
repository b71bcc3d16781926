//! # 身份验证路由控制器
//!
//! 实现登录接口：校验用户名/密码并颁发 JWT Token。

use axum::Json;
use axum::extract::State;

use crate::error::ApiError;
use crate::middleware::auth::{ROLE_USER, issue_jwt};
use crate::server::AppState;
use crate::types::{LoginRequest, LoginResponse};

const JWT_EXPIRES_IN: u64 = 86400 * 7; // 7 days

/// 用户登录
///
/// 验证用户名和密码，颁发 JWT Token。
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "鉴权 (Auth)",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = LoginResponse),
        (status = 401, description = "用户名或密码错误")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    // 1. 获取用户
    let user = state
        .user_store
        .get_user(&req.username)
        .await
        .map_err(|e| ApiError::Internal(format!("DB error: {}", e)))?;

    let user = match user {
        Some(u) => u,
        None => return Err(ApiError::Unauthorized("Invalid username or password".into())),
    };

    // 2. 验证密码
    let valid = bcrypt::verify(&req.password, &user.password_hash).unwrap_or(false);

    if !valid {
        return Err(ApiError::Unauthorized("Invalid username or password".into()));
    }

    // 3. 生成 JWT
    let token = issue_jwt(
        &state.app_config.server.jwt_secret,
        &user.id,
        ROLE_USER,
        JWT_EXPIRES_IN,
    )?;

    Ok(Json(LoginResponse {
        token,
        expires_in: JWT_EXPIRES_IN,
    }))
}
