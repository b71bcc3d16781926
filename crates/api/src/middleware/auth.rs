//! # 鉴权中间件
//!
//! 提供基于 JWT 的身份验证。两类主体：
//! - `role = "user"`：浏览器前端登录获得，必须对应存在的用户记录；
//! - `role = "service"`：Discord 桥等内部服务持有的长效 Token，
//!   不做用户表回查 (它代多个用户发起操作，目标用户在请求体中)。

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use crate::error::ApiError;
use crate::server::AppState;
use crate::types::Claims;

/// 服务主体的角色标记
pub const ROLE_SERVICE: &str = "service";
/// 普通用户的角色标记
pub const ROLE_USER: &str = "user";

/// 提取并验证 Authorization: Bearer <token>
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = req.headers().get(axum::http::header::AUTHORIZATION);

    let token = match auth_header {
        Some(header_val) => {
            let s = header_val
                .to_str()
                .map_err(|_| ApiError::Unauthorized("Invalid auth header".into()))?;
            if !s.starts_with("Bearer ") {
                tracing::warn!("Invalid Bearer format");
                return Err(ApiError::Unauthorized("Invalid Bearer format".into()));
            }
            s[7..].to_string()
        }
        None => {
            tracing::warn!("Missing Authorization header");
            return Err(ApiError::Unauthorized("Missing Authorization header".into()));
        }
    };

    let claims = match verify_jwt(&token, &state.app_config.server.jwt_secret) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!("JWT verification failed: {:?}", e);
            return Err(e);
        }
    };

    // 普通用户必须仍然存在于用户表中；服务主体直接放行
    if claims.role != ROLE_SERVICE {
        state
            .user_store
            .get_user(&claims.sub)
            .await
            .map_err(|e| ApiError::Internal(format!("DB Error: {}", e)))?
            .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
    }

    // 将主体信息注入 request extensions
    // 以便 downstream handlers 用 `CurrentActor` 提取
    req.extensions_mut().insert(claims);

    Ok(next.run(req).await)
}

/// 验证 JWT 返回强类型 Claims
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, ApiError> {
    let mut validation = Validation::default();
    validation.set_required_spec_claims(&["exp", "sub"]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_ref()),
        &validation,
    )
    .map_err(|_| ApiError::Unauthorized("Invalid or expired token".into()))?;

    Ok(token_data.claims)
}

/// 签发一枚 JWT。登录路由与 App 启动时的服务 Token 共用此函数。
pub fn issue_jwt(
    secret: &str,
    sub: &str,
    role: &str,
    ttl_secs: u64,
) -> Result<String, ApiError> {
    let exp = usize::try_from(chrono::Utc::now().timestamp())
        .map_err(|_| ApiError::Internal("Clock before epoch".into()))?
        + usize::try_from(ttl_secs).map_err(|_| ApiError::Internal("TTL overflow".into()))?;

    let claims = Claims {
        sub: sub.to_string(),
        role: role.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_ref()),
    )
    .map_err(|_| ApiError::Internal("Failed to generate token".into()))
}

// 在提取器中获取当前主体的快捷方式
pub struct CurrentActor(pub Claims);

impl<S> FromRequestParts<S> for CurrentActor
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let claims = parts
            .extensions
            .get::<Claims>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Missing actor context".into()))?;
        Ok(CurrentActor(claims))
    }
}
