//! # 持仓路由控制器

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::middleware::auth::CurrentActor;
use crate::server::AppState;
use crate::types::PositionResponse;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PositionsQuery {
    /// 目标用户；缺省取 JWT 主体
    pub user_id: Option<String>,
}

/// 查询当前未平仓持仓
#[utoipa::path(
    get,
    path = "/api/v1/positions",
    tag = "持仓 (Positions)",
    security(("bearer_jwt" = [])),
    params(PositionsQuery),
    responses(
        (status = 200, description = "未平仓持仓列表", body = Vec<PositionResponse>)
    )
)]
pub async fn get_positions(
    State(state): State<AppState>,
    CurrentActor(claims): CurrentActor,
    Query(query): Query<PositionsQuery>,
) -> Result<Json<Vec<PositionResponse>>, ApiError> {
    let user_id = query.user_id.unwrap_or(claims.sub);
    let positions = state
        .position_store
        .open_positions(&user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(positions.iter().map(Into::into).collect()))
}
