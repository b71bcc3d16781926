//! # 分析路由控制器

use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::error::ApiError;
use crate::middleware::auth::CurrentActor;
use crate::server::AppState;
use crate::types::PnlSummaryResponse;

#[derive(Debug, Deserialize, IntoParams)]
pub struct PnlQuery {
    /// 目标用户；缺省取 JWT 主体
    pub user_id: Option<String>,
}

/// 查询盈亏汇总
#[utoipa::path(
    get,
    path = "/api/v1/analytics/pnl",
    tag = "分析 (Analytics)",
    security(("bearer_jwt" = [])),
    params(PnlQuery),
    responses(
        (status = 200, description = "盈亏汇总", body = PnlSummaryResponse)
    )
)]
pub async fn get_pnl(
    State(state): State<AppState>,
    CurrentActor(claims): CurrentActor,
    Query(query): Query<PnlQuery>,
) -> Result<Json<PnlSummaryResponse>, ApiError> {
    let user_id = query.user_id.unwrap_or(claims.sub);
    let summary = state
        .position_store
        .pnl_summary(&user_id)
        .await
        .map_err(ApiError::from)?;
    Ok(Json(summary.into()))
}
