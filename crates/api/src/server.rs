//! # API 服务启动器
//!
//! 组装 axum 路由、挂载 Swagger UI、配置 CORS 并绑定 TCP 端口对外提供服务。
//! 本模块不直接启动 `main()`, 而是由 `crates/app` 的 DI 容器持有并调用。

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_axum::routes;
use utoipa_swagger_ui::SwaggerUi;

use vega_core::config::AppConfig;
use vega_core::signal::port::{ConfigStore, PositionStore, UserStore};
use vega_signal::SignalService;

use crate::routes::{analytics, auth, health, positions, signals, trading, users};
use crate::ws::RoomRegistry;

// ============================================================
//  共享应用状态
// ============================================================

/// 全局应用状态，通过 axum 的 `State` 提取器注入到每个 Handler 中。
///
/// # Invariants
/// - 各端口实现在服务启动前由 DI 容器注入，生命周期与进程等同。
/// - `rooms` 是本进程实例私有的活性状态。
#[derive(Clone)]
pub struct AppState {
    /// 信号生命周期服务 (Facade)
    pub signal_service: Arc<SignalService>,
    /// 用户数据访问接口 (鉴权验证与 Discord 身份映射)
    pub user_store: Arc<dyn UserStore>,
    /// 持仓读取接口
    pub position_store: Arc<dyn PositionStore>,
    /// 用户配置接口
    pub config_store: Arc<dyn ConfigStore>,
    /// WebSocket 房间注册表
    pub rooms: Arc<RoomRegistry>,
    /// 应用配置
    pub app_config: Arc<AppConfig>,
    /// 进程启动时刻 (健康检查的 uptime 基准)
    pub started_at: Instant,
}

// ============================================================
//  OpenAPI 文档定义
// ============================================================

/// 全局 OpenAPI 文档结构
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Vega 期权信号台 API",
        version = "0.1.0",
        description = "Vega 期权信号台的 REST/WebSocket 网关。提供信号确认/拒绝、持仓与盈亏查询、Discord 身份映射与交易控制。",
        contact(name = "Vega Team"),
        license(name = "MIT")
    ),
    tags(
        (name = "鉴权 (Auth)", description = "JWT 获取与登录认证相关 API"),
        (name = "信号 (Signals)", description = "信号查询与确认/拒绝"),
        (name = "持仓 (Positions)", description = "未平仓持仓查询"),
        (name = "分析 (Analytics)", description = "盈亏汇总"),
        (name = "用户 (Users)", description = "Discord 身份映射与交易配置"),
        (name = "交易控制 (Trading)", description = "信号生成的暂停与恢复"),
        (name = "系统 (System)", description = "健康检查")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// 为 OpenAPI 文档注入全局 Bearer JWT 鉴权方案。
///
/// 注册后，Swagger UI 页面顶部将显示 🔒 Authorize 按钮，
/// 用户可以填入 JWT Token 后对所有标记了 `security` 的接口进行鉴权测试。
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        // 若 components 不存在则创建
        let components = openapi.components.get_or_insert_with(Default::default);

        // 注册名为 "bearer_jwt" 的 HTTP Bearer 鉴权方案
        components.add_security_scheme(
            "bearer_jwt",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .description(Some(
                        "在此处填入登录接口返回的 JWT Token（无需 'Bearer ' 前缀）",
                    ))
                    .build(),
            ),
        );
    }
}

// ============================================================
//  服务构建与启动
// ============================================================

/// 构建完整的 axum 应用 (REST + Swagger UI + WebSocket)。
/// 单独暴露是为了让集成测试可以在随机端口自行 serve。
pub fn build_app(state: AppState) -> Router {
    // 1. 无需鉴权的公开路由
    let public_router = OpenApiRouter::new()
        .routes(routes!(health::health))
        .routes(routes!(auth::login));

    // 2. 需要合法 JWT 鉴权的业务路由
    let protected_router = OpenApiRouter::new()
        .routes(routes!(signals::get_pending))
        .routes(routes!(signals::get_history))
        .routes(routes!(signals::get_signal))
        .routes(routes!(signals::confirm_signal))
        .routes(routes!(signals::reject_signal))
        .routes(routes!(positions::get_positions))
        .routes(routes!(analytics::get_pnl))
        .routes(routes!(users::get_discord_link))
        .routes(routes!(users::get_user_by_discord))
        .routes(routes!(users::link_discord))
        .routes(routes!(users::get_trading_config))
        .routes(routes!(trading::pause_trading))
        .routes(routes!(trading::resume_trading))
        .routes(routes!(trading::get_trading_status))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    // 3. 合并所有路由与自动收集的 OpenAPI Doc
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(public_router)
        .merge(protected_router)
        .with_state(state.clone())
        .split_for_parts();

    // 4. 配置 CORS (开发阶段允许所有来源)
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // 5. WebSocket 升级入口不进 OpenAPI 文档，直接挂到最终 Router
    router
        .route(
            "/ws",
            get(crate::ws::handler::ws_handler).with_state(state),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", api))
        .layer(cors)
}

/// 构建完整的 axum 应用路由树并启动 HTTP 监听。
///
/// # Arguments
/// * `state` - 由外部 DI 容器注入的共享状态
/// * `bind_addr` - 监听的地址与端口，如 `"0.0.0.0:8080"`
pub async fn start_server(
    state: AppState,
    bind_addr: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let app = build_app(state);

    tracing::info!("🚀 Vega API Server listening on {}", bind_addr);
    tracing::info!("📖 Swagger UI: http://{}/swagger-ui/", bind_addr);

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
