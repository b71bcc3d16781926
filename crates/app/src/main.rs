use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use vega_api::middleware::auth::{ROLE_SERVICE, issue_jwt};
use vega_api::server::{AppState, start_server};
use vega_api::ws::{RoomRegistry, fanout::spawn_fanout};
use vega_bot::{DiscordGateway, DiscordRest, SignalBridge};
use vega_bot::api_client::HttpDeskApi;
use vega_bus::InProcessBus;
use vega_cache::MemCache;
use vega_core::bus::port::EventBus;
use vega_core::cache::port::Cache;
use vega_core::config::AppConfig;
use vega_signal::{ExpirySweeper, SignalService};
use vega_store::signal::SqliteSignalStore;
use vega_store::system::SqliteSystemStore;

/// 服务 Token 有效期 (秒)，进程重启即重签
const SERVICE_TOKEN_TTL: u64 = 86400 * 365;

/// # Summary
/// 应用启动入口，纯粹的 DI 容器。
/// 负责实例化所有具体实现组件并通过 Arc<dyn Trait> 注入各服务，
/// 依次拉起到期清扫器、WebSocket 扇出、Discord 桥与 HTTP 网关。
///
/// # Logic
/// 1. 加载配置 (默认值 <- config 文件 <- VEGA__ 环境变量)。
/// 2. 初始化全局日志 (stdout + 数据目录下的滚动日志文件)。
/// 3. 实例化基础设施层 (Store、Bus、Cache)。
/// 4. 构造应用服务层 (SignalService) 并启动清扫器。
/// 5. 启动 WebSocket 扇出协程与 (可选的) Discord 桥。
/// 6. 启动 HTTP 网关，直到收到退出信号。
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. 配置
    let settings = config::Config::builder()
        .add_source(config::Config::try_from(&AppConfig::default())?)
        .add_source(config::File::with_name("config").required(false))
        .add_source(config::Environment::with_prefix("VEGA").separator("__"))
        .build()?;
    let app_config: Arc<AppConfig> = Arc::new(settings.try_deserialize()?);

    // 2. 日志
    std::fs::create_dir_all(&app_config.database.data_dir)?;
    let file_appender =
        tracing_appender::rolling::daily(&app_config.database.data_dir, "vega.log");
    let (file_writer, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stdout.and(file_writer))
        .init();
    info!("Vega signal desk starting...");

    // 3. 基础设施层
    vega_store::config::set_root_dir(PathBuf::from(&app_config.database.data_dir));
    let signal_store = Arc::new(SqliteSignalStore::new().await?);
    let system_store = Arc::new(SqliteSystemStore::new().await?);
    let bus: Arc<dyn EventBus> = Arc::new(InProcessBus::new(app_config.bus.channel_capacity));
    let cache: Arc<dyn Cache> = Arc::new(MemCache::new());

    // 4. 应用服务层 + 权威到期清扫
    let signal_service = SignalService::new(signal_store, bus.clone(), cache.clone());
    let _sweeper = ExpirySweeper::new(
        signal_service.clone(),
        Duration::from_secs(app_config.sweeper.interval_secs),
    )
    .spawn();

    // 5. WebSocket 扇出
    let rooms = Arc::new(RoomRegistry::new());
    let _fanout = spawn_fanout(&bus, rooms.clone());

    // 6. Discord 桥 (配置了 token 才启动)
    if app_config.bot.enabled {
        let service_token = issue_jwt(
            &app_config.server.jwt_secret,
            "vega-bot",
            ROLE_SERVICE,
            SERVICE_TOKEN_TTL,
        )
        .map_err(|e| format!("Failed to issue service token: {}", e))?;

        let chat = Arc::new(DiscordRest::new(
            app_config.bot.bot_token.clone(),
            app_config.bot.api_base.clone(),
        ));
        let desk_api = Arc::new(HttpDeskApi::new(
            app_config.bot.desk_api_base.clone(),
            service_token,
        ));

        let (events_tx, events_rx) = tokio::sync::mpsc::channel(64);
        let bridge = SignalBridge::new(chat, desk_api, cache, app_config.bot.command_prefix.clone());
        let _bridge_tasks = bridge.spawn(&bus, events_rx);
        let _gateway = DiscordGateway::new(
            app_config.bot.bot_token.clone(),
            app_config.bot.gateway_url.clone(),
            app_config.bot.command_prefix.clone(),
            events_tx,
        )
        .spawn();
        info!("Discord bridge enabled");
    } else {
        info!("Discord bridge disabled (no bot token configured)");
    }

    // 7. HTTP 网关
    let state = AppState {
        signal_service,
        user_store: system_store.clone(),
        position_store: system_store.clone(),
        config_store: system_store,
        rooms,
        app_config: app_config.clone(),
        started_at: Instant::now(),
    };

    let bind_addr = format!("{}:{}", app_config.server.host, app_config.server.port);
    tokio::select! {
        result = start_server(state, &bind_addr) => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting...");
        }
    }

    Ok(())
}
