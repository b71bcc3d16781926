use serde::{Deserialize, Serialize};

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub bus: BusConfig,
    pub sweeper: SweeperConfig,
    pub bot: BotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub data_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusConfig {
    /// 每个频道 broadcast 通道的容量，慢消费者超出后丢弃最旧消息
    pub channel_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweeperConfig {
    /// 到期清扫周期 (秒)
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// 未配置 token 时整个 Discord 桥不启动
    pub enabled: bool,
    pub bot_token: String,
    /// Discord REST 基地址
    pub api_base: String,
    /// Discord Gateway WebSocket 地址
    pub gateway_url: String,
    /// 信号台自身网关的基地址 (桥的 REST 回调目标)
    pub desk_api_base: String,
    /// 桥调用信号台 REST 所用的服务 Token
    pub service_token: String,
    /// 文本命令前缀
    pub command_prefix: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
                jwt_secret: "YOUR_SUPER_SECRET_KEY".to_string(), // Default for dev, should be overwritten by config
            },
            database: DatabaseConfig {
                data_dir: "data".to_string(),
            },
            bus: BusConfig {
                channel_capacity: 256,
            },
            sweeper: SweeperConfig { interval_secs: 5 },
            bot: BotConfig {
                enabled: false,
                bot_token: String::new(),
                api_base: "https://discord.com/api/v10".to_string(),
                gateway_url: "wss://gateway.discord.gg/?v=10&encoding=json".to_string(),
                desk_api_base: "http://127.0.0.1:8080".to_string(),
                service_token: String::new(),
                command_prefix: "!".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.bus.channel_capacity, 256);
        assert_eq!(config.sweeper.interval_secs, 5);
        assert!(!config.bot.enabled);
        assert_eq!(config.bot.command_prefix, "!");
    }
}
