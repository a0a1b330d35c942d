//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{path::Path, time::Duration};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::chain_config::Chain;

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub blockchain: BlockchainConfig,
    #[serde(default)]
    pub engine: EngineConfig,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_addr: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

/// 链节点端点
///
/// EVM 与 Solana 为 JSON-RPC；UTXO 链为 Esplora 风格 REST。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainConfig {
    pub eth_rpc_url: String,
    pub polygon_rpc_url: String,
    pub bsc_rpc_url: String,
    pub solana_rpc_url: String,
    pub bitcoin_esplora_url: String,
    pub bitcoin_cash_esplora_url: String,
    pub dogecoin_esplora_url: String,
    pub request_timeout_secs: u64,
}

/// 交易引擎参数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// 预备交易有效期
    pub prepared_tx_ttl_secs: u64,
    /// 余额缓存新鲜度
    pub balance_cache_ttl_secs: u64,
    /// 广播总尝试次数（含首次）
    pub broadcast_max_attempts: u32,
    /// 单次广播硬超时
    pub broadcast_attempt_timeout_secs: u64,
    pub broadcast_initial_backoff_ms: u64,
    pub broadcast_backoff_multiplier: u32,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://postgres@localhost:5432/ironvault".into()),
            max_connections: env_or("DB_MAX_CONNS", 16),
            min_connections: env_or("DB_MIN_CONNS", 2),
            acquire_timeout_secs: env_or("DB_ACQ_TIMEOUT_SECS", 5),
            idle_timeout_secs: env_or("DB_IDLE_TIMEOUT_SECS", 300),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8088".into()),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Default for BlockchainConfig {
    fn default() -> Self {
        Self {
            eth_rpc_url: std::env::var("ETH_RPC_URL")
                .unwrap_or_else(|_| "https://eth.llamarpc.com".into()),
            polygon_rpc_url: std::env::var("POLYGON_RPC_URL")
                .unwrap_or_else(|_| "https://polygon-rpc.com".into()),
            bsc_rpc_url: std::env::var("BSC_RPC_URL")
                .unwrap_or_else(|_| "https://bsc-dataseed.binance.org".into()),
            solana_rpc_url: std::env::var("SOLANA_RPC_URL")
                .unwrap_or_else(|_| "https://api.mainnet-beta.solana.com".into()),
            bitcoin_esplora_url: std::env::var("BITCOIN_ESPLORA_URL")
                .unwrap_or_else(|_| "https://blockstream.info/api".into()),
            bitcoin_cash_esplora_url: std::env::var("BITCOIN_CASH_ESPLORA_URL")
                .unwrap_or_else(|_| "http://localhost:3002".into()),
            dogecoin_esplora_url: std::env::var("DOGECOIN_ESPLORA_URL")
                .unwrap_or_else(|_| "http://localhost:3003".into()),
            request_timeout_secs: env_or("RPC_TIMEOUT_SECS", 30),
        }
    }
}

impl BlockchainConfig {
    /// 链（代币按底层链）对应的端点
    pub fn endpoint_for(&self, chain: Chain) -> Option<&str> {
        let url = match chain.base_chain() {
            Chain::Eth => &self.eth_rpc_url,
            Chain::Pol => &self.polygon_rpc_url,
            Chain::Bnb => &self.bsc_rpc_url,
            Chain::Sol => &self.solana_rpc_url,
            Chain::Btc => &self.bitcoin_esplora_url,
            Chain::Bch => &self.bitcoin_cash_esplora_url,
            Chain::Doge => &self.dogecoin_esplora_url,
            _ => return None,
        };
        Some(url.trim_end_matches('/'))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prepared_tx_ttl_secs: env_or("PREPARED_TX_TTL_SECS", 300),
            balance_cache_ttl_secs: env_or("BALANCE_CACHE_TTL_SECS", 30),
            broadcast_max_attempts: env_or("BROADCAST_MAX_ATTEMPTS", 3),
            broadcast_attempt_timeout_secs: env_or("BROADCAST_ATTEMPT_TIMEOUT_SECS", 30),
            broadcast_initial_backoff_ms: env_or("BROADCAST_INITIAL_BACKOFF_MS", 500),
            broadcast_backoff_multiplier: env_or("BROADCAST_BACKOFF_MULTIPLIER", 2),
        }
    }
}

impl EngineConfig {
    pub fn prepared_tx_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.prepared_tx_ttl_secs as i64)
    }

    pub fn balance_cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.balance_cache_ttl_secs as i64)
    }

    pub fn broadcast_attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.broadcast_attempt_timeout_secs)
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: DatabaseConfig::default(),
            server: ServerConfig::default(),
            logging: LoggingConfig::default(),
            blockchain: BlockchainConfig::default(),
            engine: EngineConfig::default(),
        })
    }

    /// 从配置文件加载配置（缺省段落回落到环境变量默认值）
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        match path {
            Some(path) if path.as_ref().exists() => Self::from_file(path),
            _ => Self::from_env(),
        }
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        if !self.database.url.starts_with("postgres://")
            && !self.database.url.starts_with("postgresql://")
        {
            anyhow::bail!("DATABASE_URL must start with postgres:// or postgresql://");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        let engine = &self.engine;
        if engine.prepared_tx_ttl_secs == 0 || engine.balance_cache_ttl_secs == 0 {
            anyhow::bail!("prepared transaction and balance cache TTLs must be positive");
        }
        if engine.broadcast_max_attempts == 0 {
            anyhow::bail!("BROADCAST_MAX_ATTEMPTS must be at least 1");
        }
        if engine.broadcast_attempt_timeout_secs == 0 {
            anyhow::bail!("BROADCAST_ATTEMPT_TIMEOUT_SECS must be positive");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::from_env().unwrap();
        assert!(config.validate().is_ok());
        assert!(config.blockchain.endpoint_for(Chain::UsdtEth).is_some());
        assert!(config.blockchain.endpoint_for(Chain::Ada).is_none());
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[database]
url = "postgres://test@localhost/test"
max_connections = 20
min_connections = 5
acquire_timeout_secs = 30
idle_timeout_secs = 600

[server]
bind_addr = "0.0.0.0:9090"

[logging]
level = "debug"
format = "json"

[engine]
prepared_tx_ttl_secs = 120
balance_cache_ttl_secs = 10
broadcast_max_attempts = 5
broadcast_attempt_timeout_secs = 15
broadcast_initial_backoff_ms = 100
broadcast_backoff_multiplier = 3
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.server.bind_addr, "0.0.0.0:9090");
        assert_eq!(config.engine.broadcast_max_attempts, 5);
        assert_eq!(config.engine.prepared_tx_ttl(), chrono::Duration::seconds(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_rejects_zero() {
        let mut config = Config::from_env().unwrap();
        config.engine.broadcast_max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = Config::from_env().unwrap();
        config.engine.balance_cache_ttl_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::from_env().unwrap();
        config.logging.format = "yaml".into();
        assert!(config.validate().is_err());
    }
}
