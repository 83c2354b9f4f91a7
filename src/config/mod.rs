use std::env;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub jwt_secret: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub auth_redirect: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 从任意键值来源构建配置，`from_env` 与测试共用
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));
        let optional = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.into());

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parse_var(
                "DATABASE_MAX_CONNECTIONS",
                optional("DATABASE_MAX_CONNECTIONS", "10"),
            )?,
            redis_url: required("REDIS_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            rate_limit_window_secs: parse_var(
                "RATE_LIMIT_WINDOW",
                optional("RATE_LIMIT_WINDOW", "60")
                    .trim_end_matches('s')
                    .to_string(),
            )?,
            rate_limit_requests: parse_var(
                "RATE_LIMIT_REQUESTS",
                optional("RATE_LIMIT_REQUESTS", "100"),
            )?,
            server_host: optional("SERVER_HOST", "::"),
            server_port: parse_var("SERVER_PORT", optional("SERVER_PORT", "3000"))?,
            api_base_uri: normalize_base_uri(&optional("API_BASE_URI", "/api")),
            auth_redirect: optional("AUTH_REDIRECT", "/auth"),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn parse_var<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}

// axum 的 nest 要求前缀以 / 开头且不以 / 结尾
fn normalize_base_uri(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}
