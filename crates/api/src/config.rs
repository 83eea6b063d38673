//! Application configuration loaded from environment variables.

use std::time::Duration;

use fulfillment::Pay0Config;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `"json"` for JSON log lines, anything else for pretty
/// - `DATABASE_URL`: PostgreSQL URL; unset runs on the in-memory ledger
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `10`)
/// - `PUBLIC_BASE_URL`: where buyers reach the store (default: `"http://localhost:3000"`)
/// - `PAY0_API_URL`: gateway base URL (default: `"https://pay0.shop/api"`)
/// - `PAY0_USER_TOKEN`: gateway merchant token (default: empty)
/// - `GATEWAY_TIMEOUT_SECS`: outbound request timeout (default: `15`)
/// - `ADMIN_TOKEN`: bearer token for `/api/admin/*`; unset leaves them open
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub public_base_url: String,
    pub pay0_api_url: String,
    pub pay0_user_token: String,
    pub gateway_timeout_secs: u64,
    pub admin_token: Option<String>,
}

fn var_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parsed_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: var_or("HOST", &defaults.host),
            port: parsed_or("PORT", defaults.port),
            log_level: var_or("RUST_LOG", &defaults.log_level),
            log_format: var_or("LOG_FORMAT", &defaults.log_format),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections: parsed_or(
                "DATABASE_MAX_CONNECTIONS",
                defaults.database_max_connections,
            ),
            public_base_url: var_or("PUBLIC_BASE_URL", &defaults.public_base_url),
            pay0_api_url: var_or("PAY0_API_URL", &defaults.pay0_api_url),
            pay0_user_token: var_or("PAY0_USER_TOKEN", &defaults.pay0_user_token),
            gateway_timeout_secs: parsed_or("GATEWAY_TIMEOUT_SECS", defaults.gateway_timeout_secs),
            admin_token: non_empty("ADMIN_TOKEN"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }

    /// Gateway client settings.
    pub fn pay0(&self) -> Pay0Config {
        Pay0Config {
            base_url: self.pay0_api_url.clone(),
            user_token: self.pay0_user_token.clone(),
            timeout: Duration::from_secs(self.gateway_timeout_secs),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            database_url: None,
            database_max_connections: 10,
            public_base_url: "http://localhost:3000".to_string(),
            pay0_api_url: "https://pay0.shop/api".to_string(),
            pay0_user_token: String::new(),
            gateway_timeout_secs: 15,
            admin_token: None,
        }
    }
}
