//! Runtime configuration, read from the environment

use std::path::PathBuf;

use crate::constants::DEFAULT_MAP_SIZE_MB;

#[derive(Debug, Clone)]
pub struct Config {
    /// LMDB environment directory
    pub data_dir: PathBuf,
    pub map_size_mb: usize,
    /// Admin API port (server feature)
    pub http_port: u16,
    pub log_level: String,
    pub admin_email: String,
    /// Initial super admin is created only when this is set
    pub admin_password_hash: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("schoolgate_data"),
            map_size_mb: DEFAULT_MAP_SIZE_MB,
            http_port: 3000,
            log_level: "info".to_string(),
            admin_email: "admin@example.com".to_string(),
            admin_password_hash: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|k| std::env::var(k).ok())
    }

    /// Build from any key lookup; unset or unparsable values fall back to defaults
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Self {
        let d = Config::default();
        Self {
            data_dir: get("SCHOOLGATE_DATA_DIR").map(PathBuf::from).unwrap_or(d.data_dir),
            map_size_mb: get("SCHOOLGATE_MAP_SIZE_MB")
                .and_then(|v| v.parse().ok())
                .filter(|&mb: &usize| mb > 0)
                .unwrap_or(d.map_size_mb),
            http_port: get("SCHOOLGATE_HTTP_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(d.http_port),
            log_level: get("SCHOOLGATE_LOG_LEVEL").unwrap_or(d.log_level),
            admin_email: get("SCHOOLGATE_ADMIN_EMAIL").unwrap_or(d.admin_email),
            admin_password_hash: get("SCHOOLGATE_ADMIN_PASSWORD_HASH").filter(|h| !h.is_empty()),
        }
    }
}
