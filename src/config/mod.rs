use crate::user::DEFAULT_TOKEN_TTL_HOURS;
use crate::utils::DATABASE_FILE;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

pub const DEFAULT_ADDR: &str = "127.0.0.1:50061";
pub const DEFAULT_CORS_ORIGINS: &[&str] = &[
    "http://localhost",
    "https://localhost",
    "http://127.0.0.1",
    "https://127.0.0.1",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Invalid listen address {0}")]
    InvalidAddr(String),

    #[error("A JWT secret is required (--jwt-secret or WAYFARER_JWT_SECRET)")]
    MissingJwtSecret,

    #[error("Token lifetime must be at least one hour, got {0}")]
    InvalidTokenTtl(i64),
}

/// Optional JSON config file. Every field may be omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_ttl_hours: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub cors_origins: Vec<String>,
}

/// Values given on the command line or through the environment.
/// They take precedence over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub addr: Option<String>,
    pub db_path: Option<PathBuf>,
    pub jwt_secret: Option<String>,
    pub token_ttl_hours: Option<i64>,
    pub cors_origins: Vec<String>,
}

/// Fully resolved daemon settings
#[derive(Clone)]
pub struct DaemonConfig {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub cors_origins: Vec<String>,
}

impl std::fmt::Debug for DaemonConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonConfig")
            .field("addr", &self.addr)
            .field("db_path", &self.db_path)
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("cors_origins", &self.cors_origins)
            .finish_non_exhaustive()
    }
}

impl DaemonConfig {
    /// Merge overrides over the file config, then fill in defaults
    pub fn resolve(overrides: ConfigOverrides, file: FileConfig) -> Result<Self, ConfigError> {
        let addr_str = overrides
            .addr
            .or(file.addr)
            .unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let addr = addr_str
            .parse()
            .map_err(|_| ConfigError::InvalidAddr(addr_str.clone()))?;

        let jwt_secret = overrides
            .jwt_secret
            .or(file.jwt_secret)
            .filter(|s| !s.trim().is_empty())
            .ok_or(ConfigError::MissingJwtSecret)?;

        let token_ttl_hours = overrides
            .token_ttl_hours
            .or(file.token_ttl_hours)
            .unwrap_or(DEFAULT_TOKEN_TTL_HOURS);
        if token_ttl_hours < 1 {
            return Err(ConfigError::InvalidTokenTtl(token_ttl_hours));
        }

        let cors_origins = if !overrides.cors_origins.is_empty() {
            overrides.cors_origins
        } else if !file.cors_origins.is_empty() {
            file.cors_origins
        } else {
            DEFAULT_CORS_ORIGINS.iter().map(|s| s.to_string()).collect()
        };
        let cors_origins = cors_origins
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            addr,
            db_path: overrides
                .db_path
                .or(file.db_path)
                .unwrap_or_else(|| PathBuf::from(DATABASE_FILE)),
            jwt_secret,
            token_ttl_hours,
            cors_origins,
        })
    }

    pub fn allows_all_origins(&self) -> bool {
        self.cors_origins.iter().any(|o| o == "*")
    }
}

/// Read the configuration file, `None` if it does not exist
pub async fn read_config(path: &Path) -> Result<Option<FileConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).await?;
    let config: FileConfig = serde_json::from_str(&content)?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn with_secret() -> ConfigOverrides {
        ConfigOverrides {
            jwt_secret: Some("s3cret".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = DaemonConfig::resolve(with_secret(), FileConfig::default()).unwrap();
        assert_eq!(config.addr.to_string(), DEFAULT_ADDR);
        assert_eq!(config.db_path, PathBuf::from(DATABASE_FILE));
        assert_eq!(config.token_ttl_hours, DEFAULT_TOKEN_TTL_HOURS);
        assert_eq!(config.cors_origins.len(), DEFAULT_CORS_ORIGINS.len());
        assert!(!config.allows_all_origins());
    }

    #[test]
    fn test_missing_secret_is_an_error() {
        let result = DaemonConfig::resolve(ConfigOverrides::default(), FileConfig::default());
        assert!(matches!(result, Err(ConfigError::MissingJwtSecret)));

        let blank = ConfigOverrides {
            jwt_secret: Some("  ".to_string()),
            ..Default::default()
        };
        assert!(DaemonConfig::resolve(blank, FileConfig::default()).is_err());
    }

    #[test]
    fn test_overrides_win_over_file() {
        let file = FileConfig {
            addr: Some("0.0.0.0:9000".to_string()),
            jwt_secret: Some("from-file".to_string()),
            token_ttl_hours: Some(12),
            cors_origins: vec!["*".to_string()],
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            addr: Some("127.0.0.1:7000".to_string()),
            ..Default::default()
        };
        let config = DaemonConfig::resolve(overrides, file).unwrap();
        assert_eq!(config.addr.port(), 7000);
        assert_eq!(config.jwt_secret, "from-file");
        assert_eq!(config.token_ttl_hours, 12);
        assert!(config.allows_all_origins());
    }

    #[test]
    fn test_invalid_values() {
        let bad_addr = ConfigOverrides {
            addr: Some("not an address".to_string()),
            ..with_secret()
        };
        assert!(matches!(
            DaemonConfig::resolve(bad_addr, FileConfig::default()),
            Err(ConfigError::InvalidAddr(_))
        ));

        let bad_ttl = ConfigOverrides {
            token_ttl_hours: Some(0),
            ..with_secret()
        };
        assert!(matches!(
            DaemonConfig::resolve(bad_ttl, FileConfig::default()),
            Err(ConfigError::InvalidTokenTtl(0))
        ));
    }

    #[tokio::test]
    async fn test_read_config_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("wayfarer.json");
        assert!(read_config(&path).await.unwrap().is_none());

        tokio::fs::write(&path, r#"{"dbPath": "/var/lib/wayfarer/db.sqlite", "tokenTtlHours": 48}"#)
            .await
            .unwrap();
        let config = read_config(&path).await.unwrap().unwrap();
        assert_eq!(
            config.db_path,
            Some(PathBuf::from("/var/lib/wayfarer/db.sqlite"))
        );
        assert_eq!(config.token_ttl_hours, Some(48));
    }
}
