//! Configuration management with file persistence

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Environment variable that overrides the config file location
pub const CONFIG_PATH_ENV: &str = "SUREBOOK_CONFIG_PATH";

/// Default config file location relative to the runtime root
pub const DEFAULT_CONFIG_REL_PATH: &str = "config/surebook.toml";

/// Default env var carrying the database cipher key
pub const DEFAULT_DB_KEY_ENV: &str = "SUREBOOK_DB_KEY";

/// Default env var carrying the record-encryption key
pub const DEFAULT_RECORD_KEY_ENV: &str = "SUREBOOK_RECORD_KEY";

/// Surebook configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub encryption: EncryptionConfig,
    pub audit: AuditConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path (relative paths resolve against the cwd)
    pub path: PathBuf,
    /// Env var name holding the database cipher key
    pub key_env: String,
    /// Permit opening a plain SQLite database when no cipher is linked in
    pub allow_plain_fallback: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptionConfig {
    /// Env var name holding the record-encryption key
    pub key_env: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Audit log retention window in days
    pub retention_days: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                path: PathBuf::from("surebook.db"),
                key_env: DEFAULT_DB_KEY_ENV.to_string(),
                allow_plain_fallback: false,
            },
            encryption: EncryptionConfig {
                key_env: DEFAULT_RECORD_KEY_ENV.to_string(),
            },
            audit: AuditConfig {
                retention_days: 1095,
            },
        }
    }
}

impl AppConfig {
    /// Resolve the config file path: env override, then the fixed
    /// relative path under the current directory
    pub fn config_path() -> PathBuf {
        if let Ok(custom) = env::var(CONFIG_PATH_ENV) {
            return PathBuf::from(custom);
        }
        PathBuf::from(DEFAULT_CONFIG_REL_PATH)
    }

    /// Load configuration from file, or return defaults when no file exists
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)?;
            let config: AppConfig = toml::from_str(&contents).map_err(|e| {
                Error::Config(format!("failed to parse {}: {}", path.display(), e))
            })?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save configuration to file, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        fs::write(path, contents)?;
        Ok(())
    }
}
