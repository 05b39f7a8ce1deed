//! Key bootstrap
//!
//! Resolves the database cipher key and the record-encryption key before
//! any connection is opened. Keys come from the process environment, from
//! local env files, or are generated once and persisted to
//! `config/runtime.env`. The one rule that must never be relaxed: when an
//! encrypted database file already exists and no runtime key file is
//! present, startup fails instead of generating a fresh key that could
//! never decrypt the existing data.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

use aes_gcm::aead::{rand_core::RngCore, OsRng};

use crate::config::AppConfig;
use crate::crypto::FieldKey;
use crate::error::{Error, Result};

/// Relative path of the generated runtime key file
pub const RUNTIME_ENV_REL_PATH: &str = "config/runtime.env";

/// Default database file name probed for existing encrypted data
const DEFAULT_DB_FILE: &str = "surebook.db";

/// Entropy (bytes) of a generated database cipher key
const DB_KEY_BYTES: usize = 48;

/// A secret string value that is zeroed on drop and never printed
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    value: String,
}

impl Secret {
    pub fn new(value: String) -> Self {
        Self { value }
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secret")
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Key material resolved by [`Bootstrap::resolve`]
#[derive(Debug, Clone)]
pub struct RuntimeKeys {
    pub db_key: Secret,
    pub record_key: FieldKey,
}

/// Bootstrap context constructed once at process start
///
/// Owns the runtime root (where the key file and default database live)
/// so there is no hidden global state; the connection factory receives the
/// resolved keys by value.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    runtime_root: PathBuf,
}

impl Bootstrap {
    /// Bootstrap rooted at the current directory
    pub fn new() -> Self {
        Self {
            runtime_root: PathBuf::from("."),
        }
    }

    /// Bootstrap rooted at an explicit directory (tests, packaged installs)
    pub fn with_root(runtime_root: impl Into<PathBuf>) -> Self {
        Self {
            runtime_root: runtime_root.into(),
        }
    }

    /// Absolute location of the generated runtime key file
    pub fn runtime_env_path(&self) -> PathBuf {
        self.runtime_root.join(RUNTIME_ENV_REL_PATH)
    }

    /// Resolve both keys, loading local env files and generating missing
    /// key material when it is safe to do so
    pub fn resolve(&self, config: &AppConfig) -> Result<RuntimeKeys> {
        for path in self.env_file_candidates() {
            load_env_file(&path);
        }

        let db_key = env::var(&config.database.key_env).ok();
        let record_key = env::var(&config.encryption.key_env).ok();

        if let (Some(db), Some(record)) = (&db_key, &record_key) {
            return Ok(RuntimeKeys {
                db_key: Secret::new(db.clone()),
                record_key: FieldKey::from_base64(record)?,
            });
        }

        // A database without its key file means generated keys would be
        // useless; refuse to start rather than orphan the data.
        let has_existing_db = self
            .db_file_candidates(&config.database.path)
            .iter()
            .any(|p| p.exists());
        if has_existing_db && !self.runtime_env_path().exists() {
            return Err(Error::KeyFileMissing);
        }

        let db_key = match db_key {
            Some(value) => value,
            None => generate_db_key(),
        };
        let record_key = match record_key {
            Some(value) => FieldKey::from_base64(&value)?,
            None => FieldKey::generate(),
        };

        env::set_var(&config.database.key_env, &db_key);
        env::set_var(&config.encryption.key_env, record_key.to_base64());
        self.write_runtime_env(config, &db_key, &record_key)?;
        info!(path = %self.runtime_env_path().display(), "generated runtime keys");

        Ok(RuntimeKeys {
            db_key: Secret::new(db_key),
            record_key,
        })
    }

    /// Return a required environment variable after bootstrap
    ///
    /// Defensive: [`resolve`](Self::resolve) guarantees the configured keys
    /// exist, so this only fires for misconfigured names.
    pub fn require(name: &str) -> Result<Secret> {
        match env::var(name) {
            Ok(value) if !value.is_empty() => Ok(Secret::new(value)),
            _ => Err(Error::Environment(name.to_string())),
        }
    }

    /// Ordered candidate files that may contain runtime keys
    fn env_file_candidates(&self) -> Vec<PathBuf> {
        let mut roots = vec![self.runtime_root.clone()];
        if let Ok(cwd) = env::current_dir() {
            roots.push(cwd);
        }
        if let Some(exe_dir) = env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(Path::to_path_buf))
        {
            roots.push(exe_dir);
        }

        let mut seen = HashSet::new();
        let mut paths = Vec::new();
        for root in roots {
            for rel in [".env.local", ".env.local.ps1", RUNTIME_ENV_REL_PATH] {
                let path = root.join(rel);
                let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
                if seen.insert(canonical) {
                    paths.push(path);
                }
            }
        }
        paths
    }

    /// Likely database paths that indicate existing encrypted data
    fn db_file_candidates(&self, configured: &Path) -> Vec<PathBuf> {
        let mut candidates = vec![
            self.runtime_root.join(DEFAULT_DB_FILE),
            PathBuf::from(DEFAULT_DB_FILE),
            configured.to_path_buf(),
        ];
        candidates.dedup();
        candidates
    }

    fn write_runtime_env(
        &self,
        config: &AppConfig,
        db_key: &str,
        record_key: &FieldKey,
    ) -> Result<()> {
        let path = self.runtime_env_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = format!(
            "{}='{}'\n{}='{}'\n",
            config.database.key_env,
            db_key,
            config.encryption.key_env,
            record_key.to_base64(),
        );
        fs::write(&path, contents)?;
        Ok(())
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}

/// Generate a high-entropy URL-safe database cipher key
fn generate_db_key() -> String {
    let mut bytes = [0u8; DB_KEY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Parse a shell or PowerShell key assignment line
fn split_key_value(raw_line: &str) -> Option<(String, String)> {
    let mut line = raw_line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }

    if let Some(rest) = line.strip_prefix("$env:") {
        line = rest;
    } else if let Some(rest) = line.strip_prefix("export ") {
        line = rest;
    }

    let (key, value) = line.split_once('=')?;
    let key = key.trim();
    let mut value = value.trim();
    if key.is_empty() {
        return None;
    }

    if (value.starts_with('\'') && value.ends_with('\'') && value.len() >= 2)
        || (value.starts_with('"') && value.ends_with('"') && value.len() >= 2)
    {
        value = &value[1..value.len() - 1];
    }

    Some((key.to_string(), value.to_string()))
}

/// Load `KEY=VALUE` lines from a local file into the process environment
///
/// Already-set variables are never overwritten, so the first file that
/// defines a key wins.
fn load_env_file(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };
    debug!(path = %path.display(), "loading env file");
    for line in contents.lines() {
        let Some((key, value)) = split_key_value(line) else {
            continue;
        };
        if env::var_os(&key).is_none() {
            env::set_var(&key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir, tag: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.path = dir.path().join("records.db");
        // Unique env names per test; the process environment is shared
        config.database.key_env = format!("SUREBOOK_TEST_DB_KEY_{}", tag);
        config.encryption.key_env = format!("SUREBOOK_TEST_RECORD_KEY_{}", tag);
        config
    }

    #[test]
    fn test_split_key_value_syntaxes() {
        assert_eq!(
            split_key_value("export FOO='bar'"),
            Some(("FOO".into(), "bar".into()))
        );
        assert_eq!(
            split_key_value("$env:FOO=\"bar\""),
            Some(("FOO".into(), "bar".into()))
        );
        assert_eq!(
            split_key_value("FOO=bar=baz"),
            Some(("FOO".into(), "bar=baz".into()))
        );
        assert_eq!(split_key_value("# comment"), None);
        assert_eq!(split_key_value(""), None);
        assert_eq!(split_key_value("no assignment here"), None);
    }

    #[test]
    fn test_generates_and_persists_keys() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, "GEN");
        let bootstrap = Bootstrap::with_root(dir.path());

        let keys = bootstrap.resolve(&config).unwrap();
        assert!(!keys.db_key.expose().is_empty());

        let persisted = fs::read_to_string(bootstrap.runtime_env_path()).unwrap();
        assert!(persisted.contains(&config.database.key_env));
        assert!(persisted.contains(keys.db_key.expose()));
        assert!(persisted.contains(&keys.record_key.to_base64()));

        env::remove_var(&config.database.key_env);
        env::remove_var(&config.encryption.key_env);
    }

    #[test]
    fn test_existing_env_wins_over_files() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, "ENVWINS");
        let record = FieldKey::generate();
        env::set_var(&config.database.key_env, "preset-db-key");
        env::set_var(&config.encryption.key_env, record.to_base64());

        let bootstrap = Bootstrap::with_root(dir.path());
        let keys = bootstrap.resolve(&config).unwrap();
        assert_eq!(keys.db_key.expose(), "preset-db-key");
        // Nothing was generated, so no runtime file either
        assert!(!bootstrap.runtime_env_path().exists());

        env::remove_var(&config.database.key_env);
        env::remove_var(&config.encryption.key_env);
    }

    #[test]
    fn test_loads_keys_from_env_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, "FROMFILE");
        let record = FieldKey::generate();
        fs::write(
            dir.path().join(".env.local"),
            format!(
                "export {}='file-db-key'\n{}='{}'\n",
                config.database.key_env,
                config.encryption.key_env,
                record.to_base64()
            ),
        )
        .unwrap();

        let bootstrap = Bootstrap::with_root(dir.path());
        let keys = bootstrap.resolve(&config).unwrap();
        assert_eq!(keys.db_key.expose(), "file-db-key");

        env::remove_var(&config.database.key_env);
        env::remove_var(&config.encryption.key_env);
    }

    #[test]
    fn test_refuses_when_db_exists_without_key_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, "ORPHAN");
        fs::write(&config.database.path, b"encrypted bytes").unwrap();

        let bootstrap = Bootstrap::with_root(dir.path());
        assert!(matches!(
            bootstrap.resolve(&config),
            Err(Error::KeyFileMissing)
        ));
    }

    #[test]
    fn test_keys_survive_restart_via_runtime_file() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir, "RESTART");
        let bootstrap = Bootstrap::with_root(dir.path());

        let first = bootstrap.resolve(&config).unwrap();
        // Simulate a fresh process: env cleared, key file still on disk
        env::remove_var(&config.database.key_env);
        env::remove_var(&config.encryption.key_env);
        fs::write(&config.database.path, b"encrypted bytes").unwrap();

        let second = bootstrap.resolve(&config).unwrap();
        assert_eq!(first.db_key.expose(), second.db_key.expose());
        assert_eq!(first.record_key.to_base64(), second.record_key.to_base64());

        env::remove_var(&config.database.key_env);
        env::remove_var(&config.encryption.key_env);
    }

    #[test]
    fn test_require_missing_is_environment_error() {
        assert!(matches!(
            Bootstrap::require("SUREBOOK_TEST_DEFINITELY_UNSET"),
            Err(Error::Environment(_))
        ));
    }

    #[test]
    fn test_secret_debug_redacted() {
        let secret = Secret::new("hunter2".to_string());
        let debug = format!("{:?}", secret);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
