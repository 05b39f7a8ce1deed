//! Database connection management
//!
//! Each worker owns exactly one [`Database`] handle (and thus one SQLite
//! connection) for its lifetime; handles are never shared across threads.
//! Every statement auto-commits individually — multi-step repository
//! sequences are sequential units of work, not wrapped transactions.

pub mod schema;

use rusqlite::Connection;
use std::fs;
use tracing::debug;

use crate::bootstrap::RuntimeKeys;
use crate::config::AppConfig;
use crate::error::{Error, Result};

/// Whether this build links a page-cipher-capable SQLite
pub const CIPHER_LINKED: bool = cfg!(feature = "sqlcipher");

/// A single-connection database handle
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (creating if missing) the configured database for one worker
    ///
    /// The cipher key pragma runs before any other statement; the key value
    /// is quoted defensively and never appears in logs or errors.
    pub fn open(config: &AppConfig, keys: &RuntimeKeys) -> Result<Self> {
        if !CIPHER_LINKED && !config.database.allow_plain_fallback {
            return Err(Error::Config(
                "SQLCipher is not linked in and the plain SQLite fallback is disabled"
                    .to_string(),
            ));
        }

        if let Some(parent) = config.database.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&config.database.path)?;
        apply_cipher_key(&conn, keys.db_key.expose())?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        debug!(path = %config.database.path.display(), cipher = CIPHER_LINKED, "opened database");

        Ok(Self { conn })
    }

    /// Open an in-memory database (tests)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(Self { conn })
    }

    /// Create tables and indexes when absent
    pub fn initialize_schema(&self) -> Result<()> {
        schema::initialize(&self.conn)
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

/// Set the page cipher key, doubling single quotes in the key so an
/// operator-supplied value cannot break out of the statement
///
/// On a stock SQLite build the pragma is an unknown no-op; the fallback
/// gate in [`Database::open`] decides whether that is acceptable.
fn apply_cipher_key(conn: &Connection, key: &str) -> Result<()> {
    let quoted = key.replace('\'', "''");
    conn.execute_batch(&format!("PRAGMA key = '{quoted}';"))?;
    if CIPHER_LINKED {
        conn.execute_batch("PRAGMA cipher_compatibility = 4;")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::Secret;
    use crate::crypto::FieldKey;
    use tempfile::TempDir;

    fn runtime_keys() -> RuntimeKeys {
        RuntimeKeys {
            db_key: Secret::new("test-key-with-'quote".to_string()),
            record_key: FieldKey::generate(),
        }
    }

    fn plain_config(dir: &TempDir) -> AppConfig {
        let mut config = AppConfig::default();
        config.database.path = dir.path().join("nested/dir/records.db");
        config.database.allow_plain_fallback = true;
        config
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let config = plain_config(&dir);
        let db = Database::open(&config, &runtime_keys()).unwrap();
        db.initialize_schema().unwrap();
        assert!(config.database.path.exists());
    }

    #[test]
    fn test_quoted_key_does_not_break_statement() {
        // A key containing a single quote must not produce a SQL error
        let dir = TempDir::new().unwrap();
        let config = plain_config(&dir);
        assert!(Database::open(&config, &runtime_keys()).is_ok());
    }

    #[cfg(not(feature = "sqlcipher"))]
    #[test]
    fn test_plain_fallback_must_be_allowed() {
        let dir = TempDir::new().unwrap();
        let mut config = plain_config(&dir);
        config.database.allow_plain_fallback = false;
        assert!(matches!(
            Database::open(&config, &runtime_keys()),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_schema_init_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.initialize_schema().unwrap();
        db.initialize_schema().unwrap();

        let count: i64 = db
            .conn()
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' \
                 AND name IN ('customers', 'insurances', 'audit_logs')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 3);
    }
}
