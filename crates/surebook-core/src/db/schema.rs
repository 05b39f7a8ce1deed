//! Database schema definitions
//!
//! Three tables and five indexes, created idempotently at every startup.
//! Encrypted columns are opaque blobs (`nonce || ciphertext || tag`);
//! `rrn_hash` carries the uniqueness of the resident id so the plaintext
//! never needs an index.

use rusqlite::Connection;
use tracing::debug;

use crate::error::Result;

/// Create all tables and indexes when absent
pub const CREATE_TABLES_SQL: &str = r#"
    -- Customers: the aggregate root; soft-deleted rows keep their data
    -- but release their resident-id hash through a tombstone value
    CREATE TABLE IF NOT EXISTS customers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        rrn_encrypted BLOB NOT NULL,
        rrn_hash TEXT NOT NULL UNIQUE,
        phone TEXT NOT NULL,
        address TEXT NOT NULL,
        job TEXT,
        payment_card_encrypted BLOB,
        payment_account_encrypted BLOB,
        payout_account_encrypted BLOB,
        medical_history TEXT,
        note TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        deleted_at TEXT
    );

    CREATE TABLE IF NOT EXISTS insurances (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER NOT NULL,
        contract_date TEXT NOT NULL,
        company TEXT NOT NULL,
        policy_number TEXT NOT NULL UNIQUE,
        product_name TEXT NOT NULL,
        premium TEXT NOT NULL,
        insured_person TEXT NOT NULL,
        payment_day INTEGER NOT NULL,
        beneficiary TEXT NOT NULL,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
        deleted_at TEXT,
        FOREIGN KEY (customer_id) REFERENCES customers(id) ON DELETE RESTRICT
    );

    -- Append-only; rows are only removed by retention pruning or purge
    CREATE TABLE IF NOT EXISTS audit_logs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        action TEXT NOT NULL,
        entity TEXT NOT NULL,
        entity_id INTEGER,
        detail TEXT,
        created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
    );

    CREATE INDEX IF NOT EXISTS idx_customers_name ON customers(name);
    CREATE INDEX IF NOT EXISTS idx_customers_phone ON customers(phone);
    CREATE INDEX IF NOT EXISTS idx_insurances_customer ON insurances(customer_id);
    CREATE INDEX IF NOT EXISTS idx_insurances_policy ON insurances(policy_number);
    CREATE INDEX IF NOT EXISTS idx_audit_logs_created_at ON audit_logs(created_at);
"#;

/// Create required tables and indexes if they do not exist
pub fn initialize(conn: &Connection) -> Result<()> {
    conn.execute_batch(CREATE_TABLES_SQL)?;
    debug!("schema initialized");
    Ok(())
}
