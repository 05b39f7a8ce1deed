//! Customer repository with encrypted sensitive fields
//!
//! Uniqueness of the resident id is carried by a SHA-256 hash column, not
//! the plaintext. Soft-deleted rows mutate their hash into a tombstone
//! (`{hash}:deleted:{id}`) so the canonical hash can be reused by a new
//! active customer while the deleted row's history is preserved.

use rusqlite::{params, OptionalExtension, Row};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::debug;

use crate::crypto::FieldCipher;
use crate::db::Database;
use crate::domain::{CustomerDraft, CustomerRow, CustomerSearchField};
use crate::error::{Error, Result};
use crate::repo::is_unique_violation;

const SELECT_COLUMNS: &str = "id, name, rrn_encrypted, phone, address, job, \
     payment_card_encrypted, payment_account_encrypted, payout_account_encrypted, \
     medical_history, note";

#[derive(Clone)]
pub struct CustomerRepository {
    db: Arc<Database>,
    cipher: FieldCipher,
}

impl CustomerRepository {
    pub fn new(db: Arc<Database>, cipher: FieldCipher) -> Self {
        Self { db, cipher }
    }

    /// One-way hash of a normalized resident id
    pub fn hash_resident_id(resident_id: &str) -> String {
        hex::encode(Sha256::digest(resident_id.as_bytes()))
    }

    /// Insert a customer, reconciling the unique hash against soft-deleted
    /// rows, and return the new id
    ///
    /// A soft-deleted holder of the hash gets its hash rewritten to the
    /// tombstone form and the insert is retried once; an active holder is
    /// a duplicate. Resident ids are legally reusable, so uniqueness only
    /// binds among active customers.
    pub fn create(&self, draft: &CustomerDraft) -> Result<i64> {
        let hash = Self::hash_resident_id(&draft.resident_id);
        match self.insert(draft, &hash) {
            Ok(id) => Ok(id),
            Err(Error::Database(err)) if is_unique_violation(&err) => {
                self.free_hash_from_deleted_row(&hash)?;
                match self.insert(draft, &hash) {
                    Ok(id) => Ok(id),
                    Err(Error::Database(err)) if is_unique_violation(&err) => {
                        Err(Error::DuplicateResidentId)
                    }
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    fn insert(&self, draft: &CustomerDraft, hash: &str) -> Result<i64> {
        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO customers (
                name, rrn_encrypted, rrn_hash, phone, address, job,
                payment_card_encrypted, payment_account_encrypted,
                payout_account_encrypted, medical_history, note
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                draft.name,
                self.cipher.encrypt(&draft.resident_id)?,
                hash,
                draft.phone,
                draft.address,
                draft.job,
                self.cipher.encrypt(&draft.payment_card)?,
                self.cipher.encrypt(&draft.payment_account)?,
                self.cipher.encrypt(&draft.payout_account)?,
                draft.medical_history,
                draft.note,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Rewrite a soft-deleted holder's hash to its tombstone form so the
    /// canonical hash becomes available again
    fn free_hash_from_deleted_row(&self, hash: &str) -> Result<()> {
        let conn = self.db.conn();
        let holder: Option<(i64, Option<String>)> = conn
            .query_row(
                "SELECT id, deleted_at FROM customers WHERE rrn_hash = ?1",
                params![hash],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match holder {
            Some((_, None)) => Err(Error::DuplicateResidentId),
            Some((id, Some(_))) => {
                conn.execute(
                    "UPDATE customers SET rrn_hash = rrn_hash || ':deleted:' || id \
                     WHERE id = ?1",
                    params![id],
                )?;
                debug!(customer_id = id, "tombstoned hash of soft-deleted customer");
                Ok(())
            }
            // The violation came from somewhere else entirely; do not retry
            None => Err(Error::DuplicateResidentId),
        }
    }

    /// Fetch one active customer
    pub fn get(&self, customer_id: i64) -> Result<Option<CustomerRow>> {
        let row = self
            .db
            .conn()
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM customers \
                     WHERE id = ?1 AND deleted_at IS NULL"
                ),
                params![customer_id],
                row_to_customer,
            )
            .optional()?;
        Ok(row)
    }

    /// Active customers, newest-first, paginated
    pub fn list(&self, limit: u32, offset: u32) -> Result<Vec<CustomerRow>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM customers \
             WHERE deleted_at IS NULL ORDER BY id DESC LIMIT ?1 OFFSET ?2"
        ))?;
        let rows = stmt.query_map(params![limit, offset], row_to_customer)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Search active customers on one allow-listed column
    pub fn search(
        &self,
        field: CustomerSearchField,
        keyword: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CustomerRow>> {
        let conn = self.db.conn();
        if field == CustomerSearchField::Id {
            let Ok(id) = keyword.trim().parse::<i64>() else {
                return Ok(Vec::new());
            };
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM customers \
                 WHERE id = ?1 AND deleted_at IS NULL LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(params![id, limit, offset], row_to_customer)?;
            return Ok(rows.collect::<rusqlite::Result<_>>()?);
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM customers \
             WHERE deleted_at IS NULL AND {} LIKE ?1 \
             ORDER BY id DESC LIMIT ?2 OFFSET ?3",
            field.column()
        ))?;
        let pattern = format!("%{}%", keyword);
        let rows = stmt.query_map(params![pattern, limit, offset], row_to_customer)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Overwrite all fields of an active customer, re-encrypting and
    /// re-hashing; a hash collision on update is never auto-reconciled
    pub fn update(&self, customer_id: i64, draft: &CustomerDraft) -> Result<()> {
        let hash = Self::hash_resident_id(&draft.resident_id);
        let result = self.db.conn().execute(
            "UPDATE customers SET
                name = ?1, rrn_encrypted = ?2, rrn_hash = ?3, phone = ?4,
                address = ?5, job = ?6, payment_card_encrypted = ?7,
                payment_account_encrypted = ?8, payout_account_encrypted = ?9,
                medical_history = ?10, note = ?11, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?12 AND deleted_at IS NULL",
            params![
                draft.name,
                self.cipher.encrypt(&draft.resident_id)?,
                hash,
                draft.phone,
                draft.address,
                draft.job,
                self.cipher.encrypt(&draft.payment_card)?,
                self.cipher.encrypt(&draft.payment_account)?,
                self.cipher.encrypt(&draft.payout_account)?,
                draft.medical_history,
                draft.note,
                customer_id,
            ],
        );

        match result {
            Ok(0) => Err(Error::NotFound("customer")),
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(Error::DuplicateResidentId),
            Err(err) => Err(err.into()),
        }
    }

    /// Soft-delete a customer with no active insurances
    ///
    /// Sets the deleted timestamp and the tombstone hash in one statement
    /// so the canonical hash is immediately reusable.
    pub fn soft_delete(&self, customer_id: i64) -> Result<()> {
        let conn = self.db.conn();
        let has_active_insurance: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM insurances \
                 WHERE customer_id = ?1 AND deleted_at IS NULL LIMIT 1",
                params![customer_id],
                |row| row.get(0),
            )
            .optional()?;
        if has_active_insurance.is_some() {
            return Err(Error::ActiveDependencyExists);
        }

        let affected = conn.execute(
            "UPDATE customers SET
                deleted_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP,
                rrn_hash = rrn_hash || ':deleted:' || id
             WHERE id = ?1 AND deleted_at IS NULL",
            params![customer_id],
        )?;
        if affected == 0 {
            return Err(Error::NotFound("customer"));
        }
        Ok(())
    }

    /// Restore a soft-deleted customer under its canonical hash
    ///
    /// Check-then-act over auto-committed statements: a concurrent
    /// restore/create racing on the same freed hash can slip past the
    /// conflict check. Accepted for single-operator desktop use.
    pub fn restore(&self, customer_id: i64) -> Result<()> {
        let conn = self.db.conn();
        let encrypted: Option<Vec<u8>> = conn
            .query_row(
                "SELECT rrn_encrypted FROM customers \
                 WHERE id = ?1 AND deleted_at IS NOT NULL",
                params![customer_id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(encrypted) = encrypted else {
            return Err(Error::NotFound("customer"));
        };

        let resident_id = self.cipher.decrypt(&encrypted)?;
        let canonical = Self::hash_resident_id(&resident_id);

        let conflict: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM customers \
                 WHERE rrn_hash = ?1 AND deleted_at IS NULL AND id != ?2 LIMIT 1",
                params![canonical, customer_id],
                |row| row.get(0),
            )
            .optional()?;
        if conflict.is_some() {
            return Err(Error::RestoreConflict);
        }

        conn.execute(
            "UPDATE customers SET
                deleted_at = NULL,
                rrn_hash = ?1,
                updated_at = CURRENT_TIMESTAMP
             WHERE id = ?2",
            params![canonical, customer_id],
        )?;
        Ok(())
    }

    /// Remove a customer and all of its insurances, irreversibly
    ///
    /// Operator purge path: bypasses the active-dependency guard and the
    /// soft-delete machinery on purpose.
    pub fn hard_delete(&self, customer_id: i64) -> Result<()> {
        let conn = self.db.conn();
        conn.execute(
            "DELETE FROM insurances WHERE customer_id = ?1",
            params![customer_id],
        )?;
        let affected = conn.execute("DELETE FROM customers WHERE id = ?1", params![customer_id])?;
        if affected == 0 {
            return Err(Error::NotFound("customer"));
        }
        Ok(())
    }

    /// True when an active customer with this id exists
    pub fn exists_active(&self, customer_id: i64) -> Result<bool> {
        let row: Option<i64> = self
            .db
            .conn()
            .query_row(
                "SELECT 1 FROM customers WHERE id = ?1 AND deleted_at IS NULL LIMIT 1",
                params![customer_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }

    /// The id the next created customer will receive (UI defaults)
    pub fn next_id(&self) -> Result<i64> {
        let max: i64 = self.db.conn().query_row(
            "SELECT COALESCE(MAX(id), 0) FROM customers",
            [],
            |row| row.get(0),
        )?;
        Ok(max + 1)
    }

    /// Decrypt a stored sensitive column
    pub fn decrypt_field(&self, blob: &[u8]) -> Result<String> {
        self.cipher.decrypt(blob)
    }
}

fn row_to_customer(row: &Row<'_>) -> rusqlite::Result<CustomerRow> {
    Ok(CustomerRow {
        id: row.get(0)?,
        name: row.get(1)?,
        rrn_encrypted: row.get(2)?,
        phone: row.get(3)?,
        address: row.get(4)?,
        job: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
        payment_card_encrypted: row.get(6)?,
        payment_account_encrypted: row.get(7)?,
        payout_account_encrypted: row.get(8)?,
        medical_history: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
        note: row.get::<_, Option<String>>(10)?.unwrap_or_default(),
    })
}
