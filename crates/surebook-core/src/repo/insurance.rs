//! Insurance repository
//!
//! Plain CRUD with soft-delete; no hash machinery and no restore. The
//! premium is stored as a decimal string to avoid binary-float precision
//! loss, the contract date as an ISO date string.

use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use crate::db::Database;
use crate::domain::{InsuranceDraft, InsuranceRow, InsuranceSearchField};
use crate::error::{Error, Result};
use crate::repo::is_unique_violation;

const SELECT_COLUMNS: &str = "id, customer_id, contract_date, company, policy_number, \
     product_name, premium, insured_person, payment_day, beneficiary";

#[derive(Clone)]
pub struct InsuranceRepository {
    db: Arc<Database>,
}

impl InsuranceRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert an insurance contract and return the new id
    pub fn create(&self, draft: &InsuranceDraft) -> Result<i64> {
        let conn = self.db.conn();
        let result = conn.execute(
            "INSERT INTO insurances (
                customer_id, contract_date, company, policy_number,
                product_name, premium, insured_person, payment_day, beneficiary
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                draft.customer_id,
                draft.contract_date.format("%Y-%m-%d").to_string(),
                draft.company,
                draft.policy_number,
                draft.product_name,
                draft.premium.to_string(),
                draft.insured_person,
                i64::from(draft.payment_day),
                draft.beneficiary,
            ],
        );
        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(err) if is_unique_violation(&err) => Err(Error::DuplicatePolicyNumber),
            Err(err) => Err(err.into()),
        }
    }

    /// Fetch one active insurance
    pub fn get(&self, insurance_id: i64) -> Result<Option<InsuranceRow>> {
        let row = self
            .db
            .conn()
            .query_row(
                &format!(
                    "SELECT {SELECT_COLUMNS} FROM insurances \
                     WHERE id = ?1 AND deleted_at IS NULL"
                ),
                params![insurance_id],
                row_to_insurance,
            )
            .optional()?;
        Ok(row)
    }

    /// Active insurances for one customer, newest-first, paginated
    pub fn list_for_customer(
        &self,
        customer_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<InsuranceRow>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM insurances \
             WHERE customer_id = ?1 AND deleted_at IS NULL \
             ORDER BY id DESC LIMIT ?2 OFFSET ?3"
        ))?;
        let rows = stmt.query_map(params![customer_id, limit, offset], row_to_insurance)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Search active insurances on one allow-listed column
    pub fn search(
        &self,
        field: InsuranceSearchField,
        keyword: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<InsuranceRow>> {
        let conn = self.db.conn();
        if matches!(
            field,
            InsuranceSearchField::Id | InsuranceSearchField::CustomerId
        ) {
            let Ok(id) = keyword.trim().parse::<i64>() else {
                return Ok(Vec::new());
            };
            let mut stmt = conn.prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM insurances \
                 WHERE deleted_at IS NULL AND {} = ?1 \
                 ORDER BY id DESC LIMIT ?2 OFFSET ?3",
                field.column()
            ))?;
            let rows = stmt.query_map(params![id, limit, offset], row_to_insurance)?;
            return Ok(rows.collect::<rusqlite::Result<_>>()?);
        }

        let mut stmt = conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM insurances \
             WHERE deleted_at IS NULL AND {} LIKE ?1 \
             ORDER BY id DESC LIMIT ?2 OFFSET ?3",
            field.column()
        ))?;
        let pattern = format!("%{}%", keyword);
        let rows = stmt.query_map(params![pattern, limit, offset], row_to_insurance)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    /// Overwrite all fields of an active insurance
    pub fn update(&self, insurance_id: i64, draft: &InsuranceDraft) -> Result<()> {
        let result = self.db.conn().execute(
            "UPDATE insurances SET
                customer_id = ?1, contract_date = ?2, company = ?3,
                policy_number = ?4, product_name = ?5, premium = ?6,
                insured_person = ?7, payment_day = ?8, beneficiary = ?9,
                updated_at = CURRENT_TIMESTAMP
             WHERE id = ?10 AND deleted_at IS NULL",
            params![
                draft.customer_id,
                draft.contract_date.format("%Y-%m-%d").to_string(),
                draft.company,
                draft.policy_number,
                draft.product_name,
                draft.premium.to_string(),
                draft.insured_person,
                i64::from(draft.payment_day),
                draft.beneficiary,
                insurance_id,
            ],
        );
        match result {
            Ok(0) => Err(Error::NotFound("insurance")),
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => Err(Error::DuplicatePolicyNumber),
            Err(err) => Err(err.into()),
        }
    }

    /// Soft-delete an active insurance
    pub fn soft_delete(&self, insurance_id: i64) -> Result<()> {
        let affected = self.db.conn().execute(
            "UPDATE insurances SET
                deleted_at = CURRENT_TIMESTAMP,
                updated_at = CURRENT_TIMESTAMP
             WHERE id = ?1 AND deleted_at IS NULL",
            params![insurance_id],
        )?;
        if affected == 0 {
            return Err(Error::NotFound("insurance"));
        }
        Ok(())
    }

    /// Remove an insurance row irreversibly (operator purge path)
    pub fn hard_delete(&self, insurance_id: i64) -> Result<()> {
        let affected = self
            .db
            .conn()
            .execute("DELETE FROM insurances WHERE id = ?1", params![insurance_id])?;
        if affected == 0 {
            return Err(Error::NotFound("insurance"));
        }
        Ok(())
    }

    /// True when the customer has any active insurance
    pub fn has_active_for_customer(&self, customer_id: i64) -> Result<bool> {
        let row: Option<i64> = self
            .db
            .conn()
            .query_row(
                "SELECT 1 FROM insurances \
                 WHERE customer_id = ?1 AND deleted_at IS NULL LIMIT 1",
                params![customer_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(row.is_some())
    }
}

fn row_to_insurance(row: &Row<'_>) -> rusqlite::Result<InsuranceRow> {
    Ok(InsuranceRow {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        contract_date: row.get(2)?,
        company: row.get(3)?,
        policy_number: row.get(4)?,
        product_name: row.get(5)?,
        premium: row.get(6)?,
        insured_person: row.get(7)?,
        payment_day: row.get(8)?,
        beneficiary: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn repos() -> (InsuranceRepository, Arc<Database>) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.initialize_schema().unwrap();
        // Seed one customer so the foreign key holds
        db.conn()
            .execute(
                "INSERT INTO customers (name, rrn_encrypted, rrn_hash, phone, address) \
                 VALUES ('Kim', x'00', 'h', '010-1234-5678', 'Seoul')",
                [],
            )
            .unwrap();
        (InsuranceRepository::new(db.clone()), db)
    }

    fn draft(policy: &str) -> InsuranceDraft {
        InsuranceDraft {
            customer_id: 1,
            contract_date: NaiveDate::from_ymd_opt(2020, 6, 15).unwrap(),
            company: "Hanwha".to_string(),
            policy_number: policy.to_string(),
            product_name: "Cancer cover".to_string(),
            premium: Decimal::new(3500050, 2),
            insured_person: "Kim".to_string(),
            payment_day: 25,
            beneficiary: "Kim".to_string(),
        }
    }

    #[test]
    fn test_premium_round_trips_as_decimal_string() {
        let (repo, _db) = repos();
        let id = repo.create(&draft("POL-1")).unwrap();
        let row = repo.get(id).unwrap().unwrap();
        assert_eq!(row.premium, "35000.50");
        assert_eq!(row.contract_date, "2020-06-15");
    }

    #[test]
    fn test_policy_number_is_globally_unique() {
        let (repo, _db) = repos();
        repo.create(&draft("POL-1")).unwrap();
        assert!(matches!(
            repo.create(&draft("POL-1")),
            Err(Error::DuplicatePolicyNumber)
        ));
    }

    #[test]
    fn test_foreign_key_violation_is_not_a_duplicate() {
        let (repo, _db) = repos();
        let mut orphan = draft("POL-1");
        orphan.customer_id = 999;
        assert!(matches!(repo.create(&orphan), Err(Error::Database(_))));
    }

    #[test]
    fn test_soft_delete_and_not_found() {
        let (repo, _db) = repos();
        let id = repo.create(&draft("POL-1")).unwrap();
        repo.soft_delete(id).unwrap();
        assert!(repo.get(id).unwrap().is_none());
        assert!(matches!(repo.soft_delete(id), Err(Error::NotFound(_))));
        assert!(matches!(
            repo.update(id, &draft("POL-2")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_list_for_customer_paginates() {
        let (repo, _db) = repos();
        for i in 0..5 {
            repo.create(&draft(&format!("POL-{i}"))).unwrap();
        }
        let page = repo.list_for_customer(1, 2, 1).unwrap();
        assert_eq!(page.len(), 2);
        assert!(page[0].id > page[1].id);
    }

    #[test]
    fn test_search_allow_listed_fields() {
        let (repo, _db) = repos();
        repo.create(&draft("POL-ABC")).unwrap();

        let by_policy = repo
            .search(InsuranceSearchField::PolicyNumber, "ABC", 10, 0)
            .unwrap();
        assert_eq!(by_policy.len(), 1);

        let by_customer = repo
            .search(InsuranceSearchField::CustomerId, "1", 10, 0)
            .unwrap();
        assert_eq!(by_customer.len(), 1);

        let bogus = repo
            .search(InsuranceSearchField::Id, "abc", 10, 0)
            .unwrap();
        assert!(bogus.is_empty());
    }

    #[test]
    fn test_has_active_for_customer() {
        let (repo, _db) = repos();
        assert!(!repo.has_active_for_customer(1).unwrap());
        let id = repo.create(&draft("POL-1")).unwrap();
        assert!(repo.has_active_for_customer(1).unwrap());
        repo.soft_delete(id).unwrap();
        assert!(!repo.has_active_for_customer(1).unwrap());
    }
}
