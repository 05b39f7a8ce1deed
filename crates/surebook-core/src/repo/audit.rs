//! Audit log repository
//!
//! Append-only trail of every create/read/update/delete. A failed audit
//! write fails the surrounding operation; the trail is a compliance
//! requirement, not best-effort logging.

use rusqlite::{params, params_from_iter, types::Value};
use std::sync::Arc;
use tracing::info;

use crate::db::Database;
use crate::domain::{AuditAction, AuditEntry, AuditFilter};
use crate::error::{Error, Result};

/// Default page size for audit listing
const DEFAULT_LIMIT: u32 = 100;

#[derive(Clone)]
pub struct AuditRepository {
    db: Arc<Database>,
}

impl AuditRepository {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Insert one audit row; `created_at` defaults to the current time
    pub fn append(
        &self,
        action: AuditAction,
        entity: &str,
        entity_id: Option<i64>,
        detail: &str,
    ) -> Result<()> {
        self.db.conn().execute(
            "INSERT INTO audit_logs (action, entity, entity_id, detail) VALUES (?1, ?2, ?3, ?4)",
            params![action.as_str(), entity, entity_id, detail],
        )?;
        Ok(())
    }

    /// Delete rows older than the retention window; returns removed count
    pub fn prune(&self, retention_days: u32) -> Result<usize> {
        let removed = self.db.conn().execute(
            "DELETE FROM audit_logs WHERE created_at < datetime('now', ?1)",
            params![format!("-{} days", retention_days)],
        )?;
        if removed > 0 {
            info!(removed, retention_days, "pruned audit logs");
        }
        Ok(removed)
    }

    /// Delete every row and reset the identity sequence
    ///
    /// Destructive; callers gate this behind an explicit operator action.
    pub fn purge_all(&self) -> Result<usize> {
        let conn = self.db.conn();
        let removed = conn.execute("DELETE FROM audit_logs", [])?;
        // sqlite_sequence only exists once an AUTOINCREMENT insert happened
        if let Err(err) =
            conn.execute("DELETE FROM sqlite_sequence WHERE name = 'audit_logs'", [])
        {
            if !err.to_string().contains("no such table") {
                return Err(err.into());
            }
        }
        Ok(removed)
    }

    /// List entries newest-first with optional filters
    ///
    /// `keyword` substring-matches the detail column; date bounds are
    /// inclusive on the calendar date.
    pub fn list(&self, filter: &AuditFilter) -> Result<Vec<AuditEntry>> {
        let mut sql = String::from(
            "SELECT id, action, entity, entity_id, detail, created_at \
             FROM audit_logs WHERE 1=1",
        );
        let mut args: Vec<Value> = Vec::new();

        if let Some(action) = filter.action {
            sql.push_str(&format!(" AND action = ?{}", args.len() + 1));
            args.push(Value::Text(action.as_str().to_string()));
        }
        if let Some(entity) = &filter.entity {
            sql.push_str(&format!(" AND entity = ?{}", args.len() + 1));
            args.push(Value::Text(entity.clone()));
        }
        if let Some(keyword) = &filter.keyword {
            sql.push_str(&format!(" AND detail LIKE ?{}", args.len() + 1));
            args.push(Value::Text(format!("%{}%", keyword)));
        }
        if let Some(from) = filter.date_from {
            sql.push_str(&format!(" AND date(created_at) >= ?{}", args.len() + 1));
            args.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = filter.date_to {
            sql.push_str(&format!(" AND date(created_at) <= ?{}", args.len() + 1));
            args.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }

        sql.push_str(&format!(
            " ORDER BY id DESC LIMIT ?{} OFFSET ?{}",
            args.len() + 1,
            args.len() + 2
        ));
        args.push(Value::Integer(
            i64::from(filter.limit.unwrap_or(DEFAULT_LIMIT)),
        ));
        args.push(Value::Integer(i64::from(filter.offset)));

        let conn = self.db.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, action, entity, entity_id, detail, created_at) = row?;
            let action = AuditAction::parse(&action)
                .ok_or_else(|| Error::Config(format!("unknown audit action: {}", action)))?;
            entries.push(AuditEntry {
                id,
                action,
                entity,
                entity_id,
                detail,
                created_at,
            });
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> AuditRepository {
        let db = Database::open_in_memory().unwrap();
        db.initialize_schema().unwrap();
        AuditRepository::new(Arc::new(db))
    }

    fn seed(repo: &AuditRepository) {
        repo.append(AuditAction::Create, "customer", Some(1), "customer created")
            .unwrap();
        repo.append(AuditAction::Update, "customer", Some(1), "customer updated")
            .unwrap();
        repo.append(AuditAction::Read, "insurance", None, "insurance list customer_id=1")
            .unwrap();
        repo.append(AuditAction::Delete, "insurance", Some(7), "insurance soft-deleted")
            .unwrap();
    }

    #[test]
    fn test_list_is_newest_first() {
        let repo = repo();
        seed(&repo);
        let entries = repo.list(&AuditFilter::default()).unwrap();
        assert_eq!(entries.len(), 4);
        assert!(entries.windows(2).all(|w| w[0].id > w[1].id));
    }

    #[test]
    fn test_list_filters() {
        let repo = repo();
        seed(&repo);

        let by_action = repo
            .list(&AuditFilter {
                action: Some(AuditAction::Create),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_action.len(), 1);
        assert_eq!(by_action[0].entity_id, Some(1));

        let by_entity = repo
            .list(&AuditFilter {
                entity: Some("insurance".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_entity.len(), 2);

        let by_keyword = repo
            .list(&AuditFilter {
                keyword: Some("soft-deleted".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(by_keyword.len(), 1);
        assert_eq!(by_keyword[0].action, AuditAction::Delete);
    }

    #[test]
    fn test_list_date_bounds_are_inclusive() {
        let repo = repo();
        seed(&repo);
        let today = chrono::Utc::now().date_naive();

        let within = repo
            .list(&AuditFilter {
                date_from: Some(today),
                date_to: Some(today),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(within.len(), 4);

        let future = repo
            .list(&AuditFilter {
                date_from: Some(today + chrono::Days::new(1)),
                ..Default::default()
            })
            .unwrap();
        assert!(future.is_empty());
    }

    #[test]
    fn test_limit_and_offset() {
        let repo = repo();
        seed(&repo);
        let page = repo
            .list(&AuditFilter {
                limit: Some(2),
                offset: 1,
                ..Default::default()
            })
            .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].id, 3);
    }

    #[test]
    fn test_prune_retention() {
        let repo = repo();
        seed(&repo);
        // Backdate two rows beyond a 30-day window
        repo.db
            .conn()
            .execute(
                "UPDATE audit_logs SET created_at = datetime('now', '-40 days') WHERE id <= 2",
                [],
            )
            .unwrap();

        assert_eq!(repo.prune(30).unwrap(), 2);
        assert_eq!(repo.list(&AuditFilter::default()).unwrap().len(), 2);
        assert_eq!(repo.prune(30).unwrap(), 0);
    }

    #[test]
    fn test_purge_all_resets_sequence() {
        let repo = repo();
        seed(&repo);
        assert_eq!(repo.purge_all().unwrap(), 4);
        assert!(repo.list(&AuditFilter::default()).unwrap().is_empty());

        repo.append(AuditAction::Create, "customer", Some(9), "after purge")
            .unwrap();
        let entries = repo.list(&AuditFilter::default()).unwrap();
        assert_eq!(entries[0].id, 1);
    }
}
