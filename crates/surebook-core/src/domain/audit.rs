//! Audit trail domain models

use chrono::NaiveDate;
use serde::Serialize;

/// The four auditable operation classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditAction {
    Create,
    Read,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "CREATE" => Some(Self::Create),
            "READ" => Some(Self::Read),
            "UPDATE" => Some(Self::Update),
            "DELETE" => Some(Self::Delete),
            _ => None,
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One appended audit row
///
/// `entity_id` is null for bulk operations (list, search, import
/// summaries); `detail` is free text or a JSON snapshot/diff.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub id: i64,
    pub action: AuditAction,
    pub entity: String,
    pub entity_id: Option<i64>,
    pub detail: Option<String>,
    pub created_at: String,
}

/// Filter for audit listing; dates are inclusive calendar bounds
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    pub limit: Option<u32>,
    pub offset: u32,
    pub action: Option<AuditAction>,
    pub entity: Option<String>,
    pub keyword: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_roundtrip() {
        for action in [
            AuditAction::Create,
            AuditAction::Read,
            AuditAction::Update,
            AuditAction::Delete,
        ] {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AuditAction::parse("RESTORE"), None);
    }
}
