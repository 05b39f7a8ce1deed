//! Service layer
//!
//! Coordinates validation, masking-on-read, and the audit trail around
//! the repositories. Every mutation writes exactly one audit entry with a
//! structured before/after payload; reads are audited without field
//! values.

pub mod csv_import;
pub mod customer;
pub mod insurance;

pub use csv_import::{CsvImportResult, CsvImportService};
pub use customer::CustomerService;
pub use insurance::InsuranceService;

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::error::Result;

/// JSON object for the `after` state of a freshly created row
pub(crate) fn snapshot_after<T: Serialize>(view: &T) -> Result<String> {
    Ok(json!({ "after": serde_json::to_value(view)? }).to_string())
}

/// JSON object for the `before` state of a deleted row
pub(crate) fn snapshot_before<T: Serialize>(view: &T) -> Result<String> {
    Ok(json!({ "before": serde_json::to_value(view)? }).to_string())
}

/// Field-level diff of two view snapshots, keyed by field name
///
/// Only fields whose serialized (masked, where applicable) value changed
/// are included; two sensitive values that mask identically therefore do
/// not show up. The `id` field never diffs.
pub(crate) fn snapshot_diff<T: Serialize>(before: &T, after: &T) -> Result<String> {
    let before = serde_json::to_value(before)?;
    let after = serde_json::to_value(after)?;

    let mut changed = Map::new();
    if let (Value::Object(before), Value::Object(after)) = (&before, &after) {
        for (key, old) in before {
            if key == "id" {
                continue;
            }
            let new = after.get(key).cloned().unwrap_or(Value::Null);
            if *old != new {
                changed.insert(key.clone(), json!({ "from": old, "to": new }));
            }
        }
    }
    Ok(json!({ "changed": Value::Object(changed) }).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Sample {
        id: i64,
        name: String,
        phone: String,
    }

    #[test]
    fn test_diff_contains_only_changed_fields() {
        let before = Sample {
            id: 1,
            name: "Kim".into(),
            phone: "010-1234-5678".into(),
        };
        let after = Sample {
            id: 1,
            name: "Lee".into(),
            phone: "010-1234-5678".into(),
        };

        let diff: Value = serde_json::from_str(&snapshot_diff(&before, &after).unwrap()).unwrap();
        let changed = diff["changed"].as_object().unwrap();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed["name"]["from"], "Kim");
        assert_eq!(changed["name"]["to"], "Lee");
    }
}
