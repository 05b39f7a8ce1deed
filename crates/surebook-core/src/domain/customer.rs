//! Customer domain models

use serde::Serialize;

/// Input model for creating or updating a customer (contractor)
///
/// Sensitive fields arrive as plaintext here and only ever leave the
/// repository encrypted; drafts are short-lived call arguments.
#[derive(Debug, Clone, Default)]
pub struct CustomerDraft {
    pub name: String,
    pub resident_id: String,
    pub phone: String,
    pub address: String,
    pub job: String,
    pub payment_card: String,
    pub payment_account: String,
    pub payout_account: String,
    pub medical_history: String,
    pub note: String,
}

/// A customer row as stored, decoded at the repository boundary
///
/// Encrypted columns stay as blobs; decryption is an explicit step so
/// list paths can decide per field what to reveal.
#[derive(Debug, Clone)]
pub struct CustomerRow {
    pub id: i64,
    pub name: String,
    pub rrn_encrypted: Vec<u8>,
    pub phone: String,
    pub address: String,
    pub job: String,
    pub payment_card_encrypted: Vec<u8>,
    pub payment_account_encrypted: Vec<u8>,
    pub payout_account_encrypted: Vec<u8>,
    pub medical_history: String,
    pub note: String,
}

/// Output model for customer retrieval; sensitive fields are either
/// masked or revealed depending on the read path
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CustomerView {
    pub id: i64,
    pub name: String,
    pub resident_id: String,
    pub phone: String,
    pub address: String,
    pub job: String,
    pub payment_card: String,
    pub payment_account: String,
    pub payout_account: String,
    pub medical_history: String,
    pub note: String,
}

/// Searchable customer columns; anything else is rejected before it can
/// reach a query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CustomerSearchField {
    Id,
    Name,
    Phone,
    Address,
    Job,
}

impl CustomerSearchField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(Self::Id),
            "name" => Some(Self::Name),
            "phone" => Some(Self::Phone),
            "address" => Some(Self::Address),
            "job" => Some(Self::Job),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::Job => "job",
        }
    }
}

impl std::fmt::Display for CustomerSearchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_field_allow_list() {
        assert_eq!(CustomerSearchField::parse("phone"), Some(CustomerSearchField::Phone));
        assert_eq!(CustomerSearchField::parse("rrn_hash"), None);
        assert_eq!(CustomerSearchField::parse("1; DROP TABLE customers"), None);
    }
}
