//! Domain entities and value objects

pub mod audit;
pub mod customer;
pub mod insurance;

pub use audit::{AuditAction, AuditEntry, AuditFilter};
pub use customer::{CustomerDraft, CustomerRow, CustomerSearchField, CustomerView};
pub use insurance::{InsuranceDraft, InsuranceRow, InsuranceSearchField, InsuranceView};
