//! Persistence layer
//!
//! Repositories decode rows into typed structs at this boundary and are
//! the only place SQL is built. Each repository method is one logical
//! unit of work over auto-committed statements.

pub mod audit;
pub mod customer;
pub mod insurance;

pub use audit::AuditRepository;
pub use customer::CustomerRepository;
pub use insurance::InsuranceRepository;

/// True when the error is SQLite reporting a UNIQUE constraint violation
///
/// Checks the extended result code: foreign-key and NOT NULL failures are
/// also `ConstraintViolation` at the primary-code level and must not be
/// mistaken for duplicates.
pub(crate) fn is_unique_violation(err: &rusqlite::Error) -> bool {
    err.sqlite_error().is_some_and(|e| {
        e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            || e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    })
}
