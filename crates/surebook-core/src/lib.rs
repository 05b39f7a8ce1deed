//! Surebook core
//!
//! Encrypted customer and insurance record keeping over SQLite.
//! Sensitive customer fields are AES-256-GCM encrypted at rest, resident
//! id uniqueness is enforced through a hash column with soft-delete
//! tombstones, and every operation leaves an audit trail.

pub mod bootstrap;
pub mod config;
pub mod container;
pub mod crypto;
pub mod db;
pub mod domain;
pub mod error;
pub mod repo;
pub mod service;
pub mod validate;

pub use bootstrap::{Bootstrap, RuntimeKeys, Secret};
pub use config::AppConfig;
pub use container::ServiceContainer;
pub use error::{Error, Result};
