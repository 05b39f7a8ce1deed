//! Per-worker service container
//!
//! Each worker thread builds its own container, and with it its own
//! SQLite connection; nothing here is shared across threads. Construction
//! runs the startup sequence in order: resolve keys, open the (keyed)
//! connection, ensure the schema, prune expired audit rows.

use std::sync::Arc;

use tracing::debug;

use crate::bootstrap::{Bootstrap, RuntimeKeys};
use crate::config::AppConfig;
use crate::crypto::FieldCipher;
use crate::db::Database;
use crate::error::Result;
use crate::repo::{AuditRepository, CustomerRepository, InsuranceRepository};
use crate::service::{CsvImportService, CustomerService, InsuranceService};

/// Wires repositories and services over one database connection
#[derive(Clone)]
pub struct ServiceContainer {
    pub customers: CustomerService,
    pub insurances: InsuranceService,
    pub csv_import: CsvImportService,
    pub audit: AuditRepository,
}

impl ServiceContainer {
    /// Build a container with default bootstrap and configuration
    pub fn build() -> Result<Self> {
        let config = AppConfig::load()?;
        Self::build_with(&Bootstrap::new(), &config)
    }

    /// Build a container from an explicit bootstrap context and config
    pub fn build_with(bootstrap: &Bootstrap, config: &AppConfig) -> Result<Self> {
        let keys = bootstrap.resolve(config)?;
        let db = Database::open(config, &keys)?;
        db.initialize_schema()?;

        let container = Self::wire(Arc::new(db), &keys);
        let pruned = container.audit.prune(config.audit.retention_days)?;
        debug!(pruned, "service container ready");
        Ok(container)
    }

    /// Build over an in-memory database with given keys (tests)
    pub fn build_in_memory(keys: &RuntimeKeys) -> Result<Self> {
        let db = Database::open_in_memory()?;
        db.initialize_schema()?;
        Ok(Self::wire(Arc::new(db), keys))
    }

    fn wire(db: Arc<Database>, keys: &RuntimeKeys) -> Self {
        let cipher = FieldCipher::new(&keys.record_key);
        let audit = AuditRepository::new(db.clone());
        let customer_repo = CustomerRepository::new(db.clone(), cipher);
        let insurance_repo = InsuranceRepository::new(db);

        let customers = CustomerService::new(customer_repo.clone(), audit.clone());
        let insurances =
            InsuranceService::new(insurance_repo, customer_repo, audit.clone());
        let csv_import = CsvImportService::new(customers.clone(), insurances.clone());

        Self {
            customers,
            insurances,
            csv_import,
            audit,
        }
    }
}
