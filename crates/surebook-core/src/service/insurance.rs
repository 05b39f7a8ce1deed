//! Insurance service

use tracing::debug;

use crate::domain::{AuditAction, InsuranceDraft, InsuranceSearchField, InsuranceView};
use crate::error::{Error, Result};
use crate::repo::{AuditRepository, CustomerRepository, InsuranceRepository};
use crate::service::{snapshot_after, snapshot_before, snapshot_diff};
use crate::validate;

const ENTITY: &str = "insurance";

/// Coordinates insurance contract use cases
///
/// Holds the customer repository only to verify that a referenced
/// contractor exists and is active before a contract is written.
#[derive(Clone)]
pub struct InsuranceService {
    insurances: InsuranceRepository,
    customers: CustomerRepository,
    audit: AuditRepository,
}

impl InsuranceService {
    pub fn new(
        insurances: InsuranceRepository,
        customers: CustomerRepository,
        audit: AuditRepository,
    ) -> Self {
        Self {
            insurances,
            customers,
            audit,
        }
    }

    fn validate(&self, draft: &InsuranceDraft) -> Result<InsuranceDraft> {
        if draft.customer_id <= 0 {
            return Err(validate::ValidationError::CustomerIdFormat.into());
        }
        if !self.customers.exists_active(draft.customer_id)? {
            return Err(Error::NotFound("customer"));
        }
        Ok(InsuranceDraft {
            customer_id: draft.customer_id,
            contract_date: validate::contract_date(draft.contract_date)?,
            company: validate::required_text(&draft.company, "company")?,
            policy_number: validate::required_text(&draft.policy_number, "policy number")?,
            product_name: validate::required_text(&draft.product_name, "product name")?,
            premium: validate::premium(draft.premium)?,
            payment_day: validate::payment_day(draft.payment_day)?,
            insured_person: validate::required_text(&draft.insured_person, "insured person")?,
            beneficiary: validate::required_text(&draft.beneficiary, "beneficiary")?,
        })
    }

    fn snapshot(&self, insurance_id: i64) -> Result<InsuranceView> {
        let row = self
            .insurances
            .get(insurance_id)?
            .ok_or(Error::NotFound("insurance"))?;
        Ok(row.into())
    }

    /// Validate, persist, and audit a new insurance contract
    pub fn create_insurance(&self, draft: &InsuranceDraft) -> Result<i64> {
        let normalized = self.validate(draft)?;
        let insurance_id = self.insurances.create(&normalized)?;
        let after = self.snapshot(insurance_id)?;
        self.audit.append(
            AuditAction::Create,
            ENTITY,
            Some(insurance_id),
            &snapshot_after(&after)?,
        )?;
        debug!(insurance_id, customer_id = normalized.customer_id, "insurance created");
        Ok(insurance_id)
    }

    /// Fetch one insurance contract
    pub fn get_insurance(&self, insurance_id: i64) -> Result<InsuranceView> {
        let view = self.snapshot(insurance_id)?;
        self.audit
            .append(AuditAction::Read, ENTITY, Some(insurance_id), "insurance read")?;
        Ok(view)
    }

    /// Active contracts for one customer, newest-first, paginated
    pub fn list_for_customer(
        &self,
        customer_id: i64,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<InsuranceView>> {
        let rows = self.insurances.list_for_customer(customer_id, limit, offset)?;
        self.audit.append(
            AuditAction::Read,
            ENTITY,
            None,
            &format!("insurance list customer_id={customer_id} limit={limit} offset={offset}"),
        )?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Search contracts on one allow-listed field
    pub fn search_insurances(
        &self,
        field: InsuranceSearchField,
        keyword: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<InsuranceView>> {
        let rows = self.insurances.search(field, keyword, limit, offset)?;
        self.audit.append(
            AuditAction::Read,
            ENTITY,
            None,
            &format!("insurance search field={field} keyword={keyword}"),
        )?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Update a contract and audit the field-level diff
    pub fn update_insurance(&self, insurance_id: i64, draft: &InsuranceDraft) -> Result<()> {
        let before = self.snapshot(insurance_id)?;
        let normalized = self.validate(draft)?;
        self.insurances.update(insurance_id, &normalized)?;
        let after = self.snapshot(insurance_id)?;
        self.audit.append(
            AuditAction::Update,
            ENTITY,
            Some(insurance_id),
            &snapshot_diff(&before, &after)?,
        )?;
        Ok(())
    }

    /// Soft-delete a contract and audit its final state
    pub fn delete_insurance(&self, insurance_id: i64) -> Result<()> {
        let before = self.snapshot(insurance_id)?;
        self.insurances.soft_delete(insurance_id)?;
        self.audit.append(
            AuditAction::Delete,
            ENTITY,
            Some(insurance_id),
            &snapshot_before(&before)?,
        )?;
        Ok(())
    }

    /// Irreversibly purge one contract
    pub fn hard_delete_insurance(&self, insurance_id: i64) -> Result<()> {
        self.insurances.hard_delete(insurance_id)?;
        self.audit.append(
            AuditAction::Delete,
            ENTITY,
            Some(insurance_id),
            "insurance purged (hard delete)",
        )?;
        Ok(())
    }
}
