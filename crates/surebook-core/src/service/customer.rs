//! Customer service with validation, masking, and audit logs

use tracing::debug;

use crate::crypto::{mask_account, mask_resident_id};
use crate::domain::{AuditAction, CustomerDraft, CustomerRow, CustomerSearchField, CustomerView};
use crate::error::{Error, Result};
use crate::repo::{AuditRepository, CustomerRepository};
use crate::service::{snapshot_after, snapshot_before, snapshot_diff};
use crate::validate;

const ENTITY: &str = "customer";

/// Coordinates customer use cases
#[derive(Clone)]
pub struct CustomerService {
    customers: CustomerRepository,
    audit: AuditRepository,
}

impl CustomerService {
    pub fn new(customers: CustomerRepository, audit: AuditRepository) -> Self {
        Self { customers, audit }
    }

    fn validate(draft: &CustomerDraft) -> Result<CustomerDraft> {
        Ok(CustomerDraft {
            name: validate::required_text(&draft.name, "name")?,
            resident_id: validate::resident_id(&draft.resident_id)?,
            phone: validate::phone(&draft.phone)?,
            address: validate::required_text(&draft.address, "address")?,
            job: draft.job.trim().to_string(),
            payment_card: validate::optional_number(&draft.payment_card, "card number", 12, 19)?,
            payment_account: validate::optional_number(
                &draft.payment_account,
                "payment account",
                8,
                20,
            )?,
            payout_account: validate::optional_number(
                &draft.payout_account,
                "payout account",
                8,
                20,
            )?,
            medical_history: draft.medical_history.trim().to_string(),
            note: draft.note.trim().to_string(),
        })
    }

    fn masked_view(&self, row: &CustomerRow) -> Result<CustomerView> {
        let mut view = self.revealed_view(row)?;
        view.resident_id = mask_resident_id(&view.resident_id);
        view.payment_card = mask_account(&view.payment_card);
        view.payment_account = mask_account(&view.payment_account);
        view.payout_account = mask_account(&view.payout_account);
        Ok(view)
    }

    fn revealed_view(&self, row: &CustomerRow) -> Result<CustomerView> {
        Ok(CustomerView {
            id: row.id,
            name: row.name.clone(),
            resident_id: self.customers.decrypt_field(&row.rrn_encrypted)?,
            phone: row.phone.clone(),
            address: row.address.clone(),
            job: row.job.clone(),
            payment_card: self.customers.decrypt_field(&row.payment_card_encrypted)?,
            payment_account: self
                .customers
                .decrypt_field(&row.payment_account_encrypted)?,
            payout_account: self.customers.decrypt_field(&row.payout_account_encrypted)?,
            medical_history: row.medical_history.clone(),
            note: row.note.clone(),
        })
    }

    fn masked_snapshot(&self, customer_id: i64) -> Result<CustomerView> {
        let row = self
            .customers
            .get(customer_id)?
            .ok_or(Error::NotFound("customer"))?;
        self.masked_view(&row)
    }

    /// The id the next created customer will receive (UI defaults)
    pub fn next_customer_id(&self) -> Result<i64> {
        self.customers.next_id()
    }

    /// Validate, persist, and audit customer creation
    pub fn create_customer(&self, draft: &CustomerDraft) -> Result<i64> {
        let normalized = Self::validate(draft)?;
        let customer_id = self.customers.create(&normalized)?;
        let after = self.masked_snapshot(customer_id)?;
        self.audit.append(
            AuditAction::Create,
            ENTITY,
            Some(customer_id),
            &snapshot_after(&after)?,
        )?;
        debug!(customer_id, "customer created");
        Ok(customer_id)
    }

    /// Fetch one customer with masked or decrypted sensitive fields
    ///
    /// Reading decrypted data is itself auditable, so both variants write
    /// a READ entry.
    pub fn get_customer(&self, customer_id: i64, reveal_sensitive: bool) -> Result<CustomerView> {
        let row = self
            .customers
            .get(customer_id)?
            .ok_or(Error::NotFound("customer"))?;
        let view = if reveal_sensitive {
            self.revealed_view(&row)?
        } else {
            self.masked_view(&row)?
        };

        let detail = if reveal_sensitive {
            "customer read (sensitive revealed)"
        } else {
            "customer read"
        };
        self.audit
            .append(AuditAction::Read, ENTITY, Some(customer_id), detail)?;
        Ok(view)
    }

    /// List customers with masked sensitive fields for safe display
    pub fn list_customers(&self, limit: u32, offset: u32) -> Result<Vec<CustomerView>> {
        let rows = self.customers.list(limit, offset)?;
        let views = rows
            .iter()
            .map(|row| self.masked_view(row))
            .collect::<Result<Vec<_>>>()?;
        self.audit.append(
            AuditAction::Read,
            ENTITY,
            None,
            &format!("customer list limit={limit} offset={offset}"),
        )?;
        Ok(views)
    }

    /// Search customers on one allow-listed field, masked
    pub fn search_customers(
        &self,
        field: CustomerSearchField,
        keyword: &str,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<CustomerView>> {
        let rows = self.customers.search(field, keyword, limit, offset)?;
        let views = rows
            .iter()
            .map(|row| self.masked_view(row))
            .collect::<Result<Vec<_>>>()?;
        self.audit.append(
            AuditAction::Read,
            ENTITY,
            None,
            &format!("customer search field={field} keyword={keyword}"),
        )?;
        Ok(views)
    }

    /// Update a customer and audit the field-level diff
    ///
    /// The diff compares masked snapshots, so a sensitive change whose
    /// masked form is identical does not appear; this under-reporting is
    /// part of the audit contract, not an oversight to fix here.
    pub fn update_customer(&self, customer_id: i64, draft: &CustomerDraft) -> Result<()> {
        let before = self.masked_snapshot(customer_id)?;
        let normalized = Self::validate(draft)?;
        self.customers.update(customer_id, &normalized)?;
        let after = self.masked_snapshot(customer_id)?;
        self.audit.append(
            AuditAction::Update,
            ENTITY,
            Some(customer_id),
            &snapshot_diff(&before, &after)?,
        )?;
        Ok(())
    }

    /// Soft-delete a customer and audit its masked final state
    pub fn delete_customer(&self, customer_id: i64) -> Result<()> {
        let before = self.masked_snapshot(customer_id)?;
        self.customers.soft_delete(customer_id)?;
        self.audit.append(
            AuditAction::Delete,
            ENTITY,
            Some(customer_id),
            &snapshot_before(&before)?,
        )?;
        Ok(())
    }

    /// Restore a soft-deleted customer under its canonical hash
    pub fn restore_customer(&self, customer_id: i64) -> Result<()> {
        self.customers.restore(customer_id)?;
        self.audit.append(
            AuditAction::Update,
            ENTITY,
            Some(customer_id),
            "customer restored",
        )?;
        Ok(())
    }

    /// Irreversibly purge a customer and its insurances
    pub fn hard_delete_customer(&self, customer_id: i64) -> Result<()> {
        self.customers.hard_delete(customer_id)?;
        self.audit.append(
            AuditAction::Delete,
            ENTITY,
            Some(customer_id),
            "customer purged (hard delete)",
        )?;
        Ok(())
    }
}
