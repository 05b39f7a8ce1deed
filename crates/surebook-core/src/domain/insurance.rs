//! Insurance domain models

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Input model for creating or updating an insurance contract
#[derive(Debug, Clone)]
pub struct InsuranceDraft {
    pub customer_id: i64,
    pub contract_date: NaiveDate,
    pub company: String,
    pub policy_number: String,
    pub product_name: String,
    pub premium: Decimal,
    pub payment_day: u8,
    pub insured_person: String,
    pub beneficiary: String,
}

/// An insurance row as stored; premium stays in its decimal-string form
#[derive(Debug, Clone)]
pub struct InsuranceRow {
    pub id: i64,
    pub customer_id: i64,
    pub contract_date: String,
    pub company: String,
    pub policy_number: String,
    pub product_name: String,
    pub premium: String,
    pub insured_person: String,
    pub payment_day: i64,
    pub beneficiary: String,
}

/// Output model for insurance retrieval
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct InsuranceView {
    pub id: i64,
    pub customer_id: i64,
    pub contract_date: String,
    pub company: String,
    pub policy_number: String,
    pub product_name: String,
    pub premium: String,
    pub insured_person: String,
    pub payment_day: i64,
    pub beneficiary: String,
}

impl From<InsuranceRow> for InsuranceView {
    fn from(row: InsuranceRow) -> Self {
        Self {
            id: row.id,
            customer_id: row.customer_id,
            contract_date: row.contract_date,
            company: row.company,
            policy_number: row.policy_number,
            product_name: row.product_name,
            premium: row.premium,
            insured_person: row.insured_person,
            payment_day: row.payment_day,
            beneficiary: row.beneficiary,
        }
    }
}

/// Searchable insurance columns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsuranceSearchField {
    Id,
    CustomerId,
    Company,
    PolicyNumber,
    ProductName,
    InsuredPerson,
    Beneficiary,
}

impl InsuranceSearchField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "id" => Some(Self::Id),
            "customer_id" => Some(Self::CustomerId),
            "company" => Some(Self::Company),
            "policy_number" => Some(Self::PolicyNumber),
            "product_name" => Some(Self::ProductName),
            "insured_person" => Some(Self::InsuredPerson),
            "beneficiary" => Some(Self::Beneficiary),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::CustomerId => "customer_id",
            Self::Company => "company",
            Self::PolicyNumber => "policy_number",
            Self::ProductName => "product_name",
            Self::InsuredPerson => "insured_person",
            Self::Beneficiary => "beneficiary",
        }
    }
}

impl std::fmt::Display for InsuranceSearchField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}
