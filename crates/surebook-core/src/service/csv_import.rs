//! CSV bulk import with per-row error recovery
//!
//! One bad row never aborts the file: the row's error is recorded with
//! its 1-based file position (the header is row 1) and the import moves
//! on. Only the first few errors are kept verbatim so a thoroughly
//! broken file does not produce an unbounded report.

use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::domain::{CustomerDraft, InsuranceDraft};
use crate::error::{Error, Result};
use crate::service::{CustomerService, InsuranceService};
use crate::validate;

/// Expected customer CSV header columns
pub const CUSTOMER_CSV_HEADERS: [&str; 10] = [
    "name",
    "resident_id",
    "phone",
    "address",
    "job",
    "payment_card",
    "payment_account",
    "payout_account",
    "medical_history",
    "note",
];

/// Expected insurance CSV header columns
pub const INSURANCE_CSV_HEADERS: [&str; 9] = [
    "customer_id",
    "contract_date",
    "company",
    "policy_number",
    "product_name",
    "premium",
    "insured_person",
    "payment_day",
    "beneficiary",
];

/// How many row errors are reported before the rest are only counted
const MAX_REPORTED_ERRORS: usize = 10;

/// Outcome of one import run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvImportResult {
    pub created: u32,
    pub failed: u32,
    pub errors: Vec<String>,
}

#[derive(Clone)]
pub struct CsvImportService {
    customers: CustomerService,
    insurances: InsuranceService,
}

impl CsvImportService {
    pub fn new(customers: CustomerService, insurances: InsuranceService) -> Self {
        Self {
            customers,
            insurances,
        }
    }

    /// Import customers from a CSV file
    pub fn import_customers_file(&self, path: &Path) -> Result<CsvImportResult> {
        let file = std::fs::File::open(path)?;
        self.import_customers(file)
    }

    /// Import insurances from a CSV file
    pub fn import_insurances_file(&self, path: &Path) -> Result<CsvImportResult> {
        let file = std::fs::File::open(path)?;
        self.import_insurances(file)
    }

    /// Import customers from any CSV source
    pub fn import_customers<R: Read>(&self, source: R) -> Result<CsvImportResult> {
        let mut reader = csv::Reader::from_reader(source);
        let header = HeaderMap::resolve(&mut reader, &CUSTOMER_CSV_HEADERS)?;

        let mut outcome = Outcome::default();
        for (index, record) in reader.records().enumerate() {
            let row = index + 2;
            let result = record
                .map_err(Error::from)
                .and_then(|record| self.create_customer_row(&header, &record));
            outcome.record(row, result);
        }
        info!(
            created = outcome.created,
            failed = outcome.failed,
            "customer import finished"
        );
        Ok(outcome.into_result())
    }

    /// Import insurances from any CSV source
    pub fn import_insurances<R: Read>(&self, source: R) -> Result<CsvImportResult> {
        let mut reader = csv::Reader::from_reader(source);
        let header = HeaderMap::resolve(&mut reader, &INSURANCE_CSV_HEADERS)?;

        let mut outcome = Outcome::default();
        for (index, record) in reader.records().enumerate() {
            let row = index + 2;
            let result = record
                .map_err(Error::from)
                .and_then(|record| self.create_insurance_row(&header, &record));
            outcome.record(row, result);
        }
        info!(
            created = outcome.created,
            failed = outcome.failed,
            "insurance import finished"
        );
        Ok(outcome.into_result())
    }

    fn create_customer_row(&self, header: &HeaderMap, record: &csv::StringRecord) -> Result<()> {
        let draft = CustomerDraft {
            name: header.field(record, "name"),
            resident_id: header.field(record, "resident_id"),
            phone: header.field(record, "phone"),
            address: header.field(record, "address"),
            job: header.field(record, "job"),
            payment_card: header.field(record, "payment_card"),
            payment_account: header.field(record, "payment_account"),
            payout_account: header.field(record, "payout_account"),
            medical_history: header.field(record, "medical_history"),
            note: header.field(record, "note"),
        };
        self.customers.create_customer(&draft)?;
        Ok(())
    }

    fn create_insurance_row(&self, header: &HeaderMap, record: &csv::StringRecord) -> Result<()> {
        let customer_id: i64 = header
            .field(record, "customer_id")
            .trim()
            .parse()
            .map_err(|_| validate::ValidationError::CustomerIdFormat)?;
        let payment_day: u8 = header
            .field(record, "payment_day")
            .trim()
            .parse()
            .map_err(|_| validate::ValidationError::PaymentDayRange)?;

        let draft = InsuranceDraft {
            customer_id,
            contract_date: validate::contract_date_str(&header.field(record, "contract_date"))?,
            company: header.field(record, "company"),
            policy_number: header.field(record, "policy_number"),
            product_name: header.field(record, "product_name"),
            premium: validate::premium_str(&header.field(record, "premium"))?,
            payment_day,
            insured_person: header.field(record, "insured_person"),
            beneficiary: header.field(record, "beneficiary"),
        };
        self.insurances.create_insurance(&draft)?;
        Ok(())
    }
}

/// Column name to index mapping, validated against the expected set
struct HeaderMap {
    positions: Vec<(String, usize)>,
}

impl HeaderMap {
    fn resolve<R: Read>(reader: &mut csv::Reader<R>, expected: &[&str]) -> Result<Self> {
        let headers = reader.headers()?.clone();
        let mut positions = Vec::with_capacity(expected.len());
        for name in expected {
            let Some(index) = headers.iter().position(|h| h.trim() == *name) else {
                return Err(Error::CsvHeader((*name).to_string()));
            };
            positions.push(((*name).to_string(), index));
        }
        Ok(Self { positions })
    }

    fn field(&self, record: &csv::StringRecord, name: &str) -> String {
        self.positions
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, index)| record.get(*index))
            .unwrap_or_default()
            .trim()
            .to_string()
    }
}

#[derive(Default)]
struct Outcome {
    created: u32,
    failed: u32,
    errors: Vec<String>,
}

impl Outcome {
    fn record(&mut self, row: usize, result: Result<()>) {
        match result {
            Ok(()) => self.created += 1,
            Err(err) => {
                self.failed += 1;
                if self.errors.len() < MAX_REPORTED_ERRORS {
                    self.errors.push(format!("row {row}: {err}"));
                }
            }
        }
    }

    fn into_result(self) -> CsvImportResult {
        CsvImportResult {
            created: self.created,
            failed: self.failed,
            errors: self.errors,
        }
    }
}
