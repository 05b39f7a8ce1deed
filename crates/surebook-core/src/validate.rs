//! Input validation rules for customer and insurance records
//!
//! Every rule is a pure function returning a typed result; the CSV import
//! service matches on these per row instead of aborting the whole file.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Checksum weights for the 13-digit resident registration number
const RESIDENT_ID_WEIGHTS: [u32; 12] = [2, 3, 4, 5, 6, 7, 8, 9, 2, 3, 4, 5];

/// Upper bound for a monthly premium amount
const PREMIUM_MAX: u64 = 1_000_000_000;

/// Field-specific validation failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Resident id must be 13 digits")]
    ResidentIdFormat,

    #[error("Resident id checksum is invalid")]
    ResidentIdChecksum,

    #[error("Phone number must match 010-1234-5678")]
    PhoneFormat,

    #[error("Premium must be a positive amount")]
    PremiumNotPositive,

    #[error("Premium exceeds the upper bound (1,000,000,000)")]
    PremiumTooLarge,

    #[error("Premium must be a decimal number")]
    PremiumFormat,

    #[error("Contract date must not be in the future")]
    ContractDateInFuture,

    #[error("Contract date must be an ISO date (YYYY-MM-DD)")]
    ContractDateFormat,

    #[error("Payment day must be between 1 and 31")]
    PaymentDayRange,

    #[error("Customer id must be a positive number")]
    CustomerIdFormat,

    #[error("{field} is required")]
    RequiredText { field: &'static str },

    #[error("{field} must be {min}-{max} digits")]
    NumberLength {
        field: &'static str,
        min: usize,
        max: usize,
    },
}

/// Validate a resident registration number and return the normalized
/// 13-digit form (dashes stripped)
pub fn resident_id(raw: &str) -> Result<String, ValidationError> {
    let digits: String = raw.chars().filter(|c| *c != '-').collect();
    if digits.len() != 13 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::ResidentIdFormat);
    }

    let values: Vec<u32> = digits.chars().filter_map(|c| c.to_digit(10)).collect();
    let total: u32 = values
        .iter()
        .zip(RESIDENT_ID_WEIGHTS.iter())
        .map(|(d, w)| d * w)
        .sum();
    let check = (11 - (total % 11)) % 10;
    if check != values[12] {
        return Err(ValidationError::ResidentIdChecksum);
    }

    Ok(digits)
}

/// Validate mobile number format: 010-####-####
pub fn phone(raw: &str) -> Result<String, ValidationError> {
    let value = raw.trim();
    let bytes = value.as_bytes();
    let well_formed = bytes.len() == 13
        && value.starts_with("010-")
        && bytes[8] == b'-'
        && bytes[4..8].iter().all(|b| b.is_ascii_digit())
        && bytes[9..13].iter().all(|b| b.is_ascii_digit());
    if !well_formed {
        return Err(ValidationError::PhoneFormat);
    }
    Ok(value.to_string())
}

/// Validate a premium amount: positive, capped at one billion
pub fn premium(value: Decimal) -> Result<Decimal, ValidationError> {
    if value <= Decimal::ZERO {
        return Err(ValidationError::PremiumNotPositive);
    }
    if value > Decimal::from(PREMIUM_MAX) {
        return Err(ValidationError::PremiumTooLarge);
    }
    Ok(value)
}

/// Parse and validate a premium from its decimal-string form
pub fn premium_str(raw: &str) -> Result<Decimal, ValidationError> {
    let parsed: Decimal = raw
        .trim()
        .parse()
        .map_err(|_| ValidationError::PremiumFormat)?;
    premium(parsed)
}

/// Disallow future contract dates
pub fn contract_date(value: NaiveDate) -> Result<NaiveDate, ValidationError> {
    if value > Utc::now().date_naive() {
        return Err(ValidationError::ContractDateInFuture);
    }
    Ok(value)
}

/// Parse and validate an ISO `YYYY-MM-DD` contract date
pub fn contract_date_str(raw: &str) -> Result<NaiveDate, ValidationError> {
    let parsed = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ValidationError::ContractDateFormat)?;
    contract_date(parsed)
}

/// Validate the monthly payment day range
pub fn payment_day(day: u8) -> Result<u8, ValidationError> {
    if !(1..=31).contains(&day) {
        return Err(ValidationError::PaymentDayRange);
    }
    Ok(day)
}

/// Require non-empty text and return it trimmed
pub fn required_text(raw: &str, field: &'static str) -> Result<String, ValidationError> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(ValidationError::RequiredText { field });
    }
    Ok(value.to_string())
}

/// Optional digits-only field with length bounds; empty input is allowed
pub fn optional_number(
    raw: &str,
    field: &'static str,
    min: usize,
    max: usize,
) -> Result<String, ValidationError> {
    let value: String = raw.chars().filter(|c| !c.is_whitespace() && *c != '-').collect();
    if value.is_empty() {
        return Ok(value);
    }
    if !value.chars().all(|c| c.is_ascii_digit()) || value.len() < min || value.len() > max {
        return Err(ValidationError::NumberLength { field, min, max });
    }
    Ok(value)
}
