//! Account/product record
//!
//! The persisted identifier is the concatenation of both natural-key fields
//! around a reserved delimiter. Re-inserting the same pair always targets the
//! same identifier, which is what duplicate detection relies on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Separator between account number and product code in the composite id.
pub const ID_DELIMITER: char = '|';

/// Maximum account number length after trimming (inclusive).
pub const ACCOUNT_NUMBER_MAX_LEN: usize = 15;

/// Maximum product code length after trimming (inclusive).
pub const PRODUCT_CODE_MAX_LEN: usize = 4;

/// Why a row could not be turned into a record
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("Row has fewer than two fields")]
    MissingField,

    #[error("Account number is required and cannot be empty")]
    EmptyAccountNumber,

    #[error("Account number must not exceed {ACCOUNT_NUMBER_MAX_LEN} characters")]
    AccountNumberTooLong,

    #[error("Product code is required and cannot be empty")]
    EmptyProductCode,

    #[error("Product code must not exceed {PRODUCT_CODE_MAX_LEN} characters")]
    ProductCodeTooLong,

    #[error("Fields must not contain the reserved '{ID_DELIMITER}' character")]
    ReservedDelimiter,

    #[error("Fields must not contain control characters")]
    ControlCharacter,
}

/// A single `(accountNumber, productCode)` record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountProduct {
    pub id: String,
    pub account_number: String,
    pub product_code: String,
}

impl AccountProduct {
    /// Deterministic identifier for a validated pair.
    pub fn composite_id(account_number: &str, product_code: &str) -> String {
        let mut id = String::with_capacity(account_number.len() + product_code.len() + 1);
        id.push_str(account_number);
        id.push(ID_DELIMITER);
        id.push_str(product_code);
        id
    }

    /// Trim and validate raw field values.
    pub fn from_fields(account_number: &str, product_code: &str) -> Result<Self, RecordError> {
        let account_number = account_number.trim();
        let product_code = product_code.trim();

        validate_account_number(account_number)?;
        validate_product_code(product_code)?;

        Ok(Self {
            id: Self::composite_id(account_number, product_code),
            account_number: account_number.to_string(),
            product_code: product_code.to_string(),
        })
    }

    /// Build a record from a parsed row, using only its first two fields.
    pub fn from_row<'a, I>(fields: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut fields = fields.into_iter();
        match (fields.next(), fields.next()) {
            (Some(account_number), Some(product_code)) => {
                Self::from_fields(account_number, product_code)
            },
            _ => Err(RecordError::MissingField),
        }
    }
}

fn validate_account_number(value: &str) -> Result<(), RecordError> {
    if value.is_empty() {
        return Err(RecordError::EmptyAccountNumber);
    }
    if value.chars().count() > ACCOUNT_NUMBER_MAX_LEN {
        return Err(RecordError::AccountNumberTooLong);
    }
    check_characters(value)
}

fn validate_product_code(value: &str) -> Result<(), RecordError> {
    if value.is_empty() {
        return Err(RecordError::EmptyProductCode);
    }
    if value.chars().count() > PRODUCT_CODE_MAX_LEN {
        return Err(RecordError::ProductCodeTooLong);
    }
    check_characters(value)
}

/// Rejects the id delimiter and control characters. PostgreSQL `text` cannot
/// store NUL.
fn check_characters(value: &str) -> Result<(), RecordError> {
    if value.contains(ID_DELIMITER) {
        return Err(RecordError::ReservedDelimiter);
    }
    if value.chars().any(char::is_control) {
        return Err(RecordError::ControlCharacter);
    }
    Ok(())
}
