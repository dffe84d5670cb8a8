//! Customer Directory
//!
//! In-memory, read-only lookup and verification of customer identities.

use crate::models::{CustomerRecord, SensitiveField};
use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use thiserror::Error;

/// Substrings that mark a name as an injection attempt (matched case-insensitively)
const INJECTION_MARKERS: &[&str] = &["DROP", "DELETE", "--", ";", "/*", "*/", "INSERT", "UPDATE"];

const MIN_NAME_LEN: usize = 2;

lazy_static! {
    static ref DOB_FORMAT: Regex = Regex::new(r"^[0-9]{4}/[0-9]{2}/[0-9]{2}$").unwrap();
    static ref ID_FORMAT: Regex = Regex::new(r"^[A-Z][0-9]{9}$").unwrap();
}

/// Why a verification attempt was rejected.
///
/// The display text is what the customer sees; it names a category, never
/// the stored value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationFailure {
    #[error("Invalid name format")]
    InvalidName,

    #[error("Invalid date of birth format (use YYYY/MM/DD)")]
    InvalidDob,

    #[error("Invalid ID number format")]
    InvalidIdNumber,

    #[error("Customer ID not found")]
    NotFound,

    #[error("Name does not match")]
    NameMismatch,

    #[error("Date of birth does not match")]
    DobMismatch,

    #[error("ID number does not match")]
    IdMismatch,
}

impl VerificationFailure {
    /// Stable tag for audit details
    pub fn tag(self) -> &'static str {
        match self {
            VerificationFailure::InvalidName => "invalid_name",
            VerificationFailure::InvalidDob => "invalid_dob",
            VerificationFailure::InvalidIdNumber => "invalid_id_number",
            VerificationFailure::NotFound => "not_found",
            VerificationFailure::NameMismatch => "name_mismatch",
            VerificationFailure::DobMismatch => "dob_mismatch",
            VerificationFailure::IdMismatch => "id_mismatch",
        }
    }

    /// Input-format errors as opposed to record mismatches
    pub fn is_format_error(self) -> bool {
        matches!(
            self,
            VerificationFailure::InvalidName
                | VerificationFailure::InvalidDob
                | VerificationFailure::InvalidIdNumber
        )
    }
}

//
// ================= Format Checks =================
//

pub fn is_valid_name(name: &str) -> bool {
    if name.chars().count() < MIN_NAME_LEN {
        return false;
    }

    let upper = name.to_uppercase();
    !INJECTION_MARKERS.iter().any(|marker| upper.contains(marker))
}

pub fn is_valid_dob(dob: &str) -> bool {
    DOB_FORMAT.is_match(dob)
}

pub fn is_valid_id_number(id_number: &str) -> bool {
    ID_FORMAT.is_match(&id_number.to_uppercase())
}

//
// ================= Directory =================
//

pub struct CustomerDirectory {
    customers: HashMap<String, CustomerRecord>,
}

impl CustomerDirectory {
    pub fn new(records: impl IntoIterator<Item = CustomerRecord>) -> Self {
        Self {
            customers: records
                .into_iter()
                .map(|record| (record.id_number.clone(), record))
                .collect(),
        }
    }

    /// Verify an identity claim. Returns the canonical customer id on success.
    ///
    /// Checks run in a fixed order and stop at the first failure: name, dob
    /// and id formats, then existence, then name, dob and id against the record.
    pub fn verify(
        &self,
        name: &str,
        dob: &str,
        id_number: &str,
    ) -> Result<String, VerificationFailure> {
        if !is_valid_name(name) {
            return Err(VerificationFailure::InvalidName);
        }
        if !is_valid_dob(dob) {
            return Err(VerificationFailure::InvalidDob);
        }
        if !is_valid_id_number(id_number) {
            return Err(VerificationFailure::InvalidIdNumber);
        }

        let customer = self
            .customers
            .get(id_number)
            .ok_or(VerificationFailure::NotFound)?;

        if customer.name.to_lowercase() != name.to_lowercase() {
            return Err(VerificationFailure::NameMismatch);
        }
        if customer.dob != dob {
            return Err(VerificationFailure::DobMismatch);
        }
        if customer.id_number != id_number {
            return Err(VerificationFailure::IdMismatch);
        }

        Ok(customer.id_number.clone())
    }

    /// Read one sensitive field for an already verified customer
    pub fn fetch_field(&self, customer_id: &str, field: SensitiveField) -> Option<&str> {
        self.customers.get(customer_id).map(|c| c.field(field))
    }
}
