//! Static reference data
//!
//! Loaded once at startup and shared read-only for the process lifetime.

use crate::error::TellerError;
use crate::models::{Branch, CustomerRecord};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceData {
    pub customers: Vec<CustomerRecord>,
    pub service_items: Vec<String>,
    /// Ordered as they should be listed to customers
    pub branches: Vec<Branch>,
    pub loan_process: Vec<String>,
    pub account_opening_process: Vec<String>,
}

impl ReferenceData {
    /// Built-in data set used when no file is configured
    pub fn builtin() -> Self {
        Self {
            customers: vec![CustomerRecord {
                name: "Tony Stark".to_string(),
                dob: "1996/09/10".to_string(),
                id_number: "A234763849".to_string(),
                bank_account: "6102394256679291".to_string(),
                account_balance: "TWD 2,500,394".to_string(),
                loan_balance: "TWD 19,243,225".to_string(),
                opening_branch: "Taipei First Main Branch".to_string(),
            }],
            service_items: strings(&[
                "24/7 Customer Support",
                "Account Management",
                "Loan Services",
                "Investment Advisory",
                "Credit Card Services",
                "Mobile Banking",
            ]),
            branches: vec![
                Branch {
                    name: "Taipei First Main Branch".to_string(),
                    address: "No. 1, Dunnan Rd, Taipei".to_string(),
                    phone: "02-2109-5500".to_string(),
                    hours: "Mon-Fri 9:00-17:00".to_string(),
                },
                Branch {
                    name: "Taipei Second Branch".to_string(),
                    address: "No. 88, Songshan Rd, Taipei".to_string(),
                    phone: "02-2719-7000".to_string(),
                    hours: "Mon-Fri 9:00-17:00".to_string(),
                },
            ],
            loan_process: strings(&[
                "1. Submit application with required documents",
                "2. Credit assessment and verification",
                "3. Final approval decision",
                "4. Loan disbursement",
            ]),
            account_opening_process: strings(&[
                "1. Visit nearest branch with valid ID",
                "2. Fill out account opening form",
                "3. Provide initial deposit (min TWD 1,000)",
                "4. Activate online banking (optional)",
                "5. Receive debit card in 7-10 business days",
            ]),
        }
    }

    /// Load reference data from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let data: ReferenceData = serde_json::from_str(&raw)?;
        data.validate()?;

        info!(
            path = %path.display(),
            customers = data.customers.len(),
            branches = data.branches.len(),
            "Reference data loaded"
        );

        Ok(data)
    }

    /// Reject data sets the directory could not serve consistently
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for customer in &self.customers {
            if !seen.insert(customer.id_number.as_str()) {
                return Err(TellerError::ReferenceDataError(format!(
                    "duplicate customer id {}",
                    crate::audit::redact_id(&customer.id_number)
                )));
            }
        }

        if self.service_items.is_empty() {
            return Err(TellerError::ReferenceDataError(
                "service list is empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ReferenceData {
    fn default() -> Self {
        Self::builtin()
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_is_valid() {
        let data = ReferenceData::builtin();
        assert!(data.validate().is_ok());
        assert_eq!(data.customers.len(), 1);
        assert_eq!(data.branches[0].name, "Taipei First Main Branch");
    }

    #[test]
    fn test_duplicate_customers_rejected() {
        let mut data = ReferenceData::builtin();
        let dup = data.customers[0].clone();
        data.customers.push(dup);

        let err = data.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate customer id"));
        assert!(!err.to_string().contains("A234763849"));
    }

    #[test]
    fn test_load_from_json_file() {
        let path = std::env::temp_dir().join(format!("teller-ref-{}.json", uuid::Uuid::new_v4()));
        let json = serde_json::to_string(&ReferenceData::builtin()).unwrap();
        std::fs::write(&path, json).unwrap();

        let loaded = ReferenceData::from_json_file(&path).unwrap();
        assert_eq!(loaded.service_items.len(), 6);

        std::fs::remove_file(&path).ok();
    }
}
