//! Response Generator
//!
//! Produces the reply text for an intent. Public intents are answered from
//! reference data alone; sensitive intents read exactly one field from the
//! customer directory, and only when a verified customer id is supplied.

use crate::directory::CustomerDirectory;
use crate::models::{Intent, SensitiveField};
use crate::reference::ReferenceData;
use std::sync::Arc;

pub const VERIFICATION_PROMPT: &str = "For security reasons, I need to verify your identity before providing sensitive information.\n\n\
Please provide the following details:\n\
1. Your full name\n\
2. Your date of birth (YYYY/MM/DD)\n\
3. Your ID number";

pub const FALLBACK_MENU: &str = "I'm sorry, I didn't understand your question. I can help you with:\n\
- Service items available\n\
- Branch locations and contact information\n\
- Loan application process\n\
- Account opening process\n\
- Account-related information (with verification)";

const GENERAL_HELP: &str = "Hello! I'm your bank customer service assistant. I can help you with:\n\
1. Service items and offerings\n\
2. Branch locations and contact information\n\
3. Loan application process\n\
4. Account opening process\n\
5. Account information (with verification)\n\n\
How can I assist you today?";

const UNAVAILABLE: &str = "Unable to process your request.";

pub struct ResponseGenerator {
    reference: Arc<ReferenceData>,
    directory: Arc<CustomerDirectory>,
}

impl ResponseGenerator {
    pub fn new(reference: Arc<ReferenceData>, directory: Arc<CustomerDirectory>) -> Self {
        Self {
            reference,
            directory,
        }
    }

    /// Reply text for `intent` given the session's verification state
    pub fn respond(&self, intent: Intent, verified_customer_id: Option<&str>) -> String {
        match (intent.sensitive_field(), verified_customer_id) {
            (Some(_), None) => VERIFICATION_PROMPT.to_string(),
            (Some(field), Some(customer_id)) => self.sensitive(field, customer_id),
            (None, _) => self.public(intent),
        }
    }

    fn sensitive(&self, field: SensitiveField, customer_id: &str) -> String {
        let Some(value) = self.directory.fetch_field(customer_id, field) else {
            return UNAVAILABLE.to_string();
        };

        match field {
            SensitiveField::BankAccount => format!("Your bank account number is: {}", value),
            SensitiveField::AccountBalance => {
                format!("Your current account balance is: {}", value)
            }
            SensitiveField::LoanBalance => format!("Your current loan balance is: {}", value),
            SensitiveField::OpeningBranch => format!("Your account was opened at: {}", value),
        }
    }

    fn public(&self, intent: Intent) -> String {
        match intent {
            Intent::ServiceItems => self.service_items(),
            Intent::BranchInfo => self.branch_info(),
            Intent::LoanProcess => self.loan_process(),
            Intent::AccountOpening => self.account_opening(),
            Intent::GeneralHelp => GENERAL_HELP.to_string(),
            Intent::Unknown
            | Intent::BankAccount
            | Intent::AccountBalance
            | Intent::LoanBalance
            | Intent::OpeningBranch => FALLBACK_MENU.to_string(),
        }
    }

    fn service_items(&self) -> String {
        let items = bullet_list(&self.reference.service_items);
        format!("Our available services are:\n{}", items)
    }

    fn branch_info(&self) -> String {
        let blocks: Vec<String> = self
            .reference
            .branches
            .iter()
            .map(|b| {
                format!(
                    "📍 {}\n   Address: {}\n   Phone: {}\n   Hours: {}",
                    b.name, b.address, b.phone, b.hours
                )
            })
            .collect();

        format!("Our branches:\n\n{}", blocks.join("\n\n"))
    }

    fn loan_process(&self) -> String {
        format!(
            "Loan Application Process:\n{}\n\nFor more details, please visit our website or contact your nearest branch.",
            self.reference.loan_process.join("\n")
        )
    }

    fn account_opening(&self) -> String {
        format!(
            "Account Opening Process:\n{}\n\nFor assistance, please visit your nearest branch.",
            self.reference.account_opening_process.join("\n")
        )
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}
