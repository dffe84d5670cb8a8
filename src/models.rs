//! Core data models for the teller agent

use serde::{Deserialize, Serialize};
use std::fmt;

//
// ================= Intent =================
//

/// Closed set of things a customer message can ask for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    ServiceItems,
    BranchInfo,
    LoanProcess,
    AccountOpening,
    BankAccount,
    AccountBalance,
    LoanBalance,
    OpeningBranch,
    GeneralHelp,
    Unknown,
}

impl Intent {
    /// Every intent, in classification priority order.
    pub const ALL: [Intent; 10] = [
        Intent::ServiceItems,
        Intent::BranchInfo,
        Intent::LoanProcess,
        Intent::AccountOpening,
        Intent::BankAccount,
        Intent::AccountBalance,
        Intent::LoanBalance,
        Intent::OpeningBranch,
        Intent::GeneralHelp,
        Intent::Unknown,
    ];

    /// The customer field a sensitive intent reveals. `None` for public intents.
    pub fn sensitive_field(self) -> Option<SensitiveField> {
        match self {
            Intent::BankAccount => Some(SensitiveField::BankAccount),
            Intent::AccountBalance => Some(SensitiveField::AccountBalance),
            Intent::LoanBalance => Some(SensitiveField::LoanBalance),
            Intent::OpeningBranch => Some(SensitiveField::OpeningBranch),
            Intent::ServiceItems
            | Intent::BranchInfo
            | Intent::LoanProcess
            | Intent::AccountOpening
            | Intent::GeneralHelp
            | Intent::Unknown => None,
        }
    }

    /// Whether answering requires prior identity verification
    pub fn is_sensitive(self) -> bool {
        self.sensitive_field().is_some()
    }

    /// Human readable category label
    pub fn category(self) -> &'static str {
        match self {
            Intent::ServiceItems => "Service Information",
            Intent::BranchInfo => "Branch Information",
            Intent::LoanProcess => "Loan Services",
            Intent::AccountOpening => "Account Services",
            Intent::BankAccount => "Sensitive - Bank Account",
            Intent::AccountBalance => "Sensitive - Account Balance",
            Intent::LoanBalance => "Sensitive - Loan Balance",
            Intent::OpeningBranch => "Sensitive - Opening Branch",
            Intent::GeneralHelp => "General Help",
            Intent::Unknown => "Unknown",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Intent::ServiceItems => "service_items",
            Intent::BranchInfo => "branch_info",
            Intent::LoanProcess => "loan_process",
            Intent::AccountOpening => "account_opening",
            Intent::BankAccount => "bank_account",
            Intent::AccountBalance => "account_balance",
            Intent::LoanBalance => "loan_balance",
            Intent::OpeningBranch => "opening_branch",
            Intent::GeneralHelp => "general_help",
            Intent::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The four customer fields that are only released after verification.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SensitiveField {
    BankAccount,
    AccountBalance,
    LoanBalance,
    OpeningBranch,
}

impl SensitiveField {
    pub fn as_str(self) -> &'static str {
        match self {
            SensitiveField::BankAccount => "bank_account",
            SensitiveField::AccountBalance => "account_balance",
            SensitiveField::LoanBalance => "loan_balance",
            SensitiveField::OpeningBranch => "opening_branch",
        }
    }
}

//
// ================= Reference Records =================
//

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomerRecord {
    pub name: String,
    /// `YYYY/MM/DD`
    pub dob: String,
    /// One letter followed by nine digits
    pub id_number: String,
    pub bank_account: String,
    pub account_balance: String,
    pub loan_balance: String,
    pub opening_branch: String,
}

impl CustomerRecord {
    pub fn field(&self, field: SensitiveField) -> &str {
        match field {
            SensitiveField::BankAccount => &self.bank_account,
            SensitiveField::AccountBalance => &self.account_balance,
            SensitiveField::LoanBalance => &self.loan_balance,
            SensitiveField::OpeningBranch => &self.opening_branch,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Branch {
    pub name: String,
    pub address: String,
    pub phone: String,
    pub hours: String,
}

//
// ================= Verification =================
//

/// A complete identity claim parsed out of one customer message.
/// Lives only for the duration of a single verification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationClaim {
    pub name: String,
    pub dob: String,
    pub id_number: String,
}
