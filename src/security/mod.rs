//! Security Gate
//!
//! Last check on every outgoing reply. Any forbidden keyword anywhere in
//! the text, in any case, rejects it.

use thiserror::Error;

pub const FORBIDDEN_KEYWORDS: &[&str] = &["password", "pwd", "pin", "secret", "api_key", "token"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Response contains forbidden sensitive information")]
pub struct GateRejection {
    /// First forbidden keyword found
    pub keyword: &'static str,
}

#[derive(Debug, Clone)]
pub struct SecurityGate {
    forbidden: &'static [&'static str],
}

impl SecurityGate {
    pub fn new() -> Self {
        Self {
            forbidden: FORBIDDEN_KEYWORDS,
        }
    }

    pub fn validate(&self, text: &str) -> Result<(), GateRejection> {
        let lower = text.to_lowercase();

        match self.forbidden.iter().find(|kw| lower.contains(**kw)) {
            Some(keyword) => Err(GateRejection { keyword: *keyword }),
            None => Ok(()),
        }
    }
}

impl Default for SecurityGate {
    fn default() -> Self {
        Self::new()
    }
}
