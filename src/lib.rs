//! Teller Agent
//!
//! A rule-based customer-service agent for a retail bank that:
//! - Classifies free-text messages into a closed set of intents
//! - Answers public questions straight from reference data
//! - Gates account data behind name / date of birth / ID verification
//!   with a bounded retry budget and lockout
//! - Scans every outgoing reply for forbidden keywords
//! - Reports every verification and data access to an audit sink
//!
//! TURN LOOP:
//! INPUT → CLASSIFY → (VERIFY?) → RESPOND → GATE → RECORD

pub mod api;
pub mod audit;
pub mod classifier;
pub mod config;
pub mod conversation;
pub mod directory;
pub mod error;
pub mod history;
pub mod models;
pub mod rate_limit;
pub mod reference;
pub mod responder;
pub mod security;
pub mod state;

pub use error::Result;

// Re-export common types
pub use models::*;
pub use classifier::{Classification, IntentClassifier};
pub use conversation::{ConversationEngine, ConversationState, Session};
