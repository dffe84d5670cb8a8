//! Conversation State Machine
//!
//! Drives the verify-then-answer protocol for one session at a time:
//!
//! IDLE ── sensitive intent, unverified ──▶ AWAITING VERIFICATION
//!   ▲                                             │
//!   └──── verified / lockout ◀── claim parsing ───┘
//!
//! The engine holds no per-session state; callers own [`Session`] values
//! (see `state::SessionStore`) and must not run two turns on the same
//! session concurrently.

pub mod parser;

use crate::audit::{AuditEvent, AuditEventType, AuditSink};
use crate::classifier::IntentClassifier;
use crate::directory::CustomerDirectory;
use crate::history::{Turn, TurnLog};
use crate::models::Intent;
use crate::reference::ReferenceData;
use crate::responder::{ResponseGenerator, FALLBACK_MENU, VERIFICATION_PROMPT};
use crate::security::{GateRejection, SecurityGate};
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_VERIFICATION_ATTEMPTS: u32 = 3;

pub const LOCKOUT_MESSAGE: &str = "Verification failed. For security reasons, I'm unable to proceed. \
Please contact our support team or visit a branch.";

pub const GENERIC_ERROR: &str = "An error occurred while processing your request. Please try again.";

const VERIFIED_BANNER: &str = "✓ Identity verified successfully!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationState {
    Idle,
    AwaitingVerification,
}

//
// ================= Session =================
//

/// Per-session conversation state
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    verified_customer_id: Option<String>,
    pending_intent: Option<Intent>,
    verification_attempts: u32,
    history: TurnLog,
    created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            verified_customer_id: None,
            pending_intent: None,
            verification_attempts: 0,
            history: TurnLog::new(),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn state(&self) -> ConversationState {
        if self.is_verification_pending() {
            ConversationState::AwaitingVerification
        } else {
            ConversationState::Idle
        }
    }

    pub fn is_verification_pending(&self) -> bool {
        self.pending_intent.is_some() && self.verified_customer_id.is_none()
    }

    pub fn is_verified(&self) -> bool {
        self.verified_customer_id.is_some()
    }

    pub fn verified_customer_id(&self) -> Option<&str> {
        self.verified_customer_id.as_deref()
    }

    pub fn pending_intent(&self) -> Option<Intent> {
        self.pending_intent
    }

    pub fn verification_attempts(&self) -> u32 {
        self.verification_attempts
    }

    pub fn history(&self) -> &[Turn] {
        self.history.turns()
    }
}

//
// ================= Engine =================
//

pub struct ConversationEngine {
    directory: Arc<CustomerDirectory>,
    responder: ResponseGenerator,
    gate: SecurityGate,
    audit: Arc<dyn AuditSink>,
    max_attempts: u32,
}

impl ConversationEngine {
    pub fn new(reference: Arc<ReferenceData>, audit: Arc<dyn AuditSink>) -> Self {
        let directory = Arc::new(CustomerDirectory::new(reference.customers.clone()));
        let responder = ResponseGenerator::new(reference, directory.clone());

        Self {
            directory,
            responder,
            gate: SecurityGate::new(),
            audit,
            max_attempts: DEFAULT_MAX_VERIFICATION_ATTEMPTS,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Run one turn. Always yields a reply and always records the turn.
    pub fn process_message(&self, session: &mut Session, text: &str) -> String {
        let text = text.trim();
        session.history.begin_turn(text);

        let reply = if session.is_verification_pending() {
            self.handle_verification(session, text)
        } else {
            self.handle_query(session, text)
        };

        let reply = self.guard(session, reply).unwrap_or_else(|_| GENERIC_ERROR.to_string());
        session.history.complete_turn(reply.clone());
        reply
    }

    pub fn get_history<'a>(&self, session: &'a Session) -> &'a [Turn] {
        session.history()
    }

    /// Forget verified identity, pending intent and attempt count (logout)
    pub fn reset_verification(&self, session: &mut Session) {
        session.verified_customer_id = None;
        session.verification_attempts = 0;
        session.pending_intent = None;

        info!(session = %crate::audit::redact_session(&session.id.to_string()), "Verification reset");
    }

    fn handle_query(&self, session: &mut Session, text: &str) -> String {
        let classification = IntentClassifier::classify(text);
        let intent = classification.intent;

        debug!(
            intent = %intent,
            category = intent.category(),
            confidence = classification.confidence,
            "Message classified"
        );

        if intent == Intent::Unknown {
            return FALLBACK_MENU.to_string();
        }

        if intent.is_sensitive() && !session.is_verified() {
            session.pending_intent = Some(intent);
            return VERIFICATION_PROMPT.to_string();
        }

        self.answer(session, intent)
    }

    fn handle_verification(&self, session: &mut Session, text: &str) -> String {
        // Every claim turn is charged, including incomplete ones
        session.verification_attempts += 1;
        let attempt = session.verification_attempts;

        self.audit.record(
            AuditEvent::new(AuditEventType::VerificationAttempt)
                .session(session.id)
                .details(json!({ "attempt": attempt })),
        );

        if attempt > self.max_attempts {
            return self.lock_out(session);
        }

        let claim = match parser::parse_claim(text).complete() {
            Ok(claim) => claim,
            Err(missing) => {
                debug!(missing, attempt, "Incomplete verification claim");
                return format!(
                    "Please provide all required information. \
You still need to provide {} more field(s).\n\
Format: Name, Date of Birth (YYYY/MM/DD), ID Number\n\
Or use labeled format: Name: [name] DOB: [date] ID: [id]",
                    missing
                );
            }
        };

        match self
            .directory
            .verify(&claim.name, &claim.dob, &claim.id_number)
        {
            Err(reason) => {
                let remaining = self.max_attempts.saturating_sub(attempt);

                self.audit.record(
                    AuditEvent::new(AuditEventType::VerificationFailure)
                        .session(session.id)
                        .failed()
                        .details(json!({
                            "attempts": attempt,
                            "attempts_remaining": remaining,
                            "reason": reason.tag(),
                            "format_error": reason.is_format_error(),
                        })),
                );

                if remaining == 0 {
                    return self.lock_out(session);
                }

                if reason.is_format_error() {
                    format!(
                        "Please check your details: {}\nAttempts remaining: {}\n\
Format: Name, Date of Birth (YYYY/MM/DD), ID Number",
                        reason, remaining
                    )
                } else {
                    format!(
                        "Verification failed: {}\nAttempts remaining: {}\nPlease try again with correct information.",
                        reason, remaining
                    )
                }
            }
            Ok(customer_id) => {
                session.verified_customer_id = Some(customer_id.clone());
                session.verification_attempts = 0;

                self.audit.record(
                    AuditEvent::new(AuditEventType::VerificationSuccess)
                        .session(session.id)
                        .customer(customer_id)
                        .details(json!({ "attempts": attempt })),
                );

                let reply = match session.pending_intent.take() {
                    Some(intent) => self.answer(session, intent),
                    None => FALLBACK_MENU.to_string(),
                };

                format!("{}\n\n{}", VERIFIED_BANNER, reply)
            }
        }
    }

    fn lock_out(&self, session: &mut Session) -> String {
        session.pending_intent = None;

        warn!(
            session = %crate::audit::redact_session(&session.id.to_string()),
            attempts = session.verification_attempts,
            "Verification locked out"
        );

        self.audit.record(
            AuditEvent::new(AuditEventType::VerificationFailure)
                .session(session.id)
                .failed()
                .details(json!({
                    "attempts": session.verification_attempts,
                    "attempts_remaining": 0,
                    "reason": "attempts_exhausted",
                })),
        );

        LOCKOUT_MESSAGE.to_string()
    }

    /// Generate the answer for an intent the session is allowed to see.
    ///
    /// Access is audited only once the gate has passed the reply.
    fn answer(&self, session: &Session, intent: Intent) -> String {
        let verified = session.verified_customer_id.as_deref();
        let reply = match self.guard(session, self.responder.respond(intent, verified)) {
            Ok(reply) => reply,
            Err(_) => return GENERIC_ERROR.to_string(),
        };

        if let (Some(field), Some(customer_id)) = (intent.sensitive_field(), verified) {
            self.audit.record(
                AuditEvent::new(AuditEventType::SensitiveDataAccess)
                    .session(session.id)
                    .customer(customer_id)
                    .details(json!({
                        "data_type": field.as_str(),
                        "category": intent.category(),
                    })),
            );
        }

        reply
    }

    /// Run a reply through the security gate, auditing any rejection
    fn guard(&self, session: &Session, reply: String) -> Result<String, GateRejection> {
        self.gate.validate(&reply).map(|()| reply).map_err(|rejection| {
            warn!(
                session = %crate::audit::redact_session(&session.id.to_string()),
                keyword = rejection.keyword,
                "Outgoing reply rejected by security gate"
            );

            self.audit.record(
                AuditEvent::new(AuditEventType::SecurityViolation)
                    .session(session.id)
                    .failed()
                    .details(json!({
                        "violation_type": "forbidden_keyword",
                        "keyword": rejection.keyword,
                    })),
            );

            rejection
        })
    }
}

//
// ================= Tests =================
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditLog;

    const GOOD_CLAIM: &str = "Tony Stark, 1996/09/10, A234763849";
    const WRONG_CLAIM: &str = "John Doe, 1990/01/01, B123456789";

    fn engine_with_log() -> (ConversationEngine, Arc<AuditLog>) {
        let log = Arc::new(AuditLog::new());
        let engine = ConversationEngine::new(Arc::new(ReferenceData::builtin()), log.clone());
        (engine, log)
    }

    fn engine() -> ConversationEngine {
        engine_with_log().0
    }

    fn count(log: &AuditLog, session: &Session, event_type: AuditEventType) -> usize {
        log.list_for_session(session.id())
            .iter()
            .filter(|e| e.event_type == event_type)
            .count()
    }

    #[test]
    fn test_public_query() {
        let engine = engine();
        let mut session = Session::new(Uuid::new_v4());

        let reply = engine.process_message(&mut session, "What services do you offer?");
        for item in &ReferenceData::builtin().service_items {
            assert!(reply.contains(item.as_str()));
        }
        assert_eq!(session.state(), ConversationState::Idle);
    }

    #[test]
    fn test_sensitive_query_requires_verification() {
        let engine = engine();
        let mut session = Session::new(Uuid::new_v4());

        let reply = engine.process_message(&mut session, "What is my account balance?");
        assert_eq!(reply, VERIFICATION_PROMPT);
        assert!(reply.to_lowercase().contains("identity"));
        assert_eq!(session.state(), ConversationState::AwaitingVerification);
        assert_eq!(session.pending_intent(), Some(Intent::AccountBalance));
    }

    #[test]
    fn test_verification_flow() {
        let (engine, log) = engine_with_log();
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "What is my account balance?");
        let reply = engine.process_message(&mut session, GOOD_CLAIM);

        assert!(reply.starts_with(VERIFIED_BANNER));
        assert!(reply.to_lowercase().contains("verified"));
        assert!(reply.contains("TWD 2,500,394"));
        assert_eq!(session.state(), ConversationState::Idle);
        assert_eq!(session.verified_customer_id(), Some("A234763849"));
        assert_eq!(session.verification_attempts(), 0);
        assert_eq!(session.pending_intent(), None);

        assert_eq!(count(&log, &session, AuditEventType::VerificationSuccess), 1);
        assert_eq!(count(&log, &session, AuditEventType::SensitiveDataAccess), 1);
    }

    #[test]
    fn test_labeled_claim_matches_comma_claim() {
        let engine = engine();

        let mut labeled = Session::new(Uuid::new_v4());
        engine.process_message(&mut labeled, "What is my account balance?");
        let a = engine.process_message(
            &mut labeled,
            "Name: Tony Stark DOB: 1996/09/10 ID: A234763849",
        );

        let mut commas = Session::new(Uuid::new_v4());
        engine.process_message(&mut commas, "What is my account balance?");
        let b = engine.process_message(&mut commas, GOOD_CLAIM);

        assert_eq!(a, b);
    }

    #[test]
    fn test_no_reverification_in_same_session() {
        let engine = engine();
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "What is my account balance?");
        engine.process_message(&mut session, GOOD_CLAIM);

        let reply = engine.process_message(&mut session, "What is my loan balance?");
        assert_eq!(reply, "Your current loan balance is: TWD 19,243,225");
        assert_eq!(session.state(), ConversationState::Idle);
    }

    #[test]
    fn test_failed_verification_reports_remaining() {
        let engine = engine();
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "What is my account balance?");
        let reply = engine.process_message(&mut session, WRONG_CLAIM);

        assert!(reply.contains("Verification failed: Customer ID not found"));
        assert!(reply.contains("Attempts remaining: 2"));
        assert_eq!(session.state(), ConversationState::AwaitingVerification);
    }

    #[test]
    fn test_format_error_is_reported() {
        let engine = engine();
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "What is my bank account number?");
        let reply = engine.process_message(&mut session, "Tony Stark, 1996-09-10, A234763849");

        assert!(reply.starts_with("Please check your details"));
        assert!(!reply.contains("Verification failed"));
        assert!(reply.contains("Invalid date of birth format (use YYYY/MM/DD)"));
        assert!(reply.contains("Attempts remaining: 2"));
        assert_eq!(session.state(), ConversationState::AwaitingVerification);
    }

    #[test]
    fn test_lockout_after_budget_exhausted() {
        let (engine, log) = engine_with_log();
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "What is my account balance?");
        assert!(engine
            .process_message(&mut session, WRONG_CLAIM)
            .contains("Attempts remaining: 2"));
        assert!(engine
            .process_message(&mut session, WRONG_CLAIM)
            .contains("Attempts remaining: 1"));

        let reply = engine.process_message(&mut session, WRONG_CLAIM);
        assert_eq!(reply, LOCKOUT_MESSAGE);
        assert_eq!(session.state(), ConversationState::Idle);
        assert_eq!(session.pending_intent(), None);
        assert!(!session.is_verified());

        for turn in session.history() {
            assert!(!turn.assistant.as_deref().unwrap_or("").contains("TWD"));
        }
        assert_eq!(count(&log, &session, AuditEventType::VerificationAttempt), 3);
    }

    #[test]
    fn test_locked_out_session_rejected_outright_until_reset() {
        let engine = engine();
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "What is my account balance?");
        for _ in 0..3 {
            engine.process_message(&mut session, WRONG_CLAIM);
        }

        // A fresh request re-prompts, but the next claim exceeds the budget
        engine.process_message(&mut session, "What is my account balance?");
        let reply = engine.process_message(&mut session, GOOD_CLAIM);
        assert_eq!(reply, LOCKOUT_MESSAGE);
        assert!(!session.is_verified());
        assert_eq!(session.pending_intent(), None);

        engine.reset_verification(&mut session);
        engine.process_message(&mut session, "What is my account balance?");
        let reply = engine.process_message(&mut session, GOOD_CLAIM);
        assert!(reply.contains("TWD 2,500,394"));
    }

    #[test]
    fn test_incomplete_claim_charges_attempt() {
        let engine = engine();
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "What is my account balance?");
        let reply = engine.process_message(&mut session, "Name: Tony Stark");

        assert!(reply.contains("You still need to provide 2 more field(s)"));
        assert_eq!(session.verification_attempts(), 1);
        assert_eq!(session.state(), ConversationState::AwaitingVerification);

        let reply = engine.process_message(&mut session, GOOD_CLAIM);
        assert!(reply.contains("TWD 2,500,394"));
    }

    #[test]
    fn test_unknown_intent() {
        let engine = engine();
        let mut session = Session::new(Uuid::new_v4());

        let reply = engine.process_message(&mut session, "tell me a joke");
        assert_eq!(reply, FALLBACK_MENU);
        assert_eq!(session.state(), ConversationState::Idle);
    }

    #[test]
    fn test_history_recorded_on_every_path() {
        let engine = engine();
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "  tell me a joke  ");
        engine.process_message(&mut session, "What is my account balance?");
        engine.process_message(&mut session, "Name: Tony Stark");
        engine.process_message(&mut session, WRONG_CLAIM);

        let history = engine.get_history(&session);
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].user, "tell me a joke");
        assert!(history.iter().all(|t| t.assistant.is_some()));
    }

    #[test]
    fn test_reset_verification() {
        let engine = engine();
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "What is my account balance?");
        engine.process_message(&mut session, GOOD_CLAIM);
        assert!(session.is_verified());

        engine.reset_verification(&mut session);
        assert!(!session.is_verified());

        let reply = engine.process_message(&mut session, "What is my account balance?");
        assert_eq!(reply, VERIFICATION_PROMPT);
    }

    #[test]
    fn test_leaking_reply_is_replaced() {
        let mut reference = ReferenceData::builtin();
        reference.customers[0].opening_branch = "Secret Vault Branch".to_string();

        let log = Arc::new(AuditLog::new());
        let engine = ConversationEngine::new(Arc::new(reference), log.clone());
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "Where was my account opened?");
        let reply = engine.process_message(&mut session, GOOD_CLAIM);

        assert!(!reply.to_lowercase().contains("secret"));
        assert!(reply.contains(GENERIC_ERROR));
        assert!(session.is_verified());
        assert!(count(&log, &session, AuditEventType::SecurityViolation) >= 1);
        assert_eq!(count(&log, &session, AuditEventType::SensitiveDataAccess), 0);
    }

    #[test]
    fn test_leaking_public_reply_is_replaced() {
        let mut reference = ReferenceData::builtin();
        reference.branches[0].name = "Pingtung Branch".to_string();

        let log = Arc::new(AuditLog::new());
        let engine = ConversationEngine::new(Arc::new(reference), log.clone());
        let mut session = Session::new(Uuid::new_v4());

        let reply = engine.process_message(&mut session, "Where is your nearest branch?");

        assert_eq!(reply, GENERIC_ERROR);
        assert_eq!(session.state(), ConversationState::Idle);
        assert_eq!(count(&log, &session, AuditEventType::SecurityViolation), 1);

        let events = log.list_for_session(session.id());
        assert_eq!(events[0].details["keyword"], json!("pin"));
    }

    #[test]
    fn test_access_audit_carries_category() {
        let (engine, log) = engine_with_log();
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "What is my loan balance?");
        engine.process_message(&mut session, GOOD_CLAIM);

        let access: Vec<_> = log
            .list_for_session(session.id())
            .into_iter()
            .filter(|e| e.event_type == AuditEventType::SensitiveDataAccess)
            .collect();
        assert_eq!(access.len(), 1);
        assert_eq!(access[0].details["data_type"], json!("loan_balance"));
        assert_eq!(access[0].details["category"], json!(Intent::LoanBalance.category()));
    }

    #[test]
    fn test_custom_attempt_budget() {
        let engine = engine().with_max_attempts(1);
        let mut session = Session::new(Uuid::new_v4());

        engine.process_message(&mut session, "What is my account balance?");
        let reply = engine.process_message(&mut session, WRONG_CLAIM);
        assert_eq!(reply, LOCKOUT_MESSAGE);
        assert_eq!(session.state(), ConversationState::Idle);
    }
}
