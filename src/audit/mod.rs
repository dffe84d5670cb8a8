//! Security audit trail
//!
//! The conversation core reports transition points to an [`AuditSink`] and
//! never waits on or inspects the outcome. [`AuditLog`] keeps the most recent
//! events in a bounded in-memory ring with an integrity hash, and mirrors
//! every event to the `audit` tracing target with identifiers redacted.

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::io::Write;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    SessionCreated,
    SessionDeleted,
    VerificationAttempt,
    VerificationSuccess,
    VerificationFailure,
    SensitiveDataAccess,
    RateLimitExceeded,
    InvalidInput,
    SecurityViolation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub event_type: AuditEventType,
    pub session_id: Option<Uuid>,
    pub customer_id: Option<String>,
    pub success: bool,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type,
            session_id: None,
            customer_id: None,
            success: true,
            details: serde_json::Value::Null,
            created_at: Utc::now(),
        }
    }

    pub fn session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }

    pub fn customer(mut self, customer_id: impl Into<String>) -> Self {
        self.customer_id = Some(customer_id.into());
        self
    }

    pub fn failed(mut self) -> Self {
        self.success = false;
        self
    }

    pub fn details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

/// Destination for audit events
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Discards everything
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _event: AuditEvent) {}
}

#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub event: AuditEvent,
    pub digest: String,
}

pub const DEFAULT_AUDIT_CAPACITY: usize = 10_000;

/// In-memory audit trail holding at most `capacity` events, oldest evicted first
pub struct AuditLog {
    records: RwLock<VecDeque<AuditRecord>>,
    capacity: usize,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_AUDIT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
        }
    }

    /// Retained events for a session, oldest first
    pub fn list_for_session(&self, session_id: Uuid) -> Vec<AuditEvent> {
        self.records
            .read()
            .iter()
            .filter(|r| r.event.session_id == Some(session_id))
            .map(|r| r.event.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Re-hash a retained event and compare with the digest taken at record time
    pub fn verify_integrity(&self, event_id: Uuid) -> bool {
        self.records
            .read()
            .iter()
            .find(|r| r.event.event_id == event_id)
            .map(|r| compute_event_digest(&r.event) == r.digest)
            .unwrap_or(false)
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for AuditLog {
    fn record(&self, event: AuditEvent) {
        info!(
            target: "audit",
            event_type = ?event.event_type,
            success = event.success,
            session = %event.session_id.map(|s| redact_session(&s.to_string())).unwrap_or_default(),
            customer = %event.customer_id.as_deref().map(redact_id).unwrap_or_default(),
            details = %redact_sensitive(&event.details.to_string()),
            "audit event"
        );

        let digest = compute_event_digest(&event);
        let mut records = self.records.write();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(AuditRecord { event, digest });
    }
}

/// SHA256 over the serialized event, streamed straight into the hasher
pub fn compute_event_digest(event: &AuditEvent) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), event).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

//
// ================= Redaction =================
//

lazy_static! {
    static ref LONG_TOKEN: Regex = Regex::new(r"[A-Za-z0-9_-]{32,}").unwrap();
    static ref CUSTOMER_ID: Regex = Regex::new(r"\b[A-Z][0-9]{9}\b").unwrap();
}

/// `A234763849` → `A2***49`
pub fn redact_id(customer_id: &str) -> String {
    let chars: Vec<char> = customer_id.chars().collect();
    if chars.len() < 4 {
        return "[redacted]".to_string();
    }
    let head: String = chars[..2].iter().collect();
    let tail: String = chars[chars.len() - 2..].iter().collect();
    format!("{}***{}", head, tail)
}

/// Keeps the first and last four characters of a session id
pub fn redact_session(session_id: &str) -> String {
    let chars: Vec<char> = session_id.chars().collect();
    if chars.len() < 8 {
        return "[redacted]".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

/// Strip long tokens and customer ids from free text bound for a log line
pub fn redact_sensitive(value: &str) -> String {
    let value = LONG_TOKEN.replace_all(value, "[redacted]");
    CUSTOMER_ID.replace_all(&value, "[redacted]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_and_list() {
        let log = AuditLog::new();
        let session = Uuid::new_v4();

        log.record(AuditEvent::new(AuditEventType::SessionCreated).session(session));
        log.record(
            AuditEvent::new(AuditEventType::VerificationFailure)
                .session(session)
                .failed()
                .details(json!({ "reason": "not_found" })),
        );
        log.record(AuditEvent::new(AuditEventType::SessionCreated).session(Uuid::new_v4()));

        let events = log.list_for_session(session);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, AuditEventType::SessionCreated);
        assert!(!events[1].success);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_integrity() {
        let log = AuditLog::new();
        let event = AuditEvent::new(AuditEventType::SensitiveDataAccess).customer("A234763849");
        let id = event.event_id;
        log.record(event);

        assert!(log.verify_integrity(id));
        assert!(!log.verify_integrity(Uuid::new_v4()));

        log.records.write()[0].event.customer_id = Some("B000000000".into());
        assert!(!log.verify_integrity(id));
    }

    #[test]
    fn test_capacity_evicts_oldest() {
        let log = AuditLog::with_capacity(2);
        let session = Uuid::new_v4();

        let first = AuditEvent::new(AuditEventType::SessionCreated).session(session);
        let first_id = first.event_id;
        log.record(first);
        log.record(AuditEvent::new(AuditEventType::VerificationAttempt).session(session));
        log.record(AuditEvent::new(AuditEventType::VerificationSuccess).session(session));

        assert_eq!(log.len(), 2);
        assert!(!log.verify_integrity(first_id));

        let events = log.list_for_session(session);
        assert_eq!(events[0].event_type, AuditEventType::VerificationAttempt);
        assert_eq!(events[1].event_type, AuditEventType::VerificationSuccess);
    }

    #[test]
    fn test_redaction() {
        assert_eq!(redact_id("A234763849"), "A2***49");
        assert_eq!(redact_id("abc"), "[redacted]");
        assert_eq!(
            redact_session("0f8fad5b-d9cb-469f-a165-70867728950e"),
            "0f8f...950e"
        );
        assert_eq!(
            redact_sensitive("customer A234763849 asked"),
            "customer [redacted] asked"
        );
        assert_eq!(
            redact_sensitive(&format!("key {}", "x".repeat(40))),
            "key [redacted]"
        );
    }
}
