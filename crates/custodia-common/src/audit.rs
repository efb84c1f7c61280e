//! Audit trail
//!
//! Every ledger operation, accepted or rejected, produces an [`AuditEvent`]:
//! - Authorization decisions (non-members, non-administrators)
//! - Action state transitions (submit, approve, revoke, execute)
//! - Membership and threshold changes
//! - Executor failures

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

/// Audit event severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AuditSeverity {
    /// Informational - normal operation
    Info,
    /// Warning - rejected request
    Warning,
    /// Error - operation failed downstream
    Error,
    /// Critical - integrity problem
    Critical,
}

impl std::fmt::Display for AuditSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditSeverity::Info => write!(f, "INFO"),
            AuditSeverity::Warning => write!(f, "WARN"),
            AuditSeverity::Error => write!(f, "ERROR"),
            AuditSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl FromStr for AuditSeverity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" => Ok(AuditSeverity::Info),
            "warn" | "warning" => Ok(AuditSeverity::Warning),
            "error" => Ok(AuditSeverity::Error),
            "critical" => Ok(AuditSeverity::Critical),
            other => Err(format!("unknown audit severity: {}", other)),
        }
    }
}

/// Audit event category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditCategory {
    /// Authorization decisions
    Authorization,
    /// Action state transitions
    DataModification,
    /// Membership and threshold changes
    Configuration,
    /// Executor invocations
    Execution,
    /// Journal events
    Storage,
}

impl std::fmt::Display for AuditCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditCategory::Authorization => write!(f, "AUTHZ"),
            AuditCategory::DataModification => write!(f, "DATA"),
            AuditCategory::Configuration => write!(f, "CONFIG"),
            AuditCategory::Execution => write!(f, "EXEC"),
            AuditCategory::Storage => write!(f, "STORAGE"),
        }
    }
}

/// Audit outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// Audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub event_id: String,

    /// Timestamp (Unix millis)
    pub timestamp: i64,

    /// Event severity
    pub severity: AuditSeverity,

    /// Event category
    pub category: AuditCategory,

    /// Operation name (e.g., "submit", "approve", "change_threshold")
    pub action: String,

    /// Outcome (success/failure)
    pub outcome: AuditOutcome,

    /// Principal that performed the operation
    pub actor: Option<String>,

    /// Affected resource (action id, member, setting)
    pub resource: Option<String>,

    /// Additional details
    pub details: HashMap<String, String>,
}

impl AuditEvent {
    /// Create a new audit event
    pub fn new(category: AuditCategory, action: &str, outcome: AuditOutcome) -> Self {
        Self {
            event_id: uuid::Uuid::now_v7().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            severity: match outcome {
                AuditOutcome::Success => AuditSeverity::Info,
                AuditOutcome::Failure => AuditSeverity::Warning,
            },
            category,
            action: action.to_string(),
            outcome,
            actor: None,
            resource: None,
            details: HashMap::new(),
        }
    }

    /// Set severity
    pub fn with_severity(mut self, severity: AuditSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Set actor
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = Some(actor.to_string());
        self
    }

    /// Set resource
    pub fn with_resource(mut self, resource: &str) -> Self {
        self.resource = Some(resource.to_string());
        self
    }

    /// Add detail
    pub fn with_detail(mut self, key: &str, value: &str) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }

    /// Convert to JSON string
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Audit log sink
pub trait AuditSink: Send + Sync {
    /// Write an audit event
    fn write(&self, event: &AuditEvent);

    /// Flush pending events
    fn flush(&self);
}

/// Sink forwarding events to `tracing`
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn write(&self, event: &AuditEvent) {
        let log_line = format!(
            "[{}] {} {} {} - actor={} resource={} outcome={:?}",
            event.severity,
            event.category,
            event.action,
            event.event_id,
            event.actor.as_deref().unwrap_or("-"),
            event.resource.as_deref().unwrap_or("-"),
            event.outcome,
        );

        match event.severity {
            AuditSeverity::Info => info!(target: "custodia::audit", "{}", log_line),
            AuditSeverity::Warning => warn!(target: "custodia::audit", "{}", log_line),
            AuditSeverity::Error => error!(target: "custodia::audit", "{}", log_line),
            AuditSeverity::Critical => error!(target: "custodia::audit", "CRITICAL: {}", log_line),
        }
    }

    fn flush(&self) {}
}

/// In-memory sink, cloneable so callers can keep a handle for inspection
#[derive(Clone, Default)]
pub struct MemoryAuditSink {
    events: Arc<RwLock<Vec<AuditEvent>>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded events
    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.read().clone()
    }

    /// Recorded events for one operation name
    pub fn events_for(&self, action: &str) -> Vec<AuditEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.action == action)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl AuditSink for MemoryAuditSink {
    fn write(&self, event: &AuditEvent) {
        self.events.write().push(event.clone());
    }

    fn flush(&self) {}
}

/// Audit logger
pub struct AuditLogger {
    sinks: Vec<Box<dyn AuditSink>>,
    /// Minimum severity to log
    min_severity: AuditSeverity,
}

impl AuditLogger {
    /// Create a logger writing to `tracing`
    pub fn new() -> Self {
        Self {
            sinks: vec![Box::new(TracingAuditSink)],
            min_severity: AuditSeverity::Info,
        }
    }

    /// Create a logger with no sinks
    pub fn silent() -> Self {
        Self {
            sinks: Vec::new(),
            min_severity: AuditSeverity::Info,
        }
    }

    /// Add a sink
    pub fn add_sink(&mut self, sink: Box<dyn AuditSink>) {
        self.sinks.push(sink);
    }

    /// Builder-style [`AuditLogger::add_sink`]
    pub fn with_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.add_sink(sink);
        self
    }

    /// Set minimum severity
    pub fn set_min_severity(&mut self, severity: AuditSeverity) {
        self.min_severity = severity;
    }

    pub fn min_severity(&self) -> AuditSeverity {
        self.min_severity
    }

    /// Log an audit event
    pub fn log(&self, event: AuditEvent) {
        if event.severity < self.min_severity {
            return;
        }

        for sink in &self.sinks {
            sink.write(&event);
        }
    }

    /// Log an authorization decision
    pub fn log_authorization(&self, actor: &str, resource: &str, operation: &str, allowed: bool) {
        let outcome = if allowed {
            AuditOutcome::Success
        } else {
            AuditOutcome::Failure
        };

        let mut event = AuditEvent::new(AuditCategory::Authorization, operation, outcome)
            .with_actor(actor)
            .with_resource(resource);

        if !allowed {
            event = event.with_severity(AuditSeverity::Warning);
        }

        self.log(event);
    }

    /// Log an accepted state transition
    pub fn log_transition(
        &self,
        actor: &str,
        resource: &str,
        operation: &str,
        details: &[(&str, String)],
    ) {
        let mut event =
            AuditEvent::new(AuditCategory::DataModification, operation, AuditOutcome::Success)
                .with_actor(actor)
                .with_resource(resource);

        for (key, value) in details {
            event = event.with_detail(key, value);
        }

        self.log(event);
    }

    /// Log a request rejected by a precondition
    pub fn log_rejection(&self, actor: &str, resource: &str, operation: &str, reason: &str) {
        let event =
            AuditEvent::new(AuditCategory::DataModification, operation, AuditOutcome::Failure)
                .with_actor(actor)
                .with_resource(resource)
                .with_detail("reason", reason);

        self.log(event);
    }

    /// Log a membership or threshold change
    pub fn log_config_change(
        &self,
        actor: &str,
        setting: &str,
        old_value: &str,
        new_value: &str,
    ) {
        let event = AuditEvent::new(AuditCategory::Configuration, "change", AuditOutcome::Success)
            .with_actor(actor)
            .with_resource(setting)
            .with_detail("old_value", old_value)
            .with_detail("new_value", new_value);

        self.log(event);
    }

    /// Log an executor invocation
    pub fn log_execution(&self, actor: &str, resource: &str, digest: &str, error: Option<&str>) {
        let mut event = match error {
            None => AuditEvent::new(AuditCategory::Execution, "execute", AuditOutcome::Success),
            Some(reason) => {
                AuditEvent::new(AuditCategory::Execution, "execute", AuditOutcome::Failure)
                    .with_severity(AuditSeverity::Error)
                    .with_detail("reason", reason)
            }
        };
        event = event
            .with_actor(actor)
            .with_resource(resource)
            .with_detail("digest", digest);

        self.log(event);
    }

    /// Log a journal failure
    pub fn log_storage_failure(&self, operation: &str, reason: &str) {
        let event = AuditEvent::new(AuditCategory::Storage, operation, AuditOutcome::Failure)
            .with_severity(AuditSeverity::Critical)
            .with_detail("reason", reason);

        self.log(event);
    }

    /// Flush all sinks
    pub fn flush(&self) {
        for sink in &self.sinks {
            sink.flush();
        }
    }
}

impl Default for AuditLogger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audit_event_creation() {
        let event = AuditEvent::new(AuditCategory::Authorization, "approve", AuditOutcome::Failure)
            .with_actor("0xstranger")
            .with_resource("action:0")
            .with_detail("reason", "not a member");

        assert_eq!(event.category, AuditCategory::Authorization);
        assert_eq!(event.action, "approve");
        assert_eq!(event.severity, AuditSeverity::Warning);
        assert_eq!(event.actor, Some("0xstranger".to_string()));
        assert_eq!(event.details.get("reason"), Some(&"not a member".to_string()));
    }

    #[test]
    fn test_audit_event_json() {
        let event = AuditEvent::new(AuditCategory::Configuration, "change", AuditOutcome::Success)
            .with_resource("threshold");

        let json = event.to_json();
        assert!(json.contains("Configuration"));
        assert!(json.contains("threshold"));
    }

    #[test]
    fn test_memory_sink_records() {
        let sink = MemoryAuditSink::new();
        let logger = AuditLogger::silent().with_sink(Box::new(sink.clone()));

        logger.log_authorization("0xadmin", "action:0", "approve", true);
        logger.log_transition("0xadmin", "action:0", "approve", &[("approvals", "1".into())]);
        logger.log_config_change("0xadmin", "threshold", "2", "3");
        logger.flush();

        assert_eq!(sink.len(), 3);
        assert_eq!(sink.events_for("approve").len(), 2);
        assert_eq!(
            sink.events_for("approve")[1].details.get("approvals"),
            Some(&"1".to_string())
        );
    }

    #[test]
    fn test_min_severity_filters() {
        let sink = MemoryAuditSink::new();
        let mut logger = AuditLogger::silent().with_sink(Box::new(sink.clone()));
        logger.set_min_severity(AuditSeverity::Warning);

        logger.log_authorization("0xadmin", "action:0", "approve", true);
        logger.log_authorization("0xstranger", "action:0", "approve", false);

        assert_eq!(sink.len(), 1);
        assert_eq!(sink.events()[0].outcome, AuditOutcome::Failure);
    }

    #[test]
    fn test_severity_ordering_and_parsing() {
        assert!(AuditSeverity::Info < AuditSeverity::Warning);
        assert!(AuditSeverity::Error < AuditSeverity::Critical);
        assert_eq!("WARNING".parse::<AuditSeverity>(), Ok(AuditSeverity::Warning));
        assert!("loud".parse::<AuditSeverity>().is_err());
    }
}
