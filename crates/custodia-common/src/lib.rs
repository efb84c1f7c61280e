//! # Custodia Common
//!
//! Shared types, errors, and the audit trail for the Custodia quorum engine.
//!
//! ## Core Types
//!
//! - [`Principal`]: opaque, address-like identity of a caller or destination
//! - [`ActionId`]: sequence number of a proposed action
//! - [`Action`]: a proposed (target, value, payload) with its approval record
//!
//! ## Errors
//!
//! - [`CustodiaError`]: unified error wrapping access, ledger, registry and
//!   journal failures
//!
//! ## Audit
//!
//! - [`audit`]: structured audit events, sinks and the [`AuditLogger`]

pub mod audit;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use audit::{
    AuditCategory, AuditEvent, AuditLogger, AuditOutcome, AuditSeverity, AuditSink,
    MemoryAuditSink, TracingAuditSink,
};
pub use error::{AccessError, CustodiaError, JournalError, LedgerError, RegistryError, Result};
pub use types::{
    action::Action,
    principal::{ActionId, Principal},
};

/// Custodia version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Smallest admissible quorum threshold
pub const MIN_THRESHOLD: u32 = 1;
