//! Error types for Custodia
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

use crate::types::principal::{ActionId, Principal};

/// Result type alias using CustodiaError
pub type Result<T> = std::result::Result<T, CustodiaError>;

/// Unified error type for Custodia operations
#[derive(Debug, Error)]
pub enum CustodiaError {
    // Caller lacks the role required for the operation
    #[error("Unauthorized: {0}")]
    Access(#[from] AccessError),

    // Action state machine errors
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    // Membership mutation errors
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    // Persistence errors
    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CustodiaError {
    /// True when the caller was rejected for lacking a role
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CustodiaError::Access(_))
    }
}

/// Authorization failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("{caller} is not an authorized principal (operation: {operation})")]
    NotAuthorized {
        caller: Principal,
        operation: &'static str,
    },

    #[error("{caller} is not the administrator (operation: {operation})")]
    NotAdministrator {
        caller: Principal,
        operation: &'static str,
    },

    #[error("{caller} is not the proposer of action {action_id}")]
    NotProposer { caller: Principal, action_id: ActionId },
}

/// Action lifecycle errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Action {0} does not exist")]
    ActionNotFound(ActionId),

    #[error("Action {0} has already been executed")]
    AlreadyExecuted(ActionId),

    #[error("Quorum not met for action {action_id}: {approvals} of {required} approvals")]
    QuorumNotMet {
        action_id: ActionId,
        approvals: usize,
        required: u32,
    },

    #[error("{principal} has no active approval on action {action_id}")]
    NoActiveApproval {
        action_id: ActionId,
        principal: Principal,
    },

    #[error("Invalid threshold {0}: must be at least 1")]
    InvalidThreshold(u32),

    #[error("Executor failed for action {action_id}: {reason}")]
    ExecutionFailed { action_id: ActionId, reason: String },

    /// The side effect happened and the action is executed in memory; the
    /// journal entry is queued and written before the next commit.
    #[error("Action {action_id} executed but not yet journaled: {reason}")]
    ExecutedNotJournaled { action_id: ActionId, reason: String },
}

/// Membership mutation errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("{0} is already a member")]
    AlreadyMember(Principal),

    #[error("{0} is not a member")]
    NotMember(Principal),

    #[error("The administrator {0} cannot be removed from membership")]
    CannotRemoveAdministrator(Principal),
}

/// Journal persistence errors
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupted journal entry {entry}: {reason}")]
    Corrupted { entry: u64, reason: String },

    #[error("Journal is empty, nothing to restore")]
    Empty,

    #[error("Journal already holds a ledger")]
    AlreadyInitialized,
}

// Implement From for common external error types
impl From<serde_json::Error> for JournalError {
    fn from(err: serde_json::Error) -> Self {
        JournalError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for CustodiaError {
    fn from(err: serde_json::Error) -> Self {
        CustodiaError::Journal(err.into())
    }
}

impl From<std::io::Error> for CustodiaError {
    fn from(err: std::io::Error) -> Self {
        CustodiaError::Journal(JournalError::Io(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CustodiaError::Ledger(LedgerError::ActionNotFound(ActionId(7)));
        assert!(err.to_string().contains("Action 7"));
    }

    #[test]
    fn test_quorum_error() {
        let err = LedgerError::QuorumNotMet {
            action_id: ActionId(0),
            approvals: 1,
            required: 2,
        };
        assert!(err.to_string().contains("1 of 2"));
    }

    #[test]
    fn test_unauthorized_classification() {
        let err: CustodiaError = AccessError::NotAdministrator {
            caller: Principal::new("0xbad"),
            operation: "add_member",
        }
        .into();
        assert!(err.is_unauthorized());

        let err: CustodiaError = RegistryError::NotMember(Principal::new("0xbad")).into();
        assert!(!err.is_unauthorized());
    }
}
