//! External executor - where approved actions leave the ledger
//!
//! The ledger hands `(target, value, payload)` to an [`Executor`] exactly once
//! per successful `execute` and never retries it.
//!
//! The call happens while the ledger's write lock is held. An executor must
//! not call back into the same ledger, not even a read query, or the calling
//! thread deadlocks. Work that needs ledger state should be queued and run
//! after `execute` returns.

use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use custodia_common::Principal;
use parking_lot::Mutex;
use thiserror::Error;

/// Failure reported by an executor
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutorError {
    #[error("Call rejected by target: {0}")]
    Rejected(String),

    #[error("Executor unavailable: {0}")]
    Unavailable(String),
}

/// Performs the side effect of an approved action
///
/// Runs under the ledger's write lock; it must not re-enter the ledger that
/// invoked it.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    fn execute(&self, target: &Principal, value: u128, payload: &[u8]) -> Result<(), ExecutorError>;
}

/// Executor that accepts every call and does nothing
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopExecutor;

impl Executor for NoopExecutor {
    fn execute(&self, _target: &Principal, _value: u128, _payload: &[u8]) -> Result<(), ExecutorError> {
        Ok(())
    }
}

/// A call observed by [`RecordingExecutor`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutedCall {
    pub target: Principal,
    pub value: u128,
    pub payload: Bytes,
}

/// Executor that records every call, optionally failing them
#[derive(Debug, Default)]
pub struct RecordingExecutor {
    calls: Mutex<Vec<ExecutedCall>>,
    failing: AtomicBool,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent calls fail (`true`) or succeed (`false`)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Successful calls so far
    pub fn calls(&self) -> Vec<ExecutedCall> {
        self.calls.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, target: &Principal, value: u128, payload: &[u8]) -> Result<(), ExecutorError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ExecutorError::Unavailable("recording executor set to fail".into()));
        }

        self.calls.lock().push(ExecutedCall {
            target: target.clone(),
            value,
            payload: Bytes::copy_from_slice(payload),
        });
        Ok(())
    }
}
