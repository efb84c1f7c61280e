//! Ledger construction and restoration

use std::sync::Arc;

use custodia_common::{AuditLogger, CustodiaError, JournalError, LedgerError, Principal, Result};
use parking_lot::RwLock;
use tracing::info;

use super::journal::{FileJournal, Journal, LedgerEvent, MemoryJournal};
use super::state::LedgerState;
use super::QuorumLedger;
use crate::config::{ExecutionPolicy, LedgerConfig};
use crate::executor::{Executor, NoopExecutor};
use crate::registry::PrincipalRegistry;

/// Collects a ledger's collaborators, then creates or restores it
pub struct LedgerBuilder {
    executor: Arc<dyn Executor>,
    journal: Arc<dyn Journal>,
    audit: AuditLogger,
    execution_policy: ExecutionPolicy,
}

impl LedgerBuilder {
    /// No-op executor, in-memory journal, tracing audit sink, any-member execution
    pub fn new() -> Self {
        Self {
            executor: Arc::new(NoopExecutor),
            journal: Arc::new(MemoryJournal::new()),
            audit: AuditLogger::new(),
            execution_policy: ExecutionPolicy::default(),
        }
    }

    /// Apply a loaded [`LedgerConfig`], opening the file journal if one is set
    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        let mut builder = Self::new().execution_policy(config.execution_policy);

        if let Some(path) = &config.journal_path {
            builder = builder.journal(Arc::new(FileJournal::open(path)?));
        }

        let mut audit = AuditLogger::new();
        audit.set_min_severity(config.audit_min_severity);
        Ok(builder.audit(audit))
    }

    /// Set the executor approved actions are handed to
    pub fn executor(mut self, executor: Arc<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    /// Set the journal
    pub fn journal(mut self, journal: Arc<dyn Journal>) -> Self {
        self.journal = journal;
        self
    }

    /// Set the audit logger
    pub fn audit(mut self, audit: AuditLogger) -> Self {
        self.audit = audit;
        self
    }

    /// Set who may trigger execution
    pub fn execution_policy(mut self, policy: ExecutionPolicy) -> Self {
        self.execution_policy = policy;
        self
    }

    /// Create a new ledger, writing its genesis entry to an empty journal
    pub fn create<R: PrincipalRegistry>(
        self,
        creator: Principal,
        members: Vec<Principal>,
        threshold: u32,
    ) -> Result<QuorumLedger<R>> {
        if threshold < custodia_common::MIN_THRESHOLD {
            return Err(LedgerError::InvalidThreshold(threshold).into());
        }
        if !self.journal.is_empty()? {
            return Err(JournalError::AlreadyInitialized.into());
        }

        let genesis = LedgerEvent::LedgerCreated {
            variant: R::VARIANT,
            creator: creator.clone(),
            members,
            threshold,
            timestamp: chrono::Utc::now().timestamp_millis(),
        };
        self.journal.append(&genesis)?;
        let state = LedgerState::<R>::from_genesis(&genesis)?;

        info!(
            variant = %R::VARIANT,
            creator = %creator,
            members = state.registry.size(),
            threshold,
            "Ledger created"
        );
        self.audit
            .log_config_change(creator.as_str(), "ledger", "-", &R::VARIANT.to_string());

        Ok(self.finish(state))
    }

    /// Rebuild a ledger by replaying every journal entry
    pub fn restore<R: PrincipalRegistry>(self) -> Result<QuorumLedger<R>> {
        let events = self.journal.replay()?;
        let (genesis, rest) = events.split_first().ok_or(JournalError::Empty)?;

        let mut state = LedgerState::<R>::from_genesis(genesis)?;
        for (offset, event) in rest.iter().enumerate() {
            state
                .apply(offset as u64 + 1, event)
                .map_err(CustodiaError::from)?;
        }

        info!(
            variant = %R::VARIANT,
            entries = events.len(),
            actions = state.actions.len(),
            threshold = state.threshold,
            "Ledger restored from journal"
        );

        Ok(self.finish(state))
    }

    fn finish<R: PrincipalRegistry>(self, state: LedgerState<R>) -> QuorumLedger<R> {
        QuorumLedger {
            state: RwLock::new(state),
            executor: self.executor,
            journal: self.journal,
            audit: self.audit,
            execution_policy: self.execution_policy,
        }
    }
}

impl Default for LedgerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
