//! Quorum ledger - the action state machine
//!
//! ```text
//!         submit                      threshold met
//!  (none) ------> PENDING(n=0) <===> PENDING(n>0) --execute--> EXECUTED
//!                      approve/revoke toggle one principal each
//! ```
//!
//! Every mutating operation holds the ledger's write lock for its whole
//! validate, execute, journal, apply sequence. A failed operation leaves both
//! the journal and the in-memory state untouched, with one exception: an
//! execute whose side effect already ran is applied in memory and its journal
//! entry is queued until the next successful append.

pub mod builder;
pub mod journal;
mod state;

pub use builder::LedgerBuilder;
pub use journal::{FileJournal, Journal, LedgerEvent, MemoryJournal};

use std::sync::Arc;

use bytes::Bytes;
use custodia_common::{
    AccessError, Action, ActionId, AuditLogger, CustodiaError, LedgerError, Principal, Result,
};
use parking_lot::RwLock;
use tracing::{debug, error, info, instrument, warn};

use self::state::LedgerState;
use crate::config::ExecutionPolicy;
use crate::executor::Executor;
use crate::policy::PolicyVariant;
use crate::registry::{AdministrableRegistry, MembershipChange, PrincipalRegistry};

/// Pool of proposed actions guarded by a principal registry
pub struct QuorumLedger<R: PrincipalRegistry> {
    state: RwLock<LedgerState<R>>,
    executor: Arc<dyn Executor>,
    journal: Arc<dyn Journal>,
    audit: AuditLogger,
    execution_policy: ExecutionPolicy,
}

fn resource(id: ActionId) -> String {
    format!("action:{}", id)
}

fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl<R: PrincipalRegistry> QuorumLedger<R> {
    /// Propose an action; returns its sequence number
    #[instrument(skip_all, fields(caller = %caller, target = %target, value = %value))]
    pub fn submit(
        &self,
        caller: &Principal,
        target: Principal,
        value: u128,
        payload: impl Into<Bytes>,
    ) -> Result<ActionId> {
        let mut state = self.state.write();
        let id = ActionId(state.actions.len() as u64);

        if !state.registry.is_authorized(caller) {
            let err = AccessError::NotAuthorized {
                caller: caller.clone(),
                operation: "submit",
            };
            return Err(self.reject(caller, &resource(id), "submit", err.into()));
        }

        let required = state.threshold;
        self.commit(
            &mut state,
            LedgerEvent::ActionSubmitted {
                action_id: id,
                proposer: caller.clone(),
                target,
                value,
                payload: payload.into(),
                required_approvals: required,
                timestamp: now(),
            },
        )?;

        let digest = state.actions[id.index()].digest_hex();
        self.audit.log_transition(
            caller.as_str(),
            &resource(id),
            "submit",
            &[
                ("required_approvals", required.to_string()),
                ("digest", digest),
            ],
        );
        info!(action_id = %id, required_approvals = required, "Action submitted");

        Ok(id)
    }

    /// Record `caller`'s approval; returns the approval count afterwards
    ///
    /// Approving twice is a no-op.
    #[instrument(skip_all, fields(caller = %caller, action_id = %id))]
    pub fn approve(&self, caller: &Principal, id: ActionId) -> Result<usize> {
        let mut state = self.state.write();

        let already_approved =
            self.guard(caller, id, "approve", Self::check_approve(&state, caller, id))?;
        if already_approved {
            let approvals = state.actions[id.index()].approval_count();
            debug!(approvals, "Approval already recorded");
            return Ok(approvals);
        }

        self.commit(
            &mut state,
            LedgerEvent::ApprovalGranted {
                action_id: id,
                principal: caller.clone(),
                timestamp: now(),
            },
        )?;

        let action = &state.actions[id.index()];
        let approvals = action.approval_count();
        self.audit.log_transition(
            caller.as_str(),
            &resource(id),
            "approve",
            &[
                ("approvals", approvals.to_string()),
                ("required_approvals", action.required_approvals.to_string()),
            ],
        );
        info!(approvals, required = action.required_approvals, "Action approved");

        Ok(approvals)
    }

    /// Withdraw `caller`'s active approval; returns the approval count afterwards
    #[instrument(skip_all, fields(caller = %caller, action_id = %id))]
    pub fn revoke(&self, caller: &Principal, id: ActionId) -> Result<usize> {
        let mut state = self.state.write();

        self.guard(caller, id, "revoke", Self::check_revoke(&state, caller, id))?;

        self.commit(
            &mut state,
            LedgerEvent::ApprovalRevoked {
                action_id: id,
                principal: caller.clone(),
                timestamp: now(),
            },
        )?;

        let approvals = state.actions[id.index()].approval_count();
        self.audit.log_transition(
            caller.as_str(),
            &resource(id),
            "revoke",
            &[("approvals", approvals.to_string())],
        );
        info!(approvals, "Approval revoked");

        Ok(approvals)
    }

    /// Hand an approved action to the executor and mark it executed
    ///
    /// The flag is committed only after the executor reports success. On
    /// executor failure the action stays pending and can be retried.
    ///
    /// Once the executor has succeeded the action is executed in memory even
    /// if the journal append fails. The entry is then queued, written ahead of
    /// the next commit, and the call returns
    /// [`LedgerError::ExecutedNotJournaled`]. A retry sees `AlreadyExecuted`.
    #[instrument(skip_all, fields(caller = %caller, action_id = %id))]
    pub fn execute(&self, caller: &Principal, id: ActionId) -> Result<()> {
        let mut state = self.state.write();

        let check = self.check_execute(&state, caller, id);
        self.guard(caller, id, "execute", check)?;

        let action = &state.actions[id.index()];
        let digest = action.digest_hex();
        if let Err(e) = self
            .executor
            .execute(&action.target, action.value, &action.payload)
        {
            let reason = e.to_string();
            self.audit
                .log_execution(caller.as_str(), &resource(id), &digest, Some(&reason));
            warn!(error = %reason, "Executor failed, action stays pending");
            return Err(LedgerError::ExecutionFailed {
                action_id: id,
                reason,
            }
            .into());
        }

        self.audit
            .log_execution(caller.as_str(), &resource(id), &digest, None);

        let event = LedgerEvent::ActionExecuted {
            action_id: id,
            executor: caller.clone(),
            timestamp: now(),
        };
        match self.commit(&mut state, event.clone()) {
            Ok(()) => {
                info!(digest = %digest, "Action executed");
                Ok(())
            }
            Err(CustodiaError::Journal(e)) => {
                // entry index is unknown until the backlog is written
                state
                    .apply(u64::MAX, &event)
                    .map_err(|e| CustodiaError::Internal(e.to_string()))?;
                state.unjournaled.push(event);
                error!(
                    error = %e,
                    backlog = state.unjournaled.len(),
                    "Action executed but not journaled, entry queued"
                );
                Err(LedgerError::ExecutedNotJournaled {
                    action_id: id,
                    reason: e.to_string(),
                }
                .into())
            }
            Err(other) => Err(other),
        }
    }

    /// Write queued journal entries left by a failed append
    ///
    /// Every commit does this first; call it directly to retry without
    /// issuing another mutation.
    pub fn sync_journal(&self) -> Result<()> {
        let mut state = self.state.write();
        self.flush_unjournaled(&mut state)
    }

    // ============ QUERIES ============

    /// Snapshot of one action
    pub fn action(&self, id: ActionId) -> Result<Action> {
        Ok(self.state.read().action(id)?.clone())
    }

    /// Whether `principal` currently approves action `id`
    pub fn is_approved(&self, id: ActionId, principal: &Principal) -> Result<bool> {
        Ok(self.state.read().action(id)?.is_approved_by(principal))
    }

    /// Number of actions ever submitted
    pub fn action_count(&self) -> usize {
        self.state.read().actions.len()
    }

    /// Actions not yet executed, in submission order
    pub fn pending_actions(&self) -> Vec<ActionId> {
        self.state
            .read()
            .actions
            .iter()
            .filter(|a| a.is_pending())
            .map(|a| a.id)
            .collect()
    }

    /// Threshold applied to the next submission
    pub fn threshold(&self) -> u32 {
        self.state.read().threshold
    }

    pub fn is_authorized(&self, principal: &Principal) -> bool {
        self.state.read().registry.is_authorized(principal)
    }

    pub fn member_count(&self) -> usize {
        self.state.read().registry.size()
    }

    pub fn members(&self) -> Vec<Principal> {
        self.state.read().registry.members()
    }

    pub fn administrator(&self) -> Option<Principal> {
        self.state.read().registry.administrator().cloned()
    }

    pub fn variant(&self) -> PolicyVariant {
        self.state.read().variant()
    }

    pub fn execution_policy(&self) -> ExecutionPolicy {
        self.execution_policy
    }

    /// Applied events still waiting for a journal append
    pub fn unjournaled_count(&self) -> usize {
        self.state.read().unjournaled.len()
    }

    // ============ INTERNALS ============

    fn check_approve(state: &LedgerState<R>, caller: &Principal, id: ActionId) -> Result<bool> {
        let action = state.action(id)?;
        if !state.registry.is_authorized(caller) {
            return Err(AccessError::NotAuthorized {
                caller: caller.clone(),
                operation: "approve",
            }
            .into());
        }
        if action.executed {
            return Err(LedgerError::AlreadyExecuted(id).into());
        }
        Ok(action.is_approved_by(caller))
    }

    fn check_revoke(state: &LedgerState<R>, caller: &Principal, id: ActionId) -> Result<()> {
        let action = state.action(id)?;
        if action.executed {
            return Err(LedgerError::AlreadyExecuted(id).into());
        }
        if !action.is_approved_by(caller) {
            return Err(LedgerError::NoActiveApproval {
                action_id: id,
                principal: caller.clone(),
            }
            .into());
        }
        Ok(())
    }

    fn check_execute(&self, state: &LedgerState<R>, caller: &Principal, id: ActionId) -> Result<()> {
        let action = state.action(id)?;

        if !state.registry.is_authorized(caller) {
            return Err(AccessError::NotAuthorized {
                caller: caller.clone(),
                operation: "execute",
            }
            .into());
        }
        if self.execution_policy == ExecutionPolicy::ProposerOnly && &action.proposer != caller {
            return Err(AccessError::NotProposer {
                caller: caller.clone(),
                action_id: id,
            }
            .into());
        }
        if action.executed {
            return Err(LedgerError::AlreadyExecuted(id).into());
        }
        if !action.has_quorum() {
            return Err(LedgerError::QuorumNotMet {
                action_id: id,
                approvals: action.approval_count(),
                required: action.required_approvals,
            }
            .into());
        }
        Ok(())
    }

    /// Audit and log a failed precondition check
    fn guard<T>(
        &self,
        caller: &Principal,
        id: ActionId,
        operation: &'static str,
        check: Result<T>,
    ) -> Result<T> {
        check.map_err(|err| self.reject(caller, &resource(id), operation, err))
    }

    fn reject(
        &self,
        caller: &Principal,
        resource: &str,
        operation: &'static str,
        err: CustodiaError,
    ) -> CustodiaError {
        if err.is_unauthorized() {
            self.audit
                .log_authorization(caller.as_str(), resource, operation, false);
        } else {
            self.audit
                .log_rejection(caller.as_str(), resource, operation, &err.to_string());
        }
        warn!(caller = %caller, operation, error = %err, "Request rejected");
        err
    }

    /// Journal an event, then apply it to the in-memory state
    ///
    /// Queued entries are written first so the journal keeps commit order.
    fn commit(&self, state: &mut LedgerState<R>, event: LedgerEvent) -> Result<()> {
        self.flush_unjournaled(state)?;

        let entry = self.append(&event)?;

        state.apply(entry, &event).map_err(|e| {
            self.audit.log_storage_failure(event.kind(), &e.to_string());
            error!(entry, kind = event.kind(), error = %e, "Journaled event could not be applied");
            CustodiaError::Internal(e.to_string())
        })
    }

    fn flush_unjournaled(&self, state: &mut LedgerState<R>) -> Result<()> {
        while let Some(event) = state.unjournaled.first() {
            self.append(event)?;
            state.unjournaled.remove(0);
            debug!(remaining = state.unjournaled.len(), "Queued journal entry written");
        }
        Ok(())
    }

    fn append(&self, event: &LedgerEvent) -> Result<u64> {
        self.journal.append(event).map_err(|e| {
            self.audit.log_storage_failure(event.kind(), &e.to_string());
            error!(kind = event.kind(), error = %e, "Journal append failed");
            CustodiaError::from(e)
        })
    }
}

/// Administrative operations, present only on the extended variant
impl<R: AdministrableRegistry> QuorumLedger<R> {
    /// Authorize a new principal
    #[instrument(skip_all, fields(caller = %caller, principal = %principal))]
    pub fn add_member(&self, caller: &Principal, principal: Principal) -> Result<()> {
        let mut state = self.state.write();

        if let Err(err) = state.registry.ensure_can_add(caller, &principal) {
            return Err(self.reject(caller, principal.as_str(), "add_member", err));
        }

        let before = state.registry.size();
        self.commit(
            &mut state,
            LedgerEvent::MembershipChanged {
                change: MembershipChange::Added(principal.clone()),
                timestamp: now(),
            },
        )?;
        let after = state.registry.size();

        self.audit.log_config_change(
            caller.as_str(),
            &format!("member:{}", principal),
            &before.to_string(),
            &after.to_string(),
        );
        info!(members = after, "Member added");

        Ok(())
    }

    /// Revoke a principal's membership
    ///
    /// Approvals the principal already recorded on pending actions remain.
    #[instrument(skip_all, fields(caller = %caller, principal = %principal))]
    pub fn remove_member(&self, caller: &Principal, principal: &Principal) -> Result<()> {
        let mut state = self.state.write();

        if let Err(err) = state.registry.ensure_can_remove(caller, principal) {
            return Err(self.reject(caller, principal.as_str(), "remove_member", err));
        }

        let before = state.registry.size();
        self.commit(
            &mut state,
            LedgerEvent::MembershipChanged {
                change: MembershipChange::Removed(principal.clone()),
                timestamp: now(),
            },
        )?;
        let after = state.registry.size();

        self.audit.log_config_change(
            caller.as_str(),
            &format!("member:{}", principal),
            &before.to_string(),
            &after.to_string(),
        );
        info!(members = after, "Member removed");

        Ok(())
    }

    /// Set the threshold for actions submitted from now on
    ///
    /// Values above the member count are accepted.
    #[instrument(skip_all, fields(caller = %caller, threshold = threshold))]
    pub fn change_threshold(&self, caller: &Principal, threshold: u32) -> Result<()> {
        let mut state = self.state.write();

        if !state.registry.is_administrator(caller) {
            let err = AccessError::NotAdministrator {
                caller: caller.clone(),
                operation: "change_threshold",
            };
            return Err(self.reject(caller, "threshold", "change_threshold", err.into()));
        }
        if threshold < custodia_common::MIN_THRESHOLD {
            let err = LedgerError::InvalidThreshold(threshold);
            return Err(self.reject(caller, "threshold", "change_threshold", err.into()));
        }

        let old = state.threshold;
        self.commit(
            &mut state,
            LedgerEvent::ThresholdChanged {
                old,
                new: threshold,
                timestamp: now(),
            },
        )?;

        self.audit.log_config_change(
            caller.as_str(),
            "threshold",
            &old.to_string(),
            &threshold.to_string(),
        );
        if threshold as usize > state.registry.size() {
            warn!(
                threshold,
                members = state.registry.size(),
                "Threshold exceeds member count; new actions cannot reach quorum yet"
            );
        }
        info!(old, new = threshold, "Threshold changed");

        Ok(())
    }
}
