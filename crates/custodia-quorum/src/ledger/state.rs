//! In-memory ledger state and event application
//!
//! The state changes only through [`LedgerState::apply`], which is used both
//! for live commits and for journal replay.

use custodia_common::{Action, ActionId, JournalError, LedgerError};

use super::journal::LedgerEvent;
use crate::policy::PolicyVariant;
use crate::registry::PrincipalRegistry;

pub(crate) struct LedgerState<R> {
    pub(crate) registry: R,
    pub(crate) actions: Vec<Action>,
    pub(crate) threshold: u32,
    /// Applied events whose journal append failed, oldest first
    pub(crate) unjournaled: Vec<LedgerEvent>,
}

impl<R: PrincipalRegistry> LedgerState<R> {
    /// Build the initial state from a `LedgerCreated` entry
    pub(crate) fn from_genesis(event: &LedgerEvent) -> Result<Self, JournalError> {
        match event {
            LedgerEvent::LedgerCreated {
                variant,
                creator,
                members,
                threshold,
                ..
            } => {
                if *variant != R::VARIANT {
                    return Err(corrupted(
                        0,
                        format!("journal holds a {} ledger, expected {}", variant, R::VARIANT),
                    ));
                }
                if *threshold == 0 {
                    return Err(corrupted(0, "genesis threshold is 0".to_string()));
                }
                Ok(Self {
                    registry: R::from_genesis(creator, members),
                    actions: Vec::new(),
                    threshold: *threshold,
                    unjournaled: Vec::new(),
                })
            }
            other => Err(corrupted(
                0,
                format!("first entry is {}, expected LedgerCreated", other.kind()),
            )),
        }
    }

    pub(crate) fn variant(&self) -> PolicyVariant {
        R::VARIANT
    }

    pub(crate) fn action(&self, id: ActionId) -> Result<&Action, LedgerError> {
        self.actions
            .get(id.index())
            .ok_or(LedgerError::ActionNotFound(id))
    }

    fn action_mut(&mut self, entry: u64, id: ActionId) -> Result<&mut Action, JournalError> {
        self.actions
            .get_mut(id.index())
            .ok_or_else(|| corrupted(entry, format!("unknown action {}", id)))
    }

    fn pending_action_mut(&mut self, entry: u64, id: ActionId) -> Result<&mut Action, JournalError> {
        let action = self.action_mut(entry, id)?;
        if action.executed {
            return Err(corrupted(entry, format!("action {} already executed", id)));
        }
        Ok(action)
    }

    /// Apply one committed event
    pub(crate) fn apply(&mut self, entry: u64, event: &LedgerEvent) -> Result<(), JournalError> {
        match event {
            LedgerEvent::LedgerCreated { .. } => {
                return Err(corrupted(entry, "duplicate LedgerCreated".to_string()));
            }
            LedgerEvent::ActionSubmitted {
                action_id,
                proposer,
                target,
                value,
                payload,
                required_approvals,
                timestamp,
            } => {
                if action_id.index() != self.actions.len() {
                    return Err(corrupted(
                        entry,
                        format!(
                            "action {} out of sequence, expected {}",
                            action_id,
                            self.actions.len()
                        ),
                    ));
                }
                self.actions.push(Action::new(
                    *action_id,
                    proposer.clone(),
                    target.clone(),
                    *value,
                    payload.clone(),
                    *required_approvals,
                    *timestamp,
                ));
            }
            LedgerEvent::ApprovalGranted {
                action_id,
                principal,
                ..
            } => {
                let action = self.pending_action_mut(entry, *action_id)?;
                action.approvals.insert(principal.clone());
            }
            LedgerEvent::ApprovalRevoked {
                action_id,
                principal,
                ..
            } => {
                let action = self.pending_action_mut(entry, *action_id)?;
                if !action.approvals.remove(principal) {
                    return Err(corrupted(
                        entry,
                        format!("{} had no approval on action {}", principal, action_id),
                    ));
                }
            }
            LedgerEvent::ActionExecuted {
                action_id,
                timestamp,
                ..
            } => {
                let action = self.pending_action_mut(entry, *action_id)?;
                action.executed = true;
                action.executed_at = Some(*timestamp);
            }
            LedgerEvent::MembershipChanged { change, .. } => {
                self.registry
                    .apply_membership(change)
                    .map_err(|e| match e {
                        JournalError::Corrupted { reason, .. } => corrupted(entry, reason),
                        other => other,
                    })?;
            }
            LedgerEvent::ThresholdChanged { new, .. } => {
                if *new == 0 {
                    return Err(corrupted(entry, "threshold changed to 0".to_string()));
                }
                self.threshold = *new;
            }
        }
        Ok(())
    }
}

fn corrupted(entry: u64, reason: String) -> JournalError {
    JournalError::Corrupted { entry, reason }
}
