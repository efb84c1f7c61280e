//! Fixed-membership registry
//!
//! The member set is decided at construction and never changes. There is no
//! way to add or remove members through this type.

use std::collections::BTreeSet;

use custodia_common::{JournalError, Principal};

use super::{MembershipChange, PrincipalRegistry};
use crate::policy::PolicyVariant;

/// Immutable member set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedRegistry {
    members: BTreeSet<Principal>,
}

impl FixedRegistry {
    /// Create a registry from the creator and the initial owners
    pub fn new(creator: Principal, owners: impl IntoIterator<Item = Principal>) -> Self {
        let mut members: BTreeSet<Principal> = owners.into_iter().collect();
        members.insert(creator);
        Self { members }
    }
}

impl PrincipalRegistry for FixedRegistry {
    const VARIANT: PolicyVariant = PolicyVariant::Fixed;

    fn from_genesis(creator: &Principal, members: &[Principal]) -> Self {
        Self::new(creator.clone(), members.iter().cloned())
    }

    fn is_authorized(&self, principal: &Principal) -> bool {
        self.members.contains(principal)
    }

    fn size(&self) -> usize {
        self.members.len()
    }

    fn members(&self) -> Vec<Principal> {
        self.members.iter().cloned().collect()
    }

    fn apply_membership(&mut self, change: &MembershipChange) -> Result<(), JournalError> {
        Err(JournalError::Corrupted {
            entry: 0,
            reason: format!("membership change {:?} in a fixed-membership ledger", change),
        })
    }
}
