//! Principal registry - who may act on a ledger
//!
//! This module provides:
//! - [`PrincipalRegistry`]: the authorization capability every ledger needs
//! - [`AdministrableRegistry`]: the extension capability that lets an
//!   administrator mutate membership
//! - [`FixedRegistry`] and [`AdminRegistry`], one per policy variant

pub mod admin;
pub mod fixed;

pub use admin::AdminRegistry;
pub use fixed::FixedRegistry;

use custodia_common::{JournalError, Principal, Result};
use serde::{Deserialize, Serialize};

use crate::policy::PolicyVariant;

/// Membership mutation as recorded in the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "principal", rename_all = "snake_case")]
pub enum MembershipChange {
    Added(Principal),
    Removed(Principal),
}

/// Authorization lookups shared by both policy variants
pub trait PrincipalRegistry: Send + Sync + Sized {
    /// Variant recorded in the ledger's genesis entry
    const VARIANT: PolicyVariant;

    /// Build the registry a ledger starts with
    ///
    /// The creator is always included; duplicate entries collapse.
    fn from_genesis(creator: &Principal, members: &[Principal]) -> Self;

    /// Whether `principal` is currently authorized
    fn is_authorized(&self, principal: &Principal) -> bool;

    /// Count of current members
    fn size(&self) -> usize;

    /// Current members in a stable order
    fn members(&self) -> Vec<Principal>;

    /// The administrator, if this variant has one
    fn administrator(&self) -> Option<&Principal> {
        None
    }

    /// Apply a membership change that has already been validated and journaled
    ///
    /// Variants without mutable membership reject every change as corruption.
    fn apply_membership(&mut self, change: &MembershipChange)
        -> std::result::Result<(), JournalError>;
}

/// Membership mutation, restricted to the administrator
pub trait AdministrableRegistry: PrincipalRegistry {
    /// Whether `principal` is the administrator
    fn is_administrator(&self, principal: &Principal) -> bool;

    /// Check that `caller` may add `principal`, without mutating
    fn ensure_can_add(&self, caller: &Principal, principal: &Principal) -> Result<()>;

    /// Check that `caller` may remove `principal`, without mutating
    fn ensure_can_remove(&self, caller: &Principal, principal: &Principal) -> Result<()>;
}
