//! Administrable registry
//!
//! The creator becomes the administrator and is always a member. Only the
//! administrator may add or remove members, and it cannot remove itself.
//! Removing a member does not touch approvals that member already recorded.

use std::collections::BTreeSet;

use custodia_common::{AccessError, JournalError, Principal, RegistryError, Result};

use super::{AdministrableRegistry, MembershipChange, PrincipalRegistry};
use crate::policy::PolicyVariant;

/// Member set mutable by a single administrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRegistry {
    administrator: Principal,
    members: BTreeSet<Principal>,
}

impl AdminRegistry {
    /// Create a registry administered by `administrator`
    pub fn new(administrator: Principal, initial: impl IntoIterator<Item = Principal>) -> Self {
        let mut members: BTreeSet<Principal> = initial.into_iter().collect();
        members.insert(administrator.clone());
        Self {
            administrator,
            members,
        }
    }

    fn ensure_admin(&self, caller: &Principal, operation: &'static str) -> Result<()> {
        if !self.is_administrator(caller) {
            return Err(AccessError::NotAdministrator {
                caller: caller.clone(),
                operation,
            }
            .into());
        }
        Ok(())
    }
}

impl PrincipalRegistry for AdminRegistry {
    const VARIANT: PolicyVariant = PolicyVariant::Extended;

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

    fn administrator(&self) -> Option<&Principal> {
        Some(&self.administrator)
    }

    fn apply_membership(
        &mut self,
        change: &MembershipChange,
    ) -> std::result::Result<(), JournalError> {
        match change {
            MembershipChange::Added(principal) => {
                self.members.insert(principal.clone());
            }
            MembershipChange::Removed(principal) => {
                if principal == &self.administrator {
                    return Err(JournalError::Corrupted {
                        entry: 0,
                        reason: format!("removal of administrator {}", principal),
                    });
                }
                self.members.remove(principal);
            }
        }
        Ok(())
    }
}

impl AdministrableRegistry for AdminRegistry {
    fn is_administrator(&self, principal: &Principal) -> bool {
        &self.administrator == principal
    }

    fn ensure_can_add(&self, caller: &Principal, principal: &Principal) -> Result<()> {
        self.ensure_admin(caller, "add_member")?;
        if self.members.contains(principal) {
            return Err(RegistryError::AlreadyMember(principal.clone()).into());
        }
        Ok(())
    }

    fn ensure_can_remove(&self, caller: &Principal, principal: &Principal) -> Result<()> {
        self.ensure_admin(caller, "remove_member")?;
        if principal == &self.administrator {
            return Err(RegistryError::CannotRemoveAdministrator(principal.clone()).into());
        }
        if !self.members.contains(principal) {
            return Err(RegistryError::NotMember(principal.clone()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodia_common::CustodiaError;

    fn registry() -> AdminRegistry {
        AdminRegistry::new("0xadmin".into(), vec!["0xp1".into(), "0xp2".into()])
    }

    #[test]
    fn test_administrator_auto_included() {
        let registry = registry();
        assert_eq!(registry.size(), 3);
        assert!(registry.is_authorized(&"0xadmin".into()));
        assert_eq!(registry.administrator(), Some(&Principal::new("0xadmin")));
    }

    /// Validate then apply, the way the ledger commits a membership change
    fn add(registry: &mut AdminRegistry, caller: &str, principal: &str) -> Result<()> {
        registry.ensure_can_add(&caller.into(), &principal.into())?;
        registry.apply_membership(&MembershipChange::Added(principal.into()))?;
        Ok(())
    }

    fn remove(registry: &mut AdminRegistry, caller: &str, principal: &str) -> Result<()> {
        registry.ensure_can_remove(&caller.into(), &principal.into())?;
        registry.apply_membership(&MembershipChange::Removed(principal.into()))?;
        Ok(())
    }

    #[test]
    fn test_add_member() {
        let mut registry = registry();
        add(&mut registry, "0xadmin", "0xp3").unwrap();
        assert_eq!(registry.size(), 4);
        assert!(registry.is_authorized(&"0xp3".into()));
    }

    #[test]
    fn test_add_existing_member_rejected() {
        let mut registry = registry();
        let err = add(&mut registry, "0xadmin", "0xp1").unwrap_err();
        assert!(matches!(
            err,
            CustodiaError::Registry(RegistryError::AlreadyMember(_))
        ));
        assert_eq!(registry.size(), 3);
    }

    #[test]
    fn test_remove_member() {
        let mut registry = registry();
        remove(&mut registry, "0xadmin", "0xp1").unwrap();
        assert!(!registry.is_authorized(&"0xp1".into()));
        assert_eq!(registry.size(), 2);
    }

    #[test]
    fn test_remove_non_member_rejected() {
        let mut registry = registry();
        let err = remove(&mut registry, "0xadmin", "0xp9").unwrap_err();
        assert!(matches!(err, CustodiaError::Registry(RegistryError::NotMember(_))));
    }

    #[test]
    fn test_administrator_cannot_remove_self() {
        let mut registry = registry();
        let err = remove(&mut registry, "0xadmin", "0xadmin").unwrap_err();
        assert!(matches!(
            err,
            CustodiaError::Registry(RegistryError::CannotRemoveAdministrator(_))
        ));
        assert!(registry.is_authorized(&"0xadmin".into()));
    }

    #[test]
    fn test_only_administrator_mutates() {
        let mut registry = registry();
        assert!(add(&mut registry, "0xp1", "0xp3").unwrap_err().is_unauthorized());
        assert!(remove(&mut registry, "0xp3", "0xp2").unwrap_err().is_unauthorized());
        assert_eq!(registry.size(), 3);
    }
}
