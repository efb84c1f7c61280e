//! Policy variants - how a registry and a threshold policy bind to one ledger
//!
//! - [`FixedWallet`]: members and threshold frozen at creation
//! - [`ExtendedWallet`]: an administrator manages members and the threshold
//!
//! Both are the same [`QuorumLedger`]; only the registry type differs, and the
//! administrative operations exist only where the registry is administrable.

use custodia_common::{Principal, Result};
use serde::{Deserialize, Serialize};

use crate::ledger::{LedgerBuilder, QuorumLedger};
use crate::registry::{AdminRegistry, FixedRegistry};

/// Which policy a ledger was created with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyVariant {
    Fixed,
    Extended,
}

impl std::fmt::Display for PolicyVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyVariant::Fixed => write!(f, "fixed"),
            PolicyVariant::Extended => write!(f, "extended"),
        }
    }
}

/// Fixed-membership wallet
pub type FixedWallet = QuorumLedger<FixedRegistry>;

/// Administrable wallet
pub type ExtendedWallet = QuorumLedger<AdminRegistry>;

impl QuorumLedger<FixedRegistry> {
    /// Create a fixed wallet with default collaborators
    ///
    /// `creator` is added to `owners` if missing.
    pub fn new(creator: Principal, owners: Vec<Principal>, threshold: u32) -> Result<Self> {
        LedgerBuilder::new().create(creator, owners, threshold)
    }
}

impl QuorumLedger<AdminRegistry> {
    /// Create an extended wallet administered by `admin`, with default collaborators
    ///
    /// The administrator is added to `members` automatically.
    pub fn new(admin: Principal, members: Vec<Principal>, threshold: u32) -> Result<Self> {
        LedgerBuilder::new().create(admin, members, threshold)
    }
}
