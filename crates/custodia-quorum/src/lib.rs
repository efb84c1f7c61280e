//! # Custodia Quorum
//!
//! Multi-party authorization engine: a set of principals jointly approves
//! actions before an external executor carries them out.
//!
//! ## Components
//!
//! - **Registry**: who may submit, approve and execute
//! - **Ledger**: the action pool and its approval state machine
//! - **Policy**: fixed and administrator-extended wallet variants
//! - **Journal**: append-only durability with checksummed replay
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                      QuorumLedger<R>                     │
//! ├──────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │  Registry R  │  │   Actions    │  │    Executor    │  │
//! │  │ (Fixed/Admin)│──│  + threshold │──│  (side effect) │  │
//! │  └──────────────┘  └──────┬───────┘  └────────────────┘  │
//! │                           │                              │
//! │                    ┌──────┴───────┐                      │
//! │                    │   Journal    │                      │
//! │                    └──────────────┘                      │
//! └──────────────────────────────────────────────────────────┘
//! ```

pub mod config;
pub mod executor;
pub mod ledger;
pub mod policy;
pub mod registry;

pub use config::{ExecutionPolicy, LedgerConfig};
pub use executor::{ExecutedCall, Executor, ExecutorError, NoopExecutor, RecordingExecutor};
pub use ledger::{FileJournal, Journal, LedgerBuilder, LedgerEvent, MemoryJournal, QuorumLedger};
pub use policy::{ExtendedWallet, FixedWallet, PolicyVariant};
pub use registry::{
    AdminRegistry, AdministrableRegistry, FixedRegistry, MembershipChange, PrincipalRegistry,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
