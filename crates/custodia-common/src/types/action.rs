//! Action - A proposed operation awaiting quorum
//!
//! Every submission to a ledger produces one Action. It carries:
//! - The opaque call (target, value, payload) handed to the executor
//! - The threshold snapshotted at submission time
//! - The set of principals currently approving it
//! - The terminal `executed` flag

use std::collections::BTreeSet;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::principal::{ActionId, Principal};

/// Proposed operation and its approval record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Sequence number in the owning ledger
    pub id: ActionId,

    /// Principal that submitted the action
    pub proposer: Principal,

    /// Destination identifier
    pub target: Principal,

    /// Amount to transfer
    pub value: u128,

    /// Call data for the executor
    #[serde(with = "hex_payload")]
    pub payload: Bytes,

    /// Threshold in force when the action was submitted
    pub required_approvals: u32,

    /// Principals with an active approval
    pub approvals: BTreeSet<Principal>,

    /// Terminal once true
    pub executed: bool,

    /// Reserved for explicit rejection; no operation sets it
    pub denied: bool,

    /// Submission timestamp (Unix milliseconds)
    pub submitted_at: i64,

    /// Execution timestamp (Unix milliseconds)
    pub executed_at: Option<i64>,
}

/// Serde helper storing payloads as hex strings
pub mod hex_payload {
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        hex::decode(encoded)
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

impl Action {
    /// Create a pending action with no approvals
    pub fn new(
        id: ActionId,
        proposer: Principal,
        target: Principal,
        value: u128,
        payload: Bytes,
        required_approvals: u32,
        submitted_at: i64,
    ) -> Self {
        Self {
            id,
            proposer,
            target,
            value,
            payload,
            required_approvals,
            approvals: BTreeSet::new(),
            executed: false,
            denied: false,
            submitted_at,
            executed_at: None,
        }
    }

    /// Number of active approvals
    #[inline]
    pub fn approval_count(&self) -> usize {
        self.approvals.len()
    }

    /// Whether `principal` currently approves this action
    pub fn is_approved_by(&self, principal: &Principal) -> bool {
        self.approvals.contains(principal)
    }

    /// Whether the snapshotted threshold is satisfied
    pub fn has_quorum(&self) -> bool {
        self.approvals.len() >= self.required_approvals as usize
    }

    /// Pending actions still accept approvals and revocations
    #[inline]
    pub fn is_pending(&self) -> bool {
        !self.executed
    }

    /// Content digest over (id, target, value, payload)
    ///
    /// Stable across approvals, so it identifies the proposed call itself.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.id.0.to_le_bytes());
        hasher.update(self.target.as_str().as_bytes());
        hasher.update(&[0u8]);
        hasher.update(&self.value.to_le_bytes());
        hasher.update(&self.payload);
        *hasher.finalize().as_bytes()
    }

    /// Hex form of [`Action::digest`]
    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest())
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Action#{}(target={}, value={}, approvals={}/{}, executed={})",
            self.id,
            self.target,
            self.value,
            self.approvals.len(),
            self.required_approvals,
            self.executed
        )
    }
}
