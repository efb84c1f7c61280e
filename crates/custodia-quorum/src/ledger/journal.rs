//! Append-only journal for ledger durability
//!
//! Every committed mutation is appended as a [`LedgerEvent`] before the
//! in-memory state changes. Replaying a journal from the first entry rebuilds
//! the exact ledger state, so reads after a restart reflect the last
//! committed mutation.
//!
//! Two backends are provided:
//! - [`MemoryJournal`]: process-local, cloneable handle
//! - [`FileJournal`]: JSON lines, each prefixed with a blake3 checksum

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use custodia_common::types::action::hex_payload;
use custodia_common::{ActionId, JournalError, Principal};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::policy::PolicyVariant;
use crate::registry::MembershipChange;

/// Events stored in the journal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    /// First entry of every journal
    LedgerCreated {
        variant: PolicyVariant,
        creator: Principal,
        members: Vec<Principal>,
        threshold: u32,
        timestamp: i64,
    },
    /// New pending action
    ActionSubmitted {
        action_id: ActionId,
        proposer: Principal,
        target: Principal,
        value: u128,
        #[serde(with = "hex_payload")]
        payload: Bytes,
        required_approvals: u32,
        timestamp: i64,
    },
    /// Principal approved an action
    ApprovalGranted {
        action_id: ActionId,
        principal: Principal,
        timestamp: i64,
    },
    /// Principal withdrew its approval
    ApprovalRevoked {
        action_id: ActionId,
        principal: Principal,
        timestamp: i64,
    },
    /// Executor confirmed the action
    ActionExecuted {
        action_id: ActionId,
        executor: Principal,
        timestamp: i64,
    },
    /// Administrator changed membership
    MembershipChanged {
        change: MembershipChange,
        timestamp: i64,
    },
    /// Administrator changed the threshold for future submissions
    ThresholdChanged { old: u32, new: u32, timestamp: i64 },
}

impl LedgerEvent {
    /// Short name used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerEvent::LedgerCreated { .. } => "LedgerCreated",
            LedgerEvent::ActionSubmitted { .. } => "ActionSubmitted",
            LedgerEvent::ApprovalGranted { .. } => "ApprovalGranted",
            LedgerEvent::ApprovalRevoked { .. } => "ApprovalRevoked",
            LedgerEvent::ActionExecuted { .. } => "ActionExecuted",
            LedgerEvent::MembershipChanged { .. } => "MembershipChanged",
            LedgerEvent::ThresholdChanged { .. } => "ThresholdChanged",
        }
    }
}

/// Durable, ordered event log
#[cfg_attr(test, mockall::automock)]
pub trait Journal: Send + Sync {
    /// Append an event, returning its entry index
    fn append(&self, event: &LedgerEvent) -> Result<u64, JournalError>;

    /// All events in append order
    fn replay(&self) -> Result<Vec<LedgerEvent>, JournalError>;

    /// Number of committed entries
    fn len(&self) -> Result<u64, JournalError>;

    fn is_empty(&self) -> Result<bool, JournalError> {
        Ok(self.len()? == 0)
    }
}

/// In-memory journal
///
/// Clones share the same log, so a test can keep a handle while a ledger
/// writes to it and later restore a second ledger from it.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    entries: Arc<Mutex<Vec<LedgerEvent>>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Journal for MemoryJournal {
    fn append(&self, event: &LedgerEvent) -> Result<u64, JournalError> {
        let mut entries = self.entries.lock();
        entries.push(event.clone());
        Ok(entries.len() as u64 - 1)
    }

    fn replay(&self) -> Result<Vec<LedgerEvent>, JournalError> {
        Ok(self.entries.lock().clone())
    }

    fn len(&self) -> Result<u64, JournalError> {
        Ok(self.entries.lock().len() as u64)
    }
}

/// File-backed journal
///
/// Line format: `<blake3 hex of json> <json>\n`. Appends are flushed and
/// synced before returning. A failed append truncates the file back to its
/// last committed length, and an unterminated final line found on open is an
/// interrupted append that is discarded.
pub struct FileJournal {
    path: PathBuf,
    inner: Mutex<FileJournalInner>,
}

struct FileJournalInner {
    file: File,
    next_entry: u64,
    /// Byte length covered by committed entries
    committed_len: u64,
    #[cfg(test)]
    fail_sync: bool,
}

impl FileJournalInner {
    fn write_line(&mut self, line: &[u8]) -> std::io::Result<()> {
        self.file.write_all(line)?;
        self.file.flush()?;
        #[cfg(test)]
        if self.fail_sync {
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "sync failed"));
        }
        self.file.sync_data()
    }
}

impl FileJournal {
    /// Open or create the journal at `path`, verifying existing entries
    #[instrument]
    pub fn open(path: &Path) -> Result<Self, JournalError> {
        let (existing, committed_len) = if path.exists() {
            let committed = read_entries(path)?;
            (committed.events.len() as u64, committed.len)
        } else {
            (0, 0)
        };

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() > committed_len {
            file.set_len(committed_len)?;
            file.sync_data()?;
            warn!(path = %path.display(), committed_len, "Discarded interrupted journal append");
        }

        info!(path = %path.display(), entries = existing, "Opened ledger journal");

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(FileJournalInner {
                file,
                next_entry: existing,
                committed_len,
                #[cfg(test)]
                fail_sync: false,
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Journal for FileJournal {
    fn append(&self, event: &LedgerEvent) -> Result<u64, JournalError> {
        let json = serde_json::to_string(event)?;
        let checksum = blake3::hash(json.as_bytes());

        let mut inner = self.inner.lock();
        let line = format!("{} {}\n", checksum.to_hex(), json);
        if let Err(e) = inner.write_line(line.as_bytes()) {
            let committed_len = inner.committed_len;
            if let Err(truncate) = inner.file.set_len(committed_len) {
                error!(error = %truncate, committed_len, "Journal rollback failed");
            }
            return Err(e.into());
        }

        let entry = inner.next_entry;
        inner.next_entry += 1;
        inner.committed_len += line.len() as u64;

        debug!(entry, kind = event.kind(), "Journal entry appended");
        Ok(entry)
    }

    fn replay(&self) -> Result<Vec<LedgerEvent>, JournalError> {
        // Hold the lock so no append interleaves with the read
        let _guard = self.inner.lock();
        Ok(read_entries(&self.path)?.events)
    }

    fn len(&self) -> Result<u64, JournalError> {
        Ok(self.inner.lock().next_entry)
    }
}

struct Committed {
    events: Vec<LedgerEvent>,
    /// Bytes up to the end of the last newline-terminated line
    len: u64,
}

fn read_entries(path: &Path) -> Result<Committed, JournalError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut committed = Committed {
        events: Vec::new(),
        len: 0,
    };
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let read = reader.read_until(b'\n', &mut buf)?;
        if read == 0 {
            break;
        }
        if buf.last() != Some(&b'\n') {
            warn!(bytes = read, "Ignoring unterminated journal tail");
            break;
        }

        let entry = committed.events.len() as u64;
        let line = std::str::from_utf8(&buf).map_err(|e| JournalError::Corrupted {
            entry,
            reason: e.to_string(),
        })?;
        if !line.trim().is_empty() {
            committed.events.push(parse_line(entry, line.trim_end_matches('\n'))?);
        }
        committed.len += read as u64;
    }

    Ok(committed)
}

fn parse_line(entry: u64, line: &str) -> Result<LedgerEvent, JournalError> {
    let (checksum, json) = line.split_once(' ').ok_or_else(|| JournalError::Corrupted {
        entry,
        reason: "missing checksum separator".to_string(),
    })?;

    let actual = blake3::hash(json.as_bytes());
    if actual.to_hex().as_str() != checksum {
        return Err(JournalError::Corrupted {
            entry,
            reason: format!("checksum mismatch: expected {}, got {}", checksum, actual.to_hex()),
        });
    }

    serde_json::from_str(json).map_err(|e| JournalError::Corrupted {
        entry,
        reason: e.to_string(),
    })
}
