// src/engine/sync.rs

//! Change tracking for external persistence.
//!
//! Executions flag themselves `Modified` as they change and `Removed` when
//! terminated. Once per top-level drain the engine reconciles: it hands a
//! fresh [`ExecutionSnapshot`] of every new, modified or removed execution to
//! its [`SyncListener`], evicts removed executions from the registry and
//! resets all flags to `Unchanged`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::execution::ExecutionFlags;
use crate::types::{ExecutionId, Variables};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Unchanged,
    Modified,
    Removed,
}

/// Serializable state of one execution at a sync point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub id: ExecutionId,
    pub parent_id: Option<ExecutionId>,
    pub process_id: ExecutionId,
    pub model_id: Uuid,
    pub flags: ExecutionFlags,
    pub depth: usize,
    pub timestamp: DateTime<Utc>,
    pub variables: Variables,
    pub node: Option<String>,
    pub transition: Option<String>,
}

impl ExecutionSnapshot {
    pub fn is_terminated(&self) -> bool {
        self.flags.terminated
    }

    pub fn is_waiting(&self) -> bool {
        self.flags.waiting
    }

    pub fn is_active(&self) -> bool {
        self.flags.active
    }

    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }
}

/// Persistence hook driven by the reconciliation pass.
///
/// Every method defaults to doing nothing.
pub trait SyncListener {
    fn created(&mut self, _snapshot: &ExecutionSnapshot) {}
    fn modified(&mut self, _snapshot: &ExecutionSnapshot) {}
    /// Called with the final state, right before the execution is evicted.
    fn removed(&mut self, _snapshot: &ExecutionSnapshot) {}
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSync;

impl SyncListener for NoSync {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncOp {
    Created,
    Modified,
    Removed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JournalEntry {
    pub op: SyncOp,
    pub snapshot: ExecutionSnapshot,
}

#[derive(Debug, Default)]
struct JournalState {
    latest: HashMap<ExecutionId, ExecutionSnapshot>,
    entries: Vec<JournalEntry>,
}

/// In-memory persistence mirror.
///
/// Cheap to clone; all clones share the same journal, so one clone can be
/// installed on the engine while another is kept for inspection. The latest
/// snapshot of an execution stays available after it has been evicted.
#[derive(Debug, Clone, Default)]
pub struct MemoryJournal {
    inner: Arc<Mutex<JournalState>>,
}

impl MemoryJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self, id: ExecutionId) -> Option<ExecutionSnapshot> {
        self.lock().latest.get(&id).cloned()
    }

    /// Whether the execution has been reported as removed.
    pub fn is_removed(&self, id: ExecutionId) -> bool {
        self.lock()
            .entries
            .iter()
            .any(|e| e.op == SyncOp::Removed && e.snapshot.id == id)
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.lock().entries.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    fn record(&self, op: SyncOp, snapshot: &ExecutionSnapshot) {
        let mut state = self.lock();
        state.latest.insert(snapshot.id, snapshot.clone());
        state.entries.push(JournalEntry {
            op,
            snapshot: snapshot.clone(),
        });
    }

    fn lock(&self) -> MutexGuard<'_, JournalState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SyncListener for MemoryJournal {
    fn created(&mut self, snapshot: &ExecutionSnapshot) {
        self.record(SyncOp::Created, snapshot);
    }

    fn modified(&mut self, snapshot: &ExecutionSnapshot) {
        self.record(SyncOp::Modified, snapshot);
    }

    fn removed(&mut self, snapshot: &ExecutionSnapshot) {
        self.record(SyncOp::Removed, snapshot);
    }
}
