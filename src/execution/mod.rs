// src/execution/mod.rs

//! Executions: the tokens moving through a process model.
//!
//! An [`Execution`] is plain data stored in the engine's registry; every
//! operation that reads or changes the tree (fork, join, merge, terminate,
//! variable scoping) is implemented on [`crate::engine::Engine`] and
//! addresses executions by [`ExecutionId`]. Parent and child links are ids
//! as well, so no execution ever borrows another.

mod access;
mod flow;
mod tree;
mod variables;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::sync::{ExecutionSnapshot, SyncState};
use crate::model::ProcessModel;
use crate::types::{ExecutionId, Variables};

pub use access::ExecutionAccess;

/// Orthogonal state flags of an execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionFlags {
    pub active: bool,
    pub waiting: bool,
    pub concurrent: bool,
    pub terminated: bool,
    pub scope: bool,
    pub scope_root: bool,
}

#[derive(Debug)]
pub struct Execution {
    id: ExecutionId,
    parent: Option<ExecutionId>,
    children: Vec<ExecutionId>,
    model: Arc<ProcessModel>,
    flags: ExecutionFlags,
    node: Option<String>,
    transition: Option<String>,
    variables: Variables,
    timestamp: DateTime<Utc>,
    sync_state: SyncState,
    sync_data: Option<ExecutionSnapshot>,
}

impl Execution {
    /// New process instance: an active scope root without a parent.
    pub(crate) fn new_root(model: Arc<ProcessModel>) -> Self {
        Self::new(
            None,
            model,
            ExecutionFlags {
                active: true,
                scope: true,
                scope_root: true,
                ..ExecutionFlags::default()
            },
        )
    }

    pub(crate) fn new(
        parent: Option<ExecutionId>,
        model: Arc<ProcessModel>,
        flags: ExecutionFlags,
    ) -> Self {
        Self {
            id: ExecutionId::new(),
            parent,
            children: Vec::new(),
            model,
            flags,
            node: None,
            transition: None,
            variables: Variables::new(),
            timestamp: Utc::now(),
            sync_state: SyncState::Unchanged,
            sync_data: None,
        }
    }

    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn parent_id(&self) -> Option<ExecutionId> {
        self.parent
    }

    pub fn children(&self) -> &[ExecutionId] {
        &self.children
    }

    pub fn model(&self) -> &Arc<ProcessModel> {
        &self.model
    }

    pub fn flags(&self) -> ExecutionFlags {
        self.flags
    }

    pub fn node(&self) -> Option<&str> {
        self.node.as_deref()
    }

    pub fn transition(&self) -> Option<&str> {
        self.transition.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync_state
    }

    /// Snapshot recorded the last time this execution was synchronised.
    pub fn sync_data(&self) -> Option<&ExecutionSnapshot> {
        self.sync_data.as_ref()
    }

    /// Variables stored directly on this execution (empty unless it is a scope).
    pub fn variables_local(&self) -> &Variables {
        &self.variables
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    pub fn is_active(&self) -> bool {
        self.flags.active
    }

    pub fn is_waiting(&self) -> bool {
        self.flags.waiting
    }

    pub fn is_concurrent(&self) -> bool {
        self.flags.concurrent
    }

    pub fn is_terminated(&self) -> bool {
        self.flags.terminated
    }

    pub fn is_scope(&self) -> bool {
        self.flags.scope
    }

    pub fn is_scope_root(&self) -> bool {
        self.flags.scope_root
    }

    /// Bump the last-activity time; never moves backwards.
    pub(crate) fn touch(&mut self) {
        let now = Utc::now();
        if now > self.timestamp {
            self.timestamp = now;
        }
    }

    /// Flag for the next sync pass; a pending removal is never downgraded.
    pub(crate) fn mark_modified(&mut self) {
        if self.sync_state != SyncState::Removed {
            self.sync_state = SyncState::Modified;
        }
    }

    pub(crate) fn set_sync(&mut self, state: SyncState, data: Option<ExecutionSnapshot>) {
        self.sync_state = state;
        if data.is_some() {
            self.sync_data = data;
        }
    }

    pub(crate) fn flags_mut(&mut self) -> &mut ExecutionFlags {
        &mut self.flags
    }

    pub(crate) fn set_node(&mut self, node: Option<String>) {
        self.node = node;
    }

    pub(crate) fn set_transition(&mut self, transition: Option<String>) {
        self.transition = transition;
    }

    pub(crate) fn set_parent(&mut self, parent: Option<ExecutionId>) {
        self.parent = parent;
    }

    pub(crate) fn children_mut(&mut self) -> &mut Vec<ExecutionId> {
        &mut self.children
    }

    pub(crate) fn variables_mut(&mut self) -> &mut Variables {
        &mut self.variables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_starts_as_active_scope_root() {
        let exec = Execution::new_root(Arc::new(ProcessModel::new("P")));
        assert!(exec.is_root());
        assert!(exec.is_active());
        assert!(exec.is_scope());
        assert!(exec.is_scope_root());
        assert!(!exec.is_waiting());
        assert!(!exec.is_concurrent());
        assert!(exec.node().is_none());
        assert_eq!(exec.sync_state(), SyncState::Unchanged);
    }

    #[test]
    fn removal_is_not_downgraded_by_later_modification() {
        let mut exec = Execution::new_root(Arc::new(ProcessModel::new("P")));
        exec.mark_modified();
        assert_eq!(exec.sync_state(), SyncState::Modified);

        exec.set_sync(SyncState::Removed, None);
        exec.mark_modified();
        assert_eq!(exec.sync_state(), SyncState::Removed);
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut exec = Execution::new_root(Arc::new(ProcessModel::new("P")));
        let before = exec.timestamp();
        exec.touch();
        assert!(exec.timestamp() >= before);
    }
}
