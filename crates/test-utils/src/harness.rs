use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use tokenflow::engine::{Engine, ExecutionSnapshot, MemoryJournal};
use tokenflow::errors::Result;
use tokenflow::execution::Execution;
use tokenflow::model::ProcessModel;
use tokenflow::types::{Delegation, ExecutionId, Variables};

use crate::recorder::RecordingListener;

/// Engine wrapper for scenario tests.
///
/// Mirrors every sync pass into a [`MemoryJournal`] so executions stay
/// inspectable after they have been evicted, and records every process event.
pub struct TestEngine {
    engine: Engine,
    journal: MemoryJournal,
    events: RecordingListener,
}

impl Default for TestEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TestEngine {
    pub fn new() -> Self {
        let journal = MemoryJournal::new();
        let events = RecordingListener::new();
        let mut engine = Engine::new().with_sync_listener(journal.clone());
        engine.add_listener(events.clone());
        Self {
            engine,
            journal,
            events,
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut Engine {
        &mut self.engine
    }

    pub fn journal(&self) -> &MemoryJournal {
        &self.journal
    }

    pub fn events(&self) -> &RecordingListener {
        &self.events
    }

    pub fn start_process(&mut self, model: ProcessModel, variables: Variables) -> Result<ExecutionId> {
        self.engine.start_process(Arc::new(model), variables)
    }

    pub fn signal(&mut self, id: ExecutionId, signal: Option<&str>, variables: Variables) -> Result<()> {
        self.engine.signal(id, signal, variables, Delegation::new())
    }

    pub fn set_variable(&mut self, id: ExecutionId, name: &str, value: impl Into<Value>) -> Result<()> {
        self.engine.set_variable(id, name, value)
    }

    /// Signal every waiting execution of the process, optionally only those
    /// at `node`. Returns how many were signalled.
    ///
    /// Executions parked on a nested process are skipped; the nested process
    /// resumes them when it ends.
    pub fn signal_all(&mut self, root: ExecutionId, node: Option<&str>) -> Result<usize> {
        let waiting: Vec<ExecutionId> = self
            .process_executions(root)
            .filter(|e| e.is_waiting() && e.children().is_empty())
            .filter(|e| node.is_none_or(|n| e.node() == Some(n)))
            .map(Execution::id)
            .collect();

        let mut signalled = 0;
        for id in waiting {
            let still_waiting = self
                .engine
                .find_execution(id)
                .is_ok_and(|e| e.is_waiting() && !e.is_terminated());
            if still_waiting {
                debug!(execution = %id, "test harness signalling waiting execution");
                self.engine.signal(id, None, Variables::new(), Delegation::new())?;
                signalled += 1;
            }
        }
        Ok(signalled)
    }

    /// Live, active executions of the process parked in a wait state.
    pub fn find_waiting_executions(&self, root: ExecutionId) -> Vec<ExecutionId> {
        self.process_executions(root)
            .filter(|e| e.is_active() && e.is_waiting())
            .map(Execution::id)
            .collect()
    }

    pub fn count_waiting(&self, root: ExecutionId) -> usize {
        self.find_waiting_executions(root).len()
    }

    /// Live concurrent executions of the process.
    pub fn find_concurrent_executions(&self, root: ExecutionId) -> Vec<ExecutionId> {
        self.process_executions(root)
            .filter(|e| e.is_concurrent())
            .map(Execution::id)
            .collect()
    }

    pub fn count_concurrent(&self, root: ExecutionId) -> usize {
        self.find_concurrent_executions(root).len()
    }

    /// Live state, or the last journaled state of an evicted execution.
    pub fn snapshot(&self, id: ExecutionId) -> ExecutionSnapshot {
        self.engine
            .collect_snapshot(id)
            .ok()
            .or_else(|| self.journal.snapshot(id))
            .unwrap_or_else(|| panic!("execution {id} was never seen"))
    }

    pub fn is_terminated(&self, id: ExecutionId) -> bool {
        self.snapshot(id).is_terminated()
    }

    pub fn is_waiting(&self, id: ExecutionId) -> bool {
        self.snapshot(id).is_waiting()
    }

    pub fn is_active(&self, id: ExecutionId) -> bool {
        self.snapshot(id).is_active()
    }

    pub fn node(&self, id: ExecutionId) -> Option<String> {
        self.snapshot(id).node
    }

    /// Variable stored on the execution itself (processes and nested scopes).
    pub fn variable(&self, id: ExecutionId, name: &str) -> Option<Value> {
        self.snapshot(id).variable(name).cloned()
    }

    fn process_executions(&self, root: ExecutionId) -> impl Iterator<Item = &Execution> {
        self.engine.executions().filter(move |e| {
            !e.is_terminated() && self.engine.root_execution(e.id()).is_ok_and(|r| r == root)
        })
    }
}
