// src/engine/core.rs

//! The engine: command queue, execution registry and reconciliation.
//!
//! All state changes run as [`Command`]s drained from a single priority
//! queue. Draining is re-entrant: a running command may push more commands
//! (they are queued and picked up by the same drain) or even call
//! [`Engine::execute_command`] to run something to completion right away.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, info, trace, warn};

use crate::engine::command::Command;
use crate::engine::events::{ProcessEvent, ProcessListener};
use crate::engine::queue::{CommandQueue, QueuedCommand};
use crate::engine::sync::{ExecutionSnapshot, NoSync, SyncListener, SyncState};
use crate::errors::{ProcessError, Result};
use crate::execution::Execution;
use crate::model::ProcessModel;
use crate::types::{Delegation, ExecutionId, Variables};

pub struct Engine {
    queue: CommandQueue,
    executions: HashMap<ExecutionId, Execution>,
    /// Registered since the last sync pass.
    created: Vec<ExecutionId>,
    depth: usize,
    /// Commands executed at the current depth.
    executed: usize,
    total_executed: u64,
    listeners: Vec<Box<dyn ProcessListener>>,
    sync: Box<dyn SyncListener>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            queue: CommandQueue::new(),
            executions: HashMap::new(),
            created: Vec::new(),
            depth: 0,
            executed: 0,
            total_executed: 0,
            listeners: Vec::new(),
            sync: Box::new(NoSync),
        }
    }

    pub fn with_sync_listener(mut self, listener: impl SyncListener + 'static) -> Self {
        self.sync = Box::new(listener);
        self
    }

    pub fn add_listener(&mut self, listener: impl ProcessListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Current re-entrancy depth; `0` when no drain is running.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn commands_executed(&self) -> u64 {
        self.total_executed
    }

    pub fn pending_commands(&self) -> usize {
        self.queue.len()
    }

    pub fn execution_count(&self) -> usize {
        self.executions.len()
    }

    pub fn executions(&self) -> impl Iterator<Item = &Execution> {
        self.executions.values()
    }

    // ---------------------------------------------------------------------
    // Commands
    // ---------------------------------------------------------------------

    /// Queue a command. Outside of a drain this drains the queue to empty and
    /// then reconciles execution state.
    pub fn push_command(&mut self, command: Command) -> Result<()> {
        self.queue.push(command);
        if self.depth > 0 {
            return Ok(());
        }
        self.perform_execution(|engine| engine.drain())
    }

    /// Queue a command and run it to completion before returning.
    ///
    /// - Commands ahead of it with at least the same priority run first.
    /// - The command runs in an isolated scope: everything it queues is
    ///   drained before this returns, while the rest of the outer queue is
    ///   set aside and restored afterwards.
    /// - At the top level the restored queue is drained as well.
    pub fn execute_command(&mut self, command: Command) -> Result<Option<ExecutionId>> {
        let priority = command.priority();
        let ticket = self.queue.push(command);

        self.perform_execution(|engine| {
            let result = engine.run_until(ticket, priority);
            if result.is_err() {
                engine.queue.remove(ticket);
            }
            let value = result?;
            if engine.depth == 1 {
                engine.drain()?;
            }
            Ok(value)
        })
    }

    pub fn create_execute_node_command(&self, execution: ExecutionId, node: &str) -> Command {
        Command::ExecuteNode {
            execution,
            node: node.to_string(),
        }
    }

    pub fn create_signal_command(
        &self,
        execution: ExecutionId,
        signal: Option<&str>,
        variables: Variables,
        delegation: Delegation,
    ) -> Command {
        Command::SignalExecution {
            execution,
            signal: signal.map(str::to_string),
            variables,
            delegation,
        }
    }

    pub fn create_take_transition_command(
        &self,
        execution: ExecutionId,
        transition: Option<&str>,
    ) -> Command {
        Command::TakeTransition {
            execution,
            transition: transition.map(str::to_string),
        }
    }

    /// Start a process at its single initial node and run until it settles.
    pub fn start_process(
        &mut self,
        model: Arc<ProcessModel>,
        variables: Variables,
    ) -> Result<ExecutionId> {
        let initial = model.find_initial_nodes();
        if initial.len() != 1 {
            return Err(ProcessError::NoSingleStartNode {
                process: model.title().to_string(),
            });
        }
        let start = initial[0].id().to_string();
        self.start_process_at(model, &start, variables)
    }

    pub fn start_process_at(
        &mut self,
        model: Arc<ProcessModel>,
        start_node: &str,
        variables: Variables,
    ) -> Result<ExecutionId> {
        let command = Command::StartProcess {
            model,
            start_node: start_node.to_string(),
            variables,
        };
        self.execute_command(command)?
            .ok_or_else(|| ProcessError::Other(anyhow!("start process did not yield an execution")))
    }

    pub(crate) fn run_start_process(
        &mut self,
        model: Arc<ProcessModel>,
        start_node: &str,
        variables: Variables,
    ) -> Result<ExecutionId> {
        model.find_node(start_node)?;

        let mut root = Execution::new_root(Arc::clone(&model));
        root.variables_mut()
            .extend(variables.into_iter().filter(|(_, v)| !v.is_null()));

        let id = self.register_execution(root);
        info!(process = %id, title = %model.title(), node = %start_node, "process started");

        self.notify(ProcessEvent::StartProcess {
            execution: id,
            node: start_node.to_string(),
        });
        self.execute(id, start_node)?;
        Ok(id)
    }

    fn perform_execution<T>(&mut self, work: impl FnOnce(&mut Engine) -> Result<T>) -> Result<T> {
        self.depth += 1;
        let depth = self.depth;
        let outer_executed = std::mem::replace(&mut self.executed, 0);
        debug!(depth, "BEGIN execution");

        let result = work(self);

        debug!(depth, executed = self.executed, "END execution");
        self.executed = outer_executed;
        self.depth -= 1;

        if self.depth == 0 {
            if let Err(err) = &result {
                let discarded = self.queue.clear();
                if discarded > 0 {
                    warn!(discarded, error = %err, "drain failed; discarding queued commands");
                }
            }
            self.sync_executions();
        }

        result
    }

    fn drain(&mut self) -> Result<()> {
        while let Some(entry) = self.queue.pop() {
            self.run(entry)?;
        }
        Ok(())
    }

    fn run_until(&mut self, ticket: u64, priority: i32) -> Result<Option<ExecutionId>> {
        while let Some(entry) = self.queue.pop_at_least(priority) {
            if entry.ticket != ticket {
                self.run(entry)?;
                continue;
            }

            let outer = self.queue.take();
            let result = self.run(entry).and_then(|value| {
                self.drain()?;
                Ok(value)
            });
            let leftovers = self.queue.restore(outer);
            if leftovers > 0 {
                warn!(leftovers, "discarding commands left behind by a failed command");
            }
            return result;
        }

        Err(ProcessError::Other(anyhow!(
            "command #{ticket} is no longer queued"
        )))
    }

    fn run(&mut self, entry: QueuedCommand) -> Result<Option<ExecutionId>> {
        trace!(
            ticket = entry.ticket,
            priority = entry.priority,
            command = entry.command.name(),
            execution = ?entry.command.execution(),
            depth = self.depth,
            "executing command"
        );
        self.executed += 1;
        self.total_executed += 1;
        entry.command.execute(self)
    }

    pub(crate) fn notify(&mut self, event: ProcessEvent) {
        for listener in self.listeners.iter_mut() {
            listener.notify(&event);
        }
    }

    // ---------------------------------------------------------------------
    // Registry
    // ---------------------------------------------------------------------

    pub fn find_execution(&self, id: ExecutionId) -> Result<&Execution> {
        self.executions
            .get(&id)
            .ok_or(ProcessError::ExecutionNotFound(id))
    }

    pub(crate) fn find_execution_mut(&mut self, id: ExecutionId) -> Result<&mut Execution> {
        self.executions
            .get_mut(&id)
            .ok_or(ProcessError::ExecutionNotFound(id))
    }

    /// Add a new execution; re-registering a known id is a no-op.
    pub(crate) fn register_execution(&mut self, execution: Execution) -> ExecutionId {
        let id = execution.id();
        if self.executions.contains_key(&id) {
            return id;
        }

        self.executions.insert(id, execution);
        let snapshot = self.collect_snapshot(id).ok();
        if let Some(exec) = self.executions.get_mut(&id) {
            exec.set_sync(SyncState::Unchanged, snapshot);
        }
        self.created.push(id);
        trace!(execution = %id, "execution registered");
        id
    }

    /// Fresh snapshot of a registered execution.
    pub fn collect_snapshot(&self, id: ExecutionId) -> Result<ExecutionSnapshot> {
        let exec = self.find_execution(id)?;
        Ok(ExecutionSnapshot {
            id,
            parent_id: exec.parent_id(),
            process_id: self.root_execution(id)?,
            model_id: exec.model().id(),
            flags: exec.flags(),
            depth: self.execution_depth(id)?,
            timestamp: exec.timestamp(),
            variables: exec.variables_local().clone(),
            node: exec.node().map(str::to_string),
            transition: exec.transition().map(str::to_string),
        })
    }

    /// Reconciliation pass: report changes to the sync listener, evict removed
    /// executions and reset every sync flag.
    pub(crate) fn sync_executions(&mut self) {
        let created: Vec<ExecutionId> = std::mem::take(&mut self.created);
        for id in &created {
            if let Ok(snapshot) = self.collect_snapshot(*id) {
                self.sync.created(&snapshot);
            }
        }

        let mut modified = Vec::new();
        let mut removed = Vec::new();
        for exec in self.executions.values() {
            match exec.sync_state() {
                SyncState::Modified => modified.push(exec.id()),
                SyncState::Removed => removed.push(exec.id()),
                SyncState::Unchanged => {}
            }
        }

        for id in &modified {
            let Ok(snapshot) = self.collect_snapshot(*id) else {
                continue;
            };
            self.sync.modified(&snapshot);
            if let Some(exec) = self.executions.get_mut(id) {
                exec.set_sync(SyncState::Unchanged, Some(snapshot));
            }
        }

        // Snapshot everything first: depth and process id walk through
        // parents that may be evicted in the same pass.
        let finals: Vec<ExecutionSnapshot> = removed
            .iter()
            .filter_map(|id| self.collect_snapshot(*id).ok())
            .collect();
        for id in &removed {
            self.executions.remove(id);
        }
        for snapshot in &finals {
            self.sync.removed(snapshot);
        }

        for exec in self.executions.values_mut() {
            exec.set_sync(SyncState::Unchanged, None);
        }

        if !created.is_empty() || !modified.is_empty() || !removed.is_empty() {
            debug!(
                created = created.len(),
                modified = modified.len(),
                removed = removed.len(),
                live = self.executions.len(),
                "synchronised executions"
            );
        }
    }
}
