// src/execution/tree.rs

//! Tree bookkeeping: creation, termination, re-homing and tree queries.

use std::sync::Arc;

use tracing::{debug, info};

use crate::engine::Engine;
use crate::engine::events::ProcessEvent;
use crate::errors::{ProcessError, Result};
use crate::execution::{Execution, ExecutionFlags};
use crate::model::ProcessModel;
use crate::types::{DELEGATION_EXECUTION, Delegation, ExecutionId, Variables};

impl Engine {
    /// Registered execution that has not been terminated.
    pub(crate) fn live(&self, id: ExecutionId) -> Result<&Execution> {
        let exec = self.find_execution(id)?;
        if exec.is_terminated() {
            return Err(ProcessError::Terminated(id));
        }
        Ok(exec)
    }

    pub(crate) fn live_mut(&mut self, id: ExecutionId) -> Result<&mut Execution> {
        let exec = self.find_execution_mut(id)?;
        if exec.is_terminated() {
            return Err(ProcessError::Terminated(id));
        }
        Ok(exec)
    }

    pub fn is_terminated(&self, id: ExecutionId) -> Result<bool> {
        Ok(self.find_execution(id)?.is_terminated())
    }

    pub fn execution_model(&self, id: ExecutionId) -> Result<Arc<ProcessModel>> {
        Ok(Arc::clone(self.find_execution(id)?.model()))
    }

    /// Id of the node the execution is positioned at.
    pub fn current_node(&self, id: ExecutionId) -> Result<String> {
        self.find_execution(id)?
            .node()
            .map(str::to_string)
            .ok_or_else(|| ProcessError::NodeNotFound(format!("<no current node of {id}>")))
    }

    pub fn set_active(&mut self, id: ExecutionId, active: bool) -> Result<()> {
        let exec = self.find_execution_mut(id)?;
        exec.flags_mut().active = active;
        exec.mark_modified();
        Ok(())
    }

    /// Flag for the next sync pass; `deep` also flags all descendants.
    pub fn mark_modified(&mut self, id: ExecutionId, deep: bool) -> Result<()> {
        let children = {
            let exec = self.find_execution_mut(id)?;
            exec.mark_modified();
            exec.children().to_vec()
        };
        if deep {
            for child in children {
                self.mark_modified(child, true)?;
            }
        }
        Ok(())
    }

    /// Fork a child on the same model, positioned at the parent's node.
    pub fn create_execution(&mut self, parent: ExecutionId, concurrent: bool) -> Result<ExecutionId> {
        let (model, node) = {
            let exec = self.live(parent)?;
            (Arc::clone(exec.model()), exec.node().map(str::to_string))
        };

        let mut child = Execution::new(
            Some(parent),
            model,
            ExecutionFlags {
                active: true,
                concurrent,
                ..ExecutionFlags::default()
            },
        );
        child.set_node(node);
        let id = self.attach_child(parent, child)?;

        debug!(execution = %id, parent = %parent, concurrent, "created child execution");
        Ok(id)
    }

    /// Child scope running another process model.
    ///
    /// With `is_root_scope` the child owns its variables; otherwise variable
    /// access falls through to the parent's scope root.
    pub fn create_nested_execution(
        &mut self,
        parent: ExecutionId,
        model: Arc<ProcessModel>,
        is_root_scope: bool,
    ) -> Result<ExecutionId> {
        self.live(parent)?;

        let child = Execution::new(
            Some(parent),
            model,
            ExecutionFlags {
                active: true,
                scope: true,
                scope_root: is_root_scope,
                ..ExecutionFlags::default()
            },
        );
        let id = self.attach_child(parent, child)?;

        debug!(execution = %id, parent = %parent, is_root_scope, "created nested execution");
        Ok(id)
    }

    fn attach_child(&mut self, parent: ExecutionId, child: Execution) -> Result<ExecutionId> {
        let id = child.id();
        let exec = self.find_execution_mut(parent)?;
        exec.children_mut().push(id);
        exec.mark_modified();
        Ok(self.register_execution(child))
    }

    /// Insert a new execution between this one and its parent.
    ///
    /// The new execution takes over position, variables and scope flags; this
    /// execution becomes its concurrent, non-scope child. Returns the new
    /// execution's id.
    pub fn introduce_concurrent_root(&mut self, id: ExecutionId, active: bool) -> Result<ExecutionId> {
        let (parent, model, flags, node, transition, variables) = {
            let exec = self.live_mut(id)?;
            (
                exec.parent_id(),
                Arc::clone(exec.model()),
                exec.flags(),
                exec.node().map(str::to_string),
                exec.transition().map(str::to_string),
                std::mem::take(exec.variables_mut()),
            )
        };

        let mut root = Execution::new(
            parent,
            model,
            ExecutionFlags {
                active,
                scope: true,
                scope_root: flags.scope_root || parent.is_none(),
                ..ExecutionFlags::default()
            },
        );
        root.set_node(node);
        root.set_transition(transition);
        *root.variables_mut() = variables;
        root.children_mut().push(id);
        let root_id = root.id();

        if let Some(parent) = parent {
            let exec = self.find_execution_mut(parent)?;
            for child in exec.children_mut().iter_mut() {
                if *child == id {
                    *child = root_id;
                }
            }
            exec.mark_modified();
        }

        {
            let exec = self.find_execution_mut(id)?;
            exec.set_parent(Some(root_id));
            let flags = exec.flags_mut();
            flags.concurrent = true;
            flags.scope = false;
            flags.scope_root = false;
            exec.mark_modified();
        }

        debug!(execution = %id, root = %root_id, "introduced concurrent root");
        Ok(self.register_execution(root))
    }

    /// Move every child of `from` under `to`.
    pub(crate) fn rehome_children(&mut self, from: ExecutionId, to: ExecutionId) -> Result<()> {
        let children = std::mem::take(self.find_execution_mut(from)?.children_mut());
        if children.is_empty() {
            return Ok(());
        }

        for child in &children {
            let exec = self.find_execution_mut(*child)?;
            exec.set_parent(Some(to));
            exec.mark_modified();
        }

        let target = self.find_execution_mut(to)?;
        target.children_mut().extend(children.iter().copied());
        target.mark_modified();

        debug!(from = %from, to = %to, count = children.len(), "re-homed child executions");
        Ok(())
    }

    /// Fold a concurrent execution into its parent: the parent takes over
    /// position and children and becomes active, the execution terminates.
    pub(crate) fn collapse_into_parent(&mut self, id: ExecutionId, parent: ExecutionId) -> Result<()> {
        self.rehome_children(id, parent)?;

        let (node, transition) = {
            let exec = self.find_execution_mut(id)?;
            exec.flags_mut().concurrent = false;
            (exec.node().map(str::to_string), exec.transition().map(str::to_string))
        };

        {
            let exec = self.find_execution_mut(parent)?;
            exec.set_node(node);
            exec.set_transition(transition);
            exec.flags_mut().active = true;
            exec.touch();
            exec.mark_modified();
        }

        debug!(execution = %id, parent = %parent, "merged concurrent execution into parent");
        self.terminate(id, true)
    }

    /// A concurrent branch that just ended leaves its parent stranded when no
    /// concurrent sibling remains; end the parent too.
    pub(crate) fn prune_dead_end(&mut self, id: ExecutionId) -> Result<()> {
        let exec = self.find_execution(id)?;
        let Some(parent) = exec.parent_id() else {
            return Ok(());
        };
        if !exec.is_concurrent() || !self.find_concurrent_executions(id, None)?.is_empty() {
            return Ok(());
        }

        debug!(execution = %id, parent = %parent, "last concurrent branch ended; ending parent");
        self.set_active(parent, true)?;
        self.terminate(parent, true)
    }

    /// Terminate an execution and, without further propagation, all of its
    /// children. Terminating twice is a no-op.
    ///
    /// A root ends its process; otherwise the parent is told about the
    /// termination and may resume (see `child_execution_terminated`).
    pub fn terminate(&mut self, id: ExecutionId, propagate: bool) -> Result<()> {
        let (children, parent) = {
            let exec = self.find_execution_mut(id)?;
            if exec.is_terminated() {
                return Ok(());
            }
            exec.flags_mut().terminated = true;
            exec.touch();
            exec.mark_modified();
            exec.set_sync(crate::engine::sync::SyncState::Removed, None);
            (exec.children().to_vec(), exec.parent_id())
        };

        debug!(execution = %id, propagate, children = children.len(), "terminating execution");

        for child in children {
            if !self.is_terminated(child)? {
                self.terminate(child, false)?;
            }
        }

        match parent {
            None => {
                let node = self.find_execution(id)?.node().map(str::to_string);
                info!(process = %id, node = ?node, "process ended");
                self.notify(ProcessEvent::EndProcess {
                    execution: id,
                    node,
                });
                Ok(())
            }
            Some(parent) => self.child_execution_terminated(parent, id, propagate),
        }
    }

    /// Prune a terminated child from its parent.
    ///
    /// When the last child goes away, the child was a nested scope and
    /// `propagate` is set, a live parent resumes: it is signalled (handing
    /// over the child as the `"execution"` delegation) when waiting, and
    /// leaves its node otherwise.
    fn child_execution_terminated(
        &mut self,
        parent: ExecutionId,
        child: ExecutionId,
        propagate: bool,
    ) -> Result<()> {
        let scope = self.find_execution(child)?.is_scope();

        let (removed, empty, waiting, parent_terminated) = {
            let exec = self.find_execution_mut(parent)?;
            let before = exec.children().len();
            exec.children_mut().retain(|c| *c != child);
            exec.mark_modified();
            (
                before != exec.children().len(),
                exec.children().is_empty(),
                exec.is_waiting(),
                exec.is_terminated(),
            )
        };

        if !(empty && scope && removed && propagate) || parent_terminated {
            return Ok(());
        }

        if waiting {
            debug!(execution = %parent, nested = %child, "nested scope finished; signalling parent");
            let mut delegation = Delegation::new();
            delegation.insert(DELEGATION_EXECUTION.to_string(), child);
            self.signal(parent, None, Variables::new(), delegation)
        } else {
            debug!(execution = %parent, nested = %child, "nested scope finished; parent moves on");
            self.take_all(parent, None, vec![parent])
        }
    }

    // ---------------------------------------------------------------------
    // Queries
    // ---------------------------------------------------------------------

    /// Children of the execution, optionally only those at `node`.
    pub fn find_child_executions(&self, id: ExecutionId, node: Option<&str>) -> Result<Vec<ExecutionId>> {
        let mut found = Vec::new();
        for child in self.find_execution(id)?.children() {
            let exec = self.find_execution(*child)?;
            if node.is_none_or(|n| exec.node() == Some(n)) {
                found.push(*child);
            }
        }
        Ok(found)
    }

    /// Concurrent siblings of the execution, itself included.
    ///
    /// Always empty for a root execution.
    pub fn find_concurrent_executions(&self, id: ExecutionId, node: Option<&str>) -> Result<Vec<ExecutionId>> {
        self.concurrent_siblings(id, node, |_| true)
    }

    pub fn find_inactive_concurrent_executions(
        &self,
        id: ExecutionId,
        node: Option<&str>,
    ) -> Result<Vec<ExecutionId>> {
        self.concurrent_siblings(id, node, |exec| !exec.is_active())
    }

    /// Active children parked in a wait state.
    pub fn find_waiting_executions(&self, id: ExecutionId) -> Result<Vec<ExecutionId>> {
        let mut found = Vec::new();
        for child in self.find_execution(id)?.children() {
            let exec = self.find_execution(*child)?;
            if exec.is_active() && exec.is_waiting() {
                found.push(*child);
            }
        }
        Ok(found)
    }

    fn concurrent_siblings(
        &self,
        id: ExecutionId,
        node: Option<&str>,
        keep: impl Fn(&Execution) -> bool,
    ) -> Result<Vec<ExecutionId>> {
        let Some(parent) = self.find_execution(id)?.parent_id() else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        for sibling in self.find_execution(parent)?.children() {
            let exec = self.find_execution(*sibling)?;
            if exec.is_concurrent() && node.is_none_or(|n| exec.node() == Some(n)) && keep(exec) {
                found.push(*sibling);
            }
        }
        Ok(found)
    }

    /// Top of the execution tree (the process instance).
    pub fn root_execution(&self, id: ExecutionId) -> Result<ExecutionId> {
        let mut current = id;
        while let Some(parent) = self.find_execution(current)?.parent_id() {
            current = parent;
        }
        Ok(current)
    }

    /// Execution owning the variables seen by `get_variable`/`set_variable`.
    pub fn scope_root(&self, id: ExecutionId) -> Result<ExecutionId> {
        let mut current = id;
        loop {
            let exec = self.find_execution(current)?;
            match exec.parent_id() {
                Some(parent) if !exec.is_scope_root() => current = parent,
                _ => return Ok(current),
            }
        }
    }

    /// Nearest scope, used by the `*_local` variable operations.
    pub fn nearest_scope(&self, id: ExecutionId) -> Result<ExecutionId> {
        let mut current = id;
        loop {
            let exec = self.find_execution(current)?;
            match exec.parent_id() {
                Some(parent) if !exec.is_scope() => current = parent,
                _ => return Ok(current),
            }
        }
    }

    /// Number of ancestors; `0` for a root.
    pub fn execution_depth(&self, id: ExecutionId) -> Result<usize> {
        let mut depth = 0;
        let mut current = self.find_execution(id)?.parent_id();
        while let Some(parent) = current {
            depth += 1;
            current = self.find_execution(parent)?.parent_id();
        }
        Ok(depth)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::behavior::NoopBehavior;
    use crate::model::ProcessBuilder;

    fn idle_process(engine: &mut Engine) -> ExecutionId {
        let mut builder = ProcessBuilder::new("Idle");
        builder.node("idle").behavior(NoopBehavior).initial();
        let model = Arc::new(builder.build().unwrap());
        engine.start_process(model, Variables::new()).unwrap()
    }

    #[test]
    fn root_has_no_concurrent_executions() {
        let mut engine = Engine::new();
        let root = idle_process(&mut engine);
        assert!(engine.find_concurrent_executions(root, None).unwrap().is_empty());
        assert_eq!(engine.execution_depth(root).unwrap(), 0);
        assert_eq!(engine.root_execution(root).unwrap(), root);
    }

    #[test]
    fn children_start_at_the_parent_node() {
        let mut engine = Engine::new();
        let root = idle_process(&mut engine);

        let a = engine.create_execution(root, true).unwrap();
        let b = engine.create_execution(root, true).unwrap();

        assert_eq!(engine.find_execution(a).unwrap().node(), Some("idle"));
        assert_eq!(engine.find_child_executions(root, Some("idle")).unwrap(), vec![a, b]);
        assert_eq!(engine.find_concurrent_executions(a, None).unwrap(), vec![a, b]);
        assert_eq!(engine.execution_depth(b).unwrap(), 1);
        assert_eq!(engine.scope_root(b).unwrap(), root);
    }

    #[test]
    fn termination_cascades_to_children_and_ends_the_process() {
        let mut engine = Engine::new();
        let ended = Rc::new(RefCell::new(Vec::new()));
        let seen = Rc::clone(&ended);
        engine.add_listener(move |event: &ProcessEvent| {
            if let ProcessEvent::EndProcess { execution, .. } = event {
                seen.borrow_mut().push(*execution);
            }
        });

        let root = idle_process(&mut engine);
        let child = engine.create_execution(root, true).unwrap();
        let grandchild = engine.create_execution(child, true).unwrap();

        engine.terminate(root, true).unwrap();
        engine.terminate(root, true).unwrap();

        for id in [root, child, grandchild] {
            assert!(engine.is_terminated(id).unwrap());
        }
        assert_eq!(*ended.borrow(), vec![root]);
    }

    #[test]
    fn terminated_parent_rejects_new_children() {
        let mut engine = Engine::new();
        let root = idle_process(&mut engine);
        engine.terminate(root, true).unwrap();
        assert!(matches!(
            engine.create_execution(root, true),
            Err(ProcessError::Terminated(_))
        ));
    }

    #[test]
    fn concurrent_root_takes_over_position_and_variables() {
        let mut engine = Engine::new();
        let root = idle_process(&mut engine);
        engine.set_variable(root, "x", 1).unwrap();

        let new_root = engine.introduce_concurrent_root(root, false).unwrap();

        let old = engine.find_execution(root).unwrap();
        assert!(old.is_concurrent());
        assert!(!old.is_scope());
        assert!(old.variables_local().is_empty());
        assert_eq!(old.parent_id(), Some(new_root));

        let fresh = engine.find_execution(new_root).unwrap();
        assert!(fresh.is_root());
        assert!(fresh.is_scope_root());
        assert!(!fresh.is_active());
        assert_eq!(fresh.node(), Some("idle"));
        assert_eq!(engine.get_variable(root, "x").unwrap(), serde_json::json!(1));
        assert_eq!(engine.root_execution(root).unwrap(), new_root);
    }

    #[test]
    fn nearest_scope_stops_at_nested_scopes() {
        let mut engine = Engine::new();
        let root = idle_process(&mut engine);
        let model = engine.execution_model(root).unwrap();

        let nested = engine.create_nested_execution(root, model, false).unwrap();
        let branch = engine.create_execution(nested, true).unwrap();

        assert_eq!(engine.nearest_scope(branch).unwrap(), nested);
        assert_eq!(engine.scope_root(branch).unwrap(), root);
        assert_eq!(engine.execution_depth(branch).unwrap(), 2);
    }
}
