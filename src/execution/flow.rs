// src/execution/flow.rs

//! Moving executions through the model.
//!
//! The public operations only validate and queue a [`crate::engine::Command`];
//! the `run_*` methods are what those commands execute once drained.

use std::sync::Arc;

use tracing::debug;

use crate::engine::Engine;
use crate::engine::events::ProcessEvent;
use crate::errors::{ProcessError, Result};
use crate::execution::ExecutionAccess;
use crate::model::Transition;
use crate::types::{Delegation, ExecutionId, Variables};

impl Engine {
    /// Queue entering `node`.
    pub fn execute(&mut self, id: ExecutionId, node: &str) -> Result<()> {
        self.live(id)?;
        let command = self.create_execute_node_command(id, node);
        self.push_command(command)
    }

    pub fn wait_for_signal(&mut self, id: ExecutionId) -> Result<()> {
        self.set_waiting(id, true)
    }

    pub fn wake_up(&mut self, id: ExecutionId) -> Result<()> {
        self.set_waiting(id, false)
    }

    fn set_waiting(&mut self, id: ExecutionId, waiting: bool) -> Result<()> {
        let exec = self.live_mut(id)?;
        exec.flags_mut().waiting = waiting;
        exec.touch();
        exec.mark_modified();
        Ok(())
    }

    /// Queue a signal for an execution parked in a wait state.
    pub fn signal(
        &mut self,
        id: ExecutionId,
        signal: Option<&str>,
        variables: Variables,
        delegation: Delegation,
    ) -> Result<()> {
        if !self.live(id)?.is_waiting() {
            return Err(ProcessError::NotWaiting(id));
        }
        let command = self.create_signal_command(id, signal, variables, delegation);
        self.push_command(command)
    }

    /// Queue leaving the current node through one transition; `None` requires
    /// the node to have exactly one outgoing transition.
    pub fn take(&mut self, id: ExecutionId, transition: Option<&str>) -> Result<()> {
        self.live(id)?;
        let command = self.create_take_transition_command(id, transition);
        self.push_command(command)
    }

    /// Queue leaving the current node through every enabled transition
    /// (or every enabled one of `transitions`), forking or joining as needed.
    ///
    /// `recycle` lists executions that may be reused for the outgoing
    /// branches; whatever is not reused is terminated.
    pub fn take_all(
        &mut self,
        id: ExecutionId,
        transitions: Option<Vec<String>>,
        recycle: Vec<ExecutionId>,
    ) -> Result<()> {
        self.live(id)?;
        self.push_command(crate::engine::Command::TakeAll {
            execution: id,
            transitions,
            recycle,
        })
    }

    pub fn is_transition_enabled(&self, id: ExecutionId, transition: &Transition) -> Result<bool> {
        let access = ExecutionAccess::new(self, id)?;
        Ok(transition.is_enabled(&access))
    }

    pub(crate) fn run_execute_node(&mut self, id: ExecutionId, node: &str) -> Result<()> {
        let model = Arc::clone(self.live(id)?.model());
        let behavior = Arc::clone(model.find_node(node)?.behavior());

        let exec = self.live_mut(id)?;
        exec.touch();
        exec.set_node(Some(node.to_string()));
        exec.mark_modified();

        self.notify(ProcessEvent::EnterNode {
            execution: id,
            node: node.to_string(),
        });
        behavior.execute(self, id)
    }

    pub(crate) fn run_signal(
        &mut self,
        id: ExecutionId,
        signal: Option<String>,
        variables: Variables,
        delegation: Delegation,
    ) -> Result<()> {
        self.wake_up(id)?;

        let node = self.current_node(id)?;
        let model = self.execution_model(id)?;
        let behavior = Arc::clone(model.find_node(&node)?.behavior());

        self.notify(ProcessEvent::SignalNode {
            execution: id,
            node: node.clone(),
            signal: signal.clone(),
            variables: variables.clone(),
            delegation: delegation.clone(),
        });

        match behavior.as_signalable() {
            Some(signalable) => signalable.signal(self, id, signal.as_deref(), variables, delegation),
            None => {
                debug!(execution = %id, node = %node, "node is not signalable; leaving it");
                self.take_all(id, None, vec![id])
            }
        }
    }

    pub(crate) fn run_take_transition(&mut self, id: ExecutionId, transition: Option<&str>) -> Result<()> {
        if let Some(parent) = self.lone_concurrent_parent(id)? {
            self.collapse_into_parent(id, parent)?;
            return self.take(parent, transition);
        }

        let model = self.execution_model(id)?;
        let node = self.current_node(id)?;
        let outgoing = model.find_outgoing_transitions(&node);

        let chosen = match transition {
            None => match outgoing.as_slice() {
                [only] => *only,
                _ => return Err(ProcessError::NoSingleTransition { node }),
            },
            Some(wanted) => {
                model.find_transition(wanted)?;
                outgoing
                    .iter()
                    .find(|t| t.id() == wanted)
                    .copied()
                    .ok_or_else(|| ProcessError::TransitionNotConnected {
                        transition: wanted.to_string(),
                        node: node.clone(),
                    })?
            }
        };

        if !self.is_transition_enabled(id, chosen)? {
            debug!(execution = %id, transition = %chosen.id(), "transition disabled; execution ends here");
            self.terminate(id, true)?;
            return self.prune_dead_end(id);
        }

        self.notify(ProcessEvent::LeaveNode {
            execution: id,
            node: node.clone(),
        });
        self.notify(ProcessEvent::TakeTransition {
            execution: id,
            transition: chosen.id().to_string(),
        });

        let exec = self.live_mut(id)?;
        exec.touch();
        exec.set_transition(Some(chosen.id().to_string()));
        exec.mark_modified();

        self.execute(id, chosen.to())
    }

    pub(crate) fn run_take_all(
        &mut self,
        id: ExecutionId,
        transitions: Option<Vec<String>>,
        mut recycle: Vec<ExecutionId>,
    ) -> Result<()> {
        let exec = self.live(id)?;
        let parent = exec.parent_id();
        let concurrent = exec.is_concurrent();

        // A lone concurrent branch folds back into its parent first.
        if let Some(parent) = self.lone_concurrent_parent(id)? {
            self.terminate_all(recycle.iter().copied().filter(|r| *r != id), false)?;
            self.collapse_into_parent(id, parent)?;
            return self.take_all(parent, transitions, Vec::new());
        }

        let model = self.execution_model(id)?;
        let node = self.current_node(id)?;

        let candidates: Vec<&Transition> = match &transitions {
            Some(ids) => ids
                .iter()
                .map(|t| model.find_transition(t))
                .collect::<Result<_>>()?,
            None => model.find_outgoing_transitions(&node),
        };
        let mut enabled = Vec::new();
        for transition in candidates {
            if self.is_transition_enabled(id, transition)? {
                enabled.push(transition.id().to_string());
            }
        }

        if !recycle.contains(&id) {
            recycle.insert(0, id);
        }

        if enabled.is_empty() {
            debug!(execution = %id, node = %node, "no enabled transitions; execution ends here");
            self.terminate_all(recycle, true)?;
            return self.prune_dead_end(id);
        }

        let root = match parent {
            Some(parent) if concurrent => parent,
            _ => id,
        };
        let (merge, active) = {
            let children = self.find_execution(root)?.children();
            let at_node = self.find_child_executions(root, Some(&node))?.len();
            let mut active = 0;
            for child in children {
                if self.find_execution(*child)?.is_active() {
                    active += 1;
                }
            }
            (children.len() == at_node, active)
        };
        recycle.retain(|r| *r != root);

        if enabled.len() == 1 && active == 0 && merge {
            let transition = enabled.remove(0);
            debug!(execution = %id, root = %root, transition = %transition, "joining into root");

            self.terminate_all(recycle.iter().copied().filter(|r| *r != id), true)?;
            if root != id {
                self.rehome_children(id, root)?;
                let (node, arrived_by) = {
                    let exec = self.find_execution_mut(id)?;
                    exec.flags_mut().concurrent = false;
                    (exec.node().map(str::to_string), exec.transition().map(str::to_string))
                };
                let target = self.find_execution_mut(root)?;
                target.set_node(node);
                target.set_transition(arrived_by);
                target.touch();
                self.terminate(id, true)?;
            }
            self.set_active(root, true)?;
            return self.take(root, Some(&transition));
        }

        let mut branches = Vec::with_capacity(enabled.len());
        for transition in enabled {
            let mut reused = None;
            while !recycle.is_empty() {
                let candidate = recycle.remove(0);
                if !self.is_terminated(candidate)? {
                    reused = Some(candidate);
                    break;
                }
            }
            let branch = match reused {
                Some(branch) => branch,
                None => self.create_execution(root, true)?,
            };

            let exec = self.find_execution_mut(branch)?;
            let flags = exec.flags_mut();
            flags.active = true;
            flags.concurrent = true;
            exec.set_node(Some(node.clone()));
            exec.touch();
            exec.mark_modified();
            branches.push((branch, transition));
        }

        self.set_active(root, false)?;
        self.terminate_all(recycle, true)?;

        debug!(execution = %id, root = %root, branches = branches.len(), "forking");
        for (branch, transition) in branches {
            self.take(branch, Some(&transition))?;
        }
        Ok(())
    }

    /// Parent of a concurrent execution that has no concurrent siblings left.
    fn lone_concurrent_parent(&self, id: ExecutionId) -> Result<Option<ExecutionId>> {
        let exec = self.live(id)?;
        match exec.parent_id() {
            Some(parent)
                if exec.is_concurrent() && self.find_concurrent_executions(id, None)?.len() == 1 =>
            {
                Ok(Some(parent))
            }
            _ => Ok(None),
        }
    }

    fn terminate_all(&mut self, ids: impl IntoIterator<Item = ExecutionId>, propagate: bool) -> Result<()> {
        for id in ids {
            if !self.is_terminated(id)? {
                self.terminate(id, propagate)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::behavior::{NoopBehavior, WaitStateBehavior};
    use crate::model::{ProcessBuilder, ProcessModel};

    fn wait_then_end() -> Arc<ProcessModel> {
        let mut builder = ProcessBuilder::new("Wait");
        builder.start_node("start");
        builder.wait_node("wait");
        builder.node("end").behavior(NoopBehavior);
        builder.transition("t1", "start", "wait");
        builder.transition("t2", "wait", "end");
        Arc::new(builder.build().unwrap())
    }

    #[test]
    fn start_runs_until_the_wait_state() {
        let mut engine = Engine::new();
        let id = engine.start_process(wait_then_end(), Variables::new()).unwrap();

        let exec = engine.find_execution(id).unwrap();
        assert_eq!(exec.node(), Some("wait"));
        assert_eq!(exec.transition(), Some("t1"));
        assert!(exec.is_waiting());
    }

    #[test]
    fn signalling_resumes_the_execution() {
        let mut engine = Engine::new();
        let id = engine.start_process(wait_then_end(), Variables::new()).unwrap();

        engine
            .signal(id, None, Variables::new(), Delegation::new())
            .unwrap();

        let exec = engine.find_execution(id).unwrap();
        assert_eq!(exec.node(), Some("end"));
        assert!(!exec.is_waiting());
    }

    #[test]
    fn signalling_a_running_execution_fails() {
        let mut builder = ProcessBuilder::new("Idle");
        builder.node("idle").behavior(NoopBehavior).initial();
        let model = Arc::new(builder.build().unwrap());

        let mut engine = Engine::new();
        let id = engine.start_process(model, Variables::new()).unwrap();
        assert!(matches!(
            engine.signal(id, None, Variables::new(), Delegation::new()),
            Err(ProcessError::NotWaiting(_))
        ));
    }

    #[test]
    fn terminated_execution_rejects_every_operation() {
        let mut engine = Engine::new();
        let id = engine.start_process(wait_then_end(), Variables::new()).unwrap();
        engine.terminate(id, true).unwrap();

        assert!(matches!(engine.execute(id, "end"), Err(ProcessError::Terminated(_))));
        assert!(matches!(engine.take(id, None), Err(ProcessError::Terminated(_))));
        assert!(matches!(
            engine.take_all(id, None, Vec::new()),
            Err(ProcessError::Terminated(_))
        ));
        assert!(matches!(engine.wait_for_signal(id), Err(ProcessError::Terminated(_))));
        assert!(matches!(
            engine.signal(id, None, Variables::new(), Delegation::new()),
            Err(ProcessError::Terminated(_))
        ));
    }

    #[test]
    fn naming_an_unconnected_transition_fails() {
        let mut builder = ProcessBuilder::new("Named");
        builder.start_node("a");
        builder.node("b").behavior(WaitStateBehavior);
        builder.node("c").behavior(NoopBehavior);
        builder.transition("ab", "a", "b");
        builder.transition("bc", "b", "c");
        let model = Arc::new(builder.build().unwrap());

        let mut engine = Engine::new();
        let id = engine.start_process(model, Variables::new()).unwrap();

        let command = engine.create_take_transition_command(id, Some("ab"));
        let err = engine.execute_command(command).unwrap_err();
        assert!(matches!(err, ProcessError::TransitionNotConnected { .. }));

        let command = engine.create_take_transition_command(id, Some("nope"));
        let err = engine.execute_command(command).unwrap_err();
        assert!(matches!(err, ProcessError::TransitionNotFound(_)));
    }
}
