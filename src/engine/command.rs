// src/engine/command.rs

//! Commands: the only way state changes enter the engine.
//!
//! Each variant carries execution ids, never references; the ids are
//! resolved against the registry when the command runs.

use std::fmt;
use std::sync::Arc;

use crate::engine::Engine;
use crate::errors::Result;
use crate::model::ProcessModel;
use crate::types::{
    Delegation, ExecutionId, PRIORITY_DEFAULT, PRIORITY_SIGNAL, PRIORITY_TERMINATE, Variables,
};

/// In-memory work item for [`Command::Callback`].
pub type CommandCallback = Box<dyn FnOnce(&mut Engine) -> Result<()>>;

pub enum Command {
    /// Create a root execution and enter `start_node`.
    StartProcess {
        model: Arc<ProcessModel>,
        start_node: String,
        variables: Variables,
    },
    /// Enter `node` and run its behavior.
    ExecuteNode {
        execution: ExecutionId,
        node: String,
    },
    /// Wake a waiting execution and hand the signal to its node's behavior.
    SignalExecution {
        execution: ExecutionId,
        signal: Option<String>,
        variables: Variables,
        delegation: Delegation,
    },
    /// Leave the current node through one transition.
    TakeTransition {
        execution: ExecutionId,
        transition: Option<String>,
    },
    /// Leave the current node through several transitions, forking if needed.
    TakeAll {
        execution: ExecutionId,
        transitions: Option<Vec<String>>,
        recycle: Vec<ExecutionId>,
    },
    TerminateExecution {
        execution: ExecutionId,
        propagate: bool,
    },
    /// Arbitrary closure; never serializable.
    Callback {
        priority: i32,
        callback: CommandCallback,
    },
    Void,
}

impl Command {
    pub fn callback<F>(priority: i32, callback: F) -> Self
    where
        F: FnOnce(&mut Engine) -> Result<()> + 'static,
    {
        Command::Callback {
            priority,
            callback: Box::new(callback),
        }
    }

    pub fn priority(&self) -> i32 {
        match self {
            Command::SignalExecution { .. } => PRIORITY_SIGNAL,
            Command::TerminateExecution { .. } => PRIORITY_TERMINATE,
            Command::Callback { priority, .. } => *priority,
            _ => PRIORITY_DEFAULT,
        }
    }

    /// Whether the command can be persisted and replayed: it carries only ids
    /// and plain data.
    pub fn is_serializable(&self) -> bool {
        !matches!(self, Command::Callback { .. } | Command::StartProcess { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::StartProcess { .. } => "start-process",
            Command::ExecuteNode { .. } => "execute-node",
            Command::SignalExecution { .. } => "signal-execution",
            Command::TakeTransition { .. } => "take-transition",
            Command::TakeAll { .. } => "take-all",
            Command::TerminateExecution { .. } => "terminate-execution",
            Command::Callback { .. } => "callback",
            Command::Void => "void",
        }
    }

    /// Execution the command operates on, if any.
    pub fn execution(&self) -> Option<ExecutionId> {
        match self {
            Command::ExecuteNode { execution, .. }
            | Command::SignalExecution { execution, .. }
            | Command::TakeTransition { execution, .. }
            | Command::TakeAll { execution, .. }
            | Command::TerminateExecution { execution, .. } => Some(*execution),
            Command::StartProcess { .. } | Command::Callback { .. } | Command::Void => None,
        }
    }

    /// Run the command; `StartProcess` yields the new root execution.
    pub(crate) fn execute(self, engine: &mut Engine) -> Result<Option<ExecutionId>> {
        match self {
            Command::StartProcess {
                model,
                start_node,
                variables,
            } => engine.run_start_process(model, &start_node, variables).map(Some),
            Command::ExecuteNode { execution, node } => {
                engine.run_execute_node(execution, &node).map(|_| None)
            }
            Command::SignalExecution {
                execution,
                signal,
                variables,
                delegation,
            } => engine
                .run_signal(execution, signal, variables, delegation)
                .map(|_| None),
            Command::TakeTransition {
                execution,
                transition,
            } => engine
                .run_take_transition(execution, transition.as_deref())
                .map(|_| None),
            Command::TakeAll {
                execution,
                transitions,
                recycle,
            } => engine
                .run_take_all(execution, transitions, recycle)
                .map(|_| None),
            Command::TerminateExecution {
                execution,
                propagate,
            } => engine.terminate(execution, propagate).map(|_| None),
            Command::Callback { callback, .. } => callback(engine).map(|_| None),
            Command::Void => Ok(None),
        }
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::StartProcess {
                model, start_node, ..
            } => f
                .debug_struct("StartProcess")
                .field("process", &model.title())
                .field("start_node", start_node)
                .finish(),
            Command::ExecuteNode { execution, node } => f
                .debug_struct("ExecuteNode")
                .field("execution", execution)
                .field("node", node)
                .finish(),
            Command::SignalExecution {
                execution, signal, ..
            } => f
                .debug_struct("SignalExecution")
                .field("execution", execution)
                .field("signal", signal)
                .finish(),
            Command::TakeTransition {
                execution,
                transition,
            } => f
                .debug_struct("TakeTransition")
                .field("execution", execution)
                .field("transition", transition)
                .finish(),
            Command::TakeAll {
                execution,
                transitions,
                recycle,
            } => f
                .debug_struct("TakeAll")
                .field("execution", execution)
                .field("transitions", transitions)
                .field("recycle", recycle)
                .finish(),
            Command::TerminateExecution {
                execution,
                propagate,
            } => f
                .debug_struct("TerminateExecution")
                .field("execution", execution)
                .field("propagate", propagate)
                .finish(),
            Command::Callback { priority, .. } => f
                .debug_struct("Callback")
                .field("priority", priority)
                .finish(),
            Command::Void => f.write_str("Void"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn priorities_by_kind() {
        let id = ExecutionId::new();
        assert_eq!(
            Command::TakeTransition {
                execution: id,
                transition: None
            }
            .priority(),
            PRIORITY_DEFAULT
        );
        assert_eq!(
            Command::SignalExecution {
                execution: id,
                signal: None,
                variables: Variables::new(),
                delegation: Delegation::new(),
            }
            .priority(),
            PRIORITY_SIGNAL
        );
        assert_eq!(
            Command::TerminateExecution {
                execution: id,
                propagate: true
            }
            .priority(),
            PRIORITY_TERMINATE
        );
        assert_eq!(Command::callback(1500, |_| Ok(())).priority(), 1500);
        assert_eq!(Command::Void.priority(), PRIORITY_DEFAULT);
    }

    #[test]
    fn only_id_carrying_commands_are_serializable() {
        let id = ExecutionId::new();
        assert!(Command::TakeAll {
            execution: id,
            transitions: None,
            recycle: vec![id]
        }
        .is_serializable());
        assert!(!Command::callback(0, |_| Ok(())).is_serializable());
        assert!(!Command::StartProcess {
            model: Arc::new(ProcessModel::new("P")),
            start_node: "start".into(),
            variables: Variables::new(),
        }
        .is_serializable());
        assert_eq!(Command::Void.execution(), None);
    }
}
