// src/engine/events.rs

use serde::Serialize;

use crate::types::{Delegation, ExecutionId, Variables};

/// Fire-and-forget notifications emitted while commands run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProcessEvent {
    StartProcess {
        execution: ExecutionId,
        node: String,
    },
    EndProcess {
        execution: ExecutionId,
        node: Option<String>,
    },
    EnterNode {
        execution: ExecutionId,
        node: String,
    },
    LeaveNode {
        execution: ExecutionId,
        node: String,
    },
    TakeTransition {
        execution: ExecutionId,
        transition: String,
    },
    SignalNode {
        execution: ExecutionId,
        node: String,
        signal: Option<String>,
        variables: Variables,
        delegation: Delegation,
    },
}

impl ProcessEvent {
    pub fn execution(&self) -> ExecutionId {
        match self {
            ProcessEvent::StartProcess { execution, .. }
            | ProcessEvent::EndProcess { execution, .. }
            | ProcessEvent::EnterNode { execution, .. }
            | ProcessEvent::LeaveNode { execution, .. }
            | ProcessEvent::TakeTransition { execution, .. }
            | ProcessEvent::SignalNode { execution, .. } => *execution,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProcessEvent::StartProcess { .. } => "start_process",
            ProcessEvent::EndProcess { .. } => "end_process",
            ProcessEvent::EnterNode { .. } => "enter_node",
            ProcessEvent::LeaveNode { .. } => "leave_node",
            ProcessEvent::TakeTransition { .. } => "take_transition",
            ProcessEvent::SignalNode { .. } => "signal_node",
        }
    }
}

/// Receives [`ProcessEvent`]s; listeners cannot influence execution.
pub trait ProcessListener {
    fn notify(&mut self, event: &ProcessEvent);
}

impl<F> ProcessListener for F
where
    F: FnMut(&ProcessEvent),
{
    fn notify(&mut self, event: &ProcessEvent) {
        self(event)
    }
}
