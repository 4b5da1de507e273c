// src/behavior/mod.rs

//! Node behaviors.
//!
//! A behavior runs when an execution arrives at its node and moves the
//! execution along by calling back into the [`Engine`]: taking transitions,
//! parking in a wait state, forking, joining or terminating. Behaviors that
//! can be resumed by an external signal also implement
//! [`SignalableBehavior`].

mod callback;
mod choice;
mod nested;
mod sync;
mod wait;

use std::fmt;
use std::sync::Arc;

use crate::engine::{Command, Engine};
use crate::errors::Result;
use crate::types::{Delegation, ExecutionId, Variables};

pub use callback::{CallbackBehavior, CallbackFn};
pub use choice::{ExclusiveChoiceBehavior, InclusiveChoiceBehavior};
pub use nested::NestedProcessBehavior;
pub use sync::SyncBehavior;
pub use wait::WaitStateBehavior;

pub trait Behavior: fmt::Debug {
    /// Called once each time an execution enters the node.
    fn execute(&self, engine: &mut Engine, execution: ExecutionId) -> Result<()>;

    /// Signal support, if this behavior can resume a waiting execution.
    fn as_signalable(&self) -> Option<&dyn SignalableBehavior> {
        None
    }

    /// Independent copy, used by [`crate::model::ProcessModel::deep_clone`].
    fn clone_behavior(&self) -> Arc<dyn Behavior>;
}

pub trait SignalableBehavior: Behavior {
    fn signal(
        &self,
        engine: &mut Engine,
        execution: ExecutionId,
        signal: Option<&str>,
        variables: Variables,
        delegation: Delegation,
    ) -> Result<()>;
}

/// Does nothing; the execution stays on the node.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopBehavior;

impl Behavior for NoopBehavior {
    fn execute(&self, _engine: &mut Engine, _execution: ExecutionId) -> Result<()> {
        Ok(())
    }

    fn clone_behavior(&self) -> Arc<dyn Behavior> {
        Arc::new(*self)
    }
}

/// Leaves the node through every enabled outgoing transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassBehavior;

impl Behavior for PassBehavior {
    fn execute(&self, engine: &mut Engine, execution: ExecutionId) -> Result<()> {
        engine.take_all(execution, None, Vec::new())
    }

    fn clone_behavior(&self) -> Arc<dyn Behavior> {
        Arc::new(*self)
    }
}

/// Ends the arriving execution once everything else queued has run.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminateBehavior;

impl Behavior for TerminateBehavior {
    fn execute(&self, engine: &mut Engine, execution: ExecutionId) -> Result<()> {
        engine.push_command(Command::TerminateExecution {
            execution,
            propagate: true,
        })
    }

    fn clone_behavior(&self) -> Arc<dyn Behavior> {
        Arc::new(*self)
    }
}
