// src/behavior/wait.rs

use std::sync::Arc;

use tracing::debug;

use crate::behavior::{Behavior, SignalableBehavior};
use crate::engine::Engine;
use crate::errors::Result;
use crate::types::{Delegation, ExecutionId, Variables};

/// Parks the execution until it is signalled.
///
/// - Signal variables are written into the execution's scope.
/// - A named signal takes the transition with that id.
/// - An anonymous signal leaves through every enabled outgoing transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct WaitStateBehavior;

impl Behavior for WaitStateBehavior {
    fn execute(&self, engine: &mut Engine, execution: ExecutionId) -> Result<()> {
        engine.wait_for_signal(execution)
    }

    fn as_signalable(&self) -> Option<&dyn SignalableBehavior> {
        Some(self)
    }

    fn clone_behavior(&self) -> Arc<dyn Behavior> {
        Arc::new(*self)
    }
}

impl SignalableBehavior for WaitStateBehavior {
    fn signal(
        &self,
        engine: &mut Engine,
        execution: ExecutionId,
        signal: Option<&str>,
        variables: Variables,
        _delegation: Delegation,
    ) -> Result<()> {
        for (name, value) in variables {
            engine.set_variable(execution, &name, value)?;
        }

        match signal {
            Some(transition) => {
                debug!(execution = %execution, transition, "wait state resumed by named signal");
                engine.take(execution, Some(transition))
            }
            None => engine.take_all(execution, None, vec![execution]),
        }
    }
}
