// src/behavior/sync.rs

use std::sync::Arc;

use tracing::debug;

use crate::behavior::Behavior;
use crate::engine::Engine;
use crate::errors::Result;
use crate::types::ExecutionId;

/// Parallel join: fires once an execution has arrived through every
/// incoming transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncBehavior;

impl Behavior for SyncBehavior {
    fn execute(&self, engine: &mut Engine, execution: ExecutionId) -> Result<()> {
        engine.set_active(execution, false)?;

        let node = engine.current_node(execution)?;
        let model = engine.execution_model(execution)?;
        let expected = model.find_incoming_transitions(&node).len();

        let mut arrived: Vec<(Option<String>, ExecutionId)> = Vec::new();
        let own = engine.find_execution(execution)?.transition().map(str::to_string);
        arrived.push((own, execution));

        for concurrent in engine.find_inactive_concurrent_executions(execution, Some(&node))? {
            let key = engine
                .find_execution(concurrent)?
                .transition()
                .map(str::to_string);
            if !arrived.iter().any(|(k, _)| *k == key) {
                arrived.push((key, concurrent));
            }
        }

        debug!(
            execution = %execution,
            node = %node,
            arrived = arrived.len(),
            expected,
            "sync gate"
        );

        if arrived.len() != expected {
            return Ok(());
        }

        let recycle = arrived.into_iter().map(|(_, id)| id).collect();
        engine.take_all(execution, None, recycle)
    }

    fn clone_behavior(&self) -> Arc<dyn Behavior> {
        Arc::new(*self)
    }
}
