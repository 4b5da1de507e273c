// src/execution/access.rs

use serde_json::Value;

use crate::engine::Engine;
use crate::errors::Result;
use crate::execution::Execution;
use crate::types::ExecutionId;

/// Read-only view of an execution handed to transition triggers.
///
/// Variable names resolve against the execution's scope root, the same way
/// [`Engine::get_variable`] does; unknown names resolve to `None`.
pub struct ExecutionAccess<'a> {
    execution: &'a Execution,
    scope: &'a Execution,
}

impl<'a> ExecutionAccess<'a> {
    pub fn new(engine: &'a Engine, execution: ExecutionId) -> Result<Self> {
        let scope_id = engine.scope_root(execution)?;
        Ok(Self {
            execution: engine.find_execution(execution)?,
            scope: engine.find_execution(scope_id)?,
        })
    }

    pub fn execution(&self) -> &'a Execution {
        self.execution
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution.id()
    }

    pub fn node(&self) -> Option<&'a str> {
        self.execution.node()
    }

    pub fn variable(&self, name: &str) -> Option<&'a Value> {
        self.scope.variables_local().get(name)
    }

    /// Numeric variable, or `None` when absent or not a number.
    pub fn number(&self, name: &str) -> Option<f64> {
        self.variable(name).and_then(Value::as_f64)
    }
}
