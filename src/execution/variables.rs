// src/execution/variables.rs

//! Scoped process variables.
//!
//! Plain operations resolve against the scope root (the process instance or an
//! isolated nested process); the `_local` variants use the nearest scope.
//! Writing `null` removes a variable.

use serde_json::Value;
use tracing::trace;

use crate::engine::Engine;
use crate::errors::{ProcessError, Result};
use crate::types::{ExecutionId, Variables};

impl Engine {
    pub fn has_variable(&self, id: ExecutionId, name: &str) -> Result<bool> {
        let scope = self.scope_root(id)?;
        Ok(self.find_execution(scope)?.variables_local().contains_key(name))
    }

    pub fn get_variable(&self, id: ExecutionId, name: &str) -> Result<Value> {
        self.get_variable_opt(id, name)?
            .ok_or_else(|| ProcessError::VariableNotFound(name.to_string()))
    }

    pub fn get_variable_or(&self, id: ExecutionId, name: &str, default: impl Into<Value>) -> Result<Value> {
        Ok(self.get_variable_opt(id, name)?.unwrap_or_else(|| default.into()))
    }

    fn get_variable_opt(&self, id: ExecutionId, name: &str) -> Result<Option<Value>> {
        let scope = self.scope_root(id)?;
        Ok(self.find_execution(scope)?.variables_local().get(name).cloned())
    }

    pub fn set_variable(&mut self, id: ExecutionId, name: &str, value: impl Into<Value>) -> Result<()> {
        self.live(id)?;
        let scope = self.scope_root(id)?;
        self.write_variable(scope, name, value.into())
    }

    pub fn remove_variable(&mut self, id: ExecutionId, name: &str) -> Result<()> {
        self.set_variable(id, name, Value::Null)
    }

    /// All variables visible through the scope root.
    pub fn variables(&self, id: ExecutionId) -> Result<&Variables> {
        let scope = self.scope_root(id)?;
        Ok(self.find_execution(scope)?.variables_local())
    }

    pub fn has_variable_local(&self, id: ExecutionId, name: &str) -> Result<bool> {
        Ok(self.variables_local(id)?.contains_key(name))
    }

    pub fn get_variable_local(&self, id: ExecutionId, name: &str) -> Result<Value> {
        self.variables_local(id)?
            .get(name)
            .cloned()
            .ok_or_else(|| ProcessError::VariableNotFound(name.to_string()))
    }

    pub fn set_variable_local(&mut self, id: ExecutionId, name: &str, value: impl Into<Value>) -> Result<()> {
        self.live(id)?;
        let scope = self.nearest_scope(id)?;
        self.write_variable(scope, name, value.into())
    }

    pub fn remove_variable_local(&mut self, id: ExecutionId, name: &str) -> Result<()> {
        self.set_variable_local(id, name, Value::Null)
    }

    pub fn variables_local(&self, id: ExecutionId) -> Result<&Variables> {
        let scope = self.nearest_scope(id)?;
        Ok(self.find_execution(scope)?.variables_local())
    }

    /// Merge `variables` into the nearest scope.
    pub fn set_variables_local(&mut self, id: ExecutionId, variables: Variables) -> Result<()> {
        self.live(id)?;
        let scope = self.nearest_scope(id)?;
        for (name, value) in variables {
            self.write_variable(scope, &name, value)?;
        }
        Ok(())
    }

    fn write_variable(&mut self, scope: ExecutionId, name: &str, value: Value) -> Result<()> {
        let exec = self.find_execution_mut(scope)?;
        if value.is_null() {
            exec.variables_mut().remove(name);
        } else {
            exec.variables_mut().insert(name.to_string(), value);
        }
        exec.touch();
        exec.mark_modified();
        trace!(execution = %scope, variable = name, "variable written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::model::{ProcessBuilder, ProcessModel};

    fn waiting_process() -> (Engine, ExecutionId) {
        let mut builder = ProcessBuilder::new("Vars");
        builder.wait_node("wait").initial();
        let model: Arc<ProcessModel> = Arc::new(builder.build().unwrap());

        let mut engine = Engine::new();
        let mut vars = Variables::new();
        vars.insert("x".to_string(), json!(1));
        let id = engine.start_process(model, vars).unwrap();
        (engine, id)
    }

    #[test]
    fn start_variables_are_visible() {
        let (engine, id) = waiting_process();
        assert!(engine.has_variable(id, "x").unwrap());
        assert_eq!(engine.get_variable(id, "x").unwrap(), json!(1));
    }

    #[test]
    fn missing_variable_is_an_error_unless_defaulted() {
        let (engine, id) = waiting_process();
        assert!(matches!(
            engine.get_variable(id, "missing"),
            Err(ProcessError::VariableNotFound(name)) if name == "missing"
        ));
        assert_eq!(engine.get_variable_or(id, "missing", 7).unwrap(), json!(7));
    }

    #[test]
    fn null_removes_a_variable() {
        let (mut engine, id) = waiting_process();
        engine.set_variable(id, "x", Value::Null).unwrap();
        assert!(!engine.has_variable(id, "x").unwrap());

        engine.set_variable(id, "y", "hello").unwrap();
        engine.remove_variable(id, "y").unwrap();
        assert!(engine.variables(id).unwrap().is_empty());
    }

    #[test]
    fn nested_scope_sees_parent_variables_unless_isolated() {
        let (mut engine, id) = waiting_process();
        let model = engine.execution_model(id).unwrap();

        let shared = engine.create_nested_execution(id, Arc::clone(&model), false).unwrap();
        let isolated = engine.create_nested_execution(id, model, true).unwrap();

        assert_eq!(engine.get_variable(shared, "x").unwrap(), json!(1));
        assert!(!engine.has_variable(isolated, "x").unwrap());

        engine.set_variable_local(shared, "inner", true).unwrap();
        assert!(engine.has_variable_local(shared, "inner").unwrap());
        assert!(!engine.has_variable(id, "inner").unwrap());

        engine.set_variable(shared, "outer", 2).unwrap();
        assert_eq!(engine.get_variable(id, "outer").unwrap(), json!(2));
    }

    #[test]
    fn terminated_execution_cannot_write() {
        let (mut engine, id) = waiting_process();
        engine.terminate(id, true).unwrap();
        assert!(matches!(
            engine.set_variable(id, "x", 2),
            Err(ProcessError::Terminated(_))
        ));
        assert_eq!(engine.get_variable(id, "x").unwrap(), json!(1));
    }
}
