// src/behavior/nested.rs

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::behavior::{Behavior, SignalableBehavior};
use crate::engine::Engine;
use crate::errors::{ProcessError, Result};
use crate::model::ProcessModel;
use crate::types::{DELEGATION_EXECUTION, Delegation, ExecutionId, Variables};

/// Runs another process model as a nested scope and resumes once it ends.
///
/// `inputs` and `outputs` map a target variable name to a source variable
/// name. Inputs are copied from the parent into the nested execution before
/// it starts; outputs are copied back when the nested execution hands itself
/// over through the `"execution"` delegation.
#[derive(Debug, Clone)]
pub struct NestedProcessBehavior {
    model: Arc<ProcessModel>,
    isolate: bool,
    inputs: BTreeMap<String, String>,
    outputs: BTreeMap<String, String>,
}

impl NestedProcessBehavior {
    pub fn new(model: Arc<ProcessModel>) -> Self {
        Self {
            model,
            isolate: true,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    /// Whether the nested execution owns its variables (default `true`).
    pub fn isolate(mut self, isolate: bool) -> Self {
        self.isolate = isolate;
        self
    }

    pub fn input(mut self, target: &str, source: &str) -> Self {
        self.inputs.insert(target.to_string(), source.to_string());
        self
    }

    pub fn output(mut self, target: &str, source: &str) -> Self {
        self.outputs.insert(target.to_string(), source.to_string());
        self
    }

    pub fn model(&self) -> &Arc<ProcessModel> {
        &self.model
    }
}

impl Behavior for NestedProcessBehavior {
    fn execute(&self, engine: &mut Engine, execution: ExecutionId) -> Result<()> {
        let initial = self.model.find_initial_nodes();
        if initial.len() != 1 {
            return Err(ProcessError::NoSingleStartNode {
                process: self.model.title().to_string(),
            });
        }
        let start = initial[0].id().to_string();

        let nested = engine.create_nested_execution(execution, Arc::clone(&self.model), self.isolate)?;

        for (target, source) in &self.inputs {
            if engine.has_variable(execution, source)? {
                let value = engine.get_variable(execution, source)?;
                engine.set_variable(nested, target, value)?;
            }
        }

        debug!(
            execution = %execution,
            nested = %nested,
            process = %self.model.title(),
            isolate = self.isolate,
            "starting nested process"
        );

        engine.wait_for_signal(execution)?;
        engine.execute(nested, &start)
    }

    fn as_signalable(&self) -> Option<&dyn SignalableBehavior> {
        Some(self)
    }

    fn clone_behavior(&self) -> Arc<dyn Behavior> {
        Arc::new(NestedProcessBehavior {
            model: Arc::new(self.model.deep_clone()),
            isolate: self.isolate,
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
        })
    }
}

impl SignalableBehavior for NestedProcessBehavior {
    fn signal(
        &self,
        engine: &mut Engine,
        execution: ExecutionId,
        _signal: Option<&str>,
        _variables: Variables,
        delegation: Delegation,
    ) -> Result<()> {
        let nested = delegation
            .get(DELEGATION_EXECUTION)
            .copied()
            .ok_or_else(|| ProcessError::MissingDelegation {
                execution,
                key: DELEGATION_EXECUTION.to_string(),
            })?;

        for (target, source) in &self.outputs {
            if engine.has_variable(nested, source)? {
                let value = engine.get_variable(nested, source)?;
                engine.set_variable(execution, target, value)?;
            }
        }

        debug!(execution = %execution, nested = %nested, "nested process completed");
        engine.take_all(execution, None, vec![execution])
    }
}
