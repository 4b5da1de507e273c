// src/behavior/choice.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::behavior::Behavior;
use crate::engine::Engine;
use crate::errors::{ProcessError, Result};
use crate::types::ExecutionId;

/// Takes the first enabled outgoing transition, in declaration order.
///
/// The default transition is only considered when nothing else is enabled;
/// without a default the execution would be stuck, which is an error.
#[derive(Debug, Clone, Default)]
pub struct ExclusiveChoiceBehavior {
    default: Option<String>,
}

impl ExclusiveChoiceBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(transition: &str) -> Self {
        Self {
            default: Some(transition.to_string()),
        }
    }

    pub fn default_transition(&self) -> Option<&str> {
        self.default.as_deref()
    }
}

impl Behavior for ExclusiveChoiceBehavior {
    fn execute(&self, engine: &mut Engine, execution: ExecutionId) -> Result<()> {
        let model = engine.execution_model(execution)?;
        let node = engine.current_node(execution)?;

        let mut chosen = None;
        for transition in model.find_outgoing_transitions(&node) {
            if Some(transition.id()) == self.default.as_deref() {
                continue;
            }
            if engine.is_transition_enabled(execution, transition)? {
                chosen = Some(transition.id().to_string());
                break;
            }
        }

        let chosen = chosen
            .or_else(|| self.default.clone())
            .ok_or_else(|| ProcessError::Stuck {
                execution,
                node: node.clone(),
                choice: "exclusive",
            })?;

        debug!(execution = %execution, node = %node, transition = %chosen, "exclusive choice");
        engine.take(execution, Some(&chosen))
    }

    fn clone_behavior(&self) -> Arc<dyn Behavior> {
        Arc::new(self.clone())
    }
}

/// Takes every enabled outgoing transition and doubles as a join.
///
/// As a join it holds arriving executions until no active concurrent
/// execution elsewhere can still reach this node, then recycles the waiting
/// executions (one per incoming transition) into the outgoing branches.
#[derive(Debug, Clone, Default)]
pub struct InclusiveChoiceBehavior {
    default: Option<String>,
}

impl InclusiveChoiceBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(transition: &str) -> Self {
        Self {
            default: Some(transition.to_string()),
        }
    }

    pub fn default_transition(&self) -> Option<&str> {
        self.default.as_deref()
    }

    fn has_pending_arrivals(&self, engine: &Engine, execution: ExecutionId, node: &str) -> Result<bool> {
        let model = engine.execution_model(execution)?;
        for other in engine.find_concurrent_executions(execution, None)? {
            if other == execution {
                continue;
            }
            let concurrent = engine.find_execution(other)?;
            if !concurrent.is_active() {
                continue;
            }
            if let Some(at) = concurrent.node() {
                if at != node && model.is_reachable(at, node) {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

impl Behavior for InclusiveChoiceBehavior {
    fn execute(&self, engine: &mut Engine, execution: ExecutionId) -> Result<()> {
        let node = engine.current_node(execution)?;

        if self.has_pending_arrivals(engine, execution, &node)? {
            debug!(execution = %execution, node = %node, "inclusive join waiting for more arrivals");
            return engine.set_active(execution, false);
        }

        let model = engine.execution_model(execution)?;
        let mut take = Vec::new();
        for transition in model.find_outgoing_transitions(&node) {
            if Some(transition.id()) == self.default.as_deref() {
                continue;
            }
            if engine.is_transition_enabled(execution, transition)? {
                take.push(transition.id().to_string());
            }
        }

        // One recycled execution per incoming transition, earliest arrival wins.
        let (arrived_by, arrived_at) = {
            let exec = engine.find_execution(execution)?;
            (exec.transition().map(str::to_string), exec.timestamp())
        };
        let mut recycle: Vec<(Option<String>, ExecutionId, DateTime<Utc>)> =
            vec![(arrived_by, execution, arrived_at)];

        for concurrent in engine.find_inactive_concurrent_executions(execution, Some(&node))? {
            let exec = engine.find_execution(concurrent)?;
            let key = exec.transition().map(str::to_string);
            match recycle.iter_mut().find(|(k, _, _)| *k == key) {
                Some(entry) => {
                    if exec.timestamp() < entry.2 {
                        entry.1 = concurrent;
                        entry.2 = exec.timestamp();
                    }
                }
                None => recycle.push((key, concurrent, exec.timestamp())),
            }
        }
        let recycle: Vec<ExecutionId> = recycle.into_iter().map(|(_, id, _)| id).collect();

        if !take.is_empty() {
            return engine.take_all(execution, Some(take), recycle);
        }

        match &self.default {
            Some(default) => engine.take_all(execution, Some(vec![default.clone()]), recycle),
            None => Err(ProcessError::Stuck {
                execution,
                node,
                choice: "inclusive",
            }),
        }
    }

    fn clone_behavior(&self) -> Arc<dyn Behavior> {
        Arc::new(self.clone())
    }
}
