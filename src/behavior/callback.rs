// src/behavior/callback.rs

use std::fmt;
use std::sync::Arc;

use crate::behavior::Behavior;
use crate::engine::Engine;
use crate::errors::Result;
use crate::types::ExecutionId;

/// Closure run by [`CallbackBehavior`].
///
/// Returning `Some(ids)` restricts the outgoing transitions to those ids;
/// `None` considers every outgoing transition.
pub type CallbackFn = dyn Fn(&mut Engine, ExecutionId) -> Result<Option<Vec<String>>>;

/// Runs user code, then leaves the node like a pass-through.
#[derive(Clone)]
pub struct CallbackBehavior {
    callback: Arc<CallbackFn>,
}

impl CallbackBehavior {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&mut Engine, ExecutionId) -> Result<Option<Vec<String>>> + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }
}

impl fmt::Debug for CallbackBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CallbackBehavior")
    }
}

impl Behavior for CallbackBehavior {
    fn execute(&self, engine: &mut Engine, execution: ExecutionId) -> Result<()> {
        let transitions = (self.callback)(engine, execution)?;
        engine.take_all(execution, transitions, vec![execution])
    }

    fn clone_behavior(&self) -> Arc<dyn Behavior> {
        Arc::new(self.clone())
    }
}
