// src/types.rs

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Variable values stored on scope executions.
pub type Variables = BTreeMap<String, serde_json::Value>;

/// Executions handed over alongside a signal, keyed by role.
pub type Delegation = BTreeMap<String, ExecutionId>;

/// Delegation key under which a finished nested execution is passed back to
/// its parent.
pub const DELEGATION_EXECUTION: &str = "execution";

pub const PRIORITY_DEFAULT: i32 = 1000;
pub const PRIORITY_SIGNAL: i32 = 1050;
pub const PRIORITY_TERMINATE: i32 = -1_000_000;

/// Unique identity of an execution; generated once, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionId(Uuid);

impl ExecutionId {
    pub fn new() -> Self {
        ExecutionId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ExecutionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ExecutionId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(ExecutionId)
            .map_err(|e| format!("invalid execution id {s:?}: {e}"))
    }
}
