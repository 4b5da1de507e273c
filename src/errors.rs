// src/errors.rs

use thiserror::Error;

use crate::types::ExecutionId;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("Execution not found: {0}")]
    ExecutionNotFound(ExecutionId),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Transition not found: {0}")]
    TransitionNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Variable not found: {0}")]
    VariableNotFound(String),

    #[error("No single outgoing transition found at node {node}")]
    NoSingleTransition { node: String },

    #[error("Transition {transition} not connected to node {node}")]
    TransitionNotConnected { transition: String, node: String },

    #[error("Process {process} does not declare exactly one initial node")]
    NoSingleStartNode { process: String },

    #[error("Node {0} has no behavior")]
    MissingBehavior(String),

    #[error("Duplicate model item: {0}")]
    DuplicateItem(String),

    #[error("Execution {0} is terminated")]
    Terminated(ExecutionId),

    #[error("Execution {0} is not waiting for a signal")]
    NotWaiting(ExecutionId),

    #[error("Execution {execution} received a signal without delegation \"{key}\"")]
    MissingDelegation { execution: ExecutionId, key: String },

    #[error("Execution {execution} about to get stuck in {choice} choice within node {node}")]
    Stuck {
        execution: ExecutionId,
        node: String,
        choice: &'static str,
    },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of a [`ProcessError`].
///
/// - `NotFound`: unknown execution, node, transition or variable.
/// - `Structural`: the process model cannot express the requested move.
/// - `State`: the execution is in the wrong state for the operation.
/// - `Stuck`: a choice found no enabled transition and no default.
/// - `Config`: a process definition could not be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Structural,
    State,
    Stuck,
    Config,
    Other,
}

impl ProcessError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessError::ExecutionNotFound(_)
            | ProcessError::NodeNotFound(_)
            | ProcessError::TransitionNotFound(_)
            | ProcessError::ItemNotFound(_)
            | ProcessError::VariableNotFound(_) => ErrorKind::NotFound,
            ProcessError::NoSingleTransition { .. }
            | ProcessError::TransitionNotConnected { .. }
            | ProcessError::NoSingleStartNode { .. }
            | ProcessError::MissingBehavior(_)
            | ProcessError::DuplicateItem(_) => ErrorKind::Structural,
            ProcessError::Terminated(_)
            | ProcessError::NotWaiting(_)
            | ProcessError::MissingDelegation { .. } => ErrorKind::State,
            ProcessError::Stuck { .. } => ErrorKind::Stuck,
            ProcessError::ConfigError(_)
            | ProcessError::IoError(_)
            | ProcessError::TomlError(_) => ErrorKind::Config,
            ProcessError::Other(_) => ErrorKind::Other,
        }
    }
}

pub use anyhow::Error;

pub type Result<T> = std::result::Result<T, ProcessError>;
