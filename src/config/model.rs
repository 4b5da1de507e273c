// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

/// A process definition as read from a TOML file.
///
/// ```toml
/// [process]
/// title = "Order"
///
/// [[node]]
/// id = "start"
/// behavior = "pass"
/// initial = true
///
/// [[node]]
/// id = "review"
/// behavior = "wait"
///
/// [[transition]]
/// id = "t1"
/// from = "start"
/// to = "review"
/// when = "amount >= 200"
/// ```
///
/// Nodes and transitions are arrays of tables, so declaration order survives
/// deserialization. That order becomes the model's item order.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessFile {
    #[serde(default)]
    pub process: ProcessSection,

    #[serde(default)]
    pub node: Vec<NodeConfig>,

    #[serde(default)]
    pub transition: Vec<TransitionConfig>,
}

/// `[process]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessSection {
    /// Human readable title; the file stem is used when absent.
    #[serde(default)]
    pub title: Option<String>,
}

/// One `[[node]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeConfig {
    pub id: String,

    pub behavior: BehaviorKind,

    #[serde(default)]
    pub initial: bool,

    /// Default transition of an `exclusive` or `inclusive` node.
    #[serde(default)]
    pub default: Option<String>,

    /// Path of the process file run by a `nested` node, relative to the
    /// including file.
    #[serde(default)]
    pub process: Option<String>,

    /// Whether a `nested` node's process owns its variables (default `true`).
    #[serde(default)]
    pub isolate: Option<bool>,

    /// `nested` only: `target = "source"` copied into the nested process.
    #[serde(default)]
    pub inputs: BTreeMap<String, String>,

    /// `nested` only: `target = "source"` copied back when it ends.
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
}

/// One `[[transition]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionConfig {
    pub id: String,
    pub from: String,
    pub to: String,

    /// Optional guard such as `"approved"`, `"!rejected"` or `"amount > 100"`.
    #[serde(default)]
    pub when: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BehaviorKind {
    Pass,
    Wait,
    Exclusive,
    Inclusive,
    Sync,
    Terminate,
    Noop,
    Nested,
}

impl BehaviorKind {
    pub fn is_choice(self) -> bool {
        matches!(self, BehaviorKind::Exclusive | BehaviorKind::Inclusive)
    }
}

impl fmt::Display for BehaviorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BehaviorKind::Pass => "pass",
            BehaviorKind::Wait => "wait",
            BehaviorKind::Exclusive => "exclusive",
            BehaviorKind::Inclusive => "inclusive",
            BehaviorKind::Sync => "sync",
            BehaviorKind::Terminate => "terminate",
            BehaviorKind::Noop => "noop",
            BehaviorKind::Nested => "nested",
        };
        f.write_str(name)
    }
}
