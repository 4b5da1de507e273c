// src/config/validate.rs

use std::collections::HashSet;

use tracing::warn;

use crate::config::model::{BehaviorKind, NodeConfig, ProcessFile};
use crate::errors::{ProcessError, Result};
use crate::model::Condition;
use crate::model::graph::unreachable_nodes;

/// Check a deserialized definition before it is turned into a model.
///
/// Nested process files are not followed here; the loader validates each
/// file as it reaches it.
pub fn validate_process_file(file: &ProcessFile) -> Result<()> {
    ensure_has_nodes(file)?;
    validate_unique_ids(file)?;
    validate_transition_endpoints(file)?;
    validate_initial_node(file)?;
    validate_node_options(file)?;
    validate_guards(file)?;
    Ok(())
}

/// Log nodes that no initial node can reach and return their ids.
///
/// Unreachable nodes are legal (they are simply never entered), so this only
/// warns.
pub fn warn_unreachable_nodes(file: &ProcessFile) -> Vec<String> {
    let unreachable: Vec<String> = unreachable_nodes(
        file.node.iter().map(|n| (n.id.as_str(), n.initial)),
        file.transition.iter().map(|t| (t.from.as_str(), t.to.as_str())),
    )
    .into_iter()
    .map(str::to_string)
    .collect();

    for id in &unreachable {
        warn!(node = %id, "node is not reachable from an initial node");
    }
    unreachable
}

fn config_error(message: String) -> ProcessError {
    ProcessError::ConfigError(message)
}

fn ensure_has_nodes(file: &ProcessFile) -> Result<()> {
    if file.node.is_empty() {
        return Err(config_error(
            "process must contain at least one [[node]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_unique_ids(file: &ProcessFile) -> Result<()> {
    let mut seen = HashSet::new();
    let ids = file
        .node
        .iter()
        .map(|n| &n.id)
        .chain(file.transition.iter().map(|t| &t.id));

    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(config_error(format!("duplicate item id '{id}'")));
        }
    }
    Ok(())
}

fn validate_transition_endpoints(file: &ProcessFile) -> Result<()> {
    let nodes: HashSet<&str> = file.node.iter().map(|n| n.id.as_str()).collect();

    for transition in &file.transition {
        if !nodes.contains(transition.from.as_str()) {
            return Err(config_error(format!(
                "transition '{}' starts at unknown node '{}'",
                transition.id, transition.from
            )));
        }
        if !nodes.contains(transition.to.as_str()) {
            return Err(config_error(format!(
                "transition '{}' leads to unknown node '{}'",
                transition.id, transition.to
            )));
        }
    }
    Ok(())
}

fn validate_initial_node(file: &ProcessFile) -> Result<()> {
    if !file.node.iter().any(|n| n.initial) {
        return Err(config_error(
            "process has no initial node (set `initial = true` on one node)".to_string(),
        ));
    }
    Ok(())
}

fn validate_node_options(file: &ProcessFile) -> Result<()> {
    for node in &file.node {
        validate_default_transition(file, node)?;
        validate_nested_options(node)?;
    }
    Ok(())
}

fn validate_default_transition(file: &ProcessFile, node: &NodeConfig) -> Result<()> {
    let Some(default) = &node.default else {
        return Ok(());
    };

    if !node.behavior.is_choice() {
        return Err(config_error(format!(
            "node '{}': `default` is only valid for exclusive or inclusive nodes, not {}",
            node.id, node.behavior
        )));
    }

    let outgoing = file
        .transition
        .iter()
        .any(|t| t.id == *default && t.from == node.id);
    if !outgoing {
        return Err(config_error(format!(
            "node '{}': default '{}' is not an outgoing transition of the node",
            node.id, default
        )));
    }
    Ok(())
}

fn validate_nested_options(node: &NodeConfig) -> Result<()> {
    if node.behavior == BehaviorKind::Nested {
        if node.process.is_none() {
            return Err(config_error(format!(
                "nested node '{}' must name a `process` file",
                node.id
            )));
        }
        return Ok(());
    }

    let misplaced = [
        ("process", node.process.is_some()),
        ("isolate", node.isolate.is_some()),
        ("inputs", !node.inputs.is_empty()),
        ("outputs", !node.outputs.is_empty()),
    ];
    if let Some((option, _)) = misplaced.iter().find(|(_, used)| *used) {
        return Err(config_error(format!(
            "node '{}': `{}` is only valid for nested nodes, not {}",
            node.id, option, node.behavior
        )));
    }
    Ok(())
}

fn validate_guards(file: &ProcessFile) -> Result<()> {
    for transition in &file.transition {
        if let Some(guard) = &transition.when {
            guard.parse::<Condition>().map_err(|err| {
                config_error(format!("transition '{}': {}", transition.id, err))
            })?;
        }
    }
    Ok(())
}
