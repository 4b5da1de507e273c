// src/model/builder.rs

//! Fluent construction of [`ProcessModel`]s.
//!
//! ```ignore
//! let mut builder = ProcessBuilder::new("Approval");
//! builder.start_node("start");
//! builder.wait_node("review");
//! builder.pass_node("end");
//! builder.transition("t1", "start", "review");
//! builder.transition("t2", "review", "end").when("approved");
//! let model = builder.build()?;
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use crate::behavior::{Behavior, PassBehavior, WaitStateBehavior};
use crate::errors::{ProcessError, Result};
use crate::model::graph::{Item, Node, ProcessModel, Transition, unreachable_nodes};
use crate::model::trigger::{Condition, Trigger};

#[derive(Clone)]
pub struct NodeBuilder {
    id: String,
    initial: bool,
    behavior: Option<Arc<dyn Behavior>>,
}

impl NodeBuilder {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            initial: false,
            behavior: None,
        }
    }

    pub fn behavior(&mut self, behavior: impl Behavior + 'static) -> &mut Self {
        self.behavior = Some(Arc::new(behavior));
        self
    }

    pub fn shared_behavior(&mut self, behavior: Arc<dyn Behavior>) -> &mut Self {
        self.behavior = Some(behavior);
        self
    }

    pub fn initial(&mut self) -> &mut Self {
        self.initial = true;
        self
    }
}

#[derive(Clone)]
pub struct TransitionBuilder {
    id: String,
    from: String,
    to: String,
    triggers: Vec<Arc<dyn Trigger>>,
    guards: Vec<String>,
}

impl TransitionBuilder {
    fn new(id: &str, from: &str, to: &str) -> Self {
        Self {
            id: id.to_string(),
            from: from.to_string(),
            to: to.to_string(),
            triggers: Vec::new(),
            guards: Vec::new(),
        }
    }

    pub fn trigger(&mut self, trigger: impl Trigger + 'static) -> &mut Self {
        self.triggers.push(Arc::new(trigger));
        self
    }

    /// Guard expression in [`Condition`] syntax; parsed by `build()`.
    pub fn when(&mut self, expression: &str) -> &mut Self {
        self.guards.push(expression.to_string());
        self
    }

    fn build(&self) -> Result<Transition> {
        let mut transition = Transition::new(&self.id, &self.from, &self.to);
        for trigger in &self.triggers {
            transition = transition.with_trigger(Arc::clone(trigger));
        }
        for guard in &self.guards {
            let condition = guard.parse::<Condition>().map_err(|e| {
                ProcessError::ConfigError(format!("transition '{}': {e}", self.id))
            })?;
            transition = transition.with_trigger(Arc::new(condition));
        }
        Ok(transition)
    }
}

#[derive(Clone, Copy)]
enum Slot {
    Node(usize),
    Transition(usize),
}

/// Collects nodes and transitions in declaration order.
///
/// Re-using an id is recorded and reported by [`ProcessBuilder::build`].
#[derive(Clone)]
pub struct ProcessBuilder {
    title: String,
    nodes: Vec<NodeBuilder>,
    transitions: Vec<TransitionBuilder>,
    order: Vec<Slot>,
    ids: HashSet<String>,
    duplicates: Vec<String>,
}

impl ProcessBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            nodes: Vec::new(),
            transitions: Vec::new(),
            order: Vec::new(),
            ids: HashSet::new(),
            duplicates: Vec::new(),
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn node(&mut self, id: &str) -> &mut NodeBuilder {
        self.claim(id);
        self.nodes.push(NodeBuilder::new(id));
        self.order.push(Slot::Node(self.nodes.len() - 1));
        let idx = self.nodes.len() - 1;
        &mut self.nodes[idx]
    }

    pub fn pass_node(&mut self, id: &str) -> &mut NodeBuilder {
        self.node(id).behavior(PassBehavior)
    }

    /// Pass-through node flagged as a process start point.
    pub fn start_node(&mut self, id: &str) -> &mut NodeBuilder {
        self.pass_node(id).initial()
    }

    pub fn wait_node(&mut self, id: &str) -> &mut NodeBuilder {
        self.node(id).behavior(WaitStateBehavior)
    }

    pub fn transition(&mut self, id: &str, from: &str, to: &str) -> &mut TransitionBuilder {
        self.claim(id);
        self.transitions.push(TransitionBuilder::new(id, from, to));
        self.order.push(Slot::Transition(self.transitions.len() - 1));
        let idx = self.transitions.len() - 1;
        &mut self.transitions[idx]
    }

    /// Copy every item of `other` into this builder, after the existing ones.
    pub fn append(&mut self, other: &ProcessBuilder) -> &mut Self {
        for slot in &other.order {
            match *slot {
                Slot::Node(i) => {
                    let node = other.nodes[i].clone();
                    self.claim(&node.id);
                    self.nodes.push(node);
                    self.order.push(Slot::Node(self.nodes.len() - 1));
                }
                Slot::Transition(i) => {
                    let transition = other.transitions[i].clone();
                    self.claim(&transition.id);
                    self.transitions.push(transition);
                    self.order.push(Slot::Transition(self.transitions.len() - 1));
                }
            }
        }
        self
    }

    /// Authoring problems that `build()` tolerates but that usually indicate a
    /// broken model. An empty list means nothing was found.
    pub fn validate(&self) -> Vec<String> {
        let mut problems = Vec::new();

        for id in &self.duplicates {
            problems.push(format!("duplicate item id '{id}'"));
        }

        for node in &self.nodes {
            if node.behavior.is_none() {
                problems.push(format!("node '{}' has no behavior", node.id));
            }
        }

        let node_ids: HashSet<&str> = self.nodes.iter().map(|n| n.id.as_str()).collect();
        for t in &self.transitions {
            if !node_ids.contains(t.from.as_str()) {
                problems.push(format!("transition '{}' starts at unknown node '{}'", t.id, t.from));
            }
            if !node_ids.contains(t.to.as_str()) {
                problems.push(format!("transition '{}' leads to unknown node '{}'", t.id, t.to));
            }
        }

        if !self.nodes.is_empty() && !self.nodes.iter().any(|n| n.initial) {
            problems.push("process has no initial node".to_string());
        } else {
            let unreachable = unreachable_nodes(
                self.nodes.iter().map(|n| (n.id.as_str(), n.initial)),
                self.transitions.iter().map(|t| (t.from.as_str(), t.to.as_str())),
            );
            for id in unreachable {
                problems.push(format!("node '{id}' is not reachable from an initial node"));
            }
        }

        problems
    }

    pub fn build(&self) -> Result<ProcessModel> {
        if let Some(id) = self.duplicates.first() {
            return Err(ProcessError::DuplicateItem(id.clone()));
        }

        let mut items = Vec::with_capacity(self.order.len());
        for slot in &self.order {
            match *slot {
                Slot::Node(i) => {
                    let node = &self.nodes[i];
                    let behavior = node
                        .behavior
                        .clone()
                        .ok_or_else(|| ProcessError::MissingBehavior(node.id.clone()))?;
                    items.push(Item::Node(
                        Node::new(&node.id, behavior).with_initial(node.initial),
                    ));
                }
                Slot::Transition(i) => items.push(Item::Transition(self.transitions[i].build()?)),
            }
        }

        ProcessModel::from_items(self.title.clone(), items)
    }

    fn claim(&mut self, id: &str) {
        if !self.ids.insert(id.to_string()) {
            self.duplicates.push(id.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_items_in_declaration_order() {
        let mut builder = ProcessBuilder::new("Order");
        builder.start_node("start");
        builder.transition("t1", "start", "a");
        builder.wait_node("a");

        let model = builder.build().unwrap();
        let ids: Vec<_> = model.items().iter().map(|i| i.id()).collect();
        assert_eq!(ids, vec!["start", "t1", "a"]);
        assert!(model.find_node("start").unwrap().is_initial());
        assert!(builder.validate().is_empty());
    }

    #[test]
    fn node_without_behavior_fails_to_build() {
        let mut builder = ProcessBuilder::new("Broken");
        builder.node("lonely").initial();

        let err = builder.build().unwrap_err();
        assert!(matches!(err, ProcessError::MissingBehavior(id) if id == "lonely"));
        assert_eq!(builder.validate(), vec!["node 'lonely' has no behavior".to_string()]);
    }

    #[test]
    fn duplicate_ids_are_reported_by_build() {
        let mut builder = ProcessBuilder::new("Dup");
        builder.start_node("a");
        builder.pass_node("a");

        assert!(matches!(builder.build(), Err(ProcessError::DuplicateItem(id)) if id == "a"));
    }

    #[test]
    fn validate_reports_dangling_and_unreachable_nodes() {
        let mut builder = ProcessBuilder::new("Dangling");
        builder.start_node("start");
        builder.pass_node("orphan");
        builder.transition("t1", "start", "nowhere");

        let problems = builder.validate();
        assert!(problems.contains(&"transition 't1' leads to unknown node 'nowhere'".to_string()));
        assert!(problems.contains(&"node 'orphan' is not reachable from an initial node".to_string()));
    }

    #[test]
    fn invalid_guard_fails_to_build() {
        let mut builder = ProcessBuilder::new("Guard");
        builder.start_node("start");
        builder.pass_node("end");
        builder.transition("t1", "start", "end").when("amount >=");

        assert!(matches!(builder.build(), Err(ProcessError::ConfigError(_))));
    }

    #[test]
    fn append_merges_builders() {
        let mut main = ProcessBuilder::new("Main");
        main.start_node("start");

        let mut tail = ProcessBuilder::new("Tail");
        tail.pass_node("end");
        tail.transition("t1", "start", "end");

        main.append(&tail);
        let model = main.build().unwrap();
        assert_eq!(model.title(), "Main");
        assert_eq!(model.find_outgoing_transitions("start").len(), 1);

        main.append(&tail);
        assert!(matches!(main.build(), Err(ProcessError::DuplicateItem(_))));
    }
}
