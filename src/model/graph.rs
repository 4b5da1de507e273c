// src/model/graph.rs

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use petgraph::algo::has_path_connecting;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Dfs;
use uuid::Uuid;

use crate::behavior::Behavior;
use crate::errors::{ProcessError, Result};
use crate::execution::ExecutionAccess;
use crate::model::trigger::Trigger;

/// A place in the process graph; runs its behavior when an execution arrives.
#[derive(Clone)]
pub struct Node {
    id: String,
    initial: bool,
    behavior: Arc<dyn Behavior>,
}

impl Node {
    pub fn new(id: impl Into<String>, behavior: Arc<dyn Behavior>) -> Self {
        Self {
            id: id.into(),
            initial: false,
            behavior,
        }
    }

    pub fn with_initial(mut self, initial: bool) -> Self {
        self.initial = initial;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_initial(&self) -> bool {
        self.initial
    }

    pub fn behavior(&self) -> &Arc<dyn Behavior> {
        &self.behavior
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("initial", &self.initial)
            .field("behavior", &self.behavior)
            .finish()
    }
}

/// Directed edge between two nodes, guarded by zero or more triggers.
#[derive(Clone)]
pub struct Transition {
    id: String,
    from: String,
    to: String,
    triggers: Vec<Arc<dyn Trigger>>,
}

impl Transition {
    pub fn new(id: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            triggers: Vec::new(),
        }
    }

    pub fn with_trigger(mut self, trigger: Arc<dyn Trigger>) -> Self {
        self.triggers.push(trigger);
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn from(&self) -> &str {
        &self.from
    }

    pub fn to(&self) -> &str {
        &self.to
    }

    pub fn trigger_count(&self) -> usize {
        self.triggers.len()
    }

    /// `true` iff every trigger accepts the execution; no triggers means enabled.
    pub fn is_enabled(&self, access: &ExecutionAccess<'_>) -> bool {
        self.triggers.iter().all(|t| t.is_enabled(access))
    }
}

impl fmt::Debug for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transition")
            .field("id", &self.id)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("triggers", &self.triggers.len())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Item {
    Node(Node),
    Transition(Transition),
}

impl Item {
    pub fn id(&self) -> &str {
        match self {
            Item::Node(node) => node.id(),
            Item::Transition(transition) => transition.id(),
        }
    }
}

/// Immutable process graph.
///
/// Items keep their declaration order; outgoing transitions are reported in
/// that order, which decides fork branch order and choice priority.
#[derive(Debug)]
pub struct ProcessModel {
    id: Uuid,
    title: String,
    items: Vec<Item>,
    index: HashMap<String, usize>,
}

impl ProcessModel {
    /// Empty model with a fresh id.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Build a model from items; ids must be unique across nodes and transitions.
    pub fn from_items(title: impl Into<String>, items: Vec<Item>) -> Result<Self> {
        let mut model = Self::new(title);
        for item in items {
            if model.index.contains_key(item.id()) {
                return Err(ProcessError::DuplicateItem(item.id().to_string()));
            }
            model.index.insert(item.id().to_string(), model.items.len());
            model.items.push(item);
        }
        Ok(model)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn find_item(&self, id: &str) -> Result<&Item> {
        self.index
            .get(id)
            .map(|&i| &self.items[i])
            .ok_or_else(|| ProcessError::ItemNotFound(id.to_string()))
    }

    pub fn find_node(&self, id: &str) -> Result<&Node> {
        match self.index.get(id).map(|&i| &self.items[i]) {
            Some(Item::Node(node)) => Ok(node),
            _ => Err(ProcessError::NodeNotFound(id.to_string())),
        }
    }

    pub fn find_transition(&self, id: &str) -> Result<&Transition> {
        match self.index.get(id).map(|&i| &self.items[i]) {
            Some(Item::Transition(transition)) => Ok(transition),
            _ => Err(ProcessError::TransitionNotFound(id.to_string())),
        }
    }

    pub fn find_nodes(&self) -> impl Iterator<Item = &Node> {
        self.items.iter().filter_map(|item| match item {
            Item::Node(node) => Some(node),
            Item::Transition(_) => None,
        })
    }

    pub fn find_transitions(&self) -> impl Iterator<Item = &Transition> {
        self.items.iter().filter_map(|item| match item {
            Item::Transition(transition) => Some(transition),
            Item::Node(_) => None,
        })
    }

    pub fn find_outgoing_transitions(&self, node: &str) -> Vec<&Transition> {
        self.find_transitions().filter(|t| t.from() == node).collect()
    }

    pub fn find_incoming_transitions(&self, node: &str) -> Vec<&Transition> {
        self.find_transitions().filter(|t| t.to() == node).collect()
    }

    pub fn find_initial_nodes(&self) -> Vec<&Node> {
        self.find_nodes().filter(|n| n.is_initial()).collect()
    }

    /// Nodes without any incoming transition.
    pub fn find_start_nodes(&self) -> Vec<&Node> {
        self.find_nodes()
            .filter(|n| self.find_incoming_transitions(n.id()).is_empty())
            .collect()
    }

    /// Whether `to` can be reached from `from` by following transitions.
    ///
    /// A node always reaches itself.
    pub fn is_reachable(&self, from: &str, to: &str) -> bool {
        let graph = self.flow_graph();
        if !graph.contains_node(from) || !graph.contains_node(to) {
            return false;
        }
        has_path_connecting(&graph, from, to, None)
    }

    /// Nodes that no initial node can reach.
    pub fn unreachable_nodes(&self) -> Vec<&str> {
        unreachable_nodes(
            self.find_nodes().map(|n| (n.id(), n.is_initial())),
            self.find_transitions().map(|t| (t.from(), t.to())),
        )
    }

    /// Independent copy with a fresh id and cloned node behaviors.
    pub fn deep_clone(&self) -> ProcessModel {
        let items = self
            .items
            .iter()
            .map(|item| match item {
                Item::Node(node) => Item::Node(Node {
                    id: node.id.clone(),
                    initial: node.initial,
                    behavior: node.behavior.clone_behavior(),
                }),
                Item::Transition(transition) => Item::Transition(transition.clone()),
            })
            .collect();

        ProcessModel {
            id: Uuid::new_v4(),
            title: self.title.clone(),
            items,
            index: self.index.clone(),
        }
    }

    fn flow_graph(&self) -> DiGraphMap<&str, ()> {
        let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
        for node in self.find_nodes() {
            graph.add_node(node.id());
        }
        for transition in self.find_transitions() {
            graph.add_edge(transition.from(), transition.to(), ());
        }
        graph
    }
}

/// Nodes not reachable from any of the initial nodes.
///
/// Edges may mention ids that are not in `nodes`; those are ignored.
pub(crate) fn unreachable_nodes<'a>(
    nodes: impl Iterator<Item = (&'a str, bool)>,
    edges: impl Iterator<Item = (&'a str, &'a str)>,
) -> Vec<&'a str> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    let mut order = Vec::new();
    let mut initial = Vec::new();

    for (id, is_initial) in nodes {
        graph.add_node(id);
        order.push(id);
        if is_initial {
            initial.push(id);
        }
    }

    for (from, to) in edges {
        if graph.contains_node(from) && graph.contains_node(to) {
            graph.add_edge(from, to, ());
        }
    }

    let mut seen = std::collections::HashSet::new();
    for start in initial {
        let mut dfs = Dfs::new(&graph, start);
        while let Some(id) = dfs.next(&graph) {
            seen.insert(id);
        }
    }

    order.into_iter().filter(|id| !seen.contains(id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::PassBehavior;

    fn pass(id: &str) -> Item {
        Item::Node(Node::new(id, Arc::new(PassBehavior)))
    }

    fn sample() -> ProcessModel {
        ProcessModel::from_items(
            "Sample",
            vec![
                Item::Node(Node::new("start", Arc::new(PassBehavior)).with_initial(true)),
                pass("a"),
                pass("b"),
                pass("island"),
                Item::Transition(Transition::new("t1", "start", "a")),
                Item::Transition(Transition::new("t2", "start", "b")),
                Item::Transition(Transition::new("t3", "a", "b")),
            ],
        )
        .unwrap()
    }

    #[test]
    fn keeps_identity_and_title() {
        let model = ProcessModel::new("Empty");
        assert_eq!(model.title(), "Empty");
        assert!(model.items().is_empty());
        assert_ne!(model.id(), ProcessModel::new("Empty").id());
    }

    #[test]
    fn lookups_distinguish_item_kinds() {
        let model = sample();
        assert!(model.find_node("a").is_ok());
        assert!(matches!(
            model.find_node("t1"),
            Err(ProcessError::NodeNotFound(id)) if id == "t1"
        ));
        assert!(matches!(
            model.find_transition("a"),
            Err(ProcessError::TransitionNotFound(_))
        ));
        assert!(matches!(model.find_item("zzz"), Err(ProcessError::ItemNotFound(_))));
        assert_eq!(model.find_item("t3").unwrap().id(), "t3");
    }

    #[test]
    fn adjacency_follows_declaration_order() {
        let model = sample();
        let out: Vec<_> = model.find_outgoing_transitions("start").iter().map(|t| t.id()).collect();
        assert_eq!(out, vec!["t1", "t2"]);
        let incoming: Vec<_> = model.find_incoming_transitions("b").iter().map(|t| t.id()).collect();
        assert_eq!(incoming, vec!["t2", "t3"]);
        assert_eq!(model.find_initial_nodes().len(), 1);
        let starts: Vec<_> = model.find_start_nodes().iter().map(|n| n.id()).collect();
        assert_eq!(starts, vec!["start", "island"]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let err = ProcessModel::from_items("Dup", vec![pass("a"), pass("a")]).unwrap_err();
        assert!(matches!(err, ProcessError::DuplicateItem(id) if id == "a"));
    }

    #[test]
    fn reachability_and_unreachable_nodes() {
        let model = sample();
        assert!(model.is_reachable("start", "b"));
        assert!(model.is_reachable("a", "a"));
        assert!(!model.is_reachable("b", "a"));
        assert!(!model.is_reachable("missing", "a"));
        assert_eq!(model.unreachable_nodes(), vec!["island"]);
    }

    #[test]
    fn deep_clone_gets_new_identity() {
        let model = sample();
        let copy = model.deep_clone();
        assert_ne!(model.id(), copy.id());
        assert_eq!(copy.title(), model.title());
        assert_eq!(copy.items().len(), model.items().len());
        assert!(copy.find_transition("t2").is_ok());
    }
}
