// src/model/mod.rs

//! Process models: an immutable, ordered graph of nodes and transitions.
//!
//! - [`ProcessModel`] answers adjacency queries for the engine.
//! - [`ProcessBuilder`] assembles models in code.
//! - [`Trigger`] / [`Condition`] guard transitions.

pub mod builder;
pub mod graph;
pub mod trigger;

pub use builder::{NodeBuilder, ProcessBuilder, TransitionBuilder};
pub use graph::{Item, Node, ProcessModel, Transition};
pub use trigger::{CompareOp, Condition, Trigger};
