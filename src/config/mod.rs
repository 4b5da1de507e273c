// src/config/mod.rs

//! TOML process definitions.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a definition from disk, following nested process files (`loader.rs`).
//! - Validate a definition before it is turned into a model (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_model_path, load_and_validate, load_from_path};
pub use model::{BehaviorKind, NodeConfig, ProcessFile, ProcessSection, TransitionConfig};
pub use validate::{validate_process_file, warn_unreachable_nodes};
