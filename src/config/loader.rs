// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::behavior::{
    Behavior, ExclusiveChoiceBehavior, InclusiveChoiceBehavior, NestedProcessBehavior,
    NoopBehavior, PassBehavior, SyncBehavior, TerminateBehavior, WaitStateBehavior,
};
use crate::config::model::{BehaviorKind, NodeConfig, ProcessFile};
use crate::config::validate::{validate_process_file, warn_unreachable_nodes};
use crate::errors::{ProcessError, Result};
use crate::model::{ProcessBuilder, ProcessModel};

/// Read a process definition and return the raw `ProcessFile`.
///
/// This only performs TOML deserialization; it does **not** validate the
/// definition or follow nested process files. Use [`load_and_validate`] for
/// that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ProcessFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    let file: ProcessFile = toml::from_str(&contents)?;
    Ok(file)
}

/// Read, validate and build a process model.
///
/// - Validates the definition (see [`validate_process_file`]).
/// - Warns about nodes no initial node can reach.
/// - Loads the files named by `nested` nodes, relative to the including
///   file, and builds them recursively. A file including itself, directly or
///   through other files, is a configuration error.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ProcessModel> {
    let mut including = Vec::new();
    load_model(path.as_ref(), &mut including)
}

/// `Process.toml` in the current working directory.
pub fn default_model_path() -> PathBuf {
    PathBuf::from("Process.toml")
}

fn load_model(path: &Path, including: &mut Vec<PathBuf>) -> Result<ProcessModel> {
    let canonical = fs::canonicalize(path)?;
    if including.contains(&canonical) {
        return Err(ProcessError::ConfigError(format!(
            "process file '{}' includes itself",
            path.display()
        )));
    }
    including.push(canonical);

    let file = load_from_path(path)?;
    validate_process_file(&file)?;
    warn_unreachable_nodes(&file);

    let title = file.process.title.clone().unwrap_or_else(|| {
        path.file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "process".to_string())
    });
    let base = path.parent().unwrap_or_else(|| Path::new(""));

    let mut builder = ProcessBuilder::new(&title);
    for node in &file.node {
        let behavior = node_behavior(node, base, including)?;
        let entry = builder.node(&node.id);
        entry.shared_behavior(behavior);
        if node.initial {
            entry.initial();
        }
    }
    for transition in &file.transition {
        let entry = builder.transition(&transition.id, &transition.from, &transition.to);
        if let Some(guard) = &transition.when {
            entry.when(guard);
        }
    }

    let model = builder.build()?;
    including.pop();

    debug!(
        path = %path.display(),
        title = %model.title(),
        items = model.items().len(),
        "loaded process definition"
    );
    Ok(model)
}

fn node_behavior(
    node: &NodeConfig,
    base: &Path,
    including: &mut Vec<PathBuf>,
) -> Result<Arc<dyn Behavior>> {
    let behavior: Arc<dyn Behavior> = match node.behavior {
        BehaviorKind::Pass => Arc::new(PassBehavior),
        BehaviorKind::Wait => Arc::new(WaitStateBehavior),
        BehaviorKind::Sync => Arc::new(SyncBehavior),
        BehaviorKind::Terminate => Arc::new(TerminateBehavior),
        BehaviorKind::Noop => Arc::new(NoopBehavior),
        BehaviorKind::Exclusive => Arc::new(match &node.default {
            Some(default) => ExclusiveChoiceBehavior::with_default(default),
            None => ExclusiveChoiceBehavior::new(),
        }),
        BehaviorKind::Inclusive => Arc::new(match &node.default {
            Some(default) => InclusiveChoiceBehavior::with_default(default),
            None => InclusiveChoiceBehavior::new(),
        }),
        BehaviorKind::Nested => {
            let process = node.process.as_deref().ok_or_else(|| {
                ProcessError::ConfigError(format!(
                    "nested node '{}' must name a `process` file",
                    node.id
                ))
            })?;
            let nested = load_model(&base.join(process), including)?;

            let mut behavior =
                NestedProcessBehavior::new(Arc::new(nested)).isolate(node.isolate.unwrap_or(true));
            for (target, source) in &node.inputs {
                behavior = behavior.input(target, source);
            }
            for (target, source) in &node.outputs {
                behavior = behavior.output(target, source);
            }
            Arc::new(behavior)
        }
    };
    Ok(behavior)
}
