// src/lib.rs

pub mod behavior;
pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod execution;
pub mod logging;
pub mod model;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::engine::{Engine, MemoryJournal};
use crate::model::{Item, ProcessModel};
use crate::types::{Delegation, ExecutionId, Variables};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - process definition loading
/// - an engine mirrored into an in-memory journal
/// - the optional `--signal-all` loop
/// - the final report on stdout
pub fn run(args: CliArgs) -> Result<()> {
    let model_path = PathBuf::from(&args.model);
    let model = load_and_validate(&model_path)
        .with_context(|| format!("loading process model {}", model_path.display()))?;
    let model = Arc::new(model);

    if args.dry_run {
        print_dry_run(&model);
        return Ok(());
    }

    let journal = MemoryJournal::new();
    let mut engine = Engine::new().with_sync_listener(journal.clone());

    let variables: Variables = args.vars.into_iter().collect();
    let root = engine.start_process(Arc::clone(&model), variables)?;

    if args.signal_all {
        signal_until_done(&mut engine, root, args.max_rounds)?;
    }

    print_report(&engine, &journal, root)
}

/// Signal every parked execution, round after round, until nothing waits
/// any more or `max_rounds` is used up.
///
/// Executions with live children are waiting on a nested process and are
/// resumed by it, so they are left alone.
fn signal_until_done(engine: &mut Engine, root: ExecutionId, max_rounds: usize) -> Result<()> {
    for round in 1..=max_rounds {
        let waiting: Vec<ExecutionId> = engine
            .executions()
            .filter(|e| e.is_waiting() && !e.is_terminated() && e.children().is_empty())
            .map(|e| e.id())
            .collect();

        if waiting.is_empty() {
            debug!(round, "nothing left to signal");
            return Ok(());
        }

        info!(round, count = waiting.len(), "signalling waiting executions");
        for id in waiting {
            let still_waiting = engine
                .find_execution(id)
                .map(|e| e.is_waiting() && !e.is_terminated())
                .unwrap_or(false);
            if still_waiting {
                engine.signal(id, None, Variables::new(), Delegation::new())?;
            }
        }
    }

    if engine.find_execution(root).is_ok_and(|e| !e.is_terminated()) {
        warn!(max_rounds, "process still running after the last signal round");
    }
    Ok(())
}

fn print_report(engine: &Engine, journal: &MemoryJournal, root: ExecutionId) -> Result<()> {
    let snapshot = journal
        .snapshot(root)
        .ok_or_else(|| anyhow!("no journal entry for process {root}"))?;

    println!("process {root}");
    if snapshot.is_terminated() {
        println!("  state: terminated");
    } else {
        println!("  state: running");
    }
    if let Some(node) = &snapshot.node {
        println!("  node: {node}");
    }

    let mut waiting: Vec<(String, ExecutionId)> = engine
        .executions()
        .filter(|e| e.is_waiting() && !e.is_terminated())
        .map(|e| (e.node().unwrap_or("-").to_string(), e.id()))
        .collect();
    waiting.sort();
    if !waiting.is_empty() {
        println!("  waiting ({}):", waiting.len());
        for (node, id) in waiting {
            println!("    - {id} at {node}");
        }
    }

    println!("variables:");
    println!("{}", serde_json::to_string_pretty(&snapshot.variables)?);
    Ok(())
}

/// Dry-run output: print nodes and transitions in declaration order.
fn print_dry_run(model: &ProcessModel) {
    println!("tokenflow dry-run");
    println!("  process: {}", model.title());
    println!();

    for item in model.items() {
        match item {
            Item::Node(node) => {
                let marker = if node.is_initial() { " (initial)" } else { "" };
                println!("  node {}{marker}: {:?}", node.id(), node.behavior());
            }
            Item::Transition(transition) => {
                print!(
                    "  transition {}: {} -> {}",
                    transition.id(),
                    transition.from(),
                    transition.to()
                );
                if transition.trigger_count() > 0 {
                    print!(" [{} guard(s)]", transition.trigger_count());
                }
                println!();
            }
        }
    }

    for node in model.unreachable_nodes() {
        println!("  warning: node {node} is not reachable from an initial node");
    }

    debug!("dry-run complete (no execution)");
}
