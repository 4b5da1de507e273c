// tests/transition_flow.rs
mod common;
use crate::common::fixtures::{fork_with_triggers, trigger_blocks_take, vars};
use crate::common::{TestEngine, init_tracing, no_vars};

use std::error::Error;

use serde_json::{Value, json};

type TestResult = Result<(), Box<dyn Error>>;

fn fork_result(a: bool, b: bool) -> Result<i64, Box<dyn Error>> {
    let mut harness = TestEngine::new();
    let process = harness.start_process(fork_with_triggers(), vars([("a", json!(a)), ("b", json!(b))]))?;
    assert!(harness.is_terminated(process));
    Ok(harness
        .variable(process, "result")
        .and_then(|v| v.as_i64())
        .unwrap_or(0))
}

#[test]
fn triggers_decide_which_branches_are_forked() -> TestResult {
    init_tracing();
    assert_eq!(fork_result(false, false)?, 0);
    assert_eq!(fork_result(false, true)?, 7);
    assert_eq!(fork_result(true, false)?, 3);
    assert_eq!(fork_result(true, true)?, 10);
    Ok(())
}

fn run_guarded(proceed: Value) -> Result<bool, Box<dyn Error>> {
    let mut harness = TestEngine::new();
    let process = harness.start_process(trigger_blocks_take(), vars([("proceed", proceed)]))?;
    assert!(harness.is_terminated(process));
    Ok(harness.variable(process, "done") == Some(json!(true)))
}

#[test]
fn disabled_transition_ends_the_execution() -> TestResult {
    init_tracing();
    assert!(!run_guarded(json!(0))?);
    assert!(run_guarded(json!(1))?);
    assert!(run_guarded(json!(-241))?);
    Ok(())
}

#[test]
fn blocked_process_never_enters_the_guarded_node() -> TestResult {
    init_tracing();

    let mut harness = TestEngine::new();
    harness.start_process(trigger_blocks_take(), vars([("proceed", json!(false))]))?;
    assert_eq!(harness.events().entered_nodes(), vec!["start"]);
    assert_eq!(harness.events().count("take_transition"), 0);
    assert_eq!(harness.events().count("end_process"), 1);
    Ok(())
}

#[test]
fn absent_guard_variable_counts_as_false() -> TestResult {
    init_tracing();

    let mut harness = TestEngine::new();
    let process = harness.start_process(trigger_blocks_take(), no_vars())?;
    assert!(harness.is_terminated(process));
    assert_eq!(harness.variable(process, "done"), None);
    assert_eq!(harness.events().count("take_transition"), 0);
    Ok(())
}
