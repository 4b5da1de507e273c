// tests/signal_execution.rs
mod common;
use crate::common::fixtures::{basic_transitions, signal_throw_catch, vars};
use crate::common::{TestEngine, init_tracing, no_vars};

use std::error::Error;

use serde_json::json;
use tokenflow::engine::ProcessEvent;
use tokenflow::errors::ProcessError;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn thrown_signal_is_caught_before_the_thrower_reaches_the_join() -> TestResult {
    init_tracing();

    let mut harness = TestEngine::new();
    let process = harness.start_process(signal_throw_catch(), no_vars())?;
    assert_eq!(harness.count_waiting(process), 2);

    harness.signal_all(process, Some("task"))?;

    assert!(harness.is_terminated(process));
    assert_eq!(harness.variable(process, "caught"), Some(json!(1)));

    let signalled: Vec<String> = harness
        .events()
        .events()
        .into_iter()
        .filter_map(|event| match event {
            ProcessEvent::SignalNode { node, .. } => Some(node),
            _ => None,
        })
        .collect();
    assert_eq!(signalled, vec!["task", "catch"]);
    Ok(())
}

#[test]
fn named_signal_selects_the_transition() -> TestResult {
    init_tracing();

    for (transition, node) in [("t2", "a"), ("t3", "b")] {
        let mut harness = TestEngine::new();
        let process = harness.start_process(basic_transitions(), no_vars())?;
        assert!(harness.is_waiting(process));

        harness.signal(process, Some(transition), no_vars())?;
        assert!(harness.is_terminated(process));
        assert_eq!(harness.variable(process, "outcome"), Some(json!(node)));
    }
    Ok(())
}

#[test]
fn signal_variables_land_in_the_process_scope() -> TestResult {
    init_tracing();

    let mut harness = TestEngine::new();
    let process = harness.start_process(basic_transitions(), no_vars())?;
    harness.signal(process, Some("t3"), vars([("approved", json!(true))]))?;

    assert_eq!(harness.variable(process, "approved"), Some(json!(true)));
    Ok(())
}

#[test]
fn unknown_signal_transition_fails_without_moving_the_process() -> TestResult {
    init_tracing();

    let mut harness = TestEngine::new();
    let process = harness.start_process(basic_transitions(), no_vars())?;

    let err = harness
        .signal(process, Some("t9"), no_vars())
        .expect_err("unknown transition");
    assert!(matches!(err, ProcessError::TransitionNotFound(_)));
    assert_eq!(harness.engine().pending_commands(), 0);
    assert_eq!(harness.node(process).as_deref(), Some("fork"));
    Ok(())
}
