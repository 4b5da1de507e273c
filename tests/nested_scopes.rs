// tests/nested_scopes.rs
mod common;
use crate::common::fixtures::{nested_scopes, vars};
use crate::common::{TestEngine, init_tracing, no_vars};

use std::error::Error;

use serde_json::json;
use tokenflow::types::ExecutionId;

type TestResult = Result<(), Box<dyn Error>>;

/// Start the process, enter the sub process and return `(process, nested)`.
fn enter_sub_process(harness: &mut TestEngine, isolate: bool) -> Result<(ExecutionId, ExecutionId), Box<dyn Error>> {
    let process = harness.start_process(nested_scopes(isolate), vars([("subject", json!("invoice"))]))?;
    assert_eq!(harness.node(process).as_deref(), Some("A"));

    harness.signal(process, None, no_vars())?;
    assert_eq!(harness.node(process).as_deref(), Some("sub"));
    assert!(harness.is_waiting(process));

    let children = harness.engine().find_child_executions(process, None)?;
    assert_eq!(children.len(), 1);
    let nested = children[0];
    assert_eq!(harness.node(nested).as_deref(), Some("B"));
    assert!(harness.is_waiting(nested));
    Ok((process, nested))
}

#[test]
fn isolated_sub_process_owns_its_variables() -> TestResult {
    init_tracing();

    let mut harness = TestEngine::new();
    let (process, nested) = enter_sub_process(&mut harness, true)?;

    let local = harness.engine().variables_local(nested)?;
    assert_eq!(local.get("tmp"), Some(&json!("invoice")));
    assert!(!local.contains_key("subject"));
    assert_eq!(harness.engine().get_variable(nested, "tmp")?, json!("invoice"));
    assert!(!harness.engine().has_variable(nested, "subject")?);
    assert_eq!(harness.variable(process, "tmp"), None);

    assert_eq!(harness.signal_all(process, None)?, 1);
    assert!(harness.is_terminated(nested));
    assert!(harness.is_terminated(process));
    assert_eq!(harness.node(process).as_deref(), Some("e1"));
    assert_eq!(harness.variable(process, "subject"), Some(json!("invoice")));
    assert_eq!(harness.variable(process, "tmp"), None);
    assert_eq!(harness.variable(nested, "tmp"), Some(json!("invoice")));
    Ok(())
}

#[test]
fn nested_outputs_are_copied_back_into_the_parent() -> TestResult {
    init_tracing();

    let mut harness = TestEngine::new();
    let (process, nested) = enter_sub_process(&mut harness, true)?;

    harness.signal(nested, None, vars([("tmp", json!("world"))]))?;

    assert!(harness.is_terminated(process));
    assert_eq!(harness.node(process).as_deref(), Some("e1"));
    assert_eq!(harness.variable(process, "subject"), Some(json!("world")));
    assert_eq!(harness.variable(process, "tmp"), None);
    Ok(())
}

#[test]
fn shared_sub_process_writes_through_to_the_parent() -> TestResult {
    init_tracing();

    let mut harness = TestEngine::new();
    let (process, nested) = enter_sub_process(&mut harness, false)?;

    assert!(harness.engine().variables_local(nested)?.is_empty());
    assert_eq!(harness.engine().get_variable(nested, "subject")?, json!("invoice"));
    assert_eq!(harness.variable(process, "tmp"), Some(json!("invoice")));

    harness.signal_all(process, None)?;
    assert!(harness.is_terminated(process));
    assert_eq!(harness.variable(process, "subject"), Some(json!("invoice")));
    assert_eq!(harness.variable(process, "tmp"), Some(json!("invoice")));
    Ok(())
}

#[test]
fn parent_is_resumed_by_the_nested_process_not_by_a_signal() -> TestResult {
    init_tracing();

    let mut harness = TestEngine::new();
    let (process, nested) = enter_sub_process(&mut harness, true)?;

    harness.signal(nested, None, no_vars())?;
    assert!(harness.is_terminated(process));

    let ends = harness.events().count("end_process");
    assert_eq!(ends, 1);
    assert!(harness.journal().is_removed(nested));
    Ok(())
}
