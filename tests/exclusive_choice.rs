// tests/exclusive_choice.rs
mod common;
use crate::common::fixtures::{exclusive_fork_and_join, stuck_exclusive_choice};
use crate::common::{TestEngine, init_tracing, no_vars};

use std::error::Error;

use serde_json::{Value, json};
use tokenflow::errors::{ErrorKind, ProcessError};

type TestResult = Result<(), Box<dyn Error>>;

fn bill_for(amount: i64) -> Result<Option<Value>, Box<dyn Error>> {
    let mut harness = TestEngine::new();
    let process = harness.start_process(exclusive_fork_and_join(), no_vars())?;

    assert!(harness.is_active(process));
    assert!(harness.is_waiting(process));
    assert!(!harness.is_terminated(process));
    assert_eq!(harness.variable(process, "sum"), None);

    harness.set_variable(process, "amount", amount)?;
    harness.signal(process, None, no_vars())?;

    assert!(harness.is_active(process));
    assert!(!harness.is_waiting(process));
    assert!(harness.is_terminated(process));

    Ok(harness.variable(process, "sum"))
}

#[test]
fn small_amount_takes_the_default_transition() -> TestResult {
    init_tracing();
    assert_eq!(bill_for(120)?, Some(json!(120)));
    Ok(())
}

#[test]
fn large_amounts_get_a_discount() -> TestResult {
    init_tracing();
    assert_eq!(bill_for(220)?, Some(json!(190)));
    assert_eq!(bill_for(340)?, Some(json!(310)));
    Ok(())
}

#[test]
fn discount_branch_is_visited_only_when_enabled() -> TestResult {
    init_tracing();

    let mut harness = TestEngine::new();
    let process = harness.start_process(exclusive_fork_and_join(), no_vars())?;
    harness.set_variable(process, "amount", 500)?;
    harness.signal(process, None, no_vars())?;

    assert_eq!(
        harness.events().entered_nodes(),
        vec!["start", "amount", "choice", "discount", "join", "bill", "end"]
    );
    Ok(())
}

#[test]
fn choice_without_enabled_transition_or_default_is_stuck() {
    init_tracing();

    let mut harness = TestEngine::new();
    let err = harness
        .start_process(stuck_exclusive_choice(), no_vars())
        .unwrap_err();

    assert!(matches!(err, ProcessError::Stuck { choice: "exclusive", .. }));
    assert_eq!(err.kind(), ErrorKind::Stuck);
    assert_eq!(harness.engine().pending_commands(), 0);
}
