// tests/config_loading.rs
mod common;
use crate::common::fixtures::vars;
use crate::common::{TestEngine, init_tracing, no_vars};

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::json;
use tempfile::{TempDir, tempdir};
use tokenflow::cli::CliArgs;
use tokenflow::config::load_and_validate;
use tokenflow::errors::ProcessError;

type TestResult = Result<(), Box<dyn Error>>;

const ORDER: &str = r#"
[process]
title = "Order Approval"

[[node]]
id = "start"
behavior = "pass"
initial = true

[[node]]
id = "intake"
behavior = "wait"

[[node]]
id = "route"
behavior = "exclusive"
default = "small"

[[node]]
id = "review"
behavior = "nested"
process = "review.toml"
inputs = { total = "amount" }
outputs = { verdict = "result" }

[[node]]
id = "done"
behavior = "pass"

[[transition]]
id = "t1"
from = "start"
to = "intake"

[[transition]]
id = "t2"
from = "intake"
to = "route"

[[transition]]
id = "large"
from = "route"
to = "review"
when = "amount >= 100"

[[transition]]
id = "small"
from = "route"
to = "done"

[[transition]]
id = "t5"
from = "review"
to = "done"
"#;

const REVIEW: &str = r#"
[[node]]
id = "check"
behavior = "wait"
initial = true

[[node]]
id = "decide"
behavior = "pass"

[[transition]]
id = "checked"
from = "check"
to = "decide"
"#;

fn write_order(dir: &Path) -> Result<PathBuf, Box<dyn Error>> {
    let path = dir.join("Order.toml");
    fs::write(&path, ORDER)?;
    fs::write(dir.join("review.toml"), REVIEW)?;
    Ok(path)
}

fn order_dir() -> Result<(TempDir, PathBuf), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = write_order(dir.path())?;
    Ok((dir, path))
}

#[test]
fn large_orders_go_through_the_nested_review() -> TestResult {
    init_tracing();
    let (_dir, path) = order_dir()?;

    let model = load_and_validate(&path)?;
    assert_eq!(model.title(), "Order Approval");

    let mut harness = TestEngine::new();
    let process = harness.start_process(model, vars([("amount", json!(250))]))?;
    assert_eq!(harness.node(process).as_deref(), Some("intake"));

    harness.signal(process, None, no_vars())?;
    let review = harness.engine().find_child_executions(process, None)?;
    assert_eq!(review.len(), 1);
    assert_eq!(harness.node(review[0]).as_deref(), Some("check"));
    assert_eq!(harness.variable(review[0], "total"), Some(json!(250)));

    harness.signal(review[0], None, vars([("result", json!("approved"))]))?;
    assert!(harness.is_terminated(process));
    assert_eq!(harness.node(process).as_deref(), Some("done"));
    assert_eq!(harness.variable(process, "verdict"), Some(json!("approved")));
    assert_eq!(harness.variable(process, "result"), None);
    Ok(())
}

#[test]
fn small_orders_skip_the_review() -> TestResult {
    init_tracing();
    let (_dir, path) = order_dir()?;

    let mut harness = TestEngine::new();
    let process = harness.start_process(load_and_validate(&path)?, vars([("amount", json!(20))]))?;
    harness.signal(process, None, no_vars())?;

    assert!(harness.is_terminated(process));
    assert!(!harness.events().entered_nodes().contains(&"review".to_string()));
    assert_eq!(harness.variable(process, "verdict"), None);
    Ok(())
}

#[test]
fn dangling_transition_is_rejected_at_load_time() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("broken.toml");
    fs::write(
        &path,
        r#"
        [[node]]
        id = "a"
        behavior = "pass"
        initial = true

        [[transition]]
        id = "t1"
        from = "a"
        to = "nowhere"
        "#,
    )?;

    let err = load_and_validate(&path).expect_err("dangling transition");
    assert!(matches!(err, ProcessError::ConfigError(_)));
    assert!(err.to_string().contains("nowhere"));
    Ok(())
}

#[test]
fn missing_nested_file_fails_the_whole_load() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let path = dir.path().join("Order.toml");
    fs::write(&path, ORDER)?;

    assert!(matches!(load_and_validate(&path), Err(ProcessError::IoError(_))));
    Ok(())
}

#[test]
fn run_entry_point_drives_the_process_to_completion() -> TestResult {
    init_tracing();
    let (_dir, path) = order_dir()?;
    let model = path.to_string_lossy().into_owned();

    let dry = CliArgs::try_parse_from(["tokenflow", "--model", model.as_str(), "--dry-run"])?;
    tokenflow::run(dry)?;

    let full = CliArgs::try_parse_from([
        "tokenflow",
        "--model",
        model.as_str(),
        "--var",
        "amount=250",
        "--signal-all",
    ])?;
    tokenflow::run(full)?;
    Ok(())
}

#[test]
fn run_entry_point_reports_load_failures() {
    init_tracing();
    let args = CliArgs::try_parse_from(["tokenflow", "--model", "/definitely/not/here.toml"])
        .expect("valid arguments");

    let err = tokenflow::run(args).expect_err("missing model");
    assert!(format!("{err:#}").contains("loading process model"));
}
