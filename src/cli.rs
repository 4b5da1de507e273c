// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};
use serde_json::Value;

/// Command-line arguments for `tokenflow`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "tokenflow",
    version,
    about = "Run a TOML-defined process model on the tokenflow engine.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the process definition (TOML).
    ///
    /// Default: `Process.toml` in the current working directory.
    #[arg(long, value_name = "PATH", default_value = "Process.toml")]
    pub model: String,

    /// Start variable, repeatable. VALUE is parsed as JSON and taken as a
    /// plain string when that fails.
    #[arg(long = "var", value_name = "KEY=VALUE", value_parser = parse_variable)]
    pub vars: Vec<(String, Value)>,

    /// Keep signalling every waiting execution until the process ends.
    #[arg(long)]
    pub signal_all: bool,

    /// Upper bound on `--signal-all` rounds.
    #[arg(long, value_name = "N", default_value_t = 16)]
    pub max_rounds: usize,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `TOKENFLOW_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the model, but don't run it.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

fn parse_variable(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got {raw:?}"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty variable name in {raw:?}"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn variables_parse_as_json_with_string_fallback() {
        let args = CliArgs::try_parse_from([
            "tokenflow",
            "--var",
            "amount=250",
            "--var",
            "name=Alice",
            "--var",
            "flags={\"vip\":true}",
        ])
        .unwrap();

        assert_eq!(
            args.vars,
            vec![
                ("amount".to_string(), json!(250)),
                ("name".to_string(), json!("Alice")),
                ("flags".to_string(), json!({"vip": true})),
            ]
        );
        assert_eq!(args.model, "Process.toml");
        assert_eq!(args.max_rounds, 16);
    }

    #[test]
    fn variable_without_equals_is_rejected() {
        assert!(CliArgs::try_parse_from(["tokenflow", "--var", "oops"]).is_err());
    }
}
