// src/model/trigger.rs

//! Transition guards.
//!
//! A [`Trigger`] decides whether a transition may be taken by a given
//! execution. Closures over [`ExecutionAccess`] are triggers, and
//! [`Condition`] implements a small guard syntax used by TOML definitions:
//!
//! - `ready`: variable is truthy
//! - `!ready`: variable is falsy or absent
//! - `amount >= 200`: compare a variable against a JSON literal
//!   (bare words are treated as strings)

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::execution::ExecutionAccess;

pub trait Trigger {
    fn is_enabled(&self, access: &ExecutionAccess<'_>) -> bool;
}

impl<F> Trigger for F
where
    F: Fn(&ExecutionAccess<'_>) -> bool,
{
    fn is_enabled(&self, access: &ExecutionAccess<'_>) -> bool {
        self(access)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
}

impl FromStr for CompareOp {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "==" => Ok(CompareOp::Eq),
            "!=" => Ok(CompareOp::Ne),
            ">=" => Ok(CompareOp::Ge),
            "<=" => Ok(CompareOp::Le),
            ">" => Ok(CompareOp::Gt),
            "<" => Ok(CompareOp::Lt),
            other => Err(format!("invalid comparison operator: {other}")),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Ge => ">=",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Lt => "<",
        };
        f.write_str(op)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Test {
    Truthy,
    Falsy,
    Compare(CompareOp, Value),
}

/// Guard over a single execution variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    variable: String,
    test: Test,
}

impl Condition {
    pub fn truthy(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            test: Test::Truthy,
        }
    }

    pub fn falsy(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            test: Test::Falsy,
        }
    }

    pub fn compare(variable: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Self {
            variable: variable.into(),
            test: Test::Compare(op, value.into()),
        }
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    /// Evaluate against a resolved variable value (`None` when absent).
    pub fn evaluate(&self, value: Option<&Value>) -> bool {
        let value = value.unwrap_or(&Value::Null);
        match &self.test {
            Test::Truthy => is_truthy(value),
            Test::Falsy => !is_truthy(value),
            Test::Compare(op, expected) => compare(value, *op, expected),
        }
    }
}

impl Trigger for Condition {
    fn is_enabled(&self, access: &ExecutionAccess<'_>) -> bool {
        self.evaluate(access.variable(&self.variable))
    }
}

static GUARD_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(!)?\s*([A-Za-z_][A-Za-z0-9_]*)\s*(?:(==|!=|>=|<=|>|<)\s*([^\s=<>!].*?))?\s*$")
        .expect("guard pattern is valid")
});

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = GUARD_PATTERN
            .captures(s)
            .ok_or_else(|| format!("invalid guard expression: {s:?}"))?;

        let negated = caps.get(1).is_some();
        let variable = caps[2].to_string();

        match (caps.get(3), caps.get(4)) {
            (Some(op), Some(literal)) => {
                if negated {
                    return Err(format!(
                        "invalid guard expression: {s:?} (negation cannot be combined with a comparison)"
                    ));
                }
                let op: CompareOp = op.as_str().parse()?;
                let literal = literal.as_str();
                let value = serde_json::from_str::<Value>(literal)
                    .unwrap_or_else(|_| Value::String(literal.to_string()));
                Ok(Condition::compare(variable, op, value))
            }
            _ if negated => Ok(Condition::falsy(variable)),
            _ => Ok(Condition::truthy(variable)),
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.test {
            Test::Truthy => write!(f, "{}", self.variable),
            Test::Falsy => write!(f, "!{}", self.variable),
            Test::Compare(op, value) => write!(f, "{} {op} {value}", self.variable),
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

// Values of different types never compare, whatever the operator.
fn compare(left: &Value, op: CompareOp, right: &Value) -> bool {
    let Some(ord) = ordering(left, right) else {
        return false;
    };
    match op {
        CompareOp::Eq => ord == Ordering::Equal,
        CompareOp::Ne => ord != Ordering::Equal,
        CompareOp::Ge => ord != Ordering::Less,
        CompareOp::Le => ord != Ordering::Greater,
        CompareOp::Gt => ord == Ordering::Greater,
        CompareOp::Lt => ord == Ordering::Less,
    }
}
