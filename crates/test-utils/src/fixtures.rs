//! Process models shared by the scenario tests.

use serde_json::Value;
use tokenflow::behavior::{
    CallbackBehavior, ExclusiveChoiceBehavior, InclusiveChoiceBehavior, NestedProcessBehavior,
    SyncBehavior,
};
use tokenflow::engine::Engine;
use tokenflow::errors::Result;
use tokenflow::execution::ExecutionAccess;
use tokenflow::model::{ProcessBuilder, ProcessModel};
use tokenflow::types::ExecutionId;

use std::sync::Arc;

/// Callback storing the id of the node it runs on in `variable`.
pub fn record_node(variable: &'static str) -> CallbackBehavior {
    CallbackBehavior::new(move |engine: &mut Engine, id: ExecutionId| {
        let node = engine.current_node(id)?;
        engine.set_variable(id, variable, node)?;
        Ok(None)
    })
}

/// Callback adding `amount` to the numeric `variable` (missing counts as 0).
pub fn add_to(variable: &'static str, amount: i64) -> CallbackBehavior {
    CallbackBehavior::new(move |engine: &mut Engine, id: ExecutionId| {
        let current = number(engine, id, variable)?;
        engine.set_variable(id, variable, current + amount)?;
        Ok(None)
    })
}

/// Callback squaring `number` (missing counts as 2).
pub fn square() -> CallbackBehavior {
    CallbackBehavior::new(|engine: &mut Engine, id: ExecutionId| {
        let value = engine.get_variable_or(id, "number", 2)?.as_i64().unwrap_or(0);
        engine.set_variable(id, "number", value * value)?;
        Ok(None)
    })
}

fn number(engine: &Engine, id: ExecutionId, variable: &str) -> Result<i64> {
    Ok(engine.get_variable_or(id, variable, 0)?.as_i64().unwrap_or(0))
}

/// start -> amount (wait) -> choice -(amount >= 200)-> discount -> join -> bill -> end,
/// with `t4` (choice -> join) as the default.
///
/// `bill` stores `amount - discount` in `sum`.
pub fn exclusive_fork_and_join() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Exclusive Fork and Join");

    builder.start_node("start");
    builder.transition("t1", "start", "amount");

    builder.wait_node("amount");
    builder.transition("t2", "amount", "choice");

    builder
        .node("choice")
        .behavior(ExclusiveChoiceBehavior::with_default("t4"));
    builder
        .transition("t3", "choice", "discount")
        .when("amount >= 200");
    builder.transition("t4", "choice", "join");

    builder
        .node("discount")
        .behavior(CallbackBehavior::new(|engine: &mut Engine, id: ExecutionId| {
            engine.set_variable(id, "discount", 30)?;
            Ok(None)
        }));
    builder.transition("t5", "discount", "join");

    builder.pass_node("join");
    builder.transition("t6", "join", "bill");

    builder
        .node("bill")
        .behavior(CallbackBehavior::new(|engine: &mut Engine, id: ExecutionId| {
            let sum = number(engine, id, "amount")? - number(engine, id, "discount")?;
            engine.set_variable(id, "sum", sum)?;
            Ok(None)
        }));
    builder.transition("t7", "bill", "end");

    builder.pass_node("end");
    builder.build().expect("exclusive fork and join model")
}

/// Exclusive choice whose only transition is never enabled and that has no
/// default.
pub fn stuck_exclusive_choice() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Stuck");
    builder.start_node("s");
    builder.transition("t1", "s", "c");
    builder.node("c").behavior(ExclusiveChoiceBehavior::new());
    builder
        .transition("t2", "c", "e")
        .trigger(|_: &ExecutionAccess<'_>| false);
    builder.pass_node("e");
    builder.build().expect("stuck model")
}

fn compare_numbers(access: &ExecutionAccess<'_>, test: fn(f64, f64) -> bool) -> bool {
    match (access.number("num"), access.number("threshold")) {
        (Some(num), Some(threshold)) => test(num, threshold),
        _ => false,
    }
}

/// start -> input (wait) -> gate (inclusive, default `t5`) with
/// `t3: num > threshold -> A`, `t4: num == threshold -> B`, `t5 -> C`.
///
/// `A`, `B` and `C` store their own id in `result`.
pub fn inclusive_choice() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Inclusive Choice");

    builder.start_node("start");
    builder.transition("t1", "start", "input");

    builder.wait_node("input");
    builder.transition("t2", "input", "gate");

    builder
        .node("gate")
        .behavior(InclusiveChoiceBehavior::with_default("t5"));
    builder
        .transition("t3", "gate", "A")
        .trigger(|access: &ExecutionAccess<'_>| compare_numbers(access, |a, b| a > b));
    builder
        .transition("t4", "gate", "B")
        .trigger(|access: &ExecutionAccess<'_>| compare_numbers(access, |a, b| a == b));
    builder.transition("t5", "gate", "C");

    let record = Arc::new(record_node("result"));
    for node in ["A", "B", "C"] {
        builder.node(node).shared_behavior(record.clone());
    }

    builder.build().expect("inclusive choice model")
}

/// Inclusive fork into up to three waiting branches joined by an inclusive
/// join: `t2 -> A` always (default), `t3 -> B` when `num > 5`, `t4 -> C` when
/// `num > 10`.
pub fn inclusive_fork_and_join() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Inclusive Fork and Join");

    builder.start_node("start");
    builder.transition("t0", "start", "X");

    builder.wait_node("X");
    builder.transition("t1", "X", "fork");

    builder
        .node("fork")
        .behavior(InclusiveChoiceBehavior::with_default("t2"));
    builder.transition("t2", "fork", "A");
    builder.transition("t3", "fork", "B").when("num > 5");
    builder.transition("t4", "fork", "C").when("num > 10");

    builder.wait_node("A");
    builder.transition("t5", "A", "join");
    builder.wait_node("B");
    builder.transition("t6", "B", "join");
    builder.wait_node("C");
    builder.transition("t7", "C", "join");

    builder.node("join").behavior(InclusiveChoiceBehavior::new());
    builder.transition("t8", "join", "end");

    builder.pass_node("end");
    builder.build().expect("inclusive fork and join model")
}

/// start forks into three wait states `A`, `B`, `C` that lead nowhere.
pub fn default_fork() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Default Fork");

    builder.start_node("start");
    builder.transition("t1", "start", "A");
    builder.transition("t2", "start", "B");
    builder.transition("t3", "start", "C");

    builder.wait_node("A");
    builder.wait_node("B");
    builder.wait_node("C");

    builder.build().expect("default fork model")
}

/// start forks into `A` (wait) and `B` (pass) joined by a sync gate that
/// forks again into `C` (wait) and `D` (pass), both leading to `end`.
///
/// The second half is assembled separately and appended.
pub fn sync_gate() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Sync Gate");

    builder.start_node("start");
    builder.transition("t1", "start", "A");
    builder.transition("t2", "start", "B");

    builder.wait_node("A");
    builder.transition("t3", "A", "gate");

    builder.pass_node("B");
    builder.transition("t4", "B", "gate");

    builder.node("gate").behavior(SyncBehavior);
    builder.transition("t5", "gate", "C");
    builder.transition("t6", "gate", "D");

    let mut second = ProcessBuilder::new("Gate Part 2");
    second.wait_node("C");
    second.transition("t7", "C", "end");
    second.pass_node("D");
    second.transition("t8", "D", "end");
    second.pass_node("end");

    builder.append(&second);
    builder.build().expect("sync gate model")
}

/// Squares `number` once before and once in each of two parallel branches
/// that end separately: 2 -> 4 -> 16 -> 256.
pub fn parallel_fork_with_end() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Parallel Fork With End");

    builder.start_node("start");
    builder.transition("t1", "start", "receiveOffer");

    builder.node("receiveOffer").behavior(square());
    builder.transition("t2", "receiveOffer", "fork");

    builder.pass_node("fork");
    builder.transition("t3", "fork", "drafting");
    builder.transition("t4", "fork", "registration");

    builder.node("drafting").behavior(square());
    builder.transition("t5", "drafting", "end1");

    builder.node("registration").behavior(square());
    builder.transition("t6", "registration", "end2");

    builder.pass_node("end1");
    builder.pass_node("end2");

    builder.build().expect("parallel fork with end model")
}

/// fork into `service` (pass) and `user` (wait), sync join, then `dump`
/// increments `counter` and `verify` waits before the end.
pub fn parallel_fork_and_join() -> ProcessBuilder {
    let mut builder = ProcessBuilder::new("Parallel Fork and Join");

    builder.start_node("start");
    builder.transition("t1", "start", "fork");

    builder.pass_node("fork");
    builder.transition("t2", "fork", "service");
    builder.transition("t3", "fork", "user");

    builder.pass_node("service");
    builder.transition("t4", "service", "join");

    builder.wait_node("user");
    builder.transition("t5", "user", "join");

    builder.node("join").behavior(SyncBehavior);
    builder.transition("t6", "join", "dump");

    builder.node("dump").behavior(add_to("counter", 1));
    builder.transition("t7", "dump", "verify");

    builder.wait_node("verify");
    builder.transition("t8", "verify", "end");

    builder.pass_node("end");
    builder
}

/// Two overlapping fork/join pairs: `s1` forks to `A`/`B`, `A` forks again
/// at `s2`; `j1` joins `B` with one `s2` branch and `j2` joins the rest.
pub fn multi_parallel() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Multiple Parallel Forks and Joins");

    builder.start_node("start");
    builder.transition("t1", "start", "s1");

    builder.pass_node("s1");
    builder.transition("t2", "s1", "A");
    builder.transition("t3", "s1", "B");

    builder.wait_node("A");
    builder.transition("t4", "A", "s2");

    builder.pass_node("B");
    builder.transition("t5", "B", "j1");

    builder.pass_node("s2");
    builder.transition("t6", "s2", "C");
    builder.transition("t7", "s2", "j1");

    builder.node("j1").behavior(SyncBehavior);
    builder.transition("t8", "j1", "D");

    builder.pass_node("C");
    builder.transition("t9", "C", "j2");

    builder.wait_node("D");
    builder.transition("t10", "D", "j2");

    builder.node("j2").behavior(SyncBehavior);
    builder.transition("t11", "j2", "E");

    builder.pass_node("E");
    builder.transition("t12", "E", "end");

    builder.pass_node("end");
    builder.build().expect("multi parallel model")
}

/// `A` forks straight into a sync join and into a `message` wait state that
/// also leads to the join.
pub fn concurrent_message_trigger() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Concurrent Execution Message Trigger");

    builder.start_node("start");
    builder.transition("t1", "start", "A");

    builder.pass_node("A");
    builder.transition("t2", "A", "join");
    builder.transition("t5", "A", "message");

    builder.wait_node("message");
    builder.transition("t3", "message", "join");

    builder.node("join").behavior(SyncBehavior);
    builder.transition("t4", "join", "end");

    builder.pass_node("end");
    builder.build().expect("concurrent message trigger model")
}

/// Parallel section that loops back into itself through an exclusive choice
/// while `reject` is truthy.
pub fn exclusive_parallel_merge() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Merging into a parallel branch using XOR");

    builder.start_node("start");
    builder.transition("t1", "start", "p1");

    builder.pass_node("p1");
    builder.transition("t2", "p1", "B");
    builder.transition("t3", "p1", "A");

    builder.pass_node("A");
    builder.transition("t6", "A", "x1");

    builder.pass_node("B");
    builder.transition("t4", "B", "C");

    builder.wait_node("C");
    builder.transition("t5", "C", "p2");

    builder.pass_node("x1");
    builder.transition("t7", "x1", "p2");

    builder.node("p2").behavior(SyncBehavior);
    builder.transition("t8", "p2", "D");

    builder.pass_node("D");
    builder.transition("t9", "D", "x2");

    builder
        .node("x2")
        .behavior(ExclusiveChoiceBehavior::with_default("t13"));
    builder.transition("t10", "x2", "p3").when("reject");
    builder.transition("t13", "x2", "E");

    builder.pass_node("p3");
    builder.transition("t11", "p3", "x1");
    builder.transition("t12", "p3", "B");

    builder.pass_node("E");
    builder.transition("t14", "E", "end");

    builder.pass_node("end");
    builder.build().expect("exclusive parallel merge model")
}

/// `start` forks to `A` (adds 3 to `result`) when `a` is truthy and to `B`
/// (adds 7) when `b` is truthy.
pub fn fork_with_triggers() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Fork with Transition Triggers");

    builder.start_node("start");
    builder.transition("t1", "start", "A").when("a");
    builder.transition("t2", "start", "B").when("b");

    builder.node("A").behavior(add_to("result", 3));
    builder.node("B").behavior(add_to("result", 7));

    builder.build().expect("fork with triggers model")
}

/// A single guarded transition (`proceed` truthy) into a node that sets
/// `done`.
pub fn trigger_blocks_take() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Transition Trigger blocks take()");

    builder.start_node("start");
    builder.transition("t1", "start", "A").when("proceed");

    builder
        .node("A")
        .behavior(CallbackBehavior::new(|engine: &mut Engine, id: ExecutionId| {
            engine.set_variable(id, "done", true)?;
            Ok(None)
        }));

    builder.build().expect("trigger blocks take model")
}

/// A wait state `fork` whose signal names the transition to take:
/// `t2 -> a` or `t3 -> b`; both store their id in `outcome`.
pub fn basic_transitions() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Fork Process Based on Signaled Transition ID");

    builder.start_node("start");
    builder.transition("t1", "start", "fork");

    builder.wait_node("fork");
    builder.transition("t2", "fork", "a");
    builder.transition("t3", "fork", "b");

    let record = Arc::new(record_node("outcome"));
    builder.node("a").shared_behavior(record.clone());
    builder.node("b").shared_behavior(record);

    builder.build().expect("basic transitions model")
}

/// Parallel `task` (wait) and `catch` (wait) branches; the `throw` node after
/// `task` queues a high-priority callback that signals the `catch` branch
/// before `throw` itself moves on to the join.
pub fn signal_throw_catch() -> ProcessModel {
    let mut builder = ProcessBuilder::new("Signal Throw / Catch Example");

    builder.start_node("start");
    builder.transition("t1", "start", "split");

    builder.pass_node("split");
    builder.transition("t2", "split", "task");
    builder.transition("t3", "split", "catch");

    builder.wait_node("task");
    builder.transition("t4", "task", "throw");

    builder
        .node("throw")
        .behavior(CallbackBehavior::new(|engine: &mut Engine, id: ExecutionId| {
            let catching = engine.find_concurrent_executions(id, Some("catch"))?;
            engine.set_variable(id, "caught", catching.len())?;
            for concurrent in catching {
                engine.push_command(tokenflow::engine::Command::callback(
                    tokenflow::types::PRIORITY_DEFAULT + 500,
                    move |engine| {
                        engine.signal(
                            concurrent,
                            None,
                            Default::default(),
                            Default::default(),
                        )
                    },
                ))?;
            }
            Ok(None)
        }));
    builder.transition("t5", "throw", "join");

    builder.wait_node("catch");
    builder.transition("t6", "catch", "join");

    builder.node("join").behavior(SyncBehavior);
    builder.transition("t7", "join", "end");

    builder.pass_node("end");
    builder.build().expect("signal throw catch model")
}

/// Sub process: s2 -> B (wait) -> e2.
pub fn nested_sub_process() -> ProcessModel {
    let mut sub = ProcessBuilder::new("Sub Process");
    sub.start_node("s2");
    sub.transition("t3", "s2", "B");
    sub.wait_node("B");
    sub.transition("t4", "B", "e2");
    sub.pass_node("e2");
    sub.build().expect("sub process model")
}

/// s1 -> A (wait) -> sub (nested) -> e1, passing `subject` in as `tmp` and
/// `tmp` back out as `subject`.
pub fn nested_scopes(isolate: bool) -> ProcessModel {
    let nested = NestedProcessBehavior::new(Arc::new(nested_sub_process()))
        .isolate(isolate)
        .input("tmp", "subject")
        .output("subject", "tmp");

    let mut builder = ProcessBuilder::new("Nested Scope Execution");
    builder.start_node("s1");
    builder.transition("t1", "s1", "A");
    builder.wait_node("A");
    builder.transition("t2", "A", "sub");
    builder.node("sub").behavior(nested);
    builder.transition("t5", "sub", "e1");
    builder.pass_node("e1");
    builder.build().expect("nested scopes model")
}

/// `n` parallel wait branches joined by a sync gate, then `end`.
pub fn fork_join(n: usize) -> ProcessModel {
    let mut builder = ProcessBuilder::new("Fork Join");
    builder.start_node("start");
    for i in 0..n {
        let branch = format!("b{i}");
        builder.transition(&format!("in{i}"), "start", &branch);
        builder.wait_node(&branch);
        builder.transition(&format!("out{i}"), &branch, "join");
    }
    builder.node("join").behavior(SyncBehavior);
    builder.transition("done", "join", "end");
    builder.pass_node("end");
    builder.build().expect("fork join model")
}

/// Start variables from `(name, value)` pairs.
pub fn vars<const N: usize>(pairs: [(&str, Value); N]) -> tokenflow::types::Variables {
    pairs
        .into_iter()
        .map(|(name, value)| (name.to_string(), value))
        .collect()
}
