// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

//! End to end checks for call-site attribution against real stacks.

use assertor::{BooleanAssertion, EqualityAssertion};
use castor_flow::A;
use castor_flow::flow::{ExecuteOptions, Flow};
use castor_flow::model::{SharedBuffer, Task};
use castor_x::color::CodeLineLogger;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

static DIRECT_LINE: AtomicU32 = AtomicU32::new(0);
static THROUGH_HELPER_LINE: AtomicU32 = AtomicU32::new(0);
static FROM_ACTION_LINE: AtomicU32 = AtomicU32::new(0);

fn run_task(action: fn(&A)) -> String {
    let buffer = SharedBuffer::new();
    let mut flow = Flow::new();
    flow.set_output(buffer.sink());
    flow.set_logger(Arc::new(CodeLineLogger::new()));
    flow.define(Task::new("probe", "exercises the logger", action)).unwrap();
    flow.execute(&["probe".to_string()], &ExecuteOptions::default()).unwrap();
    buffer.contents()
}

#[inline(never)]
fn log_directly(a: &A) {
    DIRECT_LINE.store(line!() + 1, Ordering::SeqCst);
    a.log("direct message");
}

#[test]
fn should_attribute_plain_logs_to_their_call_site() {
    let output = run_task(log_directly);

    let expected = format!(
        "      attribution.rs:{}: direct message\n",
        DIRECT_LINE.load(Ordering::SeqCst)
    );
    assertor::assert_that!(output).is_equal_to(expected);
}

#[inline(never)]
fn assert_ready(a: &A) {
    a.helper();
    a.log("ready");
}

#[inline(never)]
fn log_through_helper(a: &A) {
    THROUGH_HELPER_LINE.store(line!() + 1, Ordering::SeqCst);
    assert_ready(a);
}

#[test]
fn should_attribute_helper_logs_to_the_helper_caller() {
    let output = run_task(log_through_helper);

    let expected = format!(
        "      attribution.rs:{}: ready\n",
        THROUGH_HELPER_LINE.load(Ordering::SeqCst)
    );
    assertor::assert_that!(output).is_equal_to(expected);
}

#[inline(never)]
fn helper_action(a: &A) {
    a.helper();
    FROM_ACTION_LINE.store(line!() + 1, Ordering::SeqCst);
    a.log("from action");
}

#[test]
fn should_attribute_to_the_action_when_it_is_a_helper_itself() {
    let output = run_task(helper_action);

    let expected = format!(
        "      attribution.rs:{}: from action\n",
        FROM_ACTION_LINE.load(Ordering::SeqCst)
    );
    assertor::assert_that!(output).is_equal_to(expected);
}

#[inline(never)]
fn helper_alpha(logger: &CodeLineLogger, output: &mut Vec<u8>) {
    logger.helper();
    logger.log(output, "alpha");
}

#[inline(never)]
fn helper_beta(logger: &CodeLineLogger, output: &mut Vec<u8>) {
    logger.helper();
    logger.log(output, "beta");
}

#[test]
fn should_survive_concurrent_helper_registration() {
    let logger = Arc::new(CodeLineLogger::new());

    let workers: Vec<_> = (0..8)
        .map(|index| {
            let logger = logger.clone();
            std::thread::spawn(move || {
                let mut output = Vec::new();
                for _ in 0..50 {
                    if index % 2 == 0 {
                        helper_alpha(&logger, &mut output);
                    } else {
                        helper_beta(&logger, &mut output);
                    }
                }
                String::from_utf8(output).unwrap()
            })
        })
        .collect();

    for worker in workers {
        let output = worker.join().unwrap();
        for line in output.lines() {
            // Attribution must point at this file, not inside the helpers.
            assertor::assert_that!(line.starts_with("      attribution.rs:")).is_true();
        }
    }
}
