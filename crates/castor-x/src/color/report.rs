// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

use crate::color::paint;
use castor_flow::flow::{Executor, Runner};
use castor_flow::model::{TaskStatus, write_to};
use console::Style;
use std::sync::Arc;
use std::time::Instant;

/// A middleware which reports the task run status with colors.
///
/// The format is based on the reports provided by the Go test runner.
pub fn report_status(next: Runner) -> Runner {
    Arc::new(move |input| {
        let banner = format!("===== TASK  {}\n", input.task_name);
        write_to(&input.output, &paint(&Style::new().blue(), &banner));
        let start = Instant::now();

        let result = next(input);

        let (status, style) = match result.status {
            TaskStatus::Failed => ("FAIL", Style::new().red().bold()),
            TaskStatus::Skipped => ("SKIP", Style::new().yellow()),
            TaskStatus::NotRun => ("NOOP", Style::new().green()),
            TaskStatus::Passed => ("PASS", Style::new().green()),
        };
        let verdict = format!(
            "----- {status}: {} ({:.2}s)\n",
            input.task_name,
            start.elapsed().as_secs_f64()
        );
        write_to(&input.output, &paint(&style, &verdict));

        if let Some(stack) = &result.panic_stack {
            let value = result.panic_value.as_deref().unwrap_or("panic value unavailable");
            write_to(&input.output, &paint(&style, &format!("panic: {value}")));
            write_to(&input.output, "\n\n");
            write_to(&input.output, &paint(&style, stack));
        }

        result
    })
}

/// A middleware which reports the flow execution status with colors.
///
/// The format is based on the reports provided by the Go test runner.
pub fn report_flow(next: Executor) -> Executor {
    Arc::new(move |input| {
        let start = Instant::now();

        if let Err(error) = next(input) {
            let report = format!("{error}\t{:.3}s\n", start.elapsed().as_secs_f64());
            write_to(&input.output, &paint(&Style::new().red().bold(), &report));
            return Err(error);
        }

        let report = format!("ok\t{:.3}s\n", start.elapsed().as_secs_f64());
        write_to(&input.output, &paint(&Style::new().green().bold(), &report));
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use crate::color::{report_flow, report_status};
    use assertor::{BooleanAssertion, StringAssertion};
    use castor_flow::flow::{ExecuteOptions, Flow};
    use castor_flow::middleware;
    use castor_flow::model::{SharedBuffer, Task};

    fn reporting_flow(buffer: &SharedBuffer) -> Flow {
        let mut flow = Flow::new();
        flow.set_output(buffer.sink());
        flow.use_middleware(report_status);
        flow.use_executor(report_flow);
        flow
    }

    #[test]
    fn should_report_passed_tasks() {
        let buffer = SharedBuffer::new();
        let mut flow = reporting_flow(&buffer);
        flow.define(Task::new("build", "compiles", |_| {})).unwrap();

        flow.execute(&["build".to_string()], &ExecuteOptions::default()).unwrap();

        let output = buffer.contents();
        assertor::assert_that!(output).contains("===== TASK  build");
        assertor::assert_that!(output).contains("----- PASS: build (");
        assertor::assert_that!(output).contains("ok\t");
    }

    #[test]
    fn should_report_failed_tasks_and_flows() {
        let buffer = SharedBuffer::new();
        let mut flow = reporting_flow(&buffer);
        flow.define(Task::new("lint", "checks", |a| a.error("bad style"))).unwrap();

        let outcome = flow.execute(&["lint".to_string()], &ExecuteOptions::default());

        assertor::assert_that!(outcome.is_err()).is_true();
        let output = buffer.contents();
        assertor::assert_that!(output).contains("----- FAIL: lint (");
        assertor::assert_that!(output).contains("task failed: lint\t");
    }

    #[test]
    fn should_report_skipped_tasks() {
        let buffer = SharedBuffer::new();
        let mut flow = reporting_flow(&buffer);
        flow.define(Task::new("deploy", "ships", |a| a.skip("not today"))).unwrap();

        flow.execute(&["deploy".to_string()], &ExecuteOptions::default()).unwrap();

        assertor::assert_that!(buffer.contents()).contains("----- SKIP: deploy (");
    }

    #[test]
    fn should_report_dry_runs_as_noop() {
        let buffer = SharedBuffer::new();
        let mut flow = Flow::new();
        flow.set_output(buffer.sink());
        flow.use_middleware(middleware::dry_run);
        flow.use_middleware(report_status);
        flow.define(Task::new("build", "compiles", |_| {})).unwrap();

        flow.execute(&["build".to_string()], &ExecuteOptions::default()).unwrap();

        assertor::assert_that!(buffer.contents()).contains("----- NOOP: build (");
    }

    #[test]
    fn should_replay_panics_after_the_verdict() {
        let buffer = SharedBuffer::new();
        let mut flow = reporting_flow(&buffer);
        flow.define(Task::new("explode", "panics", |_| panic!("boom"))).unwrap();

        let outcome = flow.execute(&["explode".to_string()], &ExecuteOptions::default());

        assertor::assert_that!(outcome.is_err()).is_true();
        let output = buffer.contents();
        assertor::assert_that!(output).contains("----- FAIL: explode (");
        assertor::assert_that!(output).contains("panic: boom");
    }
}
