// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

//! Tracing instrumentation for flows. Every task run and the flow execution
//! itself become spans carrying the task output as recorded fields.

use castor_flow::flow::{Executor, Flow, Runner};
use castor_flow::model::{ExecuteInput, Input, SharedBuffer, Sink, sink_from};
use std::io;
use std::io::Write;
use std::sync::Arc;
use tracing::field::Empty;

/// Adds tracing instrumentation to the provided flow.
pub fn instrument(flow: &mut Flow) {
    flow.use_executor(traced_flow);
    flow.use_middleware(traced_task);
}

/// A middleware which wraps every task run in a `task` span.
pub fn traced_task(next: Runner) -> Runner {
    Arc::new(move |input| {
        let span = tracing::info_span!(
            "task",
            task.name = %input.task_name,
            task.status = Empty,
            task.output = Empty,
            task.panic.value = Empty,
            task.panic.stack = Empty,
            otel.status_code = Empty,
        );

        let copy = SharedBuffer::new();
        let teed = Input {
            task_name: input.task_name.clone(),
            output: tee(input.output.clone(), copy.clone()),
            logger: input.logger.clone(),
        };
        let result = span.in_scope(|| next(&teed));

        span.record("task.output", copy.contents().as_str());
        span.record("task.status", tracing::field::display(result.status));
        if result.failed() {
            span.record("otel.status_code", "ERROR");
        }
        if let Some(stack) = &result.panic_stack {
            let value = result.panic_value.as_deref().unwrap_or("panic value unavailable");
            span.record("task.panic.value", value);
            span.record("task.panic.stack", stack.as_str());
        }
        result
    })
}

/// A middleware which wraps the whole flow execution in an `execute` span.
pub fn traced_flow(next: Executor) -> Executor {
    Arc::new(move |input| {
        let span = tracing::info_span!(
            "execute",
            task.output = Empty,
            error.message = Empty,
            otel.status_code = Empty,
        );

        let copy = SharedBuffer::new();
        let teed = ExecuteInput {
            output: tee(input.output.clone(), copy.clone()),
        };
        let outcome = span.in_scope(|| next(&teed));

        span.record("task.output", copy.contents().as_str());
        if let Err(error) = &outcome {
            span.record("error.message", tracing::field::display(error));
            span.record("otel.status_code", "ERROR");
        }
        outcome
    })
}

struct TeeSink {
    primary: Sink,
    copy: SharedBuffer,
}

impl Write for TeeSink {
    fn write(&mut self, buffer: &[u8]) -> io::Result<usize> {
        castor_flow::model::write_bytes(&self.primary, buffer);
        self.copy.write_all(buffer)?;
        Ok(buffer.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn tee(primary: Sink, copy: SharedBuffer) -> Sink {
    sink_from(TeeSink { primary, copy })
}
