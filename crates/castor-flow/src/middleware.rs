// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

use crate::flow::Runner;
use crate::model::{Input, SharedBuffer, TaskResult, TaskStatus, write_to};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Reports every task as not run, without invoking anything.
pub fn dry_run(_next: Runner) -> Runner {
    Arc::new(|_input: &Input| TaskResult::with_status(TaskStatus::NotRun))
}

/// Buffers a task's output and replays it only when the task failed.
pub fn silent_non_failed(next: Runner) -> Runner {
    Arc::new(move |input: &Input| {
        let buffer = SharedBuffer::new();
        let buffered = Input {
            task_name: input.task_name.clone(),
            output: buffer.sink(),
            logger: input.logger.clone(),
        };

        let result = next(&buffered);

        if result.failed() {
            write_to(&input.output, &buffer.contents());
        }
        result
    })
}

/// Appends a notice when a task run exceeds the given threshold.
pub fn report_long_run(threshold: Duration) -> impl Fn(Runner) -> Runner + Send + Sync {
    move |next: Runner| {
        Arc::new(move |input: &Input| {
            let start = Instant::now();
            let result = next(input);
            let elapsed = start.elapsed();
            if elapsed > threshold {
                let notice = format!(
                    "      long task run : {} ({:.2}s)\n",
                    input.task_name,
                    elapsed.as_secs_f64()
                );
                write_to(&input.output, &notice);
            }
            result
        })
    }
}
