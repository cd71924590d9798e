// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

use crate::context::A;
use crate::logger::FlowLogger;
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};

/// Write destination shared by a task action and the middlewares around it.
pub type Sink = Arc<Mutex<dyn Write + Send>>;

pub type ActionFn = dyn Fn(&A) + Send + Sync;

pub fn sink_from<W: Write + Send + 'static>(writer: W) -> Sink {
    Arc::new(Mutex::new(writer))
}

pub(crate) fn lock_sink(sink: &Sink) -> MutexGuard<'_, dyn Write + Send + 'static> {
    match sink.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Best-effort write : the flow never fails because its output could not
/// be written.
pub fn write_to(sink: &Sink, text: &str) {
    write_bytes(sink, text.as_bytes());
}

pub fn write_bytes(sink: &Sink, bytes: &[u8]) {
    let _ = lock_sink(sink).write_all(bytes);
}

pub struct Task {
    pub name: String,
    pub usage: String,
    pub action: Arc<ActionFn>,
    pub deps: Vec<String>,
}

impl Task {
    pub fn new(name: &str, usage: &str, action: impl Fn(&A) + Send + Sync + 'static) -> Self {
        Self {
            name: name.to_string(),
            usage: usage.to_string(),
            action: Arc::new(action),
            deps: Vec::new(),
        }
    }

    pub fn with_deps(mut self, deps: &[&str]) -> Self {
        self.deps = deps.iter().map(|dep| dep.to_string()).collect();
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    NotRun,
    Passed,
    Failed,
    Skipped,
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::NotRun => f.write_str("not run"),
            TaskStatus::Passed => f.write_str("passed"),
            TaskStatus::Failed => f.write_str("failed"),
            TaskStatus::Skipped => f.write_str("skipped"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TaskResult {
    pub status: TaskStatus,
    pub panic_value: Option<String>,
    pub panic_stack: Option<String>,
}

impl TaskResult {
    pub fn with_status(status: TaskStatus) -> Self {
        Self {
            status,
            panic_value: None,
            panic_stack: None,
        }
    }

    pub fn panicked(value: String, stack: Option<String>) -> Self {
        Self {
            status: TaskStatus::Failed,
            panic_value: Some(value),
            panic_stack: stack,
        }
    }

    pub fn failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }
}

/// Per-task-run input handed to the runner pipeline.
#[derive(Clone)]
pub struct Input {
    pub task_name: String,
    pub output: Sink,
    pub logger: Arc<dyn FlowLogger>,
}

/// Per-flow-run input handed to the executor pipeline.
pub struct ExecuteInput {
    pub output: Sink,
}

/// Sink adapter collecting everything written into a shared byte buffer.
/// Used by buffering middlewares and tests.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sink(&self) -> Sink {
        sink_from(self.clone())
    }

    pub fn contents(&self) -> String {
        let bytes = match self.bytes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        let mut bytes = match self.bytes.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        bytes.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::model::{SharedBuffer, lock_sink, write_bytes, write_to};
    use assertor::EqualityAssertion;

    #[test]
    fn should_write_through_a_shared_sink() {
        let buffer = SharedBuffer::new();
        let sink = buffer.sink();

        write_to(&sink, "first ");
        write_bytes(&sink, b"second");

        assertor::assert_that!(buffer.contents()).is_equal_to("first second".to_string());
    }

    #[test]
    fn should_keep_writing_after_a_sink_lock_is_poisoned() {
        let buffer = SharedBuffer::new();
        let sink = buffer.sink();

        let poisoner = sink.clone();
        let _ = std::thread::spawn(move || {
            let _guard = lock_sink(&poisoner);
            panic!("poisoning the sink lock");
        })
        .join();

        write_to(&sink, "still writing");
        assertor::assert_that!(buffer.contents()).is_equal_to("still writing".to_string());
    }
}
