// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

use crate::logger::FlowLogger;
use crate::model::{Sink, lock_sink};
use std::fmt::Display;
use std::panic::panic_any;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Unwind sentinel raised by [`A::fatal`]; the runner maps it to a failed
/// task without panic reporting.
pub(crate) struct FailNow;

/// Unwind sentinel raised by [`A::skip`].
pub(crate) struct SkipNow;

/// Action context : the single argument to every task action. Provides the
/// task output sink and the logging surface, and records the task outcome.
pub struct A {
    name: String,
    output: Sink,
    logger: Arc<dyn FlowLogger>,
    failed: Arc<AtomicBool>,
}

impl A {
    pub(crate) fn new(name: String, output: Sink, logger: Arc<dyn FlowLogger>, failed: Arc<AtomicBool>) -> Self {
        Self {
            name,
            output,
            logger,
            failed,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn output(&self) -> Sink {
        self.output.clone()
    }

    #[inline(never)]
    pub fn log(&self, message: impl Display) {
        let text = message.to_string();
        self.logger.log(&mut *lock_sink(&self.output), &text);
    }

    /// Reports a problem and marks the task as failed; the action keeps
    /// running.
    #[inline(never)]
    pub fn error(&self, message: impl Display) {
        self.failed.store(true, Ordering::SeqCst);
        let text = message.to_string();
        self.logger.error(&mut *lock_sink(&self.output), &text);
    }

    /// Marks the task as failed without logging anything.
    pub fn fail(&self) {
        self.failed.store(true, Ordering::SeqCst);
    }

    pub fn failed(&self) -> bool {
        self.failed.load(Ordering::SeqCst)
    }

    /// Reports a problem and stops the action immediately.
    #[inline(never)]
    pub fn fatal(&self, message: impl Display) -> ! {
        self.failed.store(true, Ordering::SeqCst);
        let text = message.to_string();
        self.logger.fatal(&mut *lock_sink(&self.output), &text);
        panic_any(FailNow)
    }

    /// Reports the reason and stops the action, marking the task as skipped.
    #[inline(never)]
    pub fn skip(&self, message: impl Display) -> ! {
        let text = message.to_string();
        self.logger.skip(&mut *lock_sink(&self.output), &text);
        panic_any(SkipNow)
    }

    /// Marks the calling function as a helper : its stack frames are
    /// excluded when the logger attributes log lines to a source location.
    #[inline(never)]
    pub fn helper(&self) {
        self.logger.helper();
    }
}
