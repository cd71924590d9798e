// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

use crate::color::paint;
use crate::stack::{CallSite, StackFrame, StackInspection, StackProvider};
use castor_flow::logger::FlowLogger;
use castor_flow::runner::ACTION_BOUNDARY;
use console::Style;
use std::collections::HashSet;
use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// The maximum number of stack frames to go through when skipping helper
/// functions while decorating log messages.
const MAX_STACK_DEPTH: usize = 50;

/// Decorates the log with code line information, indentation and colors.
///
/// Every message is prefixed with the file and line of the call site that
/// produced it. Functions registered via [`CodeLineLogger::helper`] are
/// skipped during attribution, so output is credited to their callers.
pub struct CodeLineLogger {
    stack: StackProvider,
    boundary: &'static str,
    helpers: Mutex<HelperRegistry>,
}

#[derive(Default)]
struct HelperRegistry {
    sites: HashSet<CallSite>,
    names: Option<HashSet<String>>,
}

impl HelperRegistry {
    fn names(&mut self, stack: &StackProvider) -> &HashSet<String> {
        let sites = &self.sites;
        self.names.get_or_insert_with(|| {
            sites.iter().filter_map(|site| stack.site_name(*site)).collect()
        })
    }
}

impl Default for CodeLineLogger {
    fn default() -> Self {
        CodeLineLogger::new()
    }
}

impl CodeLineLogger {
    pub fn new() -> Self {
        CodeLineLogger::with_provider(StackProvider::default(), ACTION_BOUNDARY)
    }

    fn with_provider(stack: StackProvider, boundary: &'static str) -> Self {
        CodeLineLogger {
            stack,
            boundary,
            helpers: Mutex::new(HelperRegistry::default()),
        }
    }

    /// Marks the calling function as a helper function. When printing file
    /// and line information, that function will be skipped. May be called
    /// simultaneously from multiple threads.
    pub fn helper(&self) {
        let Some(site) = self.stack.caller_site(0) else {
            panic!("castor.logger : no caller frames captured");
        };

        let mut registry = self.registry();
        if registry.sites.insert(site) {
            registry.names = None;
        }
    }

    pub fn log(&self, output: &mut dyn Write, message: &str) {
        let decorated = self.decorate(message);
        let _ = output.write_all(decorated.as_bytes());
    }

    pub fn error(&self, output: &mut dyn Write, message: &str) {
        self.write_styled(output, message, &Style::new().red());
    }

    pub fn fatal(&self, output: &mut dyn Write, message: &str) {
        self.write_styled(output, message, &Style::new().red());
    }

    pub fn skip(&self, output: &mut dyn Write, message: &str) {
        self.write_styled(output, message, &Style::new().yellow());
    }

    fn write_styled(&self, output: &mut dyn Write, message: &str, style: &Style) {
        let decorated = self.decorate(message);
        let _ = output.write_all(paint(style, &decorated).as_bytes());
    }

    fn registry(&self) -> MutexGuard<'_, HelperRegistry> {
        self.helpers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Prefixes the message with the file and line of the call site and
    /// inserts the final newline and indentation spaces for formatting.
    fn decorate(&self, message: &str) -> String {
        let frame = self.attributed_frame();

        let file = match frame.file.as_deref() {
            Some(path) => base_name(path),
            None => "???",
        };
        let line = if frame.line == 0 { 1 } else { frame.line };

        // Every line is indented at least 6 spaces.
        let mut decorated = format!("      {file}:{line}: ");
        let mut lines: Vec<&str> = message.split('\n').collect();
        if lines.len() > 1 && lines.last() == Some(&"") {
            lines.pop();
        }
        for (index, line) in lines.iter().enumerate() {
            if index > 0 {
                // Second and subsequent lines are indented an additional 4 spaces.
                decorated.push_str("\n          ");
            }
            decorated.push_str(line);
        }
        decorated.push('\n');
        decorated
    }

    /// Searches for the innermost caller frame in a function not marked as
    /// a helper. The search stops when it reaches the runner frame that
    /// invoked the action.
    fn attributed_frame(&self) -> StackFrame {
        let frames = self.stack.current_frames(0, MAX_STACK_DEPTH);
        if frames.is_empty() {
            // A broken stack capture is not a recoverable condition.
            panic!("castor.logger : no caller frames captured");
        }
        let machinery = self.stack.unwind_machinery();

        let mut registry = self.registry();
        let names = registry.names(&self.stack);

        let mut first: Option<&StackFrame> = None;
        let mut previous: Option<&StackFrame> = None;
        for frame in &frames {
            if machinery.iter().any(|marker| frame.function.contains(marker)) {
                continue;
            }
            if first.is_none() {
                first = Some(frame);
            }
            if frame.function == self.boundary {
                // Gone up all the way to the runner calling the action, so
                // the action itself must have been marked as a helper.
                return previous.cloned().unwrap_or_default();
            }
            if !names.contains(&frame.function) {
                // Found a frame that wasn't inside a helper function.
                return frame.clone();
            }
            previous = Some(frame);
        }
        first.cloned().unwrap_or_default()
    }
}

impl FlowLogger for CodeLineLogger {
    fn log(&self, output: &mut dyn Write, message: &str) {
        CodeLineLogger::log(self, output, message);
    }

    fn error(&self, output: &mut dyn Write, message: &str) {
        CodeLineLogger::error(self, output, message);
    }

    fn fatal(&self, output: &mut dyn Write, message: &str) {
        CodeLineLogger::fatal(self, output, message);
    }

    fn skip(&self, output: &mut dyn Write, message: &str) {
        CodeLineLogger::skip(self, output, message);
    }

    fn helper(&self) {
        CodeLineLogger::helper(self);
    }
}

/// Truncates a path at its last file name separator.
fn base_name(path: &str) -> &str {
    if let Some(index) = path.rfind('/') {
        &path[index + 1..]
    } else if let Some(index) = path.rfind('\\') {
        &path[index + 1..]
    } else {
        path
    }
}
