// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

use std::ffi::c_void;

/// A resolved stack frame, as seen by the call-site logger.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StackFrame {
    pub function: String,
    pub file: Option<String>,
    pub line: u32,
}

/// An instruction address identifying one call site of a helper.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallSite(pub usize);

/// Reads the current call stack on behalf of the logger.
pub trait StackInspection {
    /// Returns up to `max` frames of the caller's stack, innermost first,
    /// after dropping `skip` frames. Frames belonging to the capture and
    /// logging plumbing itself are never included.
    fn current_frames(&self, skip: usize, max: usize) -> Vec<StackFrame>;

    /// Returns the call site of the frame `skip` levels above the caller.
    fn caller_site(&self, skip: usize) -> Option<CallSite>;

    /// Resolves a previously captured call site back to a function name.
    fn site_name(&self, site: CallSite) -> Option<String>;

    /// Substrings identifying panic and dispatch machinery frames that the
    /// logger must step over while attributing output.
    fn unwind_machinery(&self) -> &[&'static str];
}

pub enum StackProvider {
    Runtime(RuntimeStack),
    #[cfg(test)]
    Scripted(ScriptedStack),
}

impl Default for StackProvider {
    fn default() -> Self {
        StackProvider::Runtime(RuntimeStack)
    }
}

impl StackInspection for StackProvider {
    fn current_frames(&self, skip: usize, max: usize) -> Vec<StackFrame> {
        match self {
            StackProvider::Runtime(runtime) => runtime.current_frames(skip, max),
            #[cfg(test)]
            StackProvider::Scripted(scripted) => scripted.current_frames(skip, max),
        }
    }

    fn caller_site(&self, skip: usize) -> Option<CallSite> {
        match self {
            StackProvider::Runtime(runtime) => runtime.caller_site(skip),
            #[cfg(test)]
            StackProvider::Scripted(scripted) => scripted.caller_site(skip),
        }
    }

    fn site_name(&self, site: CallSite) -> Option<String> {
        match self {
            StackProvider::Runtime(runtime) => runtime.site_name(site),
            #[cfg(test)]
            StackProvider::Scripted(scripted) => scripted.site_name(site),
        }
    }

    fn unwind_machinery(&self) -> &[&'static str] {
        match self {
            StackProvider::Runtime(runtime) => runtime.unwind_machinery(),
            #[cfg(test)]
            StackProvider::Scripted(scripted) => scripted.unwind_machinery(),
        }
    }
}

/// Frames owned by the capture and logging plumbing. They form a contiguous
/// prefix of every captured stack and are dropped before user frames.
const OWN_MACHINERY: &[&str] = &[
    "backtrace::",
    "castor_x::stack::RuntimeStack",
    "castor_x::stack::StackProvider",
    "castor_x::color::logger",
    "castor_flow::context",
    "core::ops::function",
];

const UNWIND_MACHINERY: &[&'static str] = &[
    "std::panicking",
    "core::panicking",
    "rust_begin_unwind",
    "rust_panic",
    "__rust_try",
    "core::ops::function",
];

const CAPTURE_LIMIT: usize = 128;

pub struct RuntimeStack;

impl RuntimeStack {
    fn capture(&self) -> Vec<(usize, StackFrame)> {
        let mut collected: Vec<(usize, StackFrame)> = Vec::new();
        backtrace::trace(|frame| {
            let address = frame.ip() as usize;
            let before = collected.len();
            backtrace::resolve_frame(frame, |symbol| {
                collected.push((address, describe(symbol)));
            });
            if collected.len() == before {
                collected.push((address, StackFrame::default()));
            }
            collected.len() < CAPTURE_LIMIT
        });

        let plumbing = collected
            .iter()
            .take_while(|(_, frame)| is_own_machinery(&frame.function))
            .count();
        collected.split_off(plumbing)
    }
}

impl StackInspection for RuntimeStack {
    fn current_frames(&self, skip: usize, max: usize) -> Vec<StackFrame> {
        self.capture()
            .into_iter()
            .skip(skip)
            .take(max)
            .map(|(_, frame)| frame)
            .collect()
    }

    fn caller_site(&self, skip: usize) -> Option<CallSite> {
        self.capture()
            .into_iter()
            .nth(skip)
            .map(|(address, _)| CallSite(address))
    }

    fn site_name(&self, site: CallSite) -> Option<String> {
        // The captured address is a return address, one past the call.
        let address = site.0.saturating_sub(1) as *mut c_void;
        let mut name = None;
        backtrace::resolve(address, |symbol| {
            if name.is_none() {
                if let Some(resolved) = symbol.name() {
                    name = Some(format!("{resolved:#}"));
                }
            }
        });
        name
    }

    fn unwind_machinery(&self) -> &[&'static str] {
        UNWIND_MACHINERY
    }
}

fn describe(symbol: &backtrace::Symbol) -> StackFrame {
    StackFrame {
        function: symbol.name().map(|name| format!("{name:#}")).unwrap_or_default(),
        file: symbol.filename().map(|path| path.to_string_lossy().into_owned()),
        line: symbol.lineno().unwrap_or(0),
    }
}

fn is_own_machinery(function: &str) -> bool {
    function.is_empty() || OWN_MACHINERY.iter().any(|marker| function.contains(marker))
}

#[cfg(test)]
pub struct ScriptedStack {
    frames: Vec<StackFrame>,
    sites: std::sync::Mutex<std::collections::VecDeque<CallSite>>,
    names: std::collections::HashMap<usize, String>,
    machinery: Vec<&'static str>,
}

#[cfg(test)]
impl ScriptedStack {
    pub fn new(frames: Vec<StackFrame>) -> Self {
        ScriptedStack {
            frames,
            sites: std::sync::Mutex::new(std::collections::VecDeque::new()),
            names: std::collections::HashMap::new(),
            machinery: vec!["std::panicking", "core::ops::function"],
        }
    }

    pub fn with_sites(mut self, sites: &[CallSite]) -> Self {
        self.sites = std::sync::Mutex::new(sites.iter().copied().collect());
        self
    }

    pub fn with_name(mut self, site: CallSite, name: &str) -> Self {
        self.names.insert(site.0, name.to_string());
        self
    }

    pub fn with_machinery(mut self, machinery: &[&'static str]) -> Self {
        self.machinery = machinery.to_vec();
        self
    }
}

#[cfg(test)]
impl StackInspection for ScriptedStack {
    fn current_frames(&self, skip: usize, max: usize) -> Vec<StackFrame> {
        self.frames.iter().skip(skip).take(max).cloned().collect()
    }

    fn caller_site(&self, _skip: usize) -> Option<CallSite> {
        self.sites.lock().unwrap().pop_front()
    }

    fn site_name(&self, site: CallSite) -> Option<String> {
        self.names.get(&site.0).cloned()
    }

    fn unwind_machinery(&self) -> &[&'static str] {
        &self.machinery
    }
}

#[cfg(test)]
mod tests {
    use crate::stack::{StackInspection, StackProvider};
    use assertor::BooleanAssertion;

    #[test]
    fn should_capture_the_calling_function() {
        #[inline(never)]
        fn probe() -> Vec<crate::stack::StackFrame> {
            StackProvider::default().current_frames(0, 8)
        }

        let frames = probe();

        assertor::assert_that!(frames.is_empty()).is_false();
        assertor::assert_that!(frames[0].function.contains("probe")).is_true();
    }

    #[test]
    fn should_resolve_a_captured_call_site() {
        #[inline(never)]
        fn probe() -> Option<String> {
            let stack = StackProvider::default();
            let site = stack.caller_site(0)?;
            stack.site_name(site)
        }

        let name = probe().unwrap_or_default();

        assertor::assert_that!(name.contains("probe")).is_true();
    }
}
