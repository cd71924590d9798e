// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

use crate::context::{A, FailNow, SkipNow};
use crate::model::{ActionFn, Input, TaskResult, TaskStatus};
use std::cell::{Cell, RefCell};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Once, OnceLock};

/// Qualified name of [`invoke_action`], the frame where the flow hands
/// control to a task action. Attribution walks treat it as the outward
/// limit : climbing past it would leave the user's code entirely.
pub const ACTION_BOUNDARY: &str = "castor_flow::runner::invoke_action";

/// Invocation point for task actions. Never inlined so that its frame stays
/// visible to stack-walking loggers matching [`ACTION_BOUNDARY`].
#[inline(never)]
pub fn invoke_action(action: &ActionFn, a: &A) {
    action(a);
}

thread_local! {
    static IN_TASK: Cell<bool> = const { Cell::new(false) };
    static PANIC_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

type PanicHook = Box<dyn Fn(&std::panic::PanicHookInfo<'_>) + Send + Sync>;

static FALLBACK_HOOK: OnceLock<PanicHook> = OnceLock::new();
static HOOK_INSTALLED: Once = Once::new();

// While a task runs, panics are recovered and reported through the task
// result; the hook records the backtrace and stays silent. Outside task
// execution the previously installed hook is left in charge.
fn install_panic_hook() {
    HOOK_INSTALLED.call_once(|| {
        let previous = std::panic::take_hook();
        let _ = FALLBACK_HOOK.set(previous);
        std::panic::set_hook(Box::new(|info| {
            if IN_TASK.with(Cell::get) {
                let stack = format!("{:?}", backtrace::Backtrace::new());
                PANIC_STACK.with(|slot| *slot.borrow_mut() = Some(stack));
            } else if let Some(hook) = FALLBACK_HOOK.get() {
                hook(info);
            }
        }));
    });
}

pub(crate) fn run_task(input: &Input, action: &Arc<ActionFn>) -> TaskResult {
    install_panic_hook();

    let failed = Arc::new(AtomicBool::new(false));
    let a = A::new(
        input.task_name.clone(),
        input.output.clone(),
        input.logger.clone(),
        failed.clone(),
    );

    IN_TASK.with(|flag| flag.set(true));
    PANIC_STACK.with(|slot| slot.borrow_mut().take());
    let outcome = catch_unwind(AssertUnwindSafe(|| invoke_action(action.as_ref(), &a)));
    IN_TASK.with(|flag| flag.set(false));

    match outcome {
        Ok(()) => {
            let status = if failed.load(Ordering::SeqCst) {
                TaskStatus::Failed
            } else {
                TaskStatus::Passed
            };
            TaskResult::with_status(status)
        },
        Err(payload) => {
            if payload.downcast_ref::<SkipNow>().is_some() {
                return TaskResult::with_status(TaskStatus::Skipped);
            }
            if payload.downcast_ref::<FailNow>().is_some() {
                return TaskResult::with_status(TaskStatus::Failed);
            }
            log::debug!("[castor.flow] task panicked : {}", input.task_name);
            let stack = PANIC_STACK.with(|slot| slot.borrow_mut().take());
            TaskResult::panicked(panic_message(payload.as_ref()), stack)
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_string();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    "non-string panic payload".to_string()
}
