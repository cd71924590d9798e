// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

//! Minimal task-execution flow : named tasks with dependencies, a per-task
//! action context, and middleware seams around task and flow execution.

pub mod context;
pub mod flow;
pub mod logger;
pub mod middleware;
pub mod model;
pub mod runner;

pub use context::A;
pub use flow::{ExecuteOptions, Flow};
pub use model::{ExecuteInput, Input, SharedBuffer, Sink, Task, TaskResult, TaskStatus};
