// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

use castor_flow::{Flow, Task};
use castor_x::boot;
use castor_x::cmd;
use std::process::ExitCode;

fn main() -> ExitCode {
    better_panic::install();
    human_panic::setup_panic!();

    env_logger::builder()
        .format_timestamp(None)
        .format_module_path(false)
        .format_level(false)
        .format_file(false)
        .format_target(false)
        .init();

    log::debug!("[xtasks] bootstrapping build pipeline");

    match pipeline() {
        Ok(flow) => boot::main(flow),
        Err(error) => {
            eprintln!("xtasks: {error}");
            ExitCode::from(2)
        }
    }
}

fn pipeline() -> anyhow::Result<Flow> {
    let mut flow = Flow::new();

    flow.define(Task::new("fmt", "Formats the sources", |a| {
        cmd::exec(a, "cargo fmt --all", &[]);
    }))?;

    flow.define(Task::new("lint", "Checks the workspace with clippy", |a| {
        cmd::exec(a, "cargo clippy --workspace --all-targets", &[]);
    }))?;

    flow.define(Task::new("tests", "Runs the whole test suite", |a| {
        cmd::exec(a, "cargo test --workspace", &[]);
    }))?;

    flow.define(
        Task::new("all", "Formats, lints and tests the workspace", |_| {}).with_deps(&[
            "fmt", "lint", "tests",
        ]),
    )?;
    flow.set_default("all");

    Ok(flow)
}
