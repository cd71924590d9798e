// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

//! An extension of [`Flow::execute`] which additionally defines flags and
//! configures the flow in a convenient way.

use crate::color::{self, CodeLineLogger};
use castor_flow::flow::{ExecuteOptions, Flow};
use castor_flow::middleware;
use castor_flow::model::{write_bytes, write_to};
use clap::Parser;
use clap::error::ErrorKind;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

const EXIT_CODE_FAILURE: u8 = 1;
const EXIT_CODE_INVALID: u8 = 2;

/// Reusable flags understood by every bootstrapped build pipeline.
#[derive(Debug, Parser)]
#[command(name = "build", about = "Runs build pipeline tasks", disable_help_subcommand = true)]
pub struct BootArguments {
    /// Tasks to run
    pub tasks: Vec<String>,

    /// Print all tasks as they are run
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Print all tasks without executing actions
    #[arg(long)]
    pub dry_run: bool,

    /// Print when a task takes longer than this many seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub long_run: u64,

    /// Do not process dependencies
    #[arg(long)]
    pub no_deps: bool,

    /// Skip processing the comma-separated tasks
    #[arg(long, value_name = "TASKS", value_delimiter = ',')]
    pub skip: Vec<String>,

    /// Disable colorizing output
    #[arg(long)]
    pub no_color: bool,
}

/// Parses the process arguments, wires the most useful middlewares into the
/// flow and executes it, translating the outcome into an exit code.
pub fn main(flow: Flow) -> ExitCode {
    run(flow, std::env::args().skip(1))
}

/// Same as [`main`], but over explicit arguments.
pub fn run(flow: Flow, arguments: impl IntoIterator<Item = String>) -> ExitCode {
    ExitCode::from(exit_code(flow, arguments))
}

fn exit_code(mut flow: Flow, arguments: impl IntoIterator<Item = String>) -> u8 {
    color::init();

    let argv = std::iter::once("build".to_string()).chain(arguments);
    let arguments = match BootArguments::try_parse_from(argv) {
        Ok(parsed) => parsed,
        Err(error) => {
            let _ = error.print();
            return match error.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    let output = flow.output();
                    write_to(&output, "\n");
                    let mut listing = Vec::new();
                    flow.print_tasks(&mut listing);
                    write_bytes(&output, &listing);
                    0
                }
                _ => EXIT_CODE_INVALID,
            };
        }
    };

    if arguments.no_color {
        color::no_color();
    }
    // Reporting each task is what makes a dry run observable.
    let verbose = arguments.verbose || arguments.dry_run;

    flow.use_executor(color::report_flow);
    if arguments.dry_run {
        flow.use_middleware(middleware::dry_run);
    }
    flow.use_middleware(color::report_status);
    if !verbose {
        flow.use_middleware(middleware::silent_non_failed);
    }
    if arguments.long_run > 0 {
        flow.use_middleware(middleware::report_long_run(Duration::from_secs(arguments.long_run)));
    }
    flow.set_logger(Arc::new(CodeLineLogger::new()));

    let options = ExecuteOptions {
        no_deps: arguments.no_deps,
        skip: arguments.skip,
    };
    let plan = match flow.plan(&arguments.tasks, &options) {
        Ok(plan) => plan,
        Err(error) => {
            write_to(&flow.output(), &format!("{error}\n"));
            return EXIT_CODE_INVALID;
        }
    };

    match flow.run(&plan) {
        Ok(()) => 0,
        Err(_) => EXIT_CODE_FAILURE,
    }
}
