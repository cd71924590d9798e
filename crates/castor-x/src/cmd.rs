// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

//! Functions for running programs in a shell-like way.

use castor_flow::A;
use castor_flow::model::{Sink, write_bytes};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, ExitStatus, Stdio};
use std::thread;

/// Configures a command executed by [`exec`].
pub enum ExecOption {
    /// Sets the working directory.
    Dir(PathBuf),
    /// Sets an environment variable.
    Env(String, String),
    /// Feeds the bytes to the standard input instead of inheriting it.
    Stdin(Vec<u8>),
    /// Redirects the standard output away from the task output.
    Stdout(Sink),
    /// Redirects the standard error away from the task output.
    Stderr(Sink),
}

/// Runs the command, reporting problems via `a.error` and returning `false`
/// in case of any. Leading `KEY=value` words become environment variables
/// for the program. Example usage:
///
/// ```no_run
/// # use castor_flow::{Flow, Task};
/// # use castor_x::cmd::{self, ExecOption};
/// # let mut flow = Flow::new();
/// flow.define(Task::new("fmt", "formats the sources", |a| {
///     cmd::exec(a, "CARGO_TERM_COLOR=always cargo fmt --all", &[]);
/// }));
/// ```
pub fn exec(a: &A, command_line: &str, options: &[ExecOption]) -> bool {
    a.helper();

    let Some(words) = shlex::split(command_line) else {
        a.error(format!("parse command line: invalid quoting in {command_line:?}"));
        return false;
    };
    let (assignments, arguments) = split_assignments(words);
    let Some((program, arguments)) = arguments.split_first() else {
        a.error("parse command line: missing program");
        return false;
    };

    let mut command = Command::new(program);
    command.args(arguments).envs(assignments);

    let mut stdin_bytes = None;
    let mut stdout_sink = a.output();
    let mut stderr_sink = a.output();
    for option in options {
        match option {
            ExecOption::Dir(path) => {
                a.log(format!("Work dir: {}", path.display()));
                command.current_dir(path);
            }
            ExecOption::Env(key, value) => {
                a.log(format!("Env: {key}={value}"));
                command.env(key, value);
            }
            ExecOption::Stdin(bytes) => stdin_bytes = Some(bytes.clone()),
            ExecOption::Stdout(sink) => stdout_sink = sink.clone(),
            ExecOption::Stderr(sink) => stderr_sink = sink.clone(),
        }
    }

    let stdin = match stdin_bytes {
        Some(_) => Stdio::piped(),
        None => Stdio::inherit(),
    };
    command.stdin(stdin).stdout(Stdio::piped()).stderr(Stdio::piped());

    a.log(format!("Exec: {command_line}"));
    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(error) => {
            a.error(format!("{program}: {error}"));
            return false;
        }
    };

    // Pump both streams concurrently so output reaches the sink while the
    // command still runs and stdout/stderr keep their arrival order.
    let mut pumps = Vec::new();
    if let Some(bytes) = stdin_bytes {
        if let Some(mut stream) = child.stdin.take() {
            pumps.push(thread::spawn(move || {
                let _ = stream.write_all(&bytes);
            }));
        }
    }
    if let Some(stream) = child.stdout.take() {
        pumps.push(forward(stream, stdout_sink));
    }
    if let Some(stream) = child.stderr.take() {
        pumps.push(forward(stream, stderr_sink));
    }
    for pump in pumps {
        let _ = pump.join();
    }

    match child.wait() {
        Ok(status) if status.success() => true,
        Ok(status) => {
            a.error(describe_status(status));
            false
        }
        Err(error) => {
            a.error(format!("{program}: {error}"));
            false
        }
    }
}

/// Copies a child stream into the sink chunk by chunk until it closes.
fn forward(mut stream: impl Read + Send + 'static, sink: Sink) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut chunk = [0u8; 4096];
        loop {
            match stream.read(&mut chunk) {
                Ok(0) => break,
                Ok(count) => write_bytes(&sink, &chunk[..count]),
                Err(error) if error.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(error) => {
                    log::debug!("[castor.x] stream copy ended: {error}");
                    break;
                }
            }
        }
    })
}

/// Splits leading `KEY=value` words off a parsed command line.
fn split_assignments(words: Vec<String>) -> (Vec<(String, String)>, Vec<String>) {
    let mut assignments = Vec::new();
    let mut words = words.into_iter();
    let mut arguments = Vec::new();
    for word in words.by_ref() {
        match parse_assignment(&word) {
            Some(assignment) => assignments.push(assignment),
            None => {
                arguments.push(word);
                break;
            }
        }
    }
    arguments.extend(words);
    (assignments, arguments)
}

fn parse_assignment(word: &str) -> Option<(String, String)> {
    let (key, value) = word.split_once('=')?;
    let mut characters = key.chars();
    let first = characters.next()?;
    if !(first.is_ascii_alphabetic() || first == '_') {
        return None;
    }
    if !characters.all(|character| character.is_ascii_alphanumeric() || character == '_') {
        return None;
    }
    Some((key.to_string(), value.to_string()))
}

fn describe_status(status: ExitStatus) -> String {
    match status.code() {
        Some(code) => format!("exit status {code}"),
        None => "process terminated by a signal".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use crate::cmd::{self, ExecOption};
    use assertor::{BooleanAssertion, EqualityAssertion, StringAssertion};
    use castor_flow::flow::{ExecuteOptions, Flow};
    use castor_flow::model::{SharedBuffer, Task};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use temp_dir::TempDir;

    fn run_action(action: impl Fn(&castor_flow::A) + Send + Sync + 'static) -> (String, bool) {
        let buffer = SharedBuffer::new();
        let mut flow = Flow::new();
        flow.set_output(buffer.sink());
        flow.define(Task::new("probe", "runs a command", action)).unwrap();
        let outcome = flow.execute(&["probe".to_string()], &ExecuteOptions::default());
        (buffer.contents(), outcome.is_ok())
    }

    #[test]
    fn should_run_commands_and_forward_their_output() {
        let (output, passed) = run_action(|a| {
            cmd::exec(a, "echo hello", &[]);
        });

        assertor::assert_that!(passed).is_true();
        assertor::assert_that!(output).contains("Exec: echo hello");
        assertor::assert_that!(output).contains("hello\n");
    }

    #[test]
    fn should_apply_leading_environment_assignments() {
        let (output, passed) = run_action(|a| {
            cmd::exec(a, "GREETING=bonjour sh -c 'echo $GREETING'", &[]);
        });

        assertor::assert_that!(passed).is_true();
        assertor::assert_that!(output).contains("bonjour\n");
    }

    #[test]
    fn should_apply_environment_options() {
        let (output, passed) = run_action(|a| {
            let options = [ExecOption::Env("GREETING".to_string(), "hallo".to_string())];
            cmd::exec(a, "sh -c 'echo $GREETING'", &options);
        });

        assertor::assert_that!(passed).is_true();
        assertor::assert_that!(output).contains("Env: GREETING=hallo");
        assertor::assert_that!(output).contains("hallo\n");
    }

    #[test]
    fn should_apply_working_directory_options() {
        let workspace = TempDir::new().unwrap();
        std::fs::write(workspace.path().join("marker.txt"), "here").unwrap();
        let directory = workspace.path().to_path_buf();

        let (output, passed) = run_action(move |a| {
            cmd::exec(a, "ls", &[ExecOption::Dir(directory.clone())]);
        });

        assertor::assert_that!(passed).is_true();
        assertor::assert_that!(output).contains("Work dir: ");
        assertor::assert_that!(output).contains("marker.txt");
    }

    #[test]
    fn should_forward_stderr_as_it_arrives() {
        let (output, passed) = run_action(|a| {
            cmd::exec(a, "sh -c 'echo BBB >&2; sleep 0.2; echo CCC'", &[]);
        });

        assertor::assert_that!(passed).is_true();
        assertor::assert_that!(output).contains("BBB\nCCC\n");
    }

    #[test]
    fn should_redirect_streams_to_dedicated_sinks() {
        let errors = SharedBuffer::new();
        let probe = errors.clone();
        let (output, passed) = run_action(move |a| {
            let options = [ExecOption::Stderr(probe.sink())];
            cmd::exec(a, "sh -c 'echo out; echo err >&2'", &options);
        });

        assertor::assert_that!(passed).is_true();
        assertor::assert_that!(output).contains("out\n");
        assertor::assert_that!(errors.contents()).is_equal_to("err\n".to_string());
    }

    #[test]
    fn should_feed_the_standard_input() {
        let (output, passed) = run_action(|a| {
            cmd::exec(a, "cat", &[ExecOption::Stdin(b"from-stdin\n".to_vec())]);
        });

        assertor::assert_that!(passed).is_true();
        assertor::assert_that!(output).contains("from-stdin\n");
    }

    #[test]
    fn should_fail_the_task_on_non_zero_exit_codes() {
        let reported = Arc::new(AtomicBool::new(true));
        let probe = reported.clone();
        let (output, passed) = run_action(move |a| {
            probe.store(cmd::exec(a, "sh -c 'exit 3'", &[]), Ordering::SeqCst);
        });

        assertor::assert_that!(passed).is_false();
        assertor::assert_that!(reported.load(Ordering::SeqCst)).is_false();
        assertor::assert_that!(output).contains("exit status 3");
    }

    #[test]
    fn should_fail_the_task_on_unparsable_command_lines() {
        let (output, passed) = run_action(|a| {
            cmd::exec(a, "echo 'unterminated", &[]);
        });

        assertor::assert_that!(passed).is_false();
        assertor::assert_that!(output).contains("parse command line:");
    }

    #[test]
    fn should_fail_the_task_when_the_program_is_missing() {
        let (output, passed) = run_action(|a| {
            cmd::exec(a, "definitely-not-a-real-program-42", &[]);
        });

        assertor::assert_that!(passed).is_false();
        assertor::assert_that!(output).contains("definitely-not-a-real-program-42");
    }
}
