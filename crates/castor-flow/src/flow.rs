// Copyright 2025 Castor Contributors
// SPDX-License-Identifier: MIT

use crate::logger::{FlowLogger, PlainLogger};
use crate::model::{ActionFn, ExecuteInput, Input, Sink, Task, TaskResult, TaskStatus, sink_from};
use crate::runner;
use anyhow::bail;
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Arc;

pub type Runner = Arc<dyn Fn(&Input) -> TaskResult + Send + Sync>;
pub type Executor = Arc<dyn Fn(&ExecuteInput) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct ExecuteOptions {
    pub no_deps: bool,
    pub skip: Vec<String>,
}

/// Task registry and execution pipeline. Tasks run sequentially in
/// dependency order; middlewares wrap each task run and executor
/// middlewares wrap the whole flow run.
pub struct Flow {
    tasks: Vec<Task>,
    default_task: Option<String>,
    middlewares: Vec<Box<dyn Fn(Runner) -> Runner + Send + Sync>>,
    executor_middlewares: Vec<Box<dyn Fn(Executor) -> Executor + Send + Sync>>,
    output: Sink,
    logger: Arc<dyn FlowLogger>,
}

impl Default for Flow {
    fn default() -> Self {
        Self::new()
    }
}

impl Flow {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            default_task: None,
            middlewares: Vec::new(),
            executor_middlewares: Vec::new(),
            output: sink_from(std::io::stdout()),
            logger: Arc::new(PlainLogger),
        }
    }

    pub fn define(&mut self, task: Task) -> anyhow::Result<()> {
        if self.tasks.iter().any(|existing| existing.name == task.name) {
            bail!("castor.flow : task already defined ({})", task.name)
        }
        self.tasks.push(task);
        Ok(())
    }

    pub fn set_default(&mut self, name: &str) {
        self.default_task = Some(name.to_string());
    }

    pub fn set_output(&mut self, output: Sink) {
        self.output = output;
    }

    pub fn output(&self) -> Sink {
        self.output.clone()
    }

    pub fn set_logger(&mut self, logger: Arc<dyn FlowLogger>) {
        self.logger = logger;
    }

    /// Registers a runner middleware. Middlewares run in registration order,
    /// the last registered being the outermost.
    pub fn use_middleware(&mut self, middleware: impl Fn(Runner) -> Runner + Send + Sync + 'static) {
        self.middlewares.push(Box::new(middleware));
    }

    pub fn use_executor(&mut self, middleware: impl Fn(Executor) -> Executor + Send + Sync + 'static) {
        self.executor_middlewares.push(Box::new(middleware));
    }

    pub fn print_tasks(&self, output: &mut dyn Write) {
        let width = self.tasks.iter().map(|task| task.name.len()).max().unwrap_or(0);
        let _ = writeln!(output, "Tasks:");
        for task in &self.tasks {
            let _ = writeln!(output, "  {:width$}  {}", task.name, task.usage);
        }
    }

    /// Resolves the ordered list of tasks to run : requested tasks plus
    /// their dependencies in post-order, minus the skip list. Unknown tasks
    /// and dependency cycles are planning errors.
    pub fn plan(&self, selected: &[String], options: &ExecuteOptions) -> anyhow::Result<Vec<String>> {
        let mut requested: Vec<String> = selected.to_vec();
        if requested.is_empty() {
            match &self.default_task {
                Some(name) => requested.push(name.clone()),
                None => bail!("castor.flow : no task selected and no default task defined"),
            }
        }

        let mut ordered = Vec::new();
        if options.no_deps {
            for name in &requested {
                if self.task(name).is_none() {
                    bail!("castor.flow : no such task ({name})")
                }
                if !ordered.contains(name) {
                    ordered.push(name.clone());
                }
            }
        } else {
            let mut visited = HashSet::new();
            let mut trail = Vec::new();
            for name in &requested {
                self.visit(name, &mut ordered, &mut visited, &mut trail)?;
            }
        }

        ordered.retain(|name| !options.skip.contains(name));
        Ok(ordered)
    }

    /// Runs the planned tasks through the middleware pipelines. The first
    /// failed task aborts the flow.
    pub fn run(&self, plan: &[String]) -> anyhow::Result<()> {
        let runner = self.assemble_runner();
        let executor = self.assemble_executor(plan.to_vec(), runner);
        executor(&ExecuteInput {
            output: self.output.clone(),
        })
    }

    pub fn execute(&self, selected: &[String], options: &ExecuteOptions) -> anyhow::Result<()> {
        let plan = self.plan(selected, options)?;
        self.run(&plan)
    }

    fn task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.name == name)
    }

    fn visit(
        &self,
        name: &str,
        ordered: &mut Vec<String>,
        visited: &mut HashSet<String>,
        trail: &mut Vec<String>,
    ) -> anyhow::Result<()> {
        if visited.contains(name) {
            return Ok(());
        }
        if trail.iter().any(|pending| pending == name) {
            bail!("castor.flow : dependency cycle involving ({name})")
        }
        let Some(task) = self.task(name) else {
            bail!("castor.flow : no such task ({name})")
        };

        trail.push(name.to_string());
        for dep in &task.deps {
            self.visit(dep, ordered, visited, trail)?;
        }
        trail.pop();

        visited.insert(name.to_string());
        ordered.push(name.to_string());
        Ok(())
    }

    fn assemble_runner(&self) -> Runner {
        let actions: HashMap<String, Arc<ActionFn>> = self
            .tasks
            .iter()
            .map(|task| (task.name.clone(), task.action.clone()))
            .collect();

        let mut pipeline: Runner = Arc::new(move |input: &Input| match actions.get(&input.task_name) {
            Some(action) => runner::run_task(input, action),
            None => TaskResult::with_status(TaskStatus::NotRun),
        });
        for middleware in &self.middlewares {
            pipeline = middleware(pipeline);
        }
        pipeline
    }

    fn assemble_executor(&self, plan: Vec<String>, runner: Runner) -> Executor {
        let logger = self.logger.clone();
        let mut pipeline: Executor = Arc::new(move |input: &ExecuteInput| {
            for name in &plan {
                log::debug!("[castor.flow] running task : {name}");
                let task_input = Input {
                    task_name: name.clone(),
                    output: input.output.clone(),
                    logger: logger.clone(),
                };
                let result = runner(&task_input);
                if result.failed() {
                    bail!("task failed: {name}")
                }
            }
            Ok(())
        });
        for middleware in &self.executor_middlewares {
            pipeline = middleware(pipeline);
        }
        pipeline
    }
}
