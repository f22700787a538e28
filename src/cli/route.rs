//! CLI route: single route table and run context. Dispatches to the progress
//! runtime and presentation.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{debug, info, warn};

use crate::cli::parse::Commands;
use crate::cli::presentation::{
    format_handlers_json, format_handlers_text, format_run_json, format_run_text, RunSummary,
};
use crate::config::{ConfigLoader, ProscopeConfig};
use crate::error::ProgressError;
use crate::progress::{
    default_handlers, try_with_progress, AggregationStrategy, HandlerRegistry, HandlerSpec,
    ScopeGuard, ScopeOptions, Signaler,
};

/// Parameters of one simulated `run`.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub steps: u64,
    pub workers: usize,
    pub delay_ms: u64,
    pub strategy: Option<String>,
    pub handlers: Vec<String>,
    pub shared: bool,
    pub fail_at: Option<u64>,
    pub tokio: bool,
}

/// Runtime context for CLI execution: workspace and loaded configuration.
pub struct RunContext {
    workspace_root: PathBuf,
    config: ProscopeConfig,
}

impl RunContext {
    /// Create run context from workspace root and optional config path. Uses ConfigLoader only.
    pub fn new(workspace_root: PathBuf, config_path: Option<PathBuf>) -> Result<Self, ProgressError> {
        let config = if let Some(ref cfg_path) = config_path {
            ConfigLoader::load_from_file(cfg_path)?
        } else {
            ConfigLoader::load(&workspace_root)?
        };
        Ok(Self {
            workspace_root,
            config,
        })
    }

    /// Context over an already loaded configuration.
    pub fn from_config(workspace_root: PathBuf, config: ProscopeConfig) -> Self {
        Self {
            workspace_root,
            config,
        }
    }

    pub fn config(&self) -> &ProscopeConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &PathBuf {
        &self.workspace_root
    }

    /// Execute a command and return its rendered output.
    pub fn execute(&self, command: &Commands) -> Result<String, ProgressError> {
        match command {
            Commands::Run {
                steps,
                workers,
                delay_ms,
                strategy,
                handlers,
                shared,
                fail_at,
                tokio,
                format,
            } => {
                let request = RunRequest {
                    steps: *steps,
                    workers: *workers,
                    delay_ms: *delay_ms,
                    strategy: strategy.clone(),
                    handlers: handlers.clone(),
                    shared: *shared,
                    fail_at: *fail_at,
                    tokio: *tokio,
                };
                let summary = self.handle_run(&request)?;
                match format.as_str() {
                    "json" => format_run_json(&summary),
                    _ => Ok(format_run_text(&summary)),
                }
            }
            Commands::Handlers { format } => {
                let registry = self.effective_registry();
                match format.as_str() {
                    "json" => format_handlers_json(&registry),
                    _ => Ok(format_handlers_text(&registry)),
                }
            }
        }
    }

    /// Registry a scope entered with the loaded configuration would use.
    pub fn effective_registry(&self) -> HandlerRegistry {
        self.config
            .progress
            .registry()
            .unwrap_or_else(default_handlers)
    }

    /// Scope options for a run: configuration first, then command-line overrides.
    pub fn scope_options(&self, request: &RunRequest) -> Result<ScopeOptions, ProgressError> {
        let mut options = ScopeOptions::from_config(&self.config.progress);
        if let Some(ref strategy) = request.strategy {
            let strategy: AggregationStrategy = strategy.parse().map_err(ProgressError::Config)?;
            options = options.with_strategy(strategy);
        }
        if !request.handlers.is_empty() {
            let specs = request
                .handlers
                .iter()
                .map(|name| HandlerSpec::from_name(name))
                .collect::<Result<Vec<_>, _>>()
                .map_err(ProgressError::Config)?;
            options = options.with_registry(HandlerRegistry::from_specs(specs));
        }
        Ok(options)
    }

    /// Run a simulated parallel workload inside one progress scope.
    pub fn handle_run(&self, request: &RunRequest) -> Result<RunSummary, ProgressError> {
        if request.workers == 0 {
            return Err(ProgressError::Config(
                "run needs at least one worker".to_string(),
            ));
        }
        let options = self.scope_options(request)?;
        info!(
            workers = request.workers,
            steps = request.steps,
            shared = request.shared,
            tokio = request.tokio,
            strategy = options.strategy.as_str(),
            "Starting simulated run"
        );

        let (outcomes, report) = try_with_progress(options, |scope| {
            let signalers = worker_signalers(scope, request)?;
            if request.tokio {
                run_tokio_workers(signalers, request)
            } else {
                Ok(run_thread_workers(signalers, request))
            }
        })?;

        let mut completed_steps = 0;
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(steps) => completed_steps += steps,
                Err(e) => {
                    warn!(error = %e, "Worker failed");
                    failures.push(format!("{:#}", e));
                }
            }
        }
        debug!(scope_id = report.scope_id, completed_steps, "Simulated run finished");

        Ok(RunSummary {
            workers: request.workers,
            steps_per_worker: request.steps,
            completed_steps,
            failures,
            report,
        })
    }
}

/// Signalers are created on the scope's thread and moved into workers.
fn worker_signalers(
    scope: &ScopeGuard,
    request: &RunRequest,
) -> Result<Vec<Signaler>, ProgressError> {
    if request.shared {
        let total = request.steps.saturating_mul(request.workers as u64);
        let shared = scope.builder().steps(Some(total)).label("workers").build()?;
        Ok(vec![shared; request.workers])
    } else {
        (0..request.workers)
            .map(|i| {
                scope
                    .builder()
                    .steps(Some(request.steps))
                    .label(format!("worker-{}", i))
                    .build()
            })
            .collect()
    }
}

fn step_message(index: usize, step: u64) -> String {
    format!("worker-{} step {}", index, step + 1)
}

fn check_failure(index: usize, step: u64, fail_at: Option<u64>) -> anyhow::Result<()> {
    if index == 0 && fail_at == Some(step) {
        bail!("worker-{} failed at step {}", index, step);
    }
    Ok(())
}

fn simulate_worker(
    index: usize,
    signaler: &Signaler,
    request: &RunRequest,
) -> anyhow::Result<u64> {
    let delay = Duration::from_millis(request.delay_ms);
    for step in 0..request.steps {
        check_failure(index, step, request.fail_at)?;
        thread::sleep(delay);
        signaler.signal(Some(&step_message(index, step)));
    }
    Ok(request.steps)
}

fn run_thread_workers(
    signalers: Vec<Signaler>,
    request: &RunRequest,
) -> Vec<anyhow::Result<u64>> {
    thread::scope(|s| {
        let handles: Vec<_> = signalers
            .iter()
            .enumerate()
            .map(|(index, signaler)| s.spawn(move || simulate_worker(index, signaler, request)))
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(index, handle)| match handle.join() {
                Ok(result) => result,
                Err(_) => Err(anyhow::anyhow!("worker-{} panicked", index)),
            })
            .collect()
    })
}

fn run_tokio_workers(
    signalers: Vec<Signaler>,
    request: &RunRequest,
) -> Result<Vec<anyhow::Result<u64>>, ProgressError> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()?;
    let delay = Duration::from_millis(request.delay_ms);
    let steps = request.steps;
    let fail_at = request.fail_at;

    Ok(runtime.block_on(async move {
        let handles: Vec<_> = signalers
            .into_iter()
            .enumerate()
            .map(|(index, signaler)| {
                tokio::spawn(async move {
                    for step in 0..steps {
                        check_failure(index, step, fail_at)?;
                        tokio::time::sleep(delay).await;
                        signaler.signal(Some(&step_message(index, step)));
                    }
                    Ok::<u64, anyhow::Error>(steps)
                })
            })
            .collect();

        let mut outcomes = Vec::with_capacity(handles.len());
        for (index, handle) in handles.into_iter().enumerate() {
            let outcome = handle
                .await
                .with_context(|| format!("worker-{} task aborted", index))
                .and_then(|result| result);
            outcomes.push(outcome);
        }
        outcomes
    }))
}
