//! Main execution engine - runs the step sequence for every configuration

use crate::{
    core::{
        Configuration, Pipeline, PipelineReport, RunResult, RunStatus, StepFailure, StepOutcome,
        StepRecord,
    },
    execution::{CommandRunner, ExecutorSettings, SchedulingStrategy, StepExecutor},
};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        execution_id: Uuid,
        pipeline_name: String,
        configurations: usize,
    },
    ConfigurationStarted {
        configuration: String,
    },
    StepStarted {
        configuration: String,
        step_index: usize,
        step_name: String,
        command: String,
    },
    StepSkipped {
        configuration: String,
        step_name: String,
        reason: String,
    },
    StepSucceeded {
        configuration: String,
        step_name: String,
        duration_ms: u64,
        output: String,
    },
    StepFailed {
        configuration: String,
        step_name: String,
        failure: StepFailure,
        output: String,
    },
    StepsNotRun {
        configuration: String,
        step_names: Vec<String>,
    },
    ConfigurationFinished {
        configuration: String,
        status: RunStatus,
    },
    PipelineFinished {
        execution_id: Uuid,
        succeeded: usize,
        failed: usize,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Shared reporting sink
#[derive(Clone, Default)]
struct EventSink {
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl EventSink {
    async fn emit(&self, event: ExecutionEvent) {
        self.emit_all(vec![event]).await;
    }

    /// Deliver a batch while holding the lock, so it is never interleaved
    async fn emit_all(&self, events: Vec<ExecutionEvent>) {
        let handlers = self.handlers.lock().await;
        for event in events {
            for handler in handlers.iter() {
                handler(event.clone());
            }
        }
    }
}

/// Events of one configuration run, delivered live or as one block at the end
struct EventLog<'a> {
    sink: &'a EventSink,
    live: bool,
    pending: Vec<ExecutionEvent>,
}

impl<'a> EventLog<'a> {
    fn new(sink: &'a EventSink, live: bool) -> Self {
        Self {
            sink,
            live,
            pending: Vec::new(),
        }
    }

    async fn record(&mut self, event: ExecutionEvent) {
        if self.live {
            self.sink.emit(event).await;
        } else {
            self.pending.push(event);
        }
    }

    async fn flush(self) {
        if !self.pending.is_empty() {
            self.sink.emit_all(self.pending).await;
        }
    }
}

/// Main pipeline execution engine
pub struct ExecutionEngine<R> {
    executor: Arc<StepExecutor<R>>,
    strategy: SchedulingStrategy,
    sink: EventSink,
}

impl<R: CommandRunner + 'static> ExecutionEngine<R> {
    pub fn new(runner: R, settings: ExecutorSettings, strategy: SchedulingStrategy) -> Self {
        Self {
            executor: Arc::new(StepExecutor::new(runner, settings)),
            strategy,
            sink: EventSink::default(),
        }
    }

    pub fn executor(&self) -> &StepExecutor<R> {
        &self.executor
    }

    /// Add an event handler
    pub async fn add_event_handler<F>(&self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.sink.handlers.lock().await.push(Arc::new(handler));
    }

    /// Run every configuration of the pipeline and collect the results
    pub async fn execute(&self, pipeline: &Pipeline) -> PipelineReport {
        let execution_id = Uuid::new_v4();
        let started_at = Utc::now();
        let configurations = pipeline.configurations();

        info!(
            "Starting pipeline execution: {} ({}, {} configurations)",
            pipeline.name,
            execution_id,
            configurations.len()
        );
        self.sink
            .emit(ExecutionEvent::PipelineStarted {
                execution_id,
                pipeline_name: pipeline.name.clone(),
                configurations: configurations.len(),
            })
            .await;

        let concurrency = self.strategy.concurrency(configurations.len());
        let (runs, aborted) = if concurrency <= 1 {
            let mut runs = Vec::with_capacity(configurations.len());
            for configuration in configurations {
                runs.push(run_configuration(&*self.executor, &self.sink, pipeline, configuration, true).await);
            }
            (runs, Vec::new())
        } else {
            self.execute_concurrently(pipeline, configurations, concurrency).await
        };

        let report = PipelineReport {
            execution_id,
            pipeline_name: pipeline.name.clone(),
            runs,
            aborted,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            "Pipeline execution finished: {} - {} succeeded, {} failed",
            pipeline.name,
            report.succeeded(),
            report.failed()
        );
        self.sink
            .emit(ExecutionEvent::PipelineFinished {
                execution_id,
                succeeded: report.succeeded(),
                failed: report.failed(),
            })
            .await;

        report
    }

    /// Run the step sequence for a single configuration
    pub async fn run_configuration(&self, pipeline: &Pipeline, configuration: Configuration) -> RunResult {
        run_configuration(&*self.executor, &self.sink, pipeline, configuration, true).await
    }

    /// Run configurations as separate tasks, at most `limit` at a time
    async fn execute_concurrently(
        &self,
        pipeline: &Pipeline,
        configurations: Vec<Configuration>,
        limit: usize,
    ) -> (Vec<RunResult>, Vec<String>) {
        let pipeline = Arc::new(pipeline.clone());
        let permits = Arc::new(Semaphore::new(limit));

        let handles: Vec<(String, JoinHandle<RunResult>)> = configurations
            .into_iter()
            .map(|configuration| {
                let label = configuration.label();
                let executor = Arc::clone(&self.executor);
                let sink = self.sink.clone();
                let pipeline = Arc::clone(&pipeline);
                let permits = Arc::clone(&permits);

                let handle = tokio::spawn(async move {
                    // The semaphore is never closed
                    let _permit = permits.acquire_owned().await.ok();
                    run_configuration(&*executor, &sink, &pipeline, configuration, false).await
                });
                (label, handle)
            })
            .collect();

        let mut runs = Vec::with_capacity(handles.len());
        let mut aborted = Vec::new();
        for (label, handle) in handles {
            match handle.await {
                Ok(run) => runs.push(run),
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => {
                    error!("Configuration {} did not finish: {}", label, err);
                    aborted.push(label);
                }
            }
        }

        (runs, aborted)
    }
}

/// Run the steps of one configuration in order, stopping at the first failure
async fn run_configuration<R: CommandRunner>(
    executor: &StepExecutor<R>,
    sink: &EventSink,
    pipeline: &Pipeline,
    configuration: Configuration,
    live: bool,
) -> RunResult {
    let label = configuration.label();
    let context = pipeline.context_for(&configuration);
    let started_at = Utc::now();
    let mut log = EventLog::new(sink, live);
    let mut status = RunStatus::Pending;
    let mut records: Vec<StepRecord> = Vec::with_capacity(pipeline.steps.len());

    info!("Running configuration {}", label);
    log.record(ExecutionEvent::ConfigurationStarted {
        configuration: label.clone(),
    })
    .await;
    status.begin();

    for (index, step) in pipeline.steps.iter().enumerate() {
        status.enter_step(index);

        let outcome = match executor.skip_reason(step, &context) {
            Some(reason) => {
                info!("[{}] Skipping step {}: {}", label, step.name, reason);
                log.record(ExecutionEvent::StepSkipped {
                    configuration: label.clone(),
                    step_name: step.name.clone(),
                    reason: reason.clone(),
                })
                .await;
                StepOutcome::Skipped { reason }
            }
            None => {
                log.record(ExecutionEvent::StepStarted {
                    configuration: label.clone(),
                    step_index: index,
                    step_name: step.name.clone(),
                    command: executor.invocation(step, &context).command,
                })
                .await;
                executor.run(step, &context).await
            }
        };

        match &outcome {
            StepOutcome::Succeeded { duration_ms, output, .. } => {
                log.record(ExecutionEvent::StepSucceeded {
                    configuration: label.clone(),
                    step_name: step.name.clone(),
                    duration_ms: *duration_ms,
                    output: output.clone(),
                })
                .await;
            }
            StepOutcome::Failed { failure, output, .. } => {
                warn!("[{}] Step {} failed: {}", label, step.name, failure);
                log.record(ExecutionEvent::StepFailed {
                    configuration: label.clone(),
                    step_name: step.name.clone(),
                    failure: failure.clone(),
                    output: output.clone(),
                })
                .await;
            }
            StepOutcome::Skipped { .. } | StepOutcome::NotRun => {}
        }

        let failed = outcome.is_failure();
        records.push(StepRecord {
            name: step.name.clone(),
            kind: step.kind,
            outcome,
        });

        if failed {
            status.fail();
            break;
        }
    }

    // Fail-fast: everything after the failing step is never executed
    let remaining = &pipeline.steps[records.len()..];
    if !remaining.is_empty() {
        log.record(ExecutionEvent::StepsNotRun {
            configuration: label.clone(),
            step_names: remaining.iter().map(|s| s.name.clone()).collect(),
        })
        .await;
    }
    records.extend(remaining.iter().map(|step| StepRecord {
        name: step.name.clone(),
        kind: step.kind,
        outcome: StepOutcome::NotRun,
    }));

    if !status.is_terminal() {
        status.succeed();
    }

    info!("Configuration {} finished: {:?}", label, status);
    log.record(ExecutionEvent::ConfigurationFinished {
        configuration: label,
        status,
    })
    .await;
    log.flush().await;

    RunResult::new(configuration, records, status, started_at)
}
