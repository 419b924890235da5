// src/engine/runtime.rs

use std::collections::{BTreeSet, HashSet};

use anyhow::{anyhow, Result};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::scheduler::{ScheduledTask, Scheduler};
use crate::engine::queue::TriggerQueue;
use crate::serve::ReloadHub;

/// Public type alias for task names throughout the engine.
pub type TaskName = String;

/// Reason why a task was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// A watched source file changed.
    FileWatch,
    /// Seeded at startup or requested explicitly (CLI).
    Manual,
}

/// Result of a task invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Success,
    /// Inputs unchanged since the last successful run (`use_hash`); satisfies
    /// dependents but emits no reload.
    Skipped,
    Failed(String),
}

/// Events sent into the runtime from watchers, the executor, or signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    TaskTriggered {
        task: TaskName,
        reason: TriggerReason,
    },
    TaskCompleted {
        task: TaskName,
        outcome: TaskOutcome,
    },
    ShutdownRequested,
}

/// Options that influence how the runtime behaves.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    /// If true, exit as soon as nothing is left to run and no triggers are
    /// queued. One-shot builds set this; serve mode does not.
    pub exit_when_idle: bool,
}

/// The main orchestration runtime.
///
/// Responsibilities:
/// - Consume `RuntimeEvent`s from watchers / executor / ctrl-c.
/// - Apply queue semantics for triggers arriving mid-run.
/// - Drive the DAG scheduler and dispatch ready tasks to the executor.
/// - Publish reload signals for successful tasks marked `reload = true`.
/// - Track failures so one-shot builds can exit non-zero.
pub struct Runtime {
    scheduler: Scheduler,
    queue: TriggerQueue,
    options: RuntimeOptions,

    /// Unified event stream from all producers.
    events_rx: mpsc::Receiver<RuntimeEvent>,

    /// Channel to the executor: ready tasks go here.
    exec_tx: mpsc::Sender<ScheduledTask>,

    /// Live-reload hub, present in serve mode.
    reload: Option<ReloadHub>,

    /// Tasks triggered as one run when the loop starts (startup seeds).
    seeds: Vec<TaskName>,

    /// Tasks that failed at any point during this runtime's lifetime.
    failed: BTreeSet<TaskName>,
}

impl Runtime {
    pub fn new(
        scheduler: Scheduler,
        queue: TriggerQueue,
        options: RuntimeOptions,
        events_rx: mpsc::Receiver<RuntimeEvent>,
        exec_tx: mpsc::Sender<ScheduledTask>,
    ) -> Self {
        Self {
            scheduler,
            queue,
            options,
            events_rx,
            exec_tx,
            reload: None,
            seeds: Vec::new(),
            failed: BTreeSet::new(),
        }
    }

    /// Attach a live-reload hub; successful `reload = true` tasks publish to it.
    pub fn with_reload_hub(mut self, hub: ReloadHub) -> Self {
        self.reload = Some(hub);
        self
    }

    /// Trigger the given tasks as the first run once the event loop starts.
    ///
    /// Seeding through the runtime instead of the event channel keeps startup
    /// independent of the channel's capacity, whatever the project size.
    pub fn with_seed_tasks(mut self, tasks: Vec<TaskName>) -> Self {
        self.seeds = tasks;
        self
    }

    /// Main event loop. Returns an error naming the failed tasks when a
    /// one-shot run finishes with failures, so the CLI exits non-zero.
    pub async fn run(mut self) -> Result<()> {
        info!("siteforge runtime started");

        if !self.seeds.is_empty() {
            let seeds = std::mem::take(&mut self.seeds);
            info!(tasks = seeds.len(), "seeding initial run");
            self.start_new_run(seeds).await?;
        }

        while let Some(event) = self.events_rx.recv().await {
            debug!(?event, "runtime received event");

            let keep_running = match event {
                RuntimeEvent::TaskTriggered { task, reason } => {
                    self.handle_task_trigger(task, reason).await?
                }
                RuntimeEvent::TaskCompleted { task, outcome } => {
                    self.handle_task_completion(task, outcome).await?
                }
                RuntimeEvent::ShutdownRequested => {
                    info!("shutdown requested, stopping runtime");
                    false
                }
            };

            if !keep_running {
                break;
            }
        }

        info!("siteforge runtime exiting");

        if self.options.exit_when_idle && !self.failed.is_empty() {
            let names: Vec<&str> = self.failed.iter().map(|s| s.as_str()).collect();
            return Err(anyhow!("build finished with failed tasks: {}", names.join(", ")));
        }

        Ok(())
    }

    /// Handle a trigger (file watch, startup seed, or CLI).
    async fn handle_task_trigger(&mut self, task: TaskName, reason: TriggerReason) -> Result<bool> {
        info!(task = %task, ?reason, "task triggered");

        if self.scheduler.is_idle() {
            // Starting a new run: combine this trigger with anything queued
            // while the previous run was winding down.
            let mut triggers: HashSet<TaskName> = self.queue.drain_pending().into_iter().collect();
            triggers.insert(task);

            self.start_new_run(triggers.into_iter().collect()).await?;
        } else {
            // A run is in flight; the queue serializes the retrigger so the
            // same task never runs twice concurrently.
            self.queue.record_trigger(&task);
            debug!(task = %task, "task trigger recorded in queue");
        }

        Ok(true)
    }

    /// Handle completion of a task invocation.
    async fn handle_task_completion(
        &mut self,
        task: TaskName,
        outcome: TaskOutcome,
    ) -> Result<bool> {
        match &outcome {
            TaskOutcome::Success => {
                info!(task = %task, "task completed successfully");
                self.publish_reload(&task);
            }
            TaskOutcome::Skipped => {
                info!(task = %task, "task skipped (inputs unchanged)");
            }
            TaskOutcome::Failed(reason) => {
                warn!(task = %task, %reason, "task failed");
            }
        }

        let newly_ready = self.scheduler.handle_completion(&task, &outcome);
        self.dispatch_ready_tasks(newly_ready).await?;

        if self.scheduler.is_idle() {
            self.failed.extend(self.scheduler.failed_tasks());
        }

        self.maybe_start_queued_run().await?;

        if self.options.exit_when_idle && self.scheduler.is_idle() && self.queue.is_empty() {
            info!("runtime idle and exit_when_idle=true, stopping");
            return Ok(false);
        }

        Ok(true)
    }

    /// Start a brand-new run from the given set of triggers.
    async fn start_new_run(&mut self, triggers: Vec<TaskName>) -> Result<()> {
        if triggers.is_empty() {
            debug!("start_new_run called with empty trigger set; nothing to do");
            return Ok(());
        }

        info!(triggers = ?triggers, "starting new run");

        self.scheduler.start_new_run();

        for task in triggers {
            let newly_ready = self.scheduler.handle_trigger(&task);
            self.dispatch_ready_tasks(newly_ready).await?;
        }

        Ok(())
    }

    /// If the scheduler is idle and there are queued triggers, start a new run.
    async fn maybe_start_queued_run(&mut self) -> Result<()> {
        if !self.scheduler.is_idle() {
            return Ok(());
        }

        let triggers = self.queue.drain_pending();
        if triggers.is_empty() {
            return Ok(());
        }

        self.start_new_run(triggers).await
    }

    /// Send all ready tasks to the executor.
    async fn dispatch_ready_tasks(&mut self, tasks: Vec<ScheduledTask>) -> Result<()> {
        for task in tasks {
            debug!(task = %task.name, "dispatching task to executor");
            if let Err(err) = self.exec_tx.send(task).await {
                error!(error = %err, "failed to send task to executor");
                // Executor channel closed; bubble up so the caller can decide.
                return Err(err.into());
            }
        }
        Ok(())
    }

    /// Notify connected dev-server clients when a reload-worthy task succeeds.
    fn publish_reload(&self, task: &str) {
        if !self.scheduler.wants_reload(task) {
            return;
        }
        if let Some(hub) = &self.reload {
            let notified = hub.publish(task);
            debug!(task = %task, notified, "published reload signal");
        }
    }
}
