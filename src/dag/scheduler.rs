// src/dag/scheduler.rs

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::model::{ConfigFile, TaskConfig};
use crate::dag::graph::DagGraph;
use crate::engine::{TaskName, TaskOutcome};
use crate::errors::TaskError;
use crate::pipeline::stages::Stage;

/// Per-run state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    /// Task participates in this run but is waiting on prerequisites.
    Pending,
    /// Task has been dispatched to the executor and is currently running.
    Running,
    /// Task completed successfully for this run (or was skipped as unchanged).
    DoneSuccess,
    /// Task failed in this run, or was blocked by a failed prerequisite.
    DoneFailed,
}

/// The unit of work a task performs, resolved from config.
#[derive(Debug, Clone)]
pub enum TaskWork {
    /// Delete all files matching the globs, pruning emptied directories.
    Clean { globs: Vec<String> },
    /// Read `src`, apply `stages` in order, write the result under `dest`.
    Pipeline {
        src: Vec<String>,
        dest: String,
        stages: Vec<Stage>,
        ext: Option<String>,
    },
}

/// Static task information derived from config, plus per-run state.
#[derive(Debug, Clone)]
struct TaskInfo {
    name: TaskName,
    work: TaskWork,
    reload: bool,
    use_hash: bool,
    /// Direct prerequisites for this task (names in `after = [...]`).
    deps: Vec<TaskName>,

    /// Per-run state (None if not participating in the current run).
    run_state: Option<RunState>,
}

impl TaskInfo {
    fn from_config(name: TaskName, cfg: &TaskConfig, deps: Vec<TaskName>) -> Self {
        let work = match &cfg.clean {
            Some(globs) => TaskWork::Clean {
                globs: globs.clone(),
            },
            None => {
                let stages: Vec<Stage> = cfg
                    .stages
                    .iter()
                    .filter_map(|s| {
                        let stage = Stage::from_config(s);
                        if stage.is_none() {
                            warn!(task = %name, ?s, "unknown stage survived validation; ignoring");
                        }
                        stage
                    })
                    .collect();

                TaskWork::Pipeline {
                    src: cfg.src.clone().unwrap_or_default(),
                    dest: cfg.dest.clone().unwrap_or_default(),
                    stages,
                    ext: cfg.ext.clone(),
                }
            }
        };

        Self {
            name,
            work,
            reload: cfg.reload,
            use_hash: cfg.use_hash,
            deps,
            run_state: None,
        }
    }
}

/// Description of a task the scheduler wants the executor to run now.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub name: TaskName,
    pub work: TaskWork,
    pub reload: bool,
    pub use_hash: bool,
}

impl ScheduledTask {
    fn from_task_info(info: &TaskInfo) -> Self {
        Self {
            name: info.name.clone(),
            work: info.work.clone(),
            reload: info.reload,
            use_hash: info.use_hash,
        }
    }
}

/// Scheduler holds the immutable DAG plus mutable per-run state.
///
/// It is responsible for:
/// - pulling a triggered task's transitive prerequisites into the run, so a
///   build task's paired clean task always completes before the rebuild writes
/// - deciding when a triggered task is ready to run (prerequisites done)
/// - failing dependents when a prerequisite fails, so they are never dispatched
pub struct Scheduler {
    graph: DagGraph,
    tasks: HashMap<TaskName, TaskInfo>,

    /// Monotonically increasing run ID.
    run_counter: u64,
    /// Currently active run ID, or `None` if there is no active run.
    current_run_id: Option<u64>,
}

impl Scheduler {
    /// Construct a scheduler from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let graph = DagGraph::from_config(cfg);

        let mut tasks = HashMap::new();
        for (name, tc) in cfg.task.iter() {
            let deps = graph.dependencies_of(name).to_vec();
            tasks.insert(name.clone(), TaskInfo::from_config(name.clone(), tc, deps));
        }

        Self {
            graph,
            tasks,
            run_counter: 0,
            current_run_id: None,
        }
    }

    /// Returns `true` if there is currently no active run.
    pub fn is_idle(&self) -> bool {
        self.current_run_id.is_none()
    }

    /// All configured task names.
    pub fn task_names(&self) -> impl Iterator<Item = &str> {
        self.graph.tasks()
    }

    /// Whether the given task wants a live-reload notification on success.
    pub fn wants_reload(&self, name: &str) -> bool {
        self.tasks.get(name).map(|t| t.reload).unwrap_or(false)
    }

    /// Tasks that ended up `DoneFailed` in the current (or just-finished) run.
    pub fn failed_tasks(&self) -> Vec<TaskName> {
        let mut failed: Vec<TaskName> = self
            .tasks
            .values()
            .filter(|t| t.run_state == Some(RunState::DoneFailed))
            .map(|t| t.name.clone())
            .collect();
        failed.sort();
        failed
    }

    /// Start a new run, resetting per-run state.
    pub fn start_new_run(&mut self) {
        self.run_counter += 1;
        self.current_run_id = Some(self.run_counter);

        for info in self.tasks.values_mut() {
            info.run_state = None;
        }

        debug!(run_id = self.run_counter, "scheduler: starting new run");
    }

    /// Handle a trigger for a task name.
    ///
    /// The task *and all of its transitive prerequisites* are pulled into the
    /// current run: a watch trigger on a rebuild task always re-runs its
    /// paired clean task first. Returns the tasks now ready to execute.
    pub fn handle_trigger(&mut self, task: &str) -> Vec<ScheduledTask> {
        if self.current_run_id.is_none() {
            warn!("handle_trigger called with no active run; implicitly starting a new run");
            self.start_new_run();
        }

        if !self.tasks.contains_key(task) {
            warn!(task = %task, "trigger for unknown task; ignoring");
            return Vec::new();
        }

        let mut participants = self.graph.transitive_dependencies_of(task);
        participants.push(task.to_string());

        for name in participants {
            if let Some(info) = self.tasks.get_mut(&name) {
                if info.run_state.is_none() {
                    info.run_state = Some(RunState::Pending);
                    debug!(task = %info.name, "task marked as Pending in this run");
                }
            }
        }

        let ready = self.collect_new_ready_tasks();
        self.maybe_finish_run();
        ready
    }

    /// Handle completion of a task with a concrete outcome.
    ///
    /// - Success / Skipped mark the task `DoneSuccess` and may make dependents
    ///   ready (a skipped, unchanged task still satisfies its dependents).
    /// - Failure marks the task and all its triggered dependents `DoneFailed`;
    ///   blocked dependents are never dispatched.
    pub fn handle_completion(&mut self, task: &str, outcome: &TaskOutcome) -> Vec<ScheduledTask> {
        if self.current_run_id.is_none() {
            warn!(task = %task, "handle_completion called with no active run; ignoring");
            return Vec::new();
        }

        let mut newly_ready = Vec::new();

        match self.tasks.get_mut(task) {
            Some(info) => match outcome {
                TaskOutcome::Success | TaskOutcome::Skipped => {
                    info.run_state = Some(RunState::DoneSuccess);
                    debug!(task = %info.name, "task completed successfully");
                    newly_ready.extend(self.collect_new_ready_tasks());
                }
                TaskOutcome::Failed(reason) => {
                    info.run_state = Some(RunState::DoneFailed);
                    warn!(
                        task = %info.name,
                        %reason,
                        "task failed; blocking dependents in this run"
                    );
                    self.mark_dependents_failed(task);
                }
            },
            None => {
                warn!(task = %task, "completion for unknown task; ignoring");
            }
        }

        self.maybe_finish_run();
        newly_ready
    }

    /// Determine whether all tasks are in a terminal state and clear
    /// `current_run_id` if so.
    fn maybe_finish_run(&mut self) {
        if self.current_run_id.is_none() {
            return;
        }

        let any_active = self.tasks.values().any(|info| {
            matches!(
                info.run_state,
                Some(RunState::Pending) | Some(RunState::Running)
            )
        });

        if !any_active {
            info!(
                run_id = self.current_run_id,
                "scheduler: all tasks terminal; run finished"
            );
            self.current_run_id = None;
        }
    }

    /// Collect tasks that are `Pending` with all prerequisites done, mark them
    /// `Running`, and return them as `ScheduledTask`s.
    fn collect_new_ready_tasks(&mut self) -> Vec<ScheduledTask> {
        let mut ready = Vec::new();

        let candidates: Vec<TaskName> = self
            .tasks
            .values()
            .filter_map(|info| {
                if matches!(info.run_state, Some(RunState::Pending)) && self.deps_satisfied(info) {
                    Some(info.name.clone())
                } else {
                    None
                }
            })
            .collect();

        for name in candidates {
            if let Some(info) = self.tasks.get_mut(&name) {
                debug!(task = %info.name, "prerequisites satisfied; marking Running");
                info.run_state = Some(RunState::Running);
                ready.push(ScheduledTask::from_task_info(info));
            }
        }

        ready
    }

    /// Check whether every prerequisite of the given task reached
    /// `DoneSuccess` in the current run.
    ///
    /// Triggering pulls the full prerequisite closure into the run, so a
    /// prerequisite outside the run means something went wrong; treat it as
    /// unsatisfied rather than racing ahead.
    fn deps_satisfied(&self, info: &TaskInfo) -> bool {
        for dep_name in &info.deps {
            let dep = match self.tasks.get(dep_name) {
                Some(d) => d,
                None => {
                    warn!(
                        task = %info.name,
                        dep = %dep_name,
                        "prerequisite missing from tasks map"
                    );
                    return false;
                }
            };

            match dep.run_state {
                Some(RunState::DoneSuccess) => {}
                Some(RunState::DoneFailed)
                | Some(RunState::Pending)
                | Some(RunState::Running) => return false,
                None => {
                    warn!(
                        task = %info.name,
                        dep = %dep_name,
                        "prerequisite not part of this run; treating as unsatisfied"
                    );
                    return false;
                }
            }
        }

        true
    }

    /// Mark all triggered dependents (transitively) of a failed task as
    /// `DoneFailed` for this run, so they are never dispatched.
    fn mark_dependents_failed(&mut self, failed_task: &str) {
        let mut stack: Vec<TaskName> = self.graph.dependents_of(failed_task).to_vec();

        while let Some(name) = stack.pop() {
            if let Some(info) = self.tasks.get_mut(&name) {
                match info.run_state {
                    Some(RunState::Pending) | Some(RunState::Running) => {
                        info.run_state = Some(RunState::DoneFailed);
                        let err = TaskError::Prerequisite {
                            task: info.name.clone(),
                            dependency: failed_task.to_string(),
                        };
                        debug!(%err, "blocking dependent");
                        stack.extend(self.graph.dependents_of(&name).iter().cloned());
                    }
                    Some(RunState::DoneSuccess) | Some(RunState::DoneFailed) | None => {}
                }
            }
        }
    }
}
