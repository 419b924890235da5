// src/engine/queue.rs

use std::collections::{HashSet, VecDeque};
use std::str::FromStr;

use tracing::{debug, warn};

use super::runtime::TaskName;

/// Behaviour when a new trigger arrives while a run is already in progress.
///
/// - `Queue`: remember the trigger and start a new run when the current one
///   finishes (default behaviour).
/// - `Cancel`: drop any previously queued run and only keep the latest
///   trigger. The in-flight run itself is never interrupted; this only
///   manages what runs afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RetriggerBehaviour {
    #[default]
    Queue,
    Cancel,
}

impl FromStr for RetriggerBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "queue" => Ok(RetriggerBehaviour::Queue),
            "cancel" => Ok(RetriggerBehaviour::Cancel),
            other => Err(format!(
                "invalid on_retrigger value: {other} (expected \"queue\" or \"cancel\")"
            )),
        }
    }
}

/// Queue of triggers that arrive while a run is already executing.
///
/// This is what serializes reentrant triggers of the same task: a watched
/// file saved twice in quick succession produces one running invocation and
/// one queued batch, never two overlapping writes to the same destination.
///
/// - Each queued entry is a *batch* of task names to trigger together as one
///   future run.
/// - `max_runs` bounds how many batches are kept (default 1: at most one
///   future run is remembered).
/// - When the runtime goes idle it calls `drain_pending()`, which merges all
///   batches into a single trigger set for the next run.
#[derive(Debug)]
pub struct TriggerQueue {
    behaviour: RetriggerBehaviour,
    max_runs: usize,
    runs: VecDeque<HashSet<TaskName>>,
}

impl TriggerQueue {
    /// Create a new queue with the given behaviour and maximum queued runs.
    ///
    /// `max_runs` is clamped to at least 1; a zero-length queue would make
    /// queuing semantics meaningless.
    pub fn new(behaviour: RetriggerBehaviour, max_runs: usize) -> Self {
        Self {
            behaviour,
            max_runs: max_runs.max(1),
            runs: VecDeque::new(),
        }
    }

    /// Returns true if there are no queued triggers.
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    /// Returns the configured behaviour.
    pub fn behaviour(&self) -> RetriggerBehaviour {
        self.behaviour
    }

    /// Record that a task was triggered while a run is in progress.
    ///
    /// - `Queue`: merge into the last batch (coalescing rapid triggers into
    ///   the same future run), dropping the oldest batches past `max_runs`.
    /// - `Cancel`: drop all batches and keep only this task.
    pub fn record_trigger(&mut self, task: &str) {
        let name = task.to_string();

        match self.behaviour {
            RetriggerBehaviour::Queue => {
                if let Some(last_batch) = self.runs.back_mut() {
                    let inserted = last_batch.insert(name.clone());
                    debug!(task = %name, inserted, "merged trigger into last queued batch");
                } else {
                    self.runs.push_back(HashSet::from([name.clone()]));
                    debug!(task = %name, "created first queued batch");
                }

                if self.runs.len() > self.max_runs {
                    warn!(
                        current_batches = self.runs.len(),
                        max_runs = self.max_runs,
                        "exceeded max queued runs; dropping oldest batches"
                    );
                    while self.runs.len() > self.max_runs {
                        self.runs.pop_front();
                    }
                }
            }
            RetriggerBehaviour::Cancel => {
                debug!(task = %name, "resetting queued batches to this task only");
                self.runs.clear();
                self.runs.push_back(HashSet::from([name]));
            }
        }
    }

    /// Drain all pending batches and merge them into one set of task names,
    /// to seed the next run once the current one has finished.
    pub fn drain_pending(&mut self) -> Vec<TaskName> {
        let mut merged: HashSet<TaskName> = HashSet::new();

        while let Some(batch) = self.runs.pop_front() {
            merged.extend(batch);
        }

        let tasks: Vec<TaskName> = merged.into_iter().collect();
        debug!(drained = tasks.len(), "drained queued triggers into new run");
        tasks
    }
}
