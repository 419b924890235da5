// src/config/validate.rs

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, StageConfig, TaskConfig};
use crate::engine::RetriggerBehaviour;

/// Run semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one task
/// - `[runner].on_retrigger` is valid ("queue" or "cancel")
/// - `queue_length >= 1`
/// - each task is exactly one of the clean / pipeline shapes
/// - pipeline tasks have a non-empty `src` and a `dest`
/// - stage specs are well-formed
/// - all `after` dependencies refer to existing tasks
/// - the task graph has no cycles
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_tasks(cfg)?;
    validate_runner_section(cfg)?;
    for (name, task) in cfg.task.iter() {
        validate_task_shape(name, task)?;
    }
    validate_task_dependencies(cfg)?;
    validate_dag(cfg)?;
    Ok(())
}

fn ensure_has_tasks(cfg: &ConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(anyhow!(
            "config must contain at least one [task.<name>] section"
        ));
    }
    Ok(())
}

fn validate_runner_section(cfg: &ConfigFile) -> Result<()> {
    RetriggerBehaviour::from_str(&cfg.runner.on_retrigger)
        .map_err(|e| anyhow!(e))
        .context("invalid [runner].on_retrigger")?;

    if cfg.runner.queue_length == 0 {
        return Err(anyhow!("[runner].queue_length must be >= 1 (got 0)"));
    }

    Ok(())
}

fn validate_task_shape(name: &str, task: &TaskConfig) -> Result<()> {
    match (&task.clean, &task.src) {
        (Some(_), Some(_)) => {
            return Err(anyhow!(
                "task '{}' sets both `clean` and `src`; a task is either a clean task or a pipeline task",
                name
            ));
        }
        (None, None) => {
            return Err(anyhow!(
                "task '{}' sets neither `clean` nor `src`",
                name
            ));
        }
        (Some(globs), None) => {
            if globs.is_empty() {
                return Err(anyhow!("task '{}' has an empty `clean` glob list", name));
            }
            if !task.stages.is_empty() {
                return Err(anyhow!("clean task '{}' cannot have `stages`", name));
            }
            if task.dest.is_some() {
                return Err(anyhow!("clean task '{}' cannot have a `dest`", name));
            }
        }
        (None, Some(globs)) => {
            if globs.is_empty() {
                return Err(anyhow!("task '{}' has an empty `src` glob list", name));
            }
            if task.dest.is_none() {
                return Err(anyhow!("pipeline task '{}' is missing `dest`", name));
            }
        }
    }

    for stage in task.stages.iter() {
        validate_stage(name, stage)?;
    }

    if let Some(ref ext) = task.ext {
        if !ext.starts_with('.') {
            return Err(anyhow!(
                "task '{}': `ext` must start with '.', got '{}'",
                name,
                ext
            ));
        }
    }

    Ok(())
}

fn validate_stage(task: &str, stage: &StageConfig) -> Result<()> {
    match stage {
        StageConfig::Named(s) => match s.as_str() {
            "minify" | "render" => Ok(()),
            other => Err(anyhow!(
                "task '{}' has unknown stage '{}' (expected \"minify\", \"render\", {{ concat = .. }} or {{ exec = .. }})",
                task,
                other
            )),
        },
        StageConfig::Exec { exec } => {
            if exec.trim().is_empty() {
                return Err(anyhow!("task '{}' has an empty `exec` stage command", task));
            }
            Ok(())
        }
        StageConfig::Concat { concat } => {
            if concat.trim().is_empty() {
                return Err(anyhow!("task '{}' has an empty `concat` output name", task));
            }
            Ok(())
        }
    }
}

fn validate_task_dependencies(cfg: &ConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            if !cfg.task.contains_key(dep) {
                return Err(anyhow!(
                    "task '{}' has unknown prerequisite '{}' in `after`",
                    name,
                    dep
                ));
            }
            if dep == name {
                return Err(anyhow!(
                    "task '{}' cannot depend on itself in `after`",
                    name
                ));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &ConfigFile) -> Result<()> {
    // Edge direction: prerequisite -> task, so a toposort failure pinpoints
    // a cycle through `after` chains.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in task.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let node = cycle.node_id();
            Err(anyhow!(
                "cycle detected in task graph involving task '{}'",
                node
            ))
        }
    }
}
