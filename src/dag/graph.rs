// src/dag/graph.rs

use std::collections::HashMap;

use crate::config::model::ConfigFile;

/// Internal node structure: stores immediate prerequisites and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    /// Direct prerequisites: tasks that must complete before this one runs.
    deps: Vec<String>,
    /// Direct dependents: tasks that list this one in their `after`.
    dependents: Vec<String>,
}

/// Simple in-memory DAG representation keyed by task name.
///
/// Acyclicity is already checked in `config::validate`, so this only keeps
/// adjacency information for scheduling and diagnostics.
#[derive(Debug, Clone)]
pub struct DagGraph {
    nodes: HashMap<String, DagNode>,
}

impl DagGraph {
    /// Build a DAG from a validated [`ConfigFile`].
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();

        for (name, task) in cfg.task.iter() {
            nodes.insert(
                name.clone(),
                DagNode {
                    deps: task.after.clone(),
                    dependents: Vec::new(),
                },
            );
        }

        let task_names: Vec<String> = nodes.keys().cloned().collect();
        for task_name in task_names {
            let deps = nodes
                .get(&task_name)
                .map(|n| n.deps.clone())
                .unwrap_or_default();

            for dep in deps {
                if let Some(dep_node) = nodes.get_mut(&dep) {
                    dep_node.dependents.push(task_name.clone());
                }
            }
        }

        Self { nodes }
    }

    /// Return all task names.
    pub fn tasks(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    /// Immediate prerequisites of a task (the tasks listed in its `after`).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task.
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// All transitive prerequisites of a task, the task itself excluded.
    pub fn transitive_dependencies_of(&self, name: &str) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        let mut stack: Vec<String> = self.dependencies_of(name).to_vec();

        while let Some(dep) = stack.pop() {
            if seen.iter().any(|s| s == &dep) {
                continue;
            }
            stack.extend(self.dependencies_of(&dep).iter().cloned());
            seen.push(dep);
        }

        seen
    }
}
