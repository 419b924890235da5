// src/watch/patterns.rs

use std::fmt;

use anyhow::{Context, Result};
use globset::GlobSet;

use crate::config::model::ConfigFile;
use crate::engine::TaskName;
use crate::pipeline::sources::build_globset;

/// Compiled binding between a set of source globs and the task to re-invoke
/// when a matching file changes.
///
/// Patterns are evaluated against paths relative to the project root. Rules
/// are built once from the validated config and never mutated.
#[derive(Clone)]
pub struct WatchRule {
    task: TaskName,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchRule")
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

impl WatchRule {
    /// Name of the task this rule triggers.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// Returns true if the given root-relative path (e.g. `"src/a.css"`)
    /// should trigger this rule's task.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        if let Some(exclude) = &self.exclude_set {
            if exclude.is_match(rel_path) {
                return false;
            }
        }
        true
    }
}

/// Build one compiled rule per pipeline task.
///
/// - A task watches its `watch` globs if given, otherwise its `src` globs.
/// - Excludes merge the task's own `exclude` list, the global
///   `[server].exclude` list, and — implicitly — every task's `dest`
///   directory plus the `.siteforge/` state dir, so build output never
///   re-triggers a build.
/// - Clean tasks get no rule; they only run as prerequisites.
pub fn build_watch_rules(cfg: &ConfigFile) -> Result<Vec<WatchRule>> {
    let implicit_excludes = implicit_exclude_patterns(cfg);
    let mut rules = Vec::new();

    for (name, task) in cfg.task.iter() {
        let Some(src) = &task.src else {
            continue;
        };

        let watch_patterns = task.watch.as_ref().unwrap_or(src).clone();

        let mut exclude_patterns = task.exclude.clone();
        exclude_patterns.extend(cfg.server.exclude.iter().cloned());
        exclude_patterns.extend(implicit_excludes.iter().cloned());

        let watch_set = build_globset(&watch_patterns)
            .with_context(|| format!("building watch globset for task {name}"))?;

        let exclude_set = if exclude_patterns.is_empty() {
            None
        } else {
            Some(
                build_globset(&exclude_patterns)
                    .with_context(|| format!("building exclude globset for task {name}"))?,
            )
        };

        rules.push(WatchRule {
            task: name.clone(),
            watch_set,
            exclude_set,
        });
    }

    Ok(rules)
}

fn implicit_exclude_patterns(cfg: &ConfigFile) -> Vec<String> {
    let mut patterns = vec![".siteforge/**".to_string()];

    for task in cfg.task.values() {
        if let Some(dest) = &task.dest {
            let dir = dest.trim_end_matches('/');
            if !dir.is_empty() {
                patterns.push(format!("{dir}/**"));
            }
        }
    }

    patterns.sort();
    patterns.dedup();
    patterns
}
