// src/pipeline/runner.rs

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dag::scheduler::{ScheduledTask, TaskWork};
use crate::engine::{RuntimeEvent, TaskOutcome};
use crate::errors::TaskError;
use crate::pipeline::hash::{compute_hash_for_paths, load_task_hash, save_task_hash};
use crate::pipeline::sources::{build_globset, expand_globs, relative_str};
use crate::pipeline::stages::{minify_text, render_text, Stage};

/// Context shared by all task invocations: the project root and the template
/// variables. Constructed once from the validated config and passed
/// explicitly, never held in module-level state.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    pub root: PathBuf,
    pub vars: BTreeMap<String, String>,
}

/// An in-memory file flowing through the transform stages. Created when the
/// source glob is read, discarded once the destination write completes.
#[derive(Debug, Clone)]
struct FileData {
    /// Output path below `dest` (relative to the matching glob's base).
    rel: PathBuf,
    /// Project-relative source path, kept for error context.
    src: PathBuf,
    contents: String,
}

/// Spawn the background executor loop.
///
/// The returned `mpsc::Sender<ScheduledTask>` is what the runtime uses as
/// `exec_tx`. Each scheduled task runs in its own tokio task, so independent
/// tasks can run in parallel; reentrant invocations of the *same* task are
/// already serialized by the trigger queue upstream.
pub fn spawn_executor(
    ctx: Arc<PipelineContext>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> mpsc::Sender<ScheduledTask> {
    let (tx, mut rx) = mpsc::channel::<ScheduledTask>(32);

    tokio::spawn(async move {
        info!("pipeline executor started");
        while let Some(task) = rx.recv().await {
            let runtime_tx = runtime_tx.clone();
            let ctx = Arc::clone(&ctx);
            tokio::spawn(async move {
                let name = task.name.clone();
                let outcome = match run_work(&ctx, &task).await {
                    Ok(outcome) => outcome,
                    Err(err) => {
                        error!(task = %name, error = %err, "task execution error");
                        TaskOutcome::Failed(err.to_string())
                    }
                };
                let _ = runtime_tx
                    .send(RuntimeEvent::TaskCompleted {
                        task: name,
                        outcome,
                    })
                    .await;
            });
        }
        info!("pipeline executor finished (channel closed)");
    });

    tx
}

/// Execute a single task's unit of work.
///
/// Per-file transform failures are logged with file context and the file is
/// dropped from the set; the invocation itself still succeeds. Task-level
/// failures (unreadable destination, bad globs) surface as errors.
pub async fn run_work(ctx: &PipelineContext, task: &ScheduledTask) -> Result<TaskOutcome, TaskError> {
    match &task.work {
        TaskWork::Clean { globs } => {
            run_clean(&ctx.root, &task.name, globs)?;
            Ok(TaskOutcome::Success)
        }
        TaskWork::Pipeline {
            src,
            dest,
            stages,
            ext,
        } => run_pipeline(ctx, task, src, dest, stages, ext.as_deref()).await,
    }
}

/// Delete every file matching the given globs, then prune emptied directories.
///
/// Runs to completion before the scheduler releases any dependent, so the
/// paired rebuild never races the delete.
fn run_clean(root: &Path, task: &str, globs: &[String]) -> Result<(), TaskError> {
    let set = build_globset(globs)
        .map_err(|e| TaskError::Configuration(format!("task '{task}': {e}")))?;

    let mut removed_dirs: Vec<PathBuf> = Vec::new();
    let mut removed = 0usize;

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                let name = entry.file_name();
                if name == ".git" || name == ".siteforge" {
                    continue;
                }
                stack.push(path);
            } else if let Some(rel) = relative_str(root, &path) {
                if set.is_match(&rel) {
                    fs::remove_file(&path).map_err(|e| TaskError::io(&path, e))?;
                    removed += 1;
                    if let Some(parent) = path.parent() {
                        removed_dirs.push(parent.to_path_buf());
                    }
                }
            }
        }
    }

    // Best-effort prune: remove_dir fails on non-empty dirs, which is fine.
    removed_dirs.sort();
    removed_dirs.dedup();
    for dir in removed_dirs.iter().rev() {
        if dir != root {
            let _ = fs::remove_dir(dir);
        }
    }

    info!(task = %task, removed, "clean task finished");
    Ok(())
}

async fn run_pipeline(
    ctx: &PipelineContext,
    task: &ScheduledTask,
    src: &[String],
    dest: &str,
    stages: &[Stage],
    ext: Option<&str>,
) -> Result<TaskOutcome, TaskError> {
    let root = &ctx.root;
    let sources = expand_globs(root, src)
        .map_err(|e| TaskError::Configuration(format!("task '{}': {e}", task.name)))?;

    info!(task = %task.name, files = sources.len(), "pipeline task starting");

    let dest_dir = root.join(dest);
    let src_paths: Vec<PathBuf> = sources.iter().map(|s| root.join(&s.rel)).collect();

    if task.use_hash {
        let current = state_hash(&src_paths, &dest_dir)?;
        let stored = load_task_hash(root, &task.name)
            .map_err(|e| TaskError::Configuration(format!("loading stored hash: {e}")))?;
        if stored.as_deref() == Some(current.as_str()) {
            debug!(task = %task.name, "sources and outputs unchanged; skipping");
            return Ok(TaskOutcome::Skipped);
        }
    }

    // Read inputs; unreadable files are per-file failures, not task failures.
    // Outputs are addressed by the path below the glob's literal base, so
    // `src/views/pages/x.tmpl` lands at `<dest>/pages/x.html`.
    let mut files: Vec<FileData> = Vec::with_capacity(sources.len());
    for source in sources {
        match fs::read_to_string(root.join(&source.rel)) {
            Ok(contents) => files.push(FileData {
                rel: source.base_rel,
                src: source.rel,
                contents,
            }),
            Err(e) => {
                let err = TaskError::transform(&source.rel, format!("reading source: {e}"));
                error!(task = %task.name, %err, "skipping file");
            }
        }
    }

    for stage in stages {
        files = apply_stage(&task.name, stage, files, &ctx.vars).await;
    }

    for file in &files {
        let mut out_rel = file.rel.clone();
        if let Some(ext) = ext {
            out_rel.set_extension(ext.trim_start_matches('.'));
        }
        let out_path = dest_dir.join(&out_rel);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| TaskError::io(parent, e))?;
        }
        fs::write(&out_path, &file.contents).map_err(|e| TaskError::io(&out_path, e))?;
        debug!(task = %task.name, path = ?out_path, "wrote output file");
    }

    // The stored hash covers the freshly written outputs, so the next skip
    // check also verifies the destination is still intact.
    if task.use_hash {
        match state_hash(&src_paths, &dest_dir) {
            Ok(hash) => {
                if let Err(e) = save_task_hash(root, &task.name, &hash) {
                    warn!(task = %task.name, error = %e, "failed to persist task state hash");
                }
            }
            Err(e) => warn!(task = %task.name, error = %e, "failed to hash task state"),
        }
    }

    info!(task = %task.name, outputs = files.len(), "pipeline task finished");
    Ok(TaskOutcome::Success)
}

/// Aggregate hash over a task's source files plus whatever currently exists
/// under its destination. Because the destination state is folded in, a
/// cleaned or otherwise altered dest never satisfies the skip check while
/// the outputs are missing.
fn state_hash(src_paths: &[PathBuf], dest_dir: &Path) -> Result<String, TaskError> {
    let mut paths = src_paths.to_vec();
    paths.extend(collect_files_under(dest_dir));
    compute_hash_for_paths(&paths)
        .map_err(|e| TaskError::Configuration(format!("hashing task state: {e}")))
}

fn collect_files_under(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(d) = stack.pop() {
        let entries = match fs::read_dir(&d) {
            Ok(e) => e,
            Err(_) => continue,
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else {
                out.push(path);
            }
        }
    }
    out
}

/// Apply one stage to the whole file set. Per-file failures drop the file and
/// keep the rest moving.
async fn apply_stage(
    task: &str,
    stage: &Stage,
    files: Vec<FileData>,
    vars: &BTreeMap<String, String>,
) -> Vec<FileData> {
    match stage {
        Stage::Minify => files
            .into_iter()
            .map(|f| FileData {
                contents: minify_text(&f.contents),
                ..f
            })
            .collect(),

        Stage::Render => {
            let mut out = Vec::with_capacity(files.len());
            for f in files {
                match render_text(&f.contents, vars) {
                    Ok(contents) => out.push(FileData { contents, ..f }),
                    Err(msg) => {
                        let err = TaskError::transform(&f.src, msg);
                        error!(task = %task, %err, "skipping file");
                    }
                }
            }
            out
        }

        Stage::Concat(name) => {
            // Inputs arrive sorted by relative path; keep that order.
            let mut merged = String::new();
            for f in &files {
                merged.push_str(&f.contents);
                if !merged.ends_with('\n') {
                    merged.push('\n');
                }
            }
            if files.is_empty() {
                return Vec::new();
            }
            vec![FileData {
                rel: PathBuf::from(name),
                src: PathBuf::from(name),
                contents: merged,
            }]
        }

        Stage::Exec(cmd) => {
            let mut out = Vec::with_capacity(files.len());
            for f in files {
                match exec_filter(cmd, &f.contents).await {
                    Ok(contents) => out.push(FileData { contents, ..f }),
                    Err(msg) => {
                        let err = TaskError::transform(&f.src, msg);
                        error!(task = %task, %err, "skipping file");
                    }
                }
            }
            out
        }
    }
}

/// Pipe file contents through an external command (stdin -> stdout).
async fn exec_filter(cmd: &str, input: &str) -> Result<String, String> {
    let mut command = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(cmd);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(cmd);
        c
    };

    command
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = command
        .spawn()
        .map_err(|e| format!("spawning '{cmd}': {e}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .await
            .map_err(|e| format!("writing stdin of '{cmd}': {e}"))?;
        // Drop closes the pipe so the filter sees EOF.
    }

    let output = child
        .wait_with_output()
        .await
        .map_err(|e| format!("waiting for '{cmd}': {e}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let first_line = stderr.lines().next().unwrap_or("");
        return Err(format!(
            "'{cmd}' exited with {}: {first_line}",
            output.status.code().unwrap_or(-1)
        ));
    }

    String::from_utf8(output.stdout).map_err(|e| format!("'{cmd}' produced non-UTF-8 output: {e}"))
}
