// src/pipeline/sources.rs

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use globset::{Glob, GlobMatcher, GlobSet, GlobSetBuilder};

/// A source file matched by a task's globs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path relative to the project root, e.g. `src/views/pages/about.tmpl`.
    pub rel: PathBuf,
    /// Path relative to the matching glob's literal base, e.g.
    /// `pages/about.tmpl` for the glob `src/views/**/*.tmpl`. Destination
    /// writes and uploads preserve this, not the full source path.
    pub base_rel: PathBuf,
}

/// Build a GlobSet from simple string patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// The literal directory prefix of a glob pattern: every leading path
/// component free of glob metacharacters. `src/views/**/*.tmpl` -> `src/views`.
pub fn glob_base(pattern: &str) -> String {
    let mut parts = Vec::new();
    for comp in pattern.split('/') {
        if comp.contains(['*', '?', '[', '{']) {
            break;
        }
        parts.push(comp);
    }
    // A pattern like `src/a.css` has no metacharacters; its base is its parent.
    if parts.len() == pattern.split('/').count() {
        parts.pop();
    }
    parts.join("/")
}

/// Expand globs against the project root: walk the tree and collect files
/// whose root-relative path (forward slashes) matches any pattern.
///
/// Results are sorted by path so downstream transforms like concatenation are
/// deterministic. Each file's `base_rel` comes from the first pattern that
/// matches it.
pub fn expand_globs(root: &Path, patterns: &[String]) -> Result<Vec<SourceFile>> {
    let matchers: Vec<(GlobMatcher, String)> = patterns
        .iter()
        .map(|pat| {
            let glob = Glob::new(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
            Ok((glob.compile_matcher(), glob_base(pat)))
        })
        .collect::<Result<_>>()?;

    let mut rel_paths = Vec::new();
    walk(root, root, &matchers, &mut rel_paths)?;
    rel_paths.sort();

    let mut files = Vec::with_capacity(rel_paths.len());
    for rel_str in rel_paths {
        let base = matchers
            .iter()
            .find(|(m, _)| m.is_match(&rel_str))
            .map(|(_, base)| base.as_str())
            .unwrap_or("");

        let base_rel = rel_str
            .strip_prefix(base)
            .map(|s| s.trim_start_matches('/'))
            .unwrap_or(&rel_str)
            .to_string();

        files.push(SourceFile {
            rel: PathBuf::from(&rel_str),
            base_rel: PathBuf::from(base_rel),
        });
    }

    Ok(files)
}

fn walk(
    root: &Path,
    dir: &Path,
    matchers: &[(GlobMatcher, String)],
    out: &mut Vec<String>,
) -> Result<()> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        // Directories can vanish mid-walk (clean tasks); skip quietly.
        Err(_) => return Ok(()),
    };

    for entry in entries {
        let entry = entry.with_context(|| format!("reading directory {:?}", dir))?;
        let path = entry.path();
        let file_type = entry.file_type()?;

        if file_type.is_dir() {
            let name = entry.file_name();
            if name == ".git" || name == ".siteforge" {
                continue;
            }
            walk(root, &path, matchers, out)?;
        } else if file_type.is_file() {
            if let Some(rel_str) = relative_str(root, &path) {
                if matchers.iter().any(|(m, _)| m.is_match(&rel_str)) {
                    out.push(rel_str);
                }
            }
        }
    }

    Ok(())
}

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if the path is not under `root`.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}
