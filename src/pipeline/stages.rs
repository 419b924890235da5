// src/pipeline/stages.rs

//! Resolved transform stages and the pure text transforms the orchestrator
//! owns itself. The `exec` stage (external compilers, bundlers) is driven by
//! the runner since it involves process I/O.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::model::StageConfig;

/// `<%= name %>` placeholder pattern, compiled once for the process.
static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"<%=\s*([A-Za-z_][A-Za-z0-9_]*)\s*%>").expect("placeholder pattern is valid")
});

/// A transform stage resolved from the TOML representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    /// Pipe each file through an external command (stdin -> stdout).
    Exec(String),
    /// Merge all files, sorted by relative path, into one named output.
    Concat(String),
    /// Strip block comments and collapse insignificant whitespace.
    Minify,
    /// Interpolate `<%= var %>` placeholders from `[vars]`.
    Render,
}

impl Stage {
    /// Resolve a config stage. Returns `None` for unknown named stages,
    /// which `config::validate` rejects before a scheduler is ever built.
    pub fn from_config(cfg: &StageConfig) -> Option<Stage> {
        match cfg {
            StageConfig::Named(s) => match s.as_str() {
                "minify" => Some(Stage::Minify),
                "render" => Some(Stage::Render),
                _ => None,
            },
            StageConfig::Exec { exec } => Some(Stage::Exec(exec.clone())),
            StageConfig::Concat { concat } => Some(Stage::Concat(concat.clone())),
        }
    }
}

/// Remove `/* ... */` comment blocks. An unterminated comment runs to the end
/// of the input.
fn strip_block_comments(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

/// Generic whitespace minifier: strips comments, collapses whitespace runs to
/// a single space and drops spaces adjacent to structural punctuation.
///
/// Deterministic, so re-running a minify task over unchanged input is
/// byte-identical.
pub fn minify_text(input: &str) -> String {
    let stripped = strip_block_comments(input);
    let mut out = String::with_capacity(stripped.len());
    let mut pending_space = false;

    for c in stripped.chars() {
        if c.is_whitespace() {
            pending_space = !out.is_empty();
            continue;
        }

        let tight = matches!(c, '{' | '}' | ';' | ':' | ',' | '>');
        let prev_tight = matches!(
            out.chars().next_back(),
            Some('{' | '}' | ';' | ':' | ',' | '>')
        );

        if pending_space && !tight && !prev_tight {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }

    out
}

/// Interpolate `<%= name %>` placeholders from `vars`.
///
/// An unknown variable is an error (the caller reports it with file context);
/// text without placeholders passes through untouched.
pub fn render_text(input: &str, vars: &BTreeMap<String, String>) -> Result<String, String> {
    let mut out = String::with_capacity(input.len());
    let mut last = 0;

    for cap in PLACEHOLDER.captures_iter(input) {
        let whole = match cap.get(0) {
            Some(m) => m,
            None => continue,
        };
        let name = match cap.get(1) {
            Some(m) => m.as_str(),
            None => continue,
        };

        out.push_str(&input[last..whole.start()]);
        match vars.get(name) {
            Some(value) => out.push_str(value),
            None => return Err(format!("unknown template variable '{name}'")),
        }
        last = whole.end();
    }

    out.push_str(&input[last..]);
    Ok(out)
}
