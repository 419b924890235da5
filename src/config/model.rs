// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level project configuration as read from `Siteforge.toml`.
///
/// ```toml
/// [server]
/// port = 3000
/// start_path = "build/html/pages"
///
/// [vars]
/// msg = "Hello Gulp!"
///
/// [task."clean:css"]
/// clean = ["build/css/**/*.css"]
///
/// [task.styles]
/// after = ["clean:css"]
/// src = ["src/styles/**/*.css"]
/// dest = "build/css"
/// stages = ["minify", { concat = "styles.css" }]
/// reload = true
/// ```
///
/// The loaded value is validated once at startup and never mutated; every
/// component that needs path or task information takes it by reference.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// Runner behaviour from `[runner]`.
    #[serde(default)]
    pub runner: RunnerSection,

    /// Dev-server settings from `[server]`.
    #[serde(default)]
    pub server: ServerSection,

    /// Deploy target from `[deploy]`, if the project deploys anywhere.
    #[serde(default)]
    pub deploy: Option<DeploySection>,

    /// Variables available to the `render` stage, from `[vars]`.
    #[serde(default)]
    pub vars: BTreeMap<String, String>,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,
}

/// `[runner]` section: what happens when a trigger arrives while a run is
/// already active.
#[derive(Debug, Clone, Deserialize)]
pub struct RunnerSection {
    /// `"queue"` (default) or `"cancel"`.
    #[serde(default = "default_on_retrigger")]
    pub on_retrigger: String,

    /// Maximum number of queued trigger batches to remember.
    #[serde(default = "default_queue_length")]
    pub queue_length: usize,
}

fn default_on_retrigger() -> String {
    "queue".to_string()
}

fn default_queue_length() -> usize {
    1
}

impl Default for RunnerSection {
    fn default() -> Self {
        Self {
            on_retrigger: default_on_retrigger(),
            queue_length: default_queue_length(),
        }
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory the static server is rooted at.
    #[serde(default = "default_root")]
    pub root: String,

    /// Path the index redirect points at, e.g. `"build/html/pages"`.
    #[serde(default)]
    pub start_path: Option<String>,

    /// Extra watch-exclude globs applied to every task.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_port() -> u16 {
    3000
}

fn default_root() -> String {
    ".".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            root: default_root(),
            start_path: None,
            exclude: Vec::new(),
        }
    }
}

/// `[deploy]` section. Credentials and the remote path are deliberately not
/// part of the file; they come from `SITEFORGE_FTP_USERNAME`,
/// `SITEFORGE_FTP_PASSWORD` and `SITEFORGE_FTP_PATH`.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploySection {
    pub host: String,

    #[serde(default = "default_ftp_port")]
    pub port: u16,

    /// Switch to FTPS after connecting.
    #[serde(default)]
    pub secure: bool,

    /// Local globs to upload, e.g. `["build/css/**", "build/js/**"]`.
    pub globs: Vec<String>,
}

fn default_ftp_port() -> u16 {
    21
}

/// `[task.<name>]` section. A task is either a clean task (`clean` set) or a
/// pipeline task (`src` + `dest` + `stages`); `validate` enforces exactly one
/// of the two shapes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TaskConfig {
    /// Globs of generated files to delete. Clean-task shape.
    #[serde(default)]
    pub clean: Option<Vec<String>>,

    /// Source globs, relative to the project root. Pipeline-task shape.
    #[serde(default)]
    pub src: Option<Vec<String>>,

    /// Output directory, relative to the project root.
    #[serde(default)]
    pub dest: Option<String>,

    /// Transform stages applied in order to the matched file set.
    #[serde(default)]
    pub stages: Vec<StageConfig>,

    /// Prerequisite task names; all must complete before this task runs.
    #[serde(default)]
    pub after: Vec<String>,

    /// Watch globs; defaults to `src` when omitted.
    #[serde(default)]
    pub watch: Option<Vec<String>>,

    /// Watch-exclude globs, merged with `[server].exclude`.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Notify connected live-reload clients when this task succeeds.
    #[serde(default)]
    pub reload: bool,

    /// Skip the task when the aggregate content hash of its sources is
    /// unchanged since the last successful run.
    #[serde(default)]
    pub use_hash: bool,

    /// Output extension override, e.g. `".html"` for rendered templates.
    #[serde(default)]
    pub ext: Option<String>,
}

/// A single transform stage as written in TOML.
///
/// Bare strings name built-in stages with no arguments (`"minify"`,
/// `"render"`); one-key tables carry an argument
/// (`{ concat = "styles.css" }`, `{ exec = "sassc --stdin" }`).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StageConfig {
    Named(String),
    Exec { exec: String },
    Concat { concat: String },
}
