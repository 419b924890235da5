// src/pipeline/mod.rs

//! Asset transform execution layer.
//!
//! This module performs the actual unit of work for each scheduled task:
//! expanding source globs, running transform stages over the in-memory file
//! set, and writing results to the destination directory. It reports back to
//! the orchestration runtime via `RuntimeEvent`s.
//!
//! - [`runner`] owns the executor loop which consumes `ScheduledTask`s.
//! - [`stages`] holds the resolved stage model and the built-in pure
//!   transforms (minify, render).
//! - [`sources`] expands globs against the project tree.
//! - [`hash`] persists aggregate input hashes for `use_hash` tasks.

pub mod hash;
pub mod runner;
pub mod sources;
pub mod stages;

pub use runner::{run_work, spawn_executor, PipelineContext};
pub use sources::{build_globset, expand_globs, SourceFile};
pub use stages::Stage;
