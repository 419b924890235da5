// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling per-task watch/exclude glob rules from the config.
//! - Wiring up a cross-platform filesystem watcher (`notify`).
//!
//! It does **not** know about the DAG or task dependencies; it only turns
//! filesystem changes into task-level triggers.

pub mod patterns;
pub mod watcher;

pub use patterns::{build_watch_rules, WatchRule};
pub use watcher::{spawn_watcher, WatcherHandle};
