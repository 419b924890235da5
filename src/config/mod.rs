// src/config/mod.rs

//! Configuration loading and validation for siteforge.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a project file from disk (`loader.rs`).
//! - Validate task shapes and DAG correctness (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, DeploySection, RunnerSection, ServerSection, StageConfig, TaskConfig};
pub use validate::validate_config;
