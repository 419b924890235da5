// src/errors.rs

//! Structured error taxonomy for task execution and deployment.
//!
//! Per-file transform failures are recovered inside the pipeline (logged with
//! file context, file skipped); everything else propagates to the CLI exit
//! code via `anyhow` at the application layer.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TaskError {
    /// A single source file failed a transform stage. The owning task keeps
    /// processing its remaining files.
    #[error("transform failed for {file:?}: {message}")]
    Transform { file: PathBuf, message: String },

    /// A prerequisite task failed, so the dependent task was never run.
    #[error("task '{task}' blocked: prerequisite '{dependency}' failed")]
    Prerequisite { task: String, dependency: String },

    /// The deploy connection could not be established or an upload failed.
    #[error("deploy connection error: {0}")]
    Connection(String),

    /// A required environment variable or config value is missing.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("io error at {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl TaskError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TaskError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn transform(file: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        TaskError::Transform {
            file: file.into(),
            message: message.into(),
        }
    }
}
