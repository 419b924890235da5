// src/deploy.rs

//! One-shot upload of build artifacts to a remote FTP host.
//!
//! Connection parameters live in `[deploy]`; credentials and the remote path
//! come exclusively from the environment and are resolved *before* any socket
//! is opened, so a missing variable fails fast without a connection attempt.
//! Transfer failures surface to the caller; there is no retry.

use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use suppaftp::native_tls::TlsConnector;
use suppaftp::{NativeTlsConnector, NativeTlsFtpStream};
use tracing::{debug, info, warn};

use crate::config::model::DeploySection;
use crate::errors::TaskError;
use crate::pipeline::sources::{expand_globs, SourceFile};

pub const ENV_USERNAME: &str = "SITEFORGE_FTP_USERNAME";
pub const ENV_PASSWORD: &str = "SITEFORGE_FTP_PASSWORD";
pub const ENV_REMOTE_PATH: &str = "SITEFORGE_FTP_PATH";

/// Credentials and remote path, sourced from the process environment.
#[derive(Debug, Clone)]
pub struct DeployCredentials {
    pub username: String,
    pub password: String,
    pub remote_path: String,
}

impl DeployCredentials {
    /// Resolve all required environment variables, failing with a
    /// `Configuration` error naming the first missing one.
    pub fn from_env() -> Result<Self, TaskError> {
        Ok(Self {
            username: required_env(ENV_USERNAME)?,
            password: required_env(ENV_PASSWORD)?,
            remote_path: required_env(ENV_REMOTE_PATH)?,
        })
    }
}

fn required_env(name: &str) -> Result<String, TaskError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(TaskError::Configuration(format!(
            "required environment variable {name} is not set"
        ))),
    }
}

/// What a finished deploy uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploySummary {
    pub uploaded: usize,
    pub bytes: u64,
}

/// Upload all files matching `[deploy].globs` to the configured host.
///
/// The FTP client is blocking, so the transfer runs on the blocking pool.
pub async fn run_deploy(root: PathBuf, section: DeploySection) -> Result<DeploySummary, TaskError> {
    let creds = DeployCredentials::from_env()?;

    let files = expand_globs(&root, &section.globs)
        .map_err(|e| TaskError::Configuration(format!("expanding deploy globs: {e}")))?;

    if files.is_empty() {
        warn!("deploy globs matched no files; nothing to upload");
        return Ok(DeploySummary {
            uploaded: 0,
            bytes: 0,
        });
    }

    info!(
        host = %section.host,
        port = section.port,
        secure = section.secure,
        files = files.len(),
        "starting deploy"
    );

    tokio::task::spawn_blocking(move || upload_all(&root, &section, &creds, &files))
        .await
        .map_err(|e| TaskError::Connection(format!("deploy worker failed: {e}")))?
}

fn upload_all(
    root: &Path,
    section: &DeploySection,
    creds: &DeployCredentials,
    files: &[SourceFile],
) -> Result<DeploySummary, TaskError> {
    let addr = format!("{}:{}", section.host, section.port);
    let mut ftp = NativeTlsFtpStream::connect(addr.as_str())
        .map_err(|e| TaskError::Connection(format!("connecting to {addr}: {e}")))?;

    if section.secure {
        let connector = TlsConnector::new()
            .map_err(|e| TaskError::Connection(format!("building TLS connector: {e}")))?;
        ftp = ftp
            .into_secure(NativeTlsConnector::from(connector), &section.host)
            .map_err(|e| TaskError::Connection(format!("securing connection: {e}")))?;
    }

    ftp.login(&creds.username, &creds.password)
        .map_err(|e| TaskError::Connection(format!("login failed: {e}")))?;

    make_remote_dirs(&mut ftp, &creds.remote_path);
    ftp.cwd(&creds.remote_path)
        .map_err(|e| TaskError::Connection(format!("cwd {}: {e}", creds.remote_path)))?;

    let mut created: HashSet<String> = HashSet::new();
    let mut uploaded = 0usize;
    let mut bytes = 0u64;

    for file in files {
        let local = root.join(&file.rel);
        let contents = fs::read(&local).map_err(|e| TaskError::io(&local, e))?;

        // Remote layout mirrors the path below the glob's literal base, the
        // same mapping pipeline tasks use for their destinations.
        let remote_name = file.base_rel.to_string_lossy().replace('\\', "/");
        if let Some((dir, _)) = remote_name.rsplit_once('/') {
            if created.insert(dir.to_string()) {
                make_remote_dirs(&mut ftp, dir);
            }
        }

        let written = ftp
            .put_file(&remote_name, &mut Cursor::new(&contents))
            .map_err(|e| TaskError::Connection(format!("uploading {remote_name}: {e}")))?;

        debug!(file = %remote_name, bytes = written, "uploaded");
        uploaded += 1;
        bytes += written;
    }

    ftp.quit()
        .map_err(|e| TaskError::Connection(format!("closing connection: {e}")))?;

    info!(uploaded, bytes, "deploy finished");
    Ok(DeploySummary { uploaded, bytes })
}

/// Best-effort `mkdir` for each path component; the directories usually exist
/// already, and a later `cwd` or `put_file` decides whether the path is usable.
fn make_remote_dirs(ftp: &mut NativeTlsFtpStream, dir: &str) {
    let mut prefix = if dir.starts_with('/') {
        String::from("/")
    } else {
        String::new()
    };

    for comp in dir.split('/').filter(|c| !c.is_empty()) {
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        prefix.push_str(comp);
        let _ = ftp.mkdir(&prefix);
    }
}
