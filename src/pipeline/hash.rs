// src/pipeline/hash.rs

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use blake3::Hasher;
use tracing::{debug, info};

use crate::engine::TaskName;

/// Hash state file, relative to the project root. Line-based mapping:
///
/// ```text
/// task_name_1 <whitespace> hex_hash_1
/// task_name_2 <whitespace> hex_hash_2
/// ```
pub const HASH_FILE: &str = ".siteforge/hashes";

/// Compute a deterministic hash over the given files, covering both file
/// names and contents so adding or removing an empty file still changes the
/// aggregate.
///
/// Order of `paths` does not matter; they are sorted before hashing so the
/// aggregate is stable.
pub fn compute_hash_for_paths<I, P>(paths: I) -> Result<String>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut hasher = Hasher::new();

    let mut paths_vec: Vec<PathBuf> = paths
        .into_iter()
        .map(|p| p.as_ref().to_path_buf())
        .collect();
    paths_vec.sort();

    for path in paths_vec {
        if path.is_file() {
            debug!("hashing file {:?}", path);
            if let Some(name) = path.file_name() {
                hasher.update(name.as_encoded_bytes());
            }
            let mut file =
                File::open(&path).with_context(|| format!("opening file for hashing: {:?}", path))?;
            let mut buf = [0u8; 8192];
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
        }
    }

    let hash = hasher.finalize().to_hex().to_string();
    debug!(hash = %hash, "computed aggregate hash");
    Ok(hash)
}

fn load_all_hashes(root: &Path) -> Result<HashMap<TaskName, String>> {
    let path = root.join(HASH_FILE);

    if !path.exists() {
        return Ok(HashMap::new());
    }

    let file = File::open(&path).with_context(|| format!("opening hash file at {:?}", path))?;
    let reader = BufReader::new(file);

    let mut map = HashMap::new();
    for line_res in reader.lines() {
        let line = line_res?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some((name, hash)) = trimmed.split_once(char::is_whitespace) {
            map.insert(name.to_string(), hash.trim().to_string());
        }
    }

    Ok(map)
}

fn save_all_hashes(root: &Path, map: &HashMap<TaskName, String>) -> Result<()> {
    let path = root.join(HASH_FILE);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating hash directory at {:?}", parent))?;
    }

    let file = File::create(&path).with_context(|| format!("creating hash file at {:?}", path))?;
    let mut writer = BufWriter::new(file);

    for (name, hash) in map.iter() {
        writeln!(writer, "{} {}", name, hash)?;
    }

    writer.flush()?;
    Ok(())
}

/// Load the previously stored hash for a given task, if present.
pub fn load_task_hash(root: &Path, task: &str) -> Result<Option<String>> {
    let map = load_all_hashes(root)?;
    Ok(map.get(task).cloned())
}

/// Save the hash for a given task, merging with existing entries.
pub fn save_task_hash(root: &Path, task: &str, hash: &str) -> Result<()> {
    let mut map = load_all_hashes(root)?;
    map.insert(task.to_string(), hash.to_string());
    save_all_hashes(root, &map)?;
    info!(task = %task, hash = %hash, "stored task hash");
    Ok(())
}
