use std::error::Error;
use std::fmt::Write as _;
use std::fs;
use std::time::Duration;

use siteforge::cli::{CliArgs, Command};

type TestResult = Result<(), Box<dyn Error>>;

// Seeding goes through the runtime's first run rather than the event
// channel, so a project with more tasks than the channel's capacity must
// still build to completion.
#[tokio::test]
async fn building_a_project_with_many_tasks_completes() -> TestResult {
    let dir = tempfile::tempdir()?;

    let mut config = String::new();
    for i in 0..70 {
        writeln!(config, "[task.\"clean:{i}\"]")?;
        writeln!(config, "clean = [\"build/{i}/**\"]")?;
        writeln!(config)?;
    }
    let path = dir.path().join("Siteforge.toml");
    fs::write(&path, config)?;

    let args = CliArgs {
        config: path.to_string_lossy().into_owned(),
        log_level: None,
        dry_run: false,
        command: Some(Command::Build { task: None }),
    };

    tokio::time::timeout(Duration::from_secs(30), siteforge::run(args)).await??;

    Ok(())
}
