use std::collections::BTreeMap;
use std::error::Error;
use std::fs;
use std::path::Path;

use siteforge::dag::{ScheduledTask, TaskWork};
use siteforge::engine::TaskOutcome;
use siteforge::pipeline::{run_work, PipelineContext, Stage};

type TestResult = Result<(), Box<dyn Error>>;

fn write(root: &Path, rel: &str, contents: &str) -> TestResult {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap())?;
    fs::write(path, contents)?;
    Ok(())
}

fn ctx(root: &Path) -> PipelineContext {
    PipelineContext {
        root: root.to_path_buf(),
        vars: BTreeMap::new(),
    }
}

fn styles_task() -> ScheduledTask {
    ScheduledTask {
        name: "styles".to_string(),
        work: TaskWork::Pipeline {
            src: vec!["src/styles/**/*.css".to_string()],
            dest: "build/css".to_string(),
            stages: vec![Stage::Minify, Stage::Concat("styles.css".to_string())],
            ext: None,
        },
        reload: true,
        use_hash: false,
    }
}

#[tokio::test]
async fn styles_task_produces_one_minified_concatenated_file() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    write(root, "src/styles/a.css", "a {\n  color: red;\n}\n")?;
    write(root, "src/styles/b.css", "b {\n  margin: 0;\n}\n")?;

    let outcome = run_work(&ctx(root), &styles_task()).await?;
    assert_eq!(outcome, TaskOutcome::Success);

    let out = fs::read_to_string(root.join("build/css/styles.css"))?;
    // Inputs are concatenated in path order, each minified.
    assert_eq!(out, "a{color:red;}\nb{margin:0;}\n");

    // Only the concatenated file is produced.
    let entries: Vec<_> = fs::read_dir(root.join("build/css"))?.collect();
    assert_eq!(entries.len(), 1);

    Ok(())
}

#[tokio::test]
async fn rerunning_with_unchanged_input_is_byte_identical() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    write(root, "src/styles/a.css", "a { color: red; }\n")?;

    run_work(&ctx(root), &styles_task()).await?;
    let first = fs::read(root.join("build/css/styles.css"))?;

    run_work(&ctx(root), &styles_task()).await?;
    let second = fs::read(root.join("build/css/styles.css"))?;

    assert_eq!(first, second);
    Ok(())
}

#[tokio::test]
async fn render_task_interpolates_vars_into_one_html_per_template() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    write(root, "src/views/home.tmpl", "<h1><%= msg %></h1>\n")?;
    write(root, "src/views/pages/about.tmpl", "<p><%= msg %></p>\n")?;

    let mut vars = BTreeMap::new();
    vars.insert("msg".to_string(), "Hello Gulp!".to_string());
    let ctx = PipelineContext {
        root: root.to_path_buf(),
        vars,
    };

    let task = ScheduledTask {
        name: "pages".to_string(),
        work: TaskWork::Pipeline {
            src: vec!["src/views/**/*.tmpl".to_string()],
            dest: "build/html".to_string(),
            stages: vec![Stage::Render],
            ext: Some(".html".to_string()),
        },
        reload: true,
        use_hash: false,
    };

    let outcome = run_work(&ctx, &task).await?;
    assert_eq!(outcome, TaskOutcome::Success);

    let home = fs::read_to_string(root.join("build/html/home.tmpl"));
    assert!(home.is_err(), "template paths must get the .html extension");

    // Destination paths are relative to the glob base `src/views`.
    let home = fs::read_to_string(root.join("build/html/home.html"))?;
    assert_eq!(home, "<h1>Hello Gulp!</h1>\n");

    let about = fs::read_to_string(root.join("build/html/pages/about.html"))?;
    assert_eq!(about, "<p>Hello Gulp!</p>\n");

    Ok(())
}

#[tokio::test]
async fn unknown_template_variable_skips_the_file_but_not_the_task() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    write(root, "src/views/bad.tmpl", "<%= nope %>")?;
    write(root, "src/views/good.tmpl", "static text")?;

    let task = ScheduledTask {
        name: "pages".to_string(),
        work: TaskWork::Pipeline {
            src: vec!["src/views/**/*.tmpl".to_string()],
            dest: "build/html".to_string(),
            stages: vec![Stage::Render],
            ext: Some(".html".to_string()),
        },
        reload: false,
        use_hash: false,
    };

    let outcome = run_work(&ctx(root), &task).await?;
    assert_eq!(outcome, TaskOutcome::Success);

    assert!(!root.join("build/html/bad.html").exists());
    assert!(root.join("build/html/good.html").exists());

    Ok(())
}

#[tokio::test]
async fn clean_task_removes_stale_outputs_before_rebuild() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    write(root, "build/css/stale.css", "stale{old:1;}")?;
    write(root, "src/styles/a.css", "a { color: red; }\n")?;

    let clean = ScheduledTask {
        name: "clean:css".to_string(),
        work: TaskWork::Clean {
            globs: vec!["build/css/**/*.css".to_string()],
        },
        reload: false,
        use_hash: false,
    };

    let outcome = run_work(&ctx(root), &clean).await?;
    assert_eq!(outcome, TaskOutcome::Success);
    assert!(!root.join("build/css/stale.css").exists());

    run_work(&ctx(root), &styles_task()).await?;

    // The destination now contains only files produced by the current run.
    let names: Vec<String> = fs::read_dir(root.join("build/css"))?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["styles.css".to_string()]);

    Ok(())
}

#[tokio::test]
async fn use_hash_skips_rebuild_until_inputs_change() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    write(root, "src/styles/a.css", "a { color: red; }\n")?;

    let mut task = styles_task();
    task.use_hash = true;

    let outcome = run_work(&ctx(root), &task).await?;
    assert_eq!(outcome, TaskOutcome::Success);

    let outcome = run_work(&ctx(root), &task).await?;
    assert_eq!(outcome, TaskOutcome::Skipped);

    write(root, "src/styles/a.css", "a { color: blue; }\n")?;
    let outcome = run_work(&ctx(root), &task).await?;
    assert_eq!(outcome, TaskOutcome::Success);

    Ok(())
}

#[tokio::test]
async fn clean_prerequisite_invalidates_the_hash_skip() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    write(root, "src/js/a.js", "let a = 1;\n")?;
    write(root, "src/js/b.js", "let b = 2;\n")?;

    let scripts = ScheduledTask {
        name: "scripts".to_string(),
        work: TaskWork::Pipeline {
            src: vec!["src/js/**/*.js".to_string()],
            dest: "build/js".to_string(),
            stages: vec![Stage::Concat("bundle.js".to_string())],
            ext: None,
        },
        reload: false,
        use_hash: true,
    };
    let clean = ScheduledTask {
        name: "clean:js".to_string(),
        work: TaskWork::Clean {
            globs: vec!["build/js/**/*.js".to_string()],
        },
        reload: false,
        use_hash: false,
    };

    assert_eq!(run_work(&ctx(root), &scripts).await?, TaskOutcome::Success);
    let first = fs::read(root.join("build/js/bundle.js"))?;

    // The paired clean task always re-runs before a rebuild and empties the
    // destination.
    assert_eq!(run_work(&ctx(root), &clean).await?, TaskOutcome::Success);
    assert!(!root.join("build/js/bundle.js").exists());

    // Sources are unchanged, but the destination is gone: the task must
    // rebuild rather than skip, or the bundle would be lost for good.
    assert_eq!(run_work(&ctx(root), &scripts).await?, TaskOutcome::Success);
    assert_eq!(fs::read(root.join("build/js/bundle.js"))?, first);

    // With the destination intact, a re-run still skips.
    assert_eq!(run_work(&ctx(root), &scripts).await?, TaskOutcome::Skipped);

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn exec_stage_pipes_each_file_through_the_command() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    write(root, "src/js/index.js", "let x = 1;\n")?;

    let task = ScheduledTask {
        name: "scripts".to_string(),
        work: TaskWork::Pipeline {
            src: vec!["src/js/**/*.js".to_string()],
            dest: "build/js".to_string(),
            stages: vec![Stage::Exec("tr 'a-z' 'A-Z'".to_string())],
            ext: None,
        },
        reload: false,
        use_hash: false,
    };

    let outcome = run_work(&ctx(root), &task).await?;
    assert_eq!(outcome, TaskOutcome::Success);

    let out = fs::read_to_string(root.join("build/js/index.js"))?;
    assert_eq!(out, "LET X = 1;\n");

    Ok(())
}

#[cfg(unix)]
#[tokio::test]
async fn failing_exec_command_drops_the_file_and_continues() -> TestResult {
    let dir = tempfile::tempdir()?;
    let root = dir.path();

    write(root, "src/js/index.js", "let x = 1;\n")?;

    let task = ScheduledTask {
        name: "scripts".to_string(),
        work: TaskWork::Pipeline {
            src: vec!["src/js/**/*.js".to_string()],
            dest: "build/js".to_string(),
            stages: vec![Stage::Exec("false".to_string())],
            ext: None,
        },
        reload: false,
        use_hash: false,
    };

    // The per-file failure is recovered; the task itself still succeeds,
    // producing no output for the failed file.
    let outcome = run_work(&ctx(root), &task).await?;
    assert_eq!(outcome, TaskOutcome::Success);
    assert!(!root.join("build/js/index.js").exists());

    Ok(())
}
