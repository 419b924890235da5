use std::collections::BTreeMap;
use std::error::Error;
use std::path::PathBuf;

use siteforge::config::{
    load_and_validate, ConfigFile, RunnerSection, ServerSection, StageConfig, TaskConfig,
};
use siteforge::watch::build_watch_rules;

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn rules_default_to_src_globs_and_skip_clean_tasks() -> TestResult {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cfg = load_and_validate(manifest.join("demos/site.toml"))?;

    let rules = build_watch_rules(&cfg)?;

    // Only pipeline tasks are watched; the two clean tasks get no rule.
    assert_eq!(rules.len(), 3);

    let styles = rules.iter().find(|r| r.task() == "styles").unwrap();
    assert!(styles.matches("src/styles/main.css"));
    assert!(styles.matches("src/styles/pages/home.css"));
    assert!(!styles.matches("src/js/index.js"));

    let pages = rules.iter().find(|r| r.task() == "pages").unwrap();
    assert!(pages.matches("src/views/home.tmpl"));
    assert!(!pages.matches("src/views/home.html"));

    Ok(())
}

#[test]
fn destination_directories_are_excluded_implicitly() -> TestResult {
    let mut tasks = BTreeMap::new();
    tasks.insert(
        "styles".to_string(),
        TaskConfig {
            src: Some(vec!["src/**/*.css".into()]),
            // Deliberately broad watch: without the implicit dest exclusion,
            // every build output write would re-trigger the build.
            watch: Some(vec!["**/*.css".into()]),
            dest: Some("build/css".into()),
            stages: vec![StageConfig::Named("minify".into())],
            ..Default::default()
        },
    );

    let cfg = ConfigFile {
        runner: RunnerSection::default(),
        server: ServerSection::default(),
        deploy: None,
        vars: BTreeMap::new(),
        task: tasks,
    };

    let rules = build_watch_rules(&cfg)?;
    let styles = &rules[0];

    assert!(styles.matches("src/a.css"));
    assert!(!styles.matches("build/css/styles.css"));
    assert!(!styles.matches(".siteforge/hashes"));

    Ok(())
}

#[test]
fn task_exclude_globs_filter_matches() -> TestResult {
    let mut tasks = BTreeMap::new();
    tasks.insert(
        "scripts".to_string(),
        TaskConfig {
            src: Some(vec!["src/**/*.js".into()]),
            exclude: vec!["src/**/*.test.js".into()],
            dest: Some("build/js".into()),
            stages: vec![StageConfig::Concat {
                concat: "bundle.js".into(),
            }],
            ..Default::default()
        },
    );

    let cfg = ConfigFile {
        runner: RunnerSection::default(),
        server: ServerSection::default(),
        deploy: None,
        vars: BTreeMap::new(),
        task: tasks,
    };

    let rules = build_watch_rules(&cfg)?;
    let scripts = &rules[0];

    assert!(scripts.matches("src/index.js"));
    assert!(!scripts.matches("src/index.test.js"));

    Ok(())
}
