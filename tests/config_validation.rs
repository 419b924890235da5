use std::error::Error;
use std::path::PathBuf;

use siteforge::config::{load_and_validate, validate_config, ConfigFile};

type TestResult = Result<(), Box<dyn Error>>;

fn parse(toml_src: &str) -> ConfigFile {
    toml::from_str(toml_src).unwrap()
}

fn validation_error(toml_src: &str) -> String {
    let cfg = parse(toml_src);
    validate_config(&cfg)
        .expect_err("config should have been rejected")
        .to_string()
}

#[test]
fn demo_site_config_validates() -> TestResult {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cfg = load_and_validate(manifest.join("demos/site.toml"))?;

    assert_eq!(cfg.server.port, 3000);
    assert_eq!(cfg.vars.get("msg").map(String::as_str), Some("Hello Gulp!"));
    assert_eq!(cfg.task.len(), 5);
    assert!(cfg.deploy.is_some());

    Ok(())
}

#[test]
fn empty_config_is_rejected() {
    let msg = validation_error("");
    assert!(msg.contains("at least one [task"), "got: {msg}");
}

#[test]
fn dependency_cycle_is_rejected() {
    let msg = validation_error(
        r#"
        [task.a]
        src = ["src/**/*.css"]
        dest = "build"
        after = ["b"]

        [task.b]
        src = ["src/**/*.js"]
        dest = "build"
        after = ["a"]
        "#,
    );
    assert!(msg.contains("cycle"), "got: {msg}");
}

#[test]
fn unknown_prerequisite_is_rejected() {
    let msg = validation_error(
        r#"
        [task.styles]
        src = ["src/**/*.css"]
        dest = "build/css"
        after = ["clean:css"]
        "#,
    );
    assert!(msg.contains("unknown prerequisite 'clean:css'"), "got: {msg}");
}

#[test]
fn self_dependency_is_rejected() {
    let msg = validation_error(
        r#"
        [task.styles]
        src = ["src/**/*.css"]
        dest = "build/css"
        after = ["styles"]
        "#,
    );
    assert!(msg.contains("depend on itself"), "got: {msg}");
}

#[test]
fn task_with_both_clean_and_src_is_rejected() {
    let msg = validation_error(
        r#"
        [task.confused]
        clean = ["build/**"]
        src = ["src/**"]
        dest = "build"
        "#,
    );
    assert!(msg.contains("both `clean` and `src`"), "got: {msg}");
}

#[test]
fn task_with_neither_clean_nor_src_is_rejected() {
    let msg = validation_error(
        r#"
        [task.empty]
        reload = true
        "#,
    );
    assert!(msg.contains("neither `clean` nor `src`"), "got: {msg}");
}

#[test]
fn pipeline_task_without_dest_is_rejected() {
    let msg = validation_error(
        r#"
        [task.styles]
        src = ["src/**/*.css"]
        stages = ["minify"]
        "#,
    );
    assert!(msg.contains("missing `dest`"), "got: {msg}");
}

#[test]
fn clean_task_with_stages_is_rejected() {
    let msg = validation_error(
        r#"
        [task."clean:css"]
        clean = ["build/css/**"]
        stages = ["minify"]
        "#,
    );
    assert!(msg.contains("cannot have `stages`"), "got: {msg}");
}

#[test]
fn unknown_stage_name_is_rejected() {
    let msg = validation_error(
        r#"
        [task.styles]
        src = ["src/**/*.css"]
        dest = "build/css"
        stages = ["uglify"]
        "#,
    );
    assert!(msg.contains("unknown stage 'uglify'"), "got: {msg}");
}

#[test]
fn zero_queue_length_is_rejected() {
    let msg = validation_error(
        r#"
        [runner]
        queue_length = 0

        [task.styles]
        src = ["src/**/*.css"]
        dest = "build/css"
        "#,
    );
    assert!(msg.contains("queue_length"), "got: {msg}");
}

#[test]
fn invalid_retrigger_behaviour_is_rejected() {
    let msg = validation_error(
        r#"
        [runner]
        on_retrigger = "restart"

        [task.styles]
        src = ["src/**/*.css"]
        dest = "build/css"
        "#,
    );
    assert!(msg.contains("on_retrigger"), "got: {msg}");
}

#[test]
fn ext_without_leading_dot_is_rejected() {
    let msg = validation_error(
        r#"
        [task.pages]
        src = ["src/views/**/*.tmpl"]
        dest = "build/html"
        stages = ["render"]
        ext = "html"
        "#,
    );
    assert!(msg.contains("must start with '.'"), "got: {msg}");
}

#[test]
fn loading_a_missing_file_names_the_path() {
    let err = load_and_validate("does/not/exist/Siteforge.toml")
        .expect_err("missing file should be an error");
    assert!(format!("{err:#}").contains("does/not/exist"), "got: {err:#}");
}
