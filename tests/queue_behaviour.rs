use std::error::Error;
use std::path::PathBuf;
use std::str::FromStr;

use siteforge::config::load_and_validate;
use siteforge::engine::{RetriggerBehaviour, TriggerQueue};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn retrigger_toml_drives_queue_config() -> TestResult {
    let manifest = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    let cfg = load_and_validate(manifest.join("demos/retrigger.toml"))?;

    assert_eq!(cfg.runner.on_retrigger, "queue");
    assert_eq!(cfg.runner.queue_length, 1);

    let behaviour = RetriggerBehaviour::from_str(&cfg.runner.on_retrigger)?;

    let q = TriggerQueue::new(behaviour, cfg.runner.queue_length);
    assert!(matches!(q.behaviour(), RetriggerBehaviour::Queue));
    assert!(q.is_empty());

    Ok(())
}

#[test]
fn queue_mode_merges_triggers_into_single_batch() -> TestResult {
    let mut q = TriggerQueue::new(RetriggerBehaviour::Queue, 2);

    q.record_trigger("styles");
    q.record_trigger("scripts");
    q.record_trigger("styles");

    let mut items = q.drain_pending();
    items.sort();
    assert_eq!(items, vec!["scripts".to_string(), "styles".to_string()]);
    assert!(q.is_empty());

    Ok(())
}

#[test]
fn cancel_mode_keeps_only_latest_trigger() -> TestResult {
    let mut q = TriggerQueue::new(RetriggerBehaviour::Cancel, 3);

    q.record_trigger("styles");
    q.record_trigger("pages");

    let tasks = q.drain_pending();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0], "pages");

    Ok(())
}

#[test]
fn zero_queue_length_is_clamped_to_one() -> TestResult {
    let mut q = TriggerQueue::new(RetriggerBehaviour::Queue, 0);

    q.record_trigger("styles");
    let tasks = q.drain_pending();
    assert_eq!(tasks, vec!["styles".to_string()]);

    Ok(())
}

#[test]
fn invalid_behaviour_string_is_rejected() {
    assert!(RetriggerBehaviour::from_str("restart").is_err());
}
