// src/watch/watcher.rs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::engine::{RuntimeEvent, TriggerReason};
use crate::pipeline::sources::relative_str;
use crate::watch::patterns::WatchRule;

/// Handle for the filesystem watcher.
///
/// This exists mainly so the underlying `RecommendedWatcher` is kept alive for
/// as long as needed. Dropping this handle stops file watching.
pub struct WatcherHandle {
    _inner: RecommendedWatcher,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Spawn a filesystem watcher observing `root` recursively, sending
/// `RuntimeEvent::TaskTriggered` for every rule matching a changed path.
///
/// The subscription is persistent: triggers leave the watcher running, and
/// errors in the forwarding loop are logged without terminating it.
pub fn spawn_watcher(
    root: impl Into<PathBuf>,
    rules: Vec<WatchRule>,
    runtime_tx: mpsc::Sender<RuntimeEvent>,
) -> Result<WatcherHandle> {
    let root = root.into();
    let root = root.canonicalize().unwrap_or_else(|_| root.clone());

    let rules = Arc::new(rules);

    // Channel from the blocking notify callback into the async world.
    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = RecommendedWatcher::new(
        {
            let event_tx = event_tx.clone();
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if let Err(err) = event_tx.send(event) {
                        // tracing isn't usable from the notify thread; stderr.
                        eprintln!("siteforge: failed to forward notify event: {err}");
                    }
                }
                Err(err) => {
                    eprintln!("siteforge: file watch error: {err}");
                }
            }
        },
        Config::default(),
    )?;

    watcher.watch(&root, RecursiveMode::Recursive)?;

    info!("file watcher started on {:?}", root);

    let async_root = root.clone();
    let async_rules = Arc::clone(&rules);
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            debug!("received notify event: {:?}", event);

            for path in &event.paths {
                let Some(rel_str) = relative_str(&async_root, path) else {
                    debug!(
                        "ignoring path outside project root: {:?} (root {:?})",
                        path, async_root
                    );
                    continue;
                };

                for rule in async_rules.iter() {
                    if rule.matches(&rel_str) {
                        let task = rule.task().to_string();
                        debug!(task = %task, path = %rel_str, "watch match -> triggering task");
                        if let Err(err) = runtime_tx
                            .send(RuntimeEvent::TaskTriggered {
                                task,
                                reason: TriggerReason::FileWatch,
                            })
                            .await
                        {
                            warn!("failed to send RuntimeEvent::TaskTriggered: {err}");
                            // Runtime channel closed; no point keeping the
                            // watcher loop alive.
                            return;
                        }
                    }
                }
            }
        }

        debug!("file watcher loop ended");
    });

    Ok(WatcherHandle { _inner: watcher })
}
