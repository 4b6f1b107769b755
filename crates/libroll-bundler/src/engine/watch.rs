//! Rebuild loop driven by file system notifications.

use std::path::{Path, PathBuf};

use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use super::builder::RolldownEngine;
use super::{WatchEvent, WatchHandle};
use crate::pipeline::FormatConfig;
use crate::{Error, Result};

const CHANGE_BUFFER: usize = 100;
const EVENT_BUFFER: usize = 16;

/// Start watching the roots of `configs`, rebuilding every format per cycle.
///
/// The first cycle starts immediately. Must be called inside a Tokio runtime.
pub(super) fn spawn(engine: RolldownEngine, configs: Vec<FormatConfig>) -> Result<WatchHandle> {
    let roots = watch_roots(&configs);
    if roots.is_empty() {
        return Err(Error::WatchCycle("no existing directories to watch".into()));
    }
    let ignored: Vec<PathBuf> = configs.iter().map(|c| c.dir.clone()).collect();

    let (change_tx, mut change_rx) = mpsc::channel::<PathBuf>(CHANGE_BUFFER);
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
        let Ok(event) = res else {
            return;
        };
        if !matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) {
            return;
        }
        for path in event.paths {
            if should_ignore(&path, &ignored) {
                continue;
            }
            // a full buffer already guarantees a rebuild
            let _ = change_tx.try_send(path);
        }
    })
    .map_err(|e| Error::WatchCycle(e.to_string()))?;

    for root in &roots {
        watcher
            .watch(root, RecursiveMode::Recursive)
            .map_err(|e| Error::WatchCycle(format!("{}: {}", root.display(), e)))?;
        tracing::debug!("Watching {}", root.display());
    }

    let (event_tx, event_rx) = mpsc::channel(EVENT_BUFFER);
    let debounce = engine.debounce();

    let task = tokio::spawn(async move {
        loop {
            if event_tx.send(WatchEvent::Start).await.is_err() {
                break;
            }

            let mut failure = None;
            for config in &configs {
                if let Err(e) = engine.build(config).await {
                    tracing::debug!("Watch build of {} failed: {}", config.format, e);
                    failure.get_or_insert(e);
                }
            }

            let event = match failure {
                Some(e) => WatchEvent::Error(e),
                None => WatchEvent::End,
            };
            if event_tx.send(event).await.is_err() {
                break;
            }

            match change_rx.recv().await {
                Some(path) => tracing::debug!("Change detected: {}", path.display()),
                None => break,
            }
            tokio::time::sleep(debounce).await;
            while change_rx.try_recv().is_ok() {}
        }
    });

    Ok(WatchHandle::new(event_rx, move || {
        drop(watcher);
        task.abort();
    }))
}

fn watch_roots(configs: &[FormatConfig]) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = Vec::new();
    for root in configs.iter().flat_map(|c| c.watch_roots.iter()) {
        if root.is_dir() && !roots.iter().any(|r| root.starts_with(r)) {
            roots.retain(|r| !r.starts_with(root));
            roots.push(root.clone());
        }
    }
    roots
}

fn should_ignore(path: &Path, output_dirs: &[PathBuf]) -> bool {
    if output_dirs.iter().any(|dir| path.starts_with(dir)) {
        return true;
    }
    path.components().any(|component| {
        component.as_os_str().to_str().is_some_and(|name| {
            name == "node_modules" || (name.starts_with('.') && name != "." && name != "..")
        })
    })
}
