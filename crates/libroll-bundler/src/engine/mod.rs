//! The bundler engine seam.
//!
//! [`BundlerEngine`] is everything the runner needs from a bundler: a single
//! build of one [`FormatConfig`] and a persistent watch over a set of them.
//! [`RolldownEngine`] is the production implementation.

mod builder;
mod plugins;
mod watch;

pub use self::builder::RolldownEngine;
pub use self::plugins::{ExternalsPlugin, MediaPlugin, is_node_builtin};

use std::fmt;
use std::path::PathBuf;
use std::task::{Context, Poll};

use async_trait::async_trait;
use libroll_config::Format;
use tokio::sync::mpsc;

use crate::pipeline::FormatConfig;
use crate::{Error, Result};

/// Files produced by one format's build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    pub format: Format,
    pub files: Vec<PathBuf>,
}

/// Signals emitted by a running watch.
#[derive(Debug)]
pub enum WatchEvent {
    /// A rebuild cycle started.
    Start,
    /// Every format of the cycle built successfully.
    End,
    /// The cycle failed; the watch keeps running.
    Error(Error),
}

#[async_trait]
pub trait BundlerEngine: Send + Sync {
    /// Build one format once.
    async fn bundle(&self, config: &FormatConfig) -> Result<BundleReport>;

    /// Start watching every config, rebuilding all of them on change.
    async fn watch(&self, configs: Vec<FormatConfig>) -> Result<WatchHandle>;
}

type CloseFn = Box<dyn FnOnce() + Send>;

/// A live watch: an event receiver plus the teardown for whatever feeds it.
///
/// The close callback runs at most once, on [`WatchHandle::close`] or on drop.
pub struct WatchHandle {
    events: mpsc::Receiver<WatchEvent>,
    close: Option<CloseFn>,
}

impl WatchHandle {
    /// Wrap `events`; `close` tears down whatever sends on them.
    pub fn new(events: mpsc::Receiver<WatchEvent>, close: impl FnOnce() + Send + 'static) -> Self {
        Self {
            events,
            close: Some(Box::new(close)),
        }
    }

    /// Next event, or `None` once the watch has been closed.
    pub async fn recv(&mut self) -> Option<WatchEvent> {
        if self.is_closed() {
            return None;
        }
        self.events.recv().await
    }

    pub fn poll_recv(&mut self, cx: &mut Context<'_>) -> Poll<Option<WatchEvent>> {
        if self.is_closed() {
            return Poll::Ready(None);
        }
        self.events.poll_recv(cx)
    }

    /// Release the underlying watcher. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(close) = self.close.take() {
            tracing::debug!("Closing watch handle");
            self.events.close();
            close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.close.is_none()
    }
}

impl Drop for WatchHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("closed", &self.is_closed())
            .finish()
    }
}
