use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use tokio_stream::Stream;

use super::BuildOutcome;
use crate::Result;
use crate::engine::{WatchEvent, WatchHandle};

type OnEnd = Box<dyn FnMut() -> Result<()> + Send>;

/// Outcomes of a running watch, one per finished cycle.
///
/// Ends only when closed or dropped; either releases the watcher.
pub struct WatchStream {
    handle: Option<WatchHandle>,
    pending: Option<BuildOutcome>,
    on_end: OnEnd,
    project: String,
}

impl WatchStream {
    pub(crate) fn new(
        handle: WatchHandle,
        project: &str,
        on_end: impl FnMut() -> Result<()> + Send + 'static,
    ) -> Self {
        Self {
            handle: Some(handle),
            pending: None,
            on_end: Box::new(on_end),
            project: project.to_string(),
        }
    }

    /// A stream that yields a single failure and ends.
    pub(crate) fn failed(project: &str) -> Self {
        Self {
            handle: None,
            pending: Some(BuildOutcome::failure()),
            on_end: Box::new(|| Ok(())),
            project: project.to_string(),
        }
    }

    /// Release the watcher. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            tracing::debug!("Stopping watch of {}", self.project);
            handle.close();
        }
    }

    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }
}

impl Stream for WatchStream {
    type Item = BuildOutcome;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<BuildOutcome>> {
        let this = self.get_mut();
        if let Some(outcome) = this.pending.take() {
            return Poll::Ready(Some(outcome));
        }

        loop {
            let Some(handle) = this.handle.as_mut() else {
                return Poll::Ready(None);
            };

            match ready!(handle.poll_recv(cx)) {
                Some(WatchEvent::Start) => {
                    tracing::info!("Bundling {}...", this.project);
                }
                Some(WatchEvent::End) => {
                    return Poll::Ready(Some(match (this.on_end)() {
                        Ok(()) => {
                            tracing::info!("Bundle complete. Watching for file changes...");
                            BuildOutcome::success()
                        }
                        Err(e) => {
                            tracing::error!("Error during bundle: {}", e);
                            BuildOutcome::failure()
                        }
                    }));
                }
                Some(WatchEvent::Error(e)) => {
                    tracing::error!("Error during bundle: {}", e);
                    return Poll::Ready(Some(BuildOutcome::failure()));
                }
                None => {
                    this.close();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl Drop for WatchStream {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for WatchStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchStream")
            .field("project", &self.project)
            .field("closed", &self.is_closed())
            .finish()
    }
}
