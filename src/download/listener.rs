//! Download observers and the dispatcher task that calls them.
//!
//! Listeners never run on a download task. Every event goes through an
//! unbounded channel to one dispatcher task, which owns the listener list and
//! calls listeners one event at a time in send order.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::trace;

/// Observer of download progress and lifecycle.
pub trait DownloadListener: Send + Sync {
    /// `pages` is the number of pages on disk for `id` so far.
    fn on_progress(&self, id: &str, pages: usize);

    /// The page loop for `id` ran to the end.
    fn on_complete(&self, _id: &str) {}

    fn on_cancelled(&self, _id: &str) {}

    /// Local files for `id` were deleted.
    fn on_removed(&self, _id: &str) {}
}

/// Handle returned by listener registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

pub(crate) enum Event {
    Attach {
        id: ListenerId,
        listener: Arc<dyn DownloadListener>,
        replay: Vec<(String, usize)>,
    },
    Detach(ListenerId),
    Progress {
        archive: String,
        pages: usize,
    },
    Complete(String),
    Cancelled(String),
    Removed(String),
    Flush(oneshot::Sender<()>),
    Shutdown,
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attach { id, replay, .. } => f
                .debug_struct("Attach")
                .field("id", id)
                .field("replay", replay)
                .finish_non_exhaustive(),
            Self::Detach(id) => f.debug_tuple("Detach").field(id).finish(),
            Self::Progress { archive, pages } => f
                .debug_struct("Progress")
                .field("archive", archive)
                .field("pages", pages)
                .finish(),
            Self::Complete(id) => f.debug_tuple("Complete").field(id).finish(),
            Self::Cancelled(id) => f.debug_tuple("Cancelled").field(id).finish(),
            Self::Removed(id) => f.debug_tuple("Removed").field(id).finish(),
            Self::Flush(_) => f.write_str("Flush"),
            Self::Shutdown => f.write_str("Shutdown"),
        }
    }
}

pub(crate) fn spawn_dispatcher() -> (mpsc::UnboundedSender<Event>, JoinHandle<()>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let handle = tokio::spawn(dispatch(receiver));
    (sender, handle)
}

async fn dispatch(mut receiver: mpsc::UnboundedReceiver<Event>) {
    let mut listeners: Vec<(ListenerId, Arc<dyn DownloadListener>)> = Vec::new();

    while let Some(event) = receiver.recv().await {
        trace!(?event, "dispatching download event");
        match event {
            Event::Attach {
                id,
                listener,
                replay,
            } => {
                for (archive, pages) in &replay {
                    listener.on_progress(archive, *pages);
                }
                listeners.push((id, listener));
            }
            Event::Detach(id) => listeners.retain(|(existing, _)| *existing != id),
            Event::Progress { archive, pages } => {
                for (_, listener) in &listeners {
                    listener.on_progress(&archive, pages);
                }
            }
            Event::Complete(archive) => {
                for (_, listener) in &listeners {
                    listener.on_complete(&archive);
                }
            }
            Event::Cancelled(archive) => {
                for (_, listener) in &listeners {
                    listener.on_cancelled(&archive);
                }
            }
            Event::Removed(archive) => {
                for (_, listener) in &listeners {
                    listener.on_removed(&archive);
                }
            }
            Event::Flush(done) => {
                let _ = done.send(());
            }
            Event::Shutdown => break,
        }
    }
}
