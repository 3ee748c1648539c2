//! Category cache and update broadcast.
//!
//! [`CategoryHub`] keeps the most recent category list and broadcasts every
//! refresh to subscribers (listing selectors, UI lists). The very first
//! broadcast is flagged `first_update` so subscribers can tell an initial
//! load apart from a change.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tracing::{debug, instrument};

use crate::api::{Category, ServerClient};

const CHANNEL_CAPACITY: usize = 16;

/// One category list broadcast.
#[derive(Debug, Clone)]
pub struct CategoryUpdate {
    pub categories: Arc<Vec<Category>>,
    pub first_update: bool,
}

impl CategoryUpdate {
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.categories.iter().any(|c| c.id == id)
    }
}

/// Receiving end of category updates. Dropping it unsubscribes.
#[derive(Debug)]
pub struct CategorySubscription {
    receiver: broadcast::Receiver<CategoryUpdate>,
}

impl CategorySubscription {
    /// Returns the next queued update without waiting.
    ///
    /// If the subscriber fell behind, skipped updates are dropped and the
    /// oldest still buffered one is returned.
    pub fn try_next(&mut self) -> Option<CategoryUpdate> {
        loop {
            match self.receiver.try_recv() {
                Ok(update) => return Some(update),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "category subscriber lagged");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }

    /// Waits for the next update; `None` once the hub is gone.
    pub async fn next(&mut self) -> Option<CategoryUpdate> {
        loop {
            match self.receiver.recv().await {
                Ok(update) => return Some(update),
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "category subscriber lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

#[derive(Debug, Default)]
struct HubState {
    latest: Option<Arc<Vec<Category>>>,
    published: bool,
}

#[derive(Debug)]
pub struct CategoryHub {
    client: ServerClient,
    sender: broadcast::Sender<CategoryUpdate>,
    state: Mutex<HubState>,
}

impl CategoryHub {
    #[must_use]
    pub fn new(client: ServerClient) -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            client,
            sender,
            state: Mutex::new(HubState::default()),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> CategorySubscription {
        CategorySubscription {
            receiver: self.sender.subscribe(),
        }
    }

    #[must_use]
    pub fn latest(&self) -> Option<Arc<Vec<Category>>> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .latest
            .clone()
    }

    /// Stores and broadcasts a category list.
    pub fn publish(&self, categories: Vec<Category>) {
        let categories = Arc::new(categories);
        let first_update = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.latest = Some(Arc::clone(&categories));
            !std::mem::replace(&mut state.published, true)
        };
        debug!(count = categories.len(), first_update, "publishing categories");
        // No subscribers is fine.
        let _ = self.sender.send(CategoryUpdate {
            categories,
            first_update,
        });
    }

    /// Reloads categories from the server and broadcasts them.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> bool {
        let notifications = self.client.notifications();
        notifications.refresh_state(true);
        let loaded = self.client.categories().await;
        notifications.refresh_state(false);
        match loaded {
            Some(categories) => {
                self.publish(categories);
                true
            }
            None => false,
        }
    }

    /// Deletes a category on the server, then refreshes.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, id: &str) -> bool {
        if !self.client.delete_category(id).await {
            return false;
        }
        self.refresh().await
    }
}
