//! Live listeners over a user's book collection.

use super::{BookFilter, Database, Session};
use crate::library::book::Book;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio_util::sync::CancellationToken;

/// Full state of a subscribed collection at one point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    /// Delivery counter, strictly increasing per subscription.
    pub version: u64,
    /// Every book matching the subscription filter, oldest first.
    pub books: Vec<Book>,
}

/// Handle that cancels a subscription from elsewhere.
#[derive(Debug, Clone)]
pub struct CancelHandle(CancellationToken);

impl CancelHandle {
    /// Stop the subscription. Pending and later `next()` calls return `None`.
    pub fn cancel(&self) {
        self.0.cancel();
    }

    /// Whether the subscription has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }
}

/// Stream of full snapshots of one user's collection.
///
/// The first `next()` yields the current state, or an empty snapshot if it
/// cannot be read. Each later call waits for a write to the collection and
/// yields it again, read fresh from the store; failed reads are skipped.
pub struct Subscription {
    db: Database,
    user_id: String,
    filter: BookFilter,
    changes: broadcast::Receiver<String>,
    cancel: CancellationToken,
    primed: bool,
    version: u64,
}

impl Database {
    /// Open a live subscription on the session user's books.
    pub fn subscribe(&self, session: &Session, filter: BookFilter) -> Subscription {
        tracing::debug!(user_id = %session.user_id, filter = ?filter, "Opening book subscription");

        Subscription {
            db: self.clone(),
            user_id: session.user_id.clone(),
            filter,
            changes: self.change_receiver(),
            cancel: CancellationToken::new(),
            primed: false,
            version: 0,
        }
    }
}

impl Subscription {
    /// Wait for the next snapshot. `None` once cancelled.
    pub async fn next(&mut self) -> Option<Snapshot> {
        if self.cancel.is_cancelled() {
            return None;
        }

        if !self.primed {
            self.primed = true;
            // The first delivery always ends the loading state, even if empty.
            let snapshot = match self.read() {
                Some(snapshot) => snapshot,
                None => self.advance(Vec::new()),
            };
            return Some(snapshot);
        }

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                change = self.changes.recv() => match change {
                    Ok(user_id) if user_id == self.user_id => {}
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(user_id = %self.user_id, skipped, "Subscription lagged, reloading");
                    }
                    Err(RecvError::Closed) => return None,
                },
            }

            if let Some(snapshot) = self.read() {
                return Some(snapshot);
            }
        }
    }

    /// Cancel this subscription.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Handle for cancelling from another task.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle(self.cancel.clone())
    }

    /// Whether the subscription is cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    fn read(&mut self) -> Option<Snapshot> {
        match self.db.get_books(&self.user_id, &self.filter) {
            Ok(books) => Some(self.advance(books)),
            Err(e) => {
                tracing::warn!(user_id = %self.user_id, error = %e, "Snapshot read failed");
                None
            }
        }
    }

    fn advance(&mut self, books: Vec<Book>) -> Snapshot {
        self.version += 1;
        Snapshot {
            version: self.version,
            books,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
