//! Live library screen model: subscription in, mutations out.

use super::book::{Book, ReadingStatus};
use super::state::{LibraryEvent, LibraryState};
use crate::db::{BookFilter, CancelHandle, Database, Session};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

const ADD_FAILED: &str = "Error adding book. Please try again.";
const REMOVE_FAILED: &str = "Error removing book. Please try again.";
const UPDATE_FAILED: &str = "Error updating book. Please try again.";

/// Owns the state of one library screen for its lifetime.
///
/// With a session, a subscription feeds every store snapshot into the
/// state. Mutations update the state optimistically, then write through to
/// the store; a failed write sets the state's error flag and is not retried.
pub struct LibrarySync {
    db: Database,
    session: Option<Session>,
    state: Arc<RwLock<LibraryState>>,
    updates: watch::Sender<u64>,
    cancel: Option<CancelHandle>,
    task: Option<JoinHandle<()>>,
}

impl LibrarySync {
    /// Open a library screen. Must be called within a tokio runtime when a
    /// session is given.
    pub fn open(db: Database, session: Option<Session>) -> Self {
        let (updates, _) = watch::channel(0);

        let Some(active) = session.clone() else {
            tracing::debug!("No signed-in user, library stays empty");
            return Self {
                db,
                session: None,
                state: Arc::new(RwLock::new(LibraryState::signed_out())),
                updates,
                cancel: None,
                task: None,
            };
        };

        let state = Arc::new(RwLock::new(LibraryState::loading()));
        let mut subscription = db.subscribe(&active, BookFilter::All);
        let cancel = subscription.cancel_handle();

        let task_state = state.clone();
        let task_updates = updates.clone();
        let task = tokio::spawn(async move {
            while let Some(snapshot) = subscription.next().await {
                tracing::debug!(
                    user_id = %active.user_id,
                    version = snapshot.version,
                    books = snapshot.books.len(),
                    "Applying library snapshot"
                );
                task_state.write().apply(LibraryEvent::Snapshot(snapshot));
                task_updates.send_modify(|n| *n += 1);
            }
            tracing::debug!(user_id = %active.user_id, "Library subscription closed");
        });

        Self {
            db,
            session,
            state,
            updates,
            cancel: Some(cancel),
            task: Some(task),
        }
    }

    /// Receiver that changes after every applied event.
    pub fn updates(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    /// Copy of the current state for rendering.
    pub fn snapshot(&self) -> LibraryState {
        self.state.read().clone()
    }

    /// Session this screen was opened with.
    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Apply an event to the state and notify readers.
    pub fn dispatch(&self, event: LibraryEvent) {
        self.state.write().apply(event);
        self.updates.send_modify(|n| *n += 1);
    }

    /// Save a search candidate to the library.
    pub fn add(&self, candidate: &Book) -> bool {
        let Some(session) = &self.session else {
            self.dispatch(LibraryEvent::WriteFailed(ADD_FAILED.to_string()));
            return false;
        };

        match self.db.add_book(&session.user_id, candidate) {
            Ok(stored) => {
                tracing::info!(user_id = %session.user_id, book = %stored.id_str(), title = %stored.title, "Book added");
                self.dispatch(LibraryEvent::Added(stored));
                true
            }
            Err(e) => {
                tracing::warn!(user_id = %session.user_id, error = %e, "Add failed");
                self.dispatch(LibraryEvent::WriteFailed(ADD_FAILED.to_string()));
                false
            }
        }
    }

    /// Remove a book. The local list drops it before the store confirms.
    pub fn remove(&self, id: &str) -> bool {
        self.dispatch(LibraryEvent::Removed(id.to_string()));

        let result = match &self.session {
            Some(session) => self.db.delete_book(&session.user_id, id).map(|_| ()),
            None => Err(crate::error::AppError::Unauthenticated),
        };

        self.finish_write(result, "Remove", id, REMOVE_FAILED)
    }

    /// Change a book's reading status.
    pub fn set_status(&self, id: &str, status: ReadingStatus) -> bool {
        self.dispatch(LibraryEvent::StatusChanged {
            id: id.to_string(),
            status,
        });

        let result = match &self.session {
            Some(session) => self.db.update_book_status(&session.user_id, id, status),
            None => Err(crate::error::AppError::Unauthenticated),
        };

        self.finish_write(result, "Status update", id, UPDATE_FAILED)
    }

    /// Flip a book's favorite flag.
    pub fn toggle_favorite(&self, id: &str) -> bool {
        let Some(session) = &self.session else {
            self.dispatch(LibraryEvent::WriteFailed(UPDATE_FAILED.to_string()));
            return false;
        };

        let local = self.state.read().find(id).map(|b| b.favorite);
        let current = match local {
            Some(flag) => Some(flag),
            None => match self.db.get_book(&session.user_id, id) {
                Ok(book) => book.map(|b| b.favorite),
                Err(e) => {
                    tracing::warn!(book = %id, error = %e, "Favorite lookup failed");
                    None
                }
            },
        };

        let Some(current) = current else {
            self.dispatch(LibraryEvent::WriteFailed(UPDATE_FAILED.to_string()));
            return false;
        };

        let favorite = !current;
        self.dispatch(LibraryEvent::FavoriteChanged {
            id: id.to_string(),
            favorite,
        });

        let result = self.db.update_book_favorite(&session.user_id, id, favorite);
        self.finish_write(result, "Favorite update", id, UPDATE_FAILED)
    }

    fn finish_write(
        &self,
        result: crate::error::Result<()>,
        action: &str,
        id: &str,
        message: &str,
    ) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(book = %id, error = %e, "{} failed", action);
                self.dispatch(LibraryEvent::WriteFailed(message.to_string()));
                false
            }
        }
    }

    /// Tear the screen down and wait for the listener to stop.
    pub async fn close(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel.cancel();
        }
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "Library listener ended abnormally");
        }
    }
}

impl Drop for LibrarySync {
    fn drop(&mut self) {
        if let Some(cancel) = &self.cancel {
            cancel.cancel();
        }
    }
}
