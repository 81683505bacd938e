//! Library view state, changed only through events.

use super::book::{Book, ReadingStatus};
use super::views::{self, LibraryStats, Shelves};
use crate::db::Snapshot;

/// Something that happened to a library screen.
#[derive(Debug, Clone)]
pub enum LibraryEvent {
    /// Full snapshot pushed by the store.
    Snapshot(Snapshot),
    /// A book was saved locally ahead of the next snapshot.
    Added(Book),
    /// A book was removed locally ahead of the next snapshot.
    Removed(String),
    /// Reading status changed locally.
    StatusChanged {
        /// Book id.
        id: String,
        /// New status.
        status: ReadingStatus,
    },
    /// Favorite flag changed locally.
    FavoriteChanged {
        /// Book id.
        id: String,
        /// New flag.
        favorite: bool,
    },
    /// A write was rejected by the store.
    WriteFailed(String),
    /// The error banner was dismissed.
    ErrorDismissed,
    /// The user signed out; the screen shows nothing.
    SignedOut,
}

/// In-memory state of one library screen.
///
/// Local mutations apply at once; the next snapshot from the store replaces
/// the whole list, reconciling anything the local guess got wrong.
#[derive(Debug, Clone)]
pub struct LibraryState {
    books: Vec<Book>,
    loading: bool,
    write_error: Option<String>,
    version: u64,
}

impl LibraryState {
    /// State of a screen waiting for its first snapshot.
    pub fn loading() -> Self {
        Self {
            loading: true,
            ..Self::signed_out()
        }
    }

    /// State of a screen with no signed-in user.
    pub fn signed_out() -> Self {
        Self {
            books: Vec::new(),
            loading: false,
            write_error: None,
            version: 0,
        }
    }

    /// Apply an event.
    pub fn apply(&mut self, event: LibraryEvent) {
        match event {
            LibraryEvent::Snapshot(snapshot) => {
                if snapshot.version <= self.version {
                    tracing::debug!(
                        version = snapshot.version,
                        current = self.version,
                        "Ignoring stale snapshot"
                    );
                    return;
                }
                self.version = snapshot.version;
                self.books = snapshot.books;
                self.loading = false;
            }
            LibraryEvent::Added(book) => {
                if book.id.is_some() && self.find(book.id_str()).is_none() {
                    self.books.push(book);
                }
            }
            LibraryEvent::Removed(id) => {
                self.books.retain(|b| b.id.as_deref() != Some(id.as_str()));
            }
            LibraryEvent::StatusChanged { id, status } => {
                if let Some(book) = self.find_mut(&id) {
                    book.status = status;
                }
            }
            LibraryEvent::FavoriteChanged { id, favorite } => {
                if let Some(book) = self.find_mut(&id) {
                    book.favorite = favorite;
                }
            }
            LibraryEvent::WriteFailed(message) => {
                self.write_error = Some(message);
            }
            LibraryEvent::ErrorDismissed => {
                self.write_error = None;
            }
            LibraryEvent::SignedOut => {
                *self = Self::signed_out();
            }
        }
    }

    /// Every book, in store order.
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// Whether the first snapshot is still pending.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Whether the library is empty (and loaded).
    pub fn is_empty(&self) -> bool {
        !self.loading && self.books.is_empty()
    }

    /// Message of the last failed write, if not dismissed.
    pub fn write_error(&self) -> Option<&str> {
        self.write_error.as_deref()
    }

    /// Version of the last applied snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Look up a book by store id.
    pub fn find(&self, id: &str) -> Option<&Book> {
        self.books.iter().find(|b| b.id.as_deref() == Some(id))
    }

    fn find_mut(&mut self, id: &str) -> Option<&mut Book> {
        self.books.iter_mut().find(|b| b.id.as_deref() == Some(id))
    }

    /// Books split by reading status.
    pub fn shelves(&self) -> Shelves {
        Shelves::from_books(&self.books)
    }

    /// Favorite books.
    pub fn favorites(&self) -> Vec<Book> {
        views::favorites(&self.books)
    }

    /// Counters for the profile screen.
    pub fn stats(&self) -> LibraryStats {
        LibraryStats::from_books(&self.books)
    }
}

impl Default for LibraryState {
    fn default() -> Self {
        Self::loading()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn saved(id: &str, status: ReadingStatus) -> Book {
        Book {
            id: Some(id.to_string()),
            status,
            ..Book::candidate(id, id, "Author")
        }
    }

    fn snapshot(version: u64, books: Vec<Book>) -> LibraryEvent {
        LibraryEvent::Snapshot(Snapshot { version, books })
    }

    #[test]
    fn starts_loading_then_loads() {
        let mut state = LibraryState::loading();
        assert!(state.is_loading());
        assert!(!state.is_empty());

        state.apply(snapshot(1, vec![]));
        assert!(!state.is_loading());
        assert!(state.is_empty());
        assert!(state.shelves().is_empty());
    }

    #[test]
    fn snapshot_replaces_list() {
        let mut state = LibraryState::loading();
        state.apply(snapshot(1, vec![saved("a", ReadingStatus::ToRead)]));
        state.apply(snapshot(2, vec![saved("b", ReadingStatus::Reading)]));

        assert_eq!(state.books().len(), 1);
        assert_eq!(state.books()[0].id_str(), "b");
        assert_eq!(state.version(), 2);
    }

    #[test]
    fn stale_snapshot_ignored() {
        let mut state = LibraryState::loading();
        state.apply(snapshot(3, vec![saved("new", ReadingStatus::ToRead)]));
        state.apply(snapshot(2, vec![saved("old", ReadingStatus::ToRead)]));
        assert_eq!(state.books()[0].id_str(), "new");
    }

    #[test]
    fn optimistic_changes_reconciled_by_snapshot() {
        let mut state = LibraryState::loading();
        state.apply(snapshot(
            1,
            vec![
                saved("a", ReadingStatus::ToRead),
                saved("b", ReadingStatus::ToRead),
            ],
        ));

        state.apply(LibraryEvent::Removed("a".to_string()));
        state.apply(LibraryEvent::StatusChanged {
            id: "b".to_string(),
            status: ReadingStatus::Completed,
        });
        assert!(state.find("a").is_none());
        assert_eq!(state.shelves().completed.len(), 1);

        // The store rejected the removal: the next snapshot brings it back.
        state.apply(snapshot(
            2,
            vec![
                saved("a", ReadingStatus::ToRead),
                saved("b", ReadingStatus::Completed),
            ],
        ));
        assert!(state.find("a").is_some());
        assert_eq!(state.shelves().completed.len(), 1);
    }

    #[test]
    fn favorite_and_errors() {
        let mut state = LibraryState::loading();
        state.apply(snapshot(1, vec![saved("a", ReadingStatus::Reading)]));

        state.apply(LibraryEvent::FavoriteChanged {
            id: "a".to_string(),
            favorite: true,
        });
        assert_eq!(state.stats().favorites, 1);
        assert_eq!(state.favorites().len(), 1);

        state.apply(LibraryEvent::WriteFailed("nope".to_string()));
        assert_eq!(state.write_error(), Some("nope"));
        state.apply(LibraryEvent::ErrorDismissed);
        assert_eq!(state.write_error(), None);
    }

    #[test]
    fn added_ignores_unsaved_and_duplicates() {
        let mut state = LibraryState::loading();
        state.apply(snapshot(1, vec![saved("a", ReadingStatus::ToRead)]));

        state.apply(LibraryEvent::Added(Book::candidate("x", "X", "Y")));
        state.apply(LibraryEvent::Added(saved("a", ReadingStatus::ToRead)));
        assert_eq!(state.books().len(), 1);

        state.apply(LibraryEvent::Added(saved("b", ReadingStatus::ToRead)));
        assert_eq!(state.books().len(), 2);
    }

    #[test]
    fn sign_out_clears() {
        let mut state = LibraryState::loading();
        state.apply(snapshot(1, vec![saved("a", ReadingStatus::ToRead)]));
        state.apply(LibraryEvent::SignedOut);
        assert!(state.is_empty());
        assert_eq!(state.version(), 0);
    }
}
