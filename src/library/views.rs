//! Derived views over a library list.
//!
//! Everything here is recomputed from the full list on each change; a
//! personal library is small enough that no incremental bookkeeping is kept.

use super::book::{Book, ReadingStatus};
use serde::Serialize;

/// Books with the given status, in source order.
pub fn partition(books: &[Book], status: ReadingStatus) -> Vec<Book> {
    books.iter().filter(|b| b.status == status).cloned().collect()
}

/// Books marked as favorite, in source order.
pub fn favorites(books: &[Book]) -> Vec<Book> {
    books.iter().filter(|b| b.favorite).cloned().collect()
}

/// The three reading shelves.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Shelves {
    /// Books being read.
    pub reading: Vec<Book>,
    /// Books saved for later.
    pub to_read: Vec<Book>,
    /// Finished books.
    pub completed: Vec<Book>,
}

impl Shelves {
    /// Split a library into shelves.
    pub fn from_books(books: &[Book]) -> Self {
        Self {
            reading: partition(books, ReadingStatus::Reading),
            to_read: partition(books, ReadingStatus::ToRead),
            completed: partition(books, ReadingStatus::Completed),
        }
    }

    /// Shelf for a status.
    pub fn shelf(&self, status: ReadingStatus) -> &[Book] {
        match status {
            ReadingStatus::Reading => &self.reading,
            ReadingStatus::ToRead => &self.to_read,
            ReadingStatus::Completed => &self.completed,
        }
    }

    /// Whether every shelf is empty.
    pub fn is_empty(&self) -> bool {
        self.reading.is_empty() && self.to_read.is_empty() && self.completed.is_empty()
    }

    /// Total books across shelves.
    pub fn len(&self) -> usize {
        self.reading.len() + self.to_read.len() + self.completed.len()
    }
}

/// Profile counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    /// Number of saved books.
    pub total: usize,
    /// Number of favorites.
    pub favorites: usize,
}

impl LibraryStats {
    /// Count a library.
    pub fn from_books(books: &[Book]) -> Self {
        Self {
            total: books.len(),
            favorites: books.iter().filter(|b| b.favorite).count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(id: &str, status: ReadingStatus, favorite: bool) -> Book {
        Book {
            id: Some(id.to_string()),
            status,
            favorite,
            ..Book::candidate(format!("cat-{}", id), id, "Author")
        }
    }

    fn sample() -> Vec<Book> {
        vec![
            book("a", ReadingStatus::Reading, false),
            book("b", ReadingStatus::ToRead, true),
            book("c", ReadingStatus::Completed, false),
            book("d", ReadingStatus::Reading, true),
            book("e", ReadingStatus::ToRead, false),
        ]
    }

    fn ids(books: &[Book]) -> Vec<&str> {
        books.iter().map(|b| b.id_str()).collect()
    }

    #[test]
    fn partition_preserves_order() {
        let books = sample();
        assert_eq!(ids(&partition(&books, ReadingStatus::Reading)), ["a", "d"]);
        assert_eq!(ids(&partition(&books, ReadingStatus::ToRead)), ["b", "e"]);
        assert_eq!(ids(&partition(&books, ReadingStatus::Completed)), ["c"]);
    }

    #[test]
    fn shelves_are_total_and_disjoint() {
        let books = sample();
        let shelves = Shelves::from_books(&books);
        assert_eq!(shelves.len(), books.len());

        for b in &books {
            let hits = ReadingStatus::ALL
                .iter()
                .filter(|s| shelves.shelf(**s).iter().any(|x| x.id == b.id))
                .count();
            assert_eq!(hits, 1, "book {} should be on exactly one shelf", b.id_str());
        }
    }

    #[test]
    fn empty_library_has_empty_shelves() {
        let shelves = Shelves::from_books(&[]);
        assert!(shelves.is_empty());
        assert!(shelves.reading.is_empty());
        assert!(shelves.to_read.is_empty());
        assert!(shelves.completed.is_empty());
        assert_eq!(LibraryStats::from_books(&[]), LibraryStats::default());
    }

    #[test]
    fn favorites_and_stats() {
        let books = sample();
        assert_eq!(ids(&favorites(&books)), ["b", "d"]);
        let stats = LibraryStats::from_books(&books);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.favorites, 2);
    }
}
