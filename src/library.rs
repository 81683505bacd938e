//! Personal library: book model, view state and live sync.

pub mod book;
pub mod state;
pub mod sync;
pub mod views;

pub use book::{Book, ReadingStatus};
pub use state::{LibraryEvent, LibraryState};
pub use sync::LibrarySync;
pub use views::{LibraryStats, Shelves};
