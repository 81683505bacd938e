//! readshelf: a personal reading tracker.
//!
//! Users search an external book catalog, save books to a personal
//! library, track reading status and favorites, and see simple profile
//! statistics. The library is held in a per-user document store whose
//! changes are pushed to live subscribers as full snapshots.
//!
//! # Components
//!
//! - Catalog search client (Google Books volumes API)
//! - Document store with per-user book collections and live subscriptions
//! - Library view state with optimistic mutations reconciled by snapshots
//! - Shelf partitioning and profile counters
//! - Email/password accounts and sessions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Accounts and sessions.
pub mod auth;
/// Catalog search.
pub mod catalog;
/// Configuration and CLI.
pub mod config;
/// Document store.
pub mod db;
/// Error types.
pub mod error;
/// Library model, view state and sync.
pub mod library;
/// Profile aggregation.
pub mod profile;


pub use catalog::{CatalogClient, SearchResults};
pub use config::{Cli, Command, Config};
pub use db::{BookFilter, Database, Session, Snapshot, Subscription};
pub use error::{AppError, Result};
pub use library::{Book, LibraryState, LibrarySync, ReadingStatus, Shelves};
