//! Book model.

use crate::error::{AppError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a book sits in the user's reading flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReadingStatus {
    /// Saved for later.
    #[default]
    #[serde(rename = "To-Read")]
    ToRead,
    /// Currently being read.
    #[serde(rename = "Reading")]
    Reading,
    /// Finished.
    #[serde(rename = "Completed")]
    Completed,
}

impl ReadingStatus {
    /// All statuses, in shelf display order.
    pub const ALL: [ReadingStatus; 3] = [
        ReadingStatus::Reading,
        ReadingStatus::ToRead,
        ReadingStatus::Completed,
    ];

    /// Name used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::ToRead => "To-Read",
            ReadingStatus::Reading => "Reading",
            ReadingStatus::Completed => "Completed",
        }
    }

    /// Shelf heading for this status.
    pub fn shelf_title(&self) -> &'static str {
        match self {
            ReadingStatus::ToRead => "To Read",
            ReadingStatus::Reading => "Reading Now",
            ReadingStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "to-read" | "toread" | "to_read" | "to read" => Ok(ReadingStatus::ToRead),
            "reading" => Ok(ReadingStatus::Reading),
            "completed" | "done" => Ok(ReadingStatus::Completed),
            other => Err(AppError::InvalidInput(format!(
                "Unknown reading status '{}' (expected to-read, reading or completed)",
                other
            ))),
        }
    }
}

/// A book, either a catalog search candidate or an entry of a user's library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Store-assigned identifier. `None` until the book is saved.
    pub id: Option<String>,

    /// Identifier in the external catalog.
    pub catalog_id: String,

    /// Book title.
    pub title: String,

    /// Display author line.
    pub author: String,

    /// Book description or summary.
    pub description: String,

    /// Cover image URL (https, may be empty).
    pub cover_url: String,

    /// Average rating, 0 to 5.
    pub rating: f32,

    /// Reading status.
    pub status: ReadingStatus,

    /// Whether the user marked the book as a favorite.
    pub favorite: bool,

    /// Server-assigned creation time.
    pub created_at: Option<DateTime<Utc>>,
}

impl Book {
    /// Create a search candidate with default status and favorite flag.
    pub fn candidate(
        catalog_id: impl Into<String>,
        title: impl Into<String>,
        author: impl Into<String>,
    ) -> Self {
        Self {
            catalog_id: catalog_id.into(),
            title: title.into(),
            author: author.into(),
            ..Self::default()
        }
    }

    /// Whether this book has been saved to a library.
    pub fn is_saved(&self) -> bool {
        self.id.is_some()
    }

    /// Store identifier, or an empty string for unsaved candidates.
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    /// Text used when sharing a book.
    pub fn share_message(&self) -> String {
        // Half-up, so 4.5 shares as 5/5.
        format!(
            "I'm reading {}. It's rated {}/5!",
            self.title,
            self.rating.round()
        )
    }
}

impl Default for Book {
    fn default() -> Self {
        Self {
            id: None,
            catalog_id: String::new(),
            title: String::new(),
            author: String::new(),
            description: String::new(),
            cover_url: String::new(),
            rating: 0.0,
            status: ReadingStatus::ToRead,
            favorite: false,
            created_at: None,
        }
    }
}
