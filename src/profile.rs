//! Profile screen data.

use crate::db::{BookFilter, Database, Session};
use crate::error::Result;
use crate::library::views::LibraryStats;
use serde::Serialize;

/// What the profile screen shows. Computed once per load.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileSummary {
    /// Username from the profile document, if one exists.
    pub username: Option<String>,
    /// Sign-in email.
    pub email: String,
    /// Library counters at load time.
    pub stats: LibraryStats,
}

/// Read the profile document and count the user's books.
pub fn load_profile(db: &Database, session: &Session) -> Result<ProfileSummary> {
    let profile = db.get_profile(&session.user_id)?;
    let books = db.get_books(&session.user_id, &BookFilter::All)?;
    let stats = LibraryStats::from_books(&books);

    tracing::debug!(
        user_id = %session.user_id,
        total = stats.total,
        favorites = stats.favorites,
        "Profile loaded"
    );

    Ok(ProfileSummary {
        username: profile.map(|p| p.username),
        email: session.email.clone(),
        stats,
    })
}
