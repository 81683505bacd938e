use crate::db::*;
use crate::error::{AppError, Result};
use crate::library::book::{Book, ReadingStatus};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Capacity of the change notification channel. Slow listeners that fall
/// further behind just read a fresh snapshot.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 256;

const BOOK_COLUMNS: &str = "id, book_id, title, author, description, cover_url, rating, \
     reading_status, is_favorite, created_at";

/// Database wrapper for thread-safe access.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<String>,
}

impl Database {
    /// Open or create database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        // Create parent directories if needed
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        Self::with_connection(conn)
    }

    /// Open in-memory database (for testing).
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Internal(format!("Failed to open database: {}", e)))?;

        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
            changes,
        };

        db.initialize_schema()?;
        Ok(db)
    }

    /// Initialize database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            -- Users table
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                last_login INTEGER
            );

            -- Profile documents, one per user
            CREATE TABLE IF NOT EXISTS profiles (
                user_id TEXT PRIMARY KEY,
                username TEXT NOT NULL,
                email TEXT NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Sessions table
            CREATE TABLE IF NOT EXISTS sessions (
                token TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Saved books, scoped per user
            CREATE TABLE IF NOT EXISTS books (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                book_id TEXT NOT NULL,
                title TEXT NOT NULL,
                author TEXT NOT NULL,
                description TEXT NOT NULL,
                cover_url TEXT NOT NULL,
                rating REAL NOT NULL DEFAULT 0,
                reading_status TEXT NOT NULL DEFAULT 'To-Read',
                is_favorite INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );

            -- Indexes
            CREATE INDEX IF NOT EXISTS idx_books_user ON books(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            "#,
        )
        .map_err(|e| AppError::Internal(format!("Failed to initialize schema: {}", e)))?;

        Ok(())
    }

    /// Publish a change to a user's book collection.
    pub(crate) fn notify(&self, user_id: &str) {
        // No receivers is fine: nobody is listening right now.
        let _ = self.changes.send(user_id.to_string());
    }

    /// Run raw SQL against the store.
    #[cfg(test)]
    pub(crate) fn execute_batch(&self, sql: &str) -> rusqlite::Result<()> {
        self.conn.lock().execute_batch(sql)
    }

    /// Receiver for collection change notifications.
    pub(crate) fn change_receiver(&self) -> broadcast::Receiver<String> {
        self.changes.subscribe()
    }

    // ========== USER OPERATIONS ==========

    /// Create a new user.
    pub fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, email, password_hash, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                user.id,
                user.email,
                user.password_hash,
                user.created_at,
                user.last_login,
            ],
        )
        .map_err(|e| {
            if e.to_string().contains("UNIQUE constraint") {
                AppError::InvalidInput(format!("Email '{}' is already registered", user.email))
            } else {
                AppError::Internal(format!("Failed to create user: {}", e))
            }
        })?;
        Ok(())
    }

    /// Get user by email.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, email, password_hash, created_at, last_login
             FROM users WHERE email = ?1",
            params![email],
            row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// Get user by ID.
    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, email, password_hash, created_at, last_login
             FROM users WHERE id = ?1",
            params![id],
            row_to_user,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get user: {}", e)))
    }

    /// Update user last login.
    pub fn update_user_last_login(&self, user_id: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![now_timestamp(), user_id],
        )
        .map_err(|e| AppError::Internal(format!("Failed to update last login: {}", e)))?;
        Ok(())
    }

    /// Delete a user together with their books, profile and sessions.
    pub fn delete_user(&self, user_id: &str) -> Result<bool> {
        let rows = {
            let mut conn = self.conn.lock();
            let tx = conn
                .transaction()
                .map_err(|e| AppError::Internal(format!("Failed to begin transaction: {}", e)))?;

            for sql in [
                "DELETE FROM books WHERE user_id = ?1",
                "DELETE FROM profiles WHERE user_id = ?1",
                "DELETE FROM sessions WHERE user_id = ?1",
            ] {
                tx.execute(sql, params![user_id])
                    .map_err(|e| AppError::Internal(format!("Failed to delete user data: {}", e)))?;
            }

            let rows = tx
                .execute("DELETE FROM users WHERE id = ?1", params![user_id])
                .map_err(|e| AppError::Internal(format!("Failed to delete user: {}", e)))?;

            tx.commit()
                .map_err(|e| AppError::Internal(format!("Failed to commit: {}", e)))?;
            rows
        };

        self.notify(user_id);
        Ok(rows > 0)
    }

    // ========== PROFILE OPERATIONS ==========

    /// Write a profile document, replacing any previous one.
    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO profiles (user_id, username, email) VALUES (?1, ?2, ?3)",
            params![profile.user_id, profile.username, profile.email],
        )
        .map_err(|e| AppError::Internal(format!("Failed to save profile: {}", e)))?;
        Ok(())
    }

    /// Get a user's profile document.
    pub fn get_profile(&self, user_id: &str) -> Result<Option<Profile>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT user_id, username, email FROM profiles WHERE user_id = ?1",
            params![user_id],
            |row| {
                Ok(Profile {
                    user_id: row.get(0)?,
                    username: row.get(1)?,
                    email: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get profile: {}", e)))
    }

    // ========== SESSION OPERATIONS ==========

    /// Create session.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)",
            params![session.token, session.user_id, session.expires_at],
        )
        .map_err(|e| AppError::Internal(format!("Failed to create session: {}", e)))?;
        Ok(())
    }

    /// Get session by token.
    pub fn get_session(&self, token: &str) -> Result<Option<Session>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT s.token, s.user_id, u.email, s.expires_at
             FROM sessions s JOIN users u ON u.id = s.user_id
             WHERE s.token = ?1",
            params![token],
            |row| {
                Ok(Session {
                    token: row.get(0)?,
                    user_id: row.get(1)?,
                    email: row.get(2)?,
                    expires_at: row.get(3)?,
                })
            },
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get session: {}", e)))
    }

    /// Delete session.
    pub fn delete_session(&self, token: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])
            .map_err(|e| AppError::Internal(format!("Failed to delete session: {}", e)))?;
        Ok(())
    }

    /// Cleanup expired sessions.
    pub fn cleanup_expired_sessions(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE expires_at < ?1",
                params![now_timestamp()],
            )
            .map_err(|e| AppError::Internal(format!("Failed to cleanup sessions: {}", e)))?;
        Ok(rows)
    }

    // ========== BOOK OPERATIONS ==========

    /// Save a candidate book as a new document. The store assigns the
    /// identifier and creation time; the stored book is returned.
    pub fn add_book(&self, user_id: &str, book: &Book) -> Result<Book> {
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now();

        {
            let conn = self.conn.lock();
            conn.execute(
                "INSERT INTO books (id, user_id, book_id, title, author, description, cover_url,
                                    rating, reading_status, is_favorite, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    id,
                    user_id,
                    book.catalog_id,
                    book.title,
                    book.author,
                    book.description,
                    book.cover_url,
                    book.rating as f64,
                    book.status.as_str(),
                    book.favorite,
                    created_at.timestamp_millis(),
                ],
            )
            .map_err(|e| AppError::Internal(format!("Failed to add book: {}", e)))?;
        }

        self.notify(user_id);

        Ok(Book {
            id: Some(id),
            created_at: Some(created_at),
            ..book.clone()
        })
    }

    /// Get a user's books, oldest first.
    pub fn get_books(&self, user_id: &str, filter: &BookFilter) -> Result<Vec<Book>> {
        let conn = self.conn.lock();

        let (clause, extra) = match filter {
            BookFilter::All => ("", None),
            BookFilter::Favorites => (" AND is_favorite = 1", None),
            BookFilter::ById(id) => (" AND id = ?2", Some(id.as_str())),
        };

        let sql = format!(
            "SELECT {} FROM books WHERE user_id = ?1{} ORDER BY created_at, rowid",
            BOOK_COLUMNS, clause
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| AppError::Internal(format!("Failed to prepare query: {}", e)))?;

        let rows = match extra {
            Some(id) => stmt.query_map(params![user_id, id], row_to_book),
            None => stmt.query_map(params![user_id], row_to_book),
        };

        let books = rows
            .map_err(|e| AppError::Internal(format!("Failed to get books: {}", e)))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| AppError::Internal(format!("Failed to collect books: {}", e)))?;

        Ok(books)
    }

    /// Get a single book.
    pub fn get_book(&self, user_id: &str, id: &str) -> Result<Option<Book>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {} FROM books WHERE user_id = ?1 AND id = ?2",
                BOOK_COLUMNS
            ),
            params![user_id, id],
            row_to_book,
        )
        .optional()
        .map_err(|e| AppError::Internal(format!("Failed to get book: {}", e)))
    }

    /// Set the reading status of a book.
    pub fn update_book_status(&self, user_id: &str, id: &str, status: ReadingStatus) -> Result<()> {
        self.update_book_field(
            user_id,
            id,
            "UPDATE books SET reading_status = ?1 WHERE user_id = ?2 AND id = ?3",
            &status.as_str(),
        )
    }

    /// Set the favorite flag of a book.
    pub fn update_book_favorite(&self, user_id: &str, id: &str, favorite: bool) -> Result<()> {
        self.update_book_field(
            user_id,
            id,
            "UPDATE books SET is_favorite = ?1 WHERE user_id = ?2 AND id = ?3",
            &favorite,
        )
    }

    fn update_book_field(
        &self,
        user_id: &str,
        id: &str,
        sql: &str,
        value: &dyn rusqlite::ToSql,
    ) -> Result<()> {
        let rows = {
            let conn = self.conn.lock();
            conn.execute(sql, params![value, user_id, id])
                .map_err(|e| AppError::Internal(format!("Failed to update book: {}", e)))?
        };

        if rows == 0 {
            return Err(AppError::NotFound(format!("Book {}", id)));
        }

        self.notify(user_id);
        Ok(())
    }

    /// Delete a book. Returns false if it did not exist.
    pub fn delete_book(&self, user_id: &str, id: &str) -> Result<bool> {
        let rows = {
            let conn = self.conn.lock();
            conn.execute(
                "DELETE FROM books WHERE user_id = ?1 AND id = ?2",
                params![user_id, id],
            )
            .map_err(|e| AppError::Internal(format!("Failed to delete book: {}", e)))?
        };

        if rows > 0 {
            self.notify(user_id);
        }
        Ok(rows > 0)
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        created_at: row.get(3)?,
        last_login: row.get(4)?,
    })
}

fn row_to_book(row: &Row<'_>) -> rusqlite::Result<Book> {
    let id: String = row.get(0)?;
    let status: String = row.get(7)?;
    let status = status.parse().unwrap_or_else(|_| {
        tracing::warn!(book = %id, status = %status, "Unknown reading status, using To-Read");
        ReadingStatus::default()
    });
    let rating: f64 = row.get(6)?;
    let created_ms: i64 = row.get(9)?;

    Ok(Book {
        id: Some(id),
        catalog_id: row.get(1)?,
        title: row.get(2)?,
        author: row.get(3)?,
        description: row.get(4)?,
        cover_url: row.get(5)?,
        rating: rating as f32,
        status,
        favorite: row.get(8)?,
        created_at: chrono::DateTime::from_timestamp_millis(created_ms),
    })
}
