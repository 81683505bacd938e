use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Track the books you read: search the catalog, keep a synced library.
#[derive(Parser, Debug, Clone)]
#[command(name = "readshelf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file.
    #[arg(short, long, env = "READSHELF_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Write a default config file and create the database.
    Init {
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },

    /// Create an account.
    Register {
        /// Display username.
        username: String,
        /// Sign-in email.
        email: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign in and remember the session.
    Login {
        /// Sign-in email.
        email: String,
        /// Password (will prompt if not provided).
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Sign out.
    Logout,

    /// Delete the signed-in account and all of its books.
    DeleteAccount,

    /// Show username, email and library counters.
    Profile {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Search the catalog by title or author.
    Search {
        /// Free-text query.
        query: String,
        /// Save the N-th result (1-based) to the library.
        #[arg(long, value_name = "N")]
        add: Option<usize>,
    },

    /// Show the library grouped into shelves.
    List {
        /// Only favorites.
        #[arg(long)]
        favorites: bool,
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show one saved book.
    Show {
        /// Book id.
        id: String,
    },

    /// Set a book's reading status (to-read, reading, completed).
    Status {
        /// Book id.
        id: String,
        /// New status.
        status: String,
    },

    /// Toggle a book's favorite flag.
    Favorite {
        /// Book id.
        id: String,
    },

    /// Remove a book from the library.
    Remove {
        /// Book id.
        id: String,
    },

    /// Print a share message for a book.
    Share {
        /// Book id.
        id: String,
    },

    /// Follow the library live, printing shelves on every change.
    Watch,
}

/// Main configuration from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog search configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Catalog search configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the volumes API.
    #[serde(default = "default_catalog_url")]
    pub base_url: String,

    /// Results per search (capped at 40).
    #[serde(default = "default_max_results")]
    pub max_results: u32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_url(),
            max_results: default_max_results(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_catalog_url() -> String {
    "https://www.googleapis.com/books/v1".to_string()
}

fn default_max_results() -> u32 {
    40
}

fn default_timeout() -> u64 {
    10
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/readshelf.db")
}

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Registration mode: "open", "disabled".
    #[serde(default = "default_registration")]
    pub registration: String,

    /// Session token duration in days.
    #[serde(default = "default_session_days")]
    pub session_days: u32,

    /// Where the CLI keeps the current session token.
    #[serde(default = "default_session_file")]
    pub session_file: PathBuf,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            registration: default_registration(),
            session_days: default_session_days(),
            session_file: default_session_file(),
        }
    }
}

fn default_registration() -> String {
    "open".to_string()
}

fn default_session_days() -> u32 {
    30
}

fn default_session_file() -> PathBuf {
    PathBuf::from("data/session")
}

impl AuthConfig {
    /// Check if registration is enabled.
    pub fn registration_enabled(&self) -> bool {
        self.registration == "open"
    }
}

impl Config {
    /// Load configuration from file.
    pub fn load(path: &PathBuf) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to read config file: {}", e))
        })?;

        toml::from_str(&content).map_err(|e| {
            crate::error::AppError::Config(format!("Failed to parse config file: {}", e))
        })
    }

    /// Find config file in default locations.
    pub fn find_config_file() -> Option<PathBuf> {
        let candidates = [
            PathBuf::from("config.toml"),
            PathBuf::from("readshelf.toml"),
            dirs::config_dir()
                .map(|p| p.join("readshelf").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/readshelf/config.toml"),
        ];

        candidates
            .into_iter()
            .find(|p| !p.as_os_str().is_empty() && p.exists())
    }

    /// Generate default config file content.
    pub fn generate_default() -> String {
        r#"# readshelf configuration

[catalog]
base_url = "https://www.googleapis.com/books/v1"
# Results per search (the catalog caps this at 40)
max_results = 40
timeout_seconds = 10

[database]
# path = "/var/lib/readshelf/readshelf.db"

[auth]
# Registration mode: "open" or "disabled"
registration = "open"
# Session duration in days
session_days = 30
# session_file = "data/session"
"#
        .to_string()
    }
}
