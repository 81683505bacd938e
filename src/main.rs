//! readshelf command-line entry point.

use anyhow::Context;
use clap::Parser;
use readshelf::{
    auth::AuthService,
    catalog::CatalogClient,
    config::{Cli, Command, Config},
    db::{BookFilter, Database, Session},
    library::{Book, LibraryState, LibrarySync, ReadingStatus},
    profile,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "readshelf=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // Find or load config
    let config_path = cli.config.clone().or_else(Config::find_config_file);

    let config = if let Some(ref path) = config_path {
        Config::load(path)?
    } else {
        Config::default()
    };

    if let Command::Init { force } = cli.command {
        return cmd_init(force);
    }

    let db = Database::open(&config.database.path)?;
    match db.cleanup_expired_sessions() {
        Ok(0) => {}
        Ok(removed) => tracing::debug!(removed, "Removed expired sessions"),
        Err(e) => tracing::warn!(error = %e, "Session cleanup failed"),
    }

    let auth = AuthService::new(
        db.clone(),
        config.auth.session_days,
        config.auth.registration_enabled(),
    );
    let app = App { config, db, auth };

    match cli.command {
        Command::Init { .. } => Ok(()),
        Command::Register {
            username,
            email,
            password,
        } => app.cmd_register(&username, &email, password),
        Command::Login { email, password } => app.cmd_login(&email, password),
        Command::Logout => app.cmd_logout(),
        Command::DeleteAccount => app.cmd_delete_account(),
        Command::Profile { json } => app.cmd_profile(json),
        Command::Search { query, add } => app.cmd_search(&query, add).await,
        Command::List { favorites, json } => app.cmd_list(favorites, json),
        Command::Show { id } => app.cmd_show(&id),
        Command::Status { id, status } => app.cmd_status(&id, &status).await,
        Command::Favorite { id } => app.cmd_favorite(&id).await,
        Command::Remove { id } => app.cmd_remove(&id).await,
        Command::Share { id } => app.cmd_share(&id),
        Command::Watch => app.cmd_watch().await,
    }
}

/// Write a default config and create the database.
fn cmd_init(force: bool) -> anyhow::Result<()> {
    let config_path = PathBuf::from("config.toml");

    if config_path.exists() && !force {
        anyhow::bail!(
            "Config file already exists: {}. Use --force to overwrite.",
            config_path.display()
        );
    }

    std::fs::write(&config_path, Config::generate_default())?;
    println!("Created config file: {}", config_path.display());

    let config = Config::default();
    let _db = Database::open(&config.database.path)?;
    println!("Initialized database: {}", config.database.path.display());

    println!("\nNext: readshelf register <username> <email>");
    Ok(())
}

struct App {
    config: Config,
    db: Database,
    auth: AuthService,
}

impl App {
    /// Session saved by the last `login`, if still valid.
    fn current_session(&self) -> anyhow::Result<Option<Session>> {
        let path = &self.config.auth.session_file;
        let token = match std::fs::read_to_string(path) {
            Ok(token) => token.trim().to_string(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("Failed to read session file"),
        };

        if token.is_empty() {
            return Ok(None);
        }

        let session = self.auth.restore(&token)?;
        if session.is_none() {
            tracing::info!("Saved session expired");
            let _ = std::fs::remove_file(path);
        }
        Ok(session)
    }

    fn require_session(&self) -> anyhow::Result<Session> {
        self.current_session()?
            .ok_or_else(|| anyhow::anyhow!("Not signed in. Run: readshelf login <email>"))
    }

    fn save_session(&self, session: &Session) -> anyhow::Result<()> {
        let path = &self.config.auth.session_file;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &session.token).context("Failed to write session file")
    }

    fn clear_session(&self) {
        let _ = std::fs::remove_file(&self.config.auth.session_file);
    }

    fn cmd_register(
        &self,
        username: &str,
        email: &str,
        password: Option<String>,
    ) -> anyhow::Result<()> {
        let password = match password {
            Some(p) => p,
            None => prompt_password("Password: ")?,
        };

        let user = self.auth.register(username, email, &password)?;
        let session = self.auth.sign_in(&user.email, &password)?;
        self.save_session(&session)?;
        println!("Registered and signed in as {} ({})", username, user.email);
        Ok(())
    }

    fn cmd_login(&self, email: &str, password: Option<String>) -> anyhow::Result<()> {
        let password = match password {
            Some(p) => p,
            None => prompt_password("Password: ")?,
        };

        let session = self.auth.sign_in(email, &password)?;
        self.save_session(&session)?;
        println!("Signed in as {}", session.email);
        Ok(())
    }

    fn cmd_logout(&self) -> anyhow::Result<()> {
        if let Some(session) = self.current_session()? {
            self.auth.sign_out(&session)?;
        }
        self.clear_session();
        println!("Signed out.");
        Ok(())
    }

    fn cmd_delete_account(&self) -> anyhow::Result<()> {
        let session = self.require_session()?;
        match self.auth.delete_account(&session) {
            Ok(()) => {
                self.clear_session();
                println!("Account deleted.");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Account deletion failed");
                println!("Error deleting account.");
            }
        }
        Ok(())
    }

    fn cmd_profile(&self, json: bool) -> anyhow::Result<()> {
        let session = self.require_session()?;
        let summary = profile::load_profile(&self.db, &session)?;

        if json {
            println!("{}", serde_json::to_string_pretty(&summary)?);
            return Ok(());
        }

        println!("{}", summary.username.as_deref().unwrap_or("(no username)"));
        println!("{}", summary.email);
        println!();
        println!("Books added:    {}", summary.stats.total);
        println!("Favorite books: {}", summary.stats.favorites);
        Ok(())
    }

    async fn cmd_search(&self, query: &str, add: Option<usize>) -> anyhow::Result<()> {
        let client = CatalogClient::new(&self.config.catalog)?;
        let results: Vec<Book> = client.search(query).await.collect();

        if results.is_empty() {
            println!("No results found");
            return Ok(());
        }

        let Some(n) = add else {
            for (i, book) in results.iter().enumerate() {
                println!(
                    "{:>3}. {} by {} ({:.1})",
                    i + 1,
                    book.title,
                    book.author,
                    book.rating
                );
            }
            return Ok(());
        };

        let candidate = n
            .checked_sub(1)
            .and_then(|i| results.get(i))
            .ok_or_else(|| anyhow::anyhow!("No result #{} (got {})", n, results.len()))?;

        let session = self.require_session()?;
        let library = LibrarySync::open(self.db.clone(), Some(session));
        let added = library.add(candidate);
        let state = library.snapshot();
        library.close().await;

        report_write(added, &state, &format!("Added \"{}\"", candidate.title))
    }

    fn cmd_list(&self, favorites: bool, json: bool) -> anyhow::Result<()> {
        let session = self.require_session()?;

        if favorites {
            let books = self.db.get_books(&session.user_id, &BookFilter::Favorites)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&books)?);
                return Ok(());
            }
            if books.is_empty() {
                println!("You haven't marked any books as favorites yet.");
            }
            for book in &books {
                print_book_line(book);
            }
            return Ok(());
        }

        let books = self.db.get_books(&session.user_id, &BookFilter::All)?;
        if json {
            let shelves = readshelf::Shelves::from_books(&books);
            println!("{}", serde_json::to_string_pretty(&shelves)?);
            return Ok(());
        }
        print_shelves(&books);
        Ok(())
    }

    fn cmd_show(&self, id: &str) -> anyhow::Result<()> {
        let session = self.require_session()?;
        let book = self
            .db
            .get_book(&session.user_id, id)?
            .ok_or_else(|| anyhow::anyhow!("No book with id {}", id))?;

        println!("{}", book.title);
        println!("by {}", book.author);
        println!("Rating:   {:.1}/5", book.rating);
        println!("Status:   {}", book.status);
        println!("Favorite: {}", if book.favorite { "yes" } else { "no" });
        if !book.cover_url.is_empty() {
            println!("Cover:    {}", book.cover_url);
        }
        if let Some(created) = book.created_at {
            println!("Added:    {}", created.format("%Y-%m-%d %H:%M"));
        }
        println!();
        println!("{}", book.description);
        Ok(())
    }

    async fn cmd_status(&self, id: &str, status: &str) -> anyhow::Result<()> {
        let status: ReadingStatus = status.parse()?;
        let library = LibrarySync::open(self.db.clone(), Some(self.require_session()?));
        let ok = library.set_status(id, status);
        let state = library.snapshot();
        library.close().await;

        report_write(ok, &state, &format!("Status set to {}", status))
    }

    async fn cmd_favorite(&self, id: &str) -> anyhow::Result<()> {
        let session = self.require_session()?;
        let library = LibrarySync::open(self.db.clone(), Some(session.clone()));
        let ok = library.toggle_favorite(id);
        let state = library.snapshot();
        library.close().await;

        let message = match self.db.get_book(&session.user_id, id)? {
            Some(book) if book.favorite => "Marked as favorite",
            _ => "Removed from favorites",
        };
        report_write(ok, &state, message)
    }

    async fn cmd_remove(&self, id: &str) -> anyhow::Result<()> {
        let library = LibrarySync::open(self.db.clone(), Some(self.require_session()?));
        let ok = library.remove(id);
        let state = library.snapshot();
        library.close().await;

        report_write(ok, &state, "Removed")
    }

    fn cmd_share(&self, id: &str) -> anyhow::Result<()> {
        let session = self.require_session()?;
        let book = self
            .db
            .get_book(&session.user_id, id)?
            .ok_or_else(|| anyhow::anyhow!("No book with id {}", id))?;
        println!("{}", book.share_message());
        Ok(())
    }

    async fn cmd_watch(&self) -> anyhow::Result<()> {
        let session = self.current_session()?;
        let library = LibrarySync::open(self.db.clone(), session);
        let mut updates = library.updates();

        let initial = library.snapshot();
        if !initial.is_loading() {
            print_state(&initial);
        }

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    print_state(&library.snapshot());
                }
            }
        }

        library.close().await;
        Ok(())
    }
}

fn report_write(ok: bool, state: &LibraryState, done: &str) -> anyhow::Result<()> {
    if ok {
        println!("{}", done);
        Ok(())
    } else {
        anyhow::bail!("{}", state.write_error().unwrap_or("Write failed"))
    }
}

fn print_book_line(book: &Book) {
    println!(
        "  {}  {} by {}{}",
        book.id_str(),
        book.title,
        book.author,
        if book.favorite { "  [fav]" } else { "" }
    );
}

fn print_shelves(books: &[Book]) {
    if books.is_empty() {
        println!("Your library is empty.\nAdd a book with: readshelf search <query> --add <N>");
        return;
    }

    let shelves = readshelf::Shelves::from_books(books);
    for status in ReadingStatus::ALL {
        println!("{}", status.shelf_title());
        let shelf = shelves.shelf(status);
        if shelf.is_empty() {
            println!("  No books in this category");
        }
        for book in shelf {
            print_book_line(book);
        }
        println!();
    }
}

fn print_state(state: &LibraryState) {
    println!("--- library v{} ---", state.version());
    print_shelves(state.books());
    if let Some(error) = state.write_error() {
        println!("! {}", error);
    }
}

/// Prompt for password input.
fn prompt_password(prompt: &str) -> anyhow::Result<String> {
    print!("{}", prompt);
    io::stdout().flush()?;

    let mut password = String::new();
    io::stdin().read_line(&mut password)?;

    Ok(password.trim().to_string())
}
