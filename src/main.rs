//! # StudyShelf CLI (`shelf`)
//!
//! The `shelf` binary is the operational interface for the catalog. It
//! provides commands for database initialization, account creation,
//! publishing, searching, and starting the HTTP API server.
//!
//! ## Usage
//!
//! ```bash
//! shelf --config ./config/shelf.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `shelf init` | Create the SQLite database and run schema migrations |
//! | `shelf register` | Create an academy or student account |
//! | `shelf publish` | Publish a document as an academy account |
//! | `shelf search` | Search the catalog metadata |
//! | `shelf serve` | Start the HTTP API server |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! shelf init --config ./config/shelf.toml
//!
//! # Create an academy account
//! shelf register --name "Sunrise Academy" --email staff@sunrise.example \
//!     --password hunter22! --role ACADEMY
//!
//! # Publish a document
//! shelf publish --account staff@sunrise.example --subject Mathematics \
//!     --class "10th Grade" --school DPS --file-url https://blobs.example/algebra.pdf
//!
//! # Search (students see everything matching)
//! shelf search --subject math
//!
//! # Search an academy's own documents
//! shelf search --account staff@sunrise.example --mine
//!
//! # Start the HTTP API
//! shelf serve --config ./config/shelf.toml
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use studyshelf::auth::Authenticator;
use studyshelf::cache::MemoryCache;
use studyshelf::catalog::{CatalogService, PublishRequest};
use studyshelf::config::{self, Config};
use studyshelf::models::{Caller, ResultSource, Role};
use studyshelf::store::{CatalogStore, SqliteCatalog};
use studyshelf::{db, migrate, server};

/// StudyShelf CLI — a document-metadata catalog with cached search.
///
/// All commands accept a `--config` flag pointing to a TOML
/// configuration file. See `config/shelf.example.toml` for a full
/// example.
#[derive(Parser)]
#[command(
    name = "shelf",
    about = "StudyShelf — a document-metadata catalog with cached search",
    version,
    long_about = "StudyShelf stores metadata for academy-published PDF documents \
    (subject, class, school) and serves substring searches over it, with a \
    read-through result cache that every publish invalidates."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/shelf.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables
    /// (accounts, documents) with their indexes. Idempotent.
    Init,

    /// Create an account.
    Register {
        /// Display name for the account.
        #[arg(long)]
        name: String,

        /// Email address (unique across accounts).
        #[arg(long)]
        email: String,

        /// Password (at least 8 characters).
        #[arg(long)]
        password: String,

        /// Account role: `ACADEMY` or `STUDENT`.
        #[arg(long)]
        role: String,
    },

    /// Publish a document as an academy account.
    ///
    /// Classification fields are lowercased and trimmed before storage;
    /// the file URL is recorded verbatim.
    Publish {
        /// Email of the publishing academy account.
        #[arg(long)]
        account: String,

        /// Subject classification (e.g. `Mathematics`).
        #[arg(long)]
        subject: String,

        /// Class classification (e.g. `10th Grade`).
        #[arg(long = "class")]
        class_name: String,

        /// School classification (e.g. `DPS`).
        #[arg(long)]
        school: String,

        /// Opaque reference to the stored file.
        #[arg(long = "file-url")]
        file_url: String,
    },

    /// Search the catalog.
    ///
    /// Filters are optional substring matches (AND semantics); results
    /// are ordered newest first.
    Search {
        /// Subject filter.
        #[arg(long, default_value = "")]
        subject: String,

        /// Class filter.
        #[arg(long = "class", default_value = "")]
        class_name: String,

        /// School filter.
        #[arg(long, default_value = "")]
        school: String,

        /// Act as this account (required for --mine).
        #[arg(long)]
        account: Option<String>,

        /// Restrict to the acting account's own documents.
        #[arg(long)]
        mine: bool,
    },

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind`.
    Serve,
}

/// Resolve an account email to a caller identity for CLI use.
async fn caller_for(store: &dyn CatalogStore, email: &str) -> anyhow::Result<Caller> {
    let account = store
        .get_account_by_email(&email.trim().to_lowercase())
        .await?
        .ok_or_else(|| anyhow::anyhow!("no account registered for {email}"))?;
    Ok(Caller::from(&account))
}

/// Anonymous read-only identity for unauthenticated CLI searches.
fn anonymous_caller() -> Caller {
    Caller {
        id: "cli".to_string(),
        display_name: "cli".to_string(),
        email: String::new(),
        role: Role::Student,
    }
}

async fn build_service(cfg: &Config) -> anyhow::Result<CatalogService> {
    let pool = db::connect(cfg).await?;
    let store = Arc::new(SqliteCatalog::new(pool));
    let cache = Arc::new(MemoryCache::new());
    Ok(CatalogService::new(store, cache, &cfg.cache))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Register {
            name,
            email,
            password,
            role,
        } => {
            let role = Role::parse(&role)
                .ok_or_else(|| anyhow::anyhow!("unknown role: {role} (use ACADEMY or STUDENT)"))?;
            let service = build_service(&cfg).await?;
            let auth = Authenticator::new(&cfg.auth);
            let account = auth
                .register(service.store().as_ref(), &name, &email, &password, role)
                .await?;
            println!(
                "Registered {} account {} ({})",
                account.role.as_str(),
                account.email,
                account.id
            );
        }
        Commands::Publish {
            account,
            subject,
            class_name,
            school,
            file_url,
        } => {
            let service = build_service(&cfg).await?;
            let caller = caller_for(service.store().as_ref(), &account).await?;
            let document = service
                .publish(
                    &caller,
                    PublishRequest {
                        subject,
                        class_name,
                        school,
                        file_url,
                    },
                )
                .await?;
            println!("Published document {}", document.id);
            println!(
                "  {} / {} / {}",
                document.subject, document.class_name, document.school
            );
        }
        Commands::Search {
            subject,
            class_name,
            school,
            account,
            mine,
        } => {
            if mine && account.is_none() {
                anyhow::bail!("--mine requires --account <email>");
            }
            let service = build_service(&cfg).await?;
            let caller = match account {
                Some(email) => caller_for(service.store().as_ref(), &email).await?,
                None => anonymous_caller(),
            };
            let response = service
                .search(&caller, &subject, &class_name, &school, mine)
                .await?;

            if response.hits.is_empty() {
                println!("No results.");
                return Ok(());
            }
            let source = match response.source {
                ResultSource::Cache => "cache",
                ResultSource::Database => "database",
            };
            println!("{} result(s) from {}:", response.hits.len(), source);
            println!();
            for (i, hit) in response.hits.iter().enumerate() {
                let date = chrono::DateTime::from_timestamp_millis(hit.created_at)
                    .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_default();
                println!(
                    "{}. {} / {} / {}",
                    i + 1,
                    hit.subject,
                    hit.class_name,
                    hit.school
                );
                println!("    published: {}", date);
                println!("    academy: {}", hit.owner_email);
                println!("    file: {}", hit.file_url);
                println!("    id: {}", hit.id);
                println!();
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
