//! # Folio CLI (`folio`)
//!
//! Drives the environment-aware document adapter from the command line and
//! runs the sync HTTP service.
//!
//! ## Usage
//!
//! ```bash
//! folio --config ./config/folio.toml [--project <key>] [--emulator] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `folio targets` | List `emulator` and every project key |
//! | `folio collections` | List top-level collection ids |
//! | `folio get <path>` | Print a document (or `null`) |
//! | `folio list <collection>` | Print a collection as a JSON array |
//! | `folio set <path> <json> [--merge]` | Write a document |
//! | `folio add <collection> <json>` | Create a document, print its id |
//! | `folio update <path> <json>` | Patch fields of a document |
//! | `folio delete <path>` | Delete a document |
//! | `folio watch <path> [--collection] [--limit N]` | Stream snapshots |
//! | `folio purge <collection> [--chunk-size N]` | Delete a collection in batches |
//! | `folio serve` | Start the sync HTTP service |
//!
//! ## Examples
//!
//! ```bash
//! # Add a document on the local emulator
//! folio --emulator add test '{"message":"hello","createdAt":1000}'
//!
//! # Newest first from the live project
//! folio list test --sort updatedAt --sort createdAt
//!
//! # Follow a collection
//! folio --emulator watch test --collection
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use folio::commands;
use folio::config;
use folio::logging;
use folio::registry::{ClientRegistry, Environment};
use folio::server;

/// Folio: environment-aware document store access.
///
/// All commands read a TOML configuration file. See
/// `config/folio.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "folio",
    about = "Folio: environment-aware document store access",
    version,
    long_about = "Folio resolves a logical project and an environment (local emulator or live) \
    to a cached backend client, and exposes path-based document operations, batched writes, \
    and live listeners on top of it."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/folio.toml")]
    config: PathBuf,

    /// Project key from `[projects.<key>]`. Defaults to `default_project`.
    #[arg(long, global = true)]
    project: Option<String>,

    /// Target the local emulator instead of the live project.
    #[arg(long, global = true)]
    emulator: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available targets.
    Targets,

    /// List top-level collection ids.
    Collections,

    /// Print one document as JSON, or `null` if it does not exist.
    Get {
        /// Document path, e.g. `test/abc`.
        path: String,
    },

    /// Print every document of a collection as a JSON array.
    List {
        /// Collection path, e.g. `test`.
        collection: String,

        /// Sort newest-first by these fields (repeatable, first wins).
        #[arg(long)]
        sort: Vec<String>,
    },

    /// Create or overwrite a document.
    Set {
        path: String,
        /// Document body as a JSON object.
        json: String,
        /// Deep-merge into the existing document instead of replacing it.
        #[arg(long)]
        merge: bool,
    },

    /// Create a document with a generated id and print the id.
    Add {
        collection: String,
        /// Document body as a JSON object.
        json: String,
    },

    /// Patch fields of an existing document.
    Update {
        path: String,
        /// Fields to change as a JSON object. Keys may be dotted paths.
        json: String,
    },

    /// Delete a document. Succeeds if it is already gone.
    Delete { path: String },

    /// Print each snapshot of a document or collection as a JSON line.
    Watch {
        path: String,
        /// Treat `path` as a collection.
        #[arg(long)]
        collection: bool,
        /// Stop after this many snapshots.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Delete every document in a collection using chunked batches.
    Purge {
        collection: String,
        /// Operations per batch. Defaults to `[store].chunk_size`.
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Start the sync HTTP service on `[server].bind`.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_logging("info");
    let cli = Cli::parse();

    let cfg = config::load_config(&cli.config)?;

    if let Commands::Serve = cli.command {
        return server::run_server(&cfg).await;
    }

    let registry = ClientRegistry::from_config(cfg)?;
    let environment = if cli.emulator {
        Environment::Emulator
    } else {
        Environment::Live
    };

    if let Commands::Targets = cli.command {
        commands::run_targets(&registry);
        return Ok(());
    }

    let adapter = registry.adapter(cli.project.as_deref(), environment)?;

    match cli.command {
        Commands::Collections => commands::run_collections(&adapter).await?,
        Commands::Get { path } => commands::run_get(&adapter, &path).await?,
        Commands::List { collection, sort } => {
            commands::run_list(&adapter, &collection, &sort).await?
        }
        Commands::Set { path, json, merge } => {
            commands::run_set(&adapter, &path, &json, merge).await?
        }
        Commands::Add { collection, json } => {
            commands::run_add(&adapter, &collection, &json).await?
        }
        Commands::Update { path, json } => commands::run_update(&adapter, &path, &json).await?,
        Commands::Delete { path } => commands::run_delete(&adapter, &path).await?,
        Commands::Watch {
            path,
            collection,
            limit,
        } => commands::run_watch(&adapter, &path, collection, limit).await?,
        Commands::Purge {
            collection,
            chunk_size,
        } => commands::run_purge(&adapter, &collection, chunk_size).await?,
        Commands::Targets | Commands::Serve => {
            // Handled above
            unreachable!()
        }
    }

    Ok(())
}
