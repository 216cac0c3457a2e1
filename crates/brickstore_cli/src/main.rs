//! Brickstore CLI
//!
//! Command-line access to a directory-backed Brickstore store.
//!
//! # Commands
//!
//! - `insert`, `insert-many`, `set`, `get`, `remove` - single-record access
//! - `get-many` - ordered range queries with offset and count
//! - `size`, `clear` - whole-store operations
//!
//! Records and keys are JSON; results are printed as JSON.

mod commands;

use brickstore_core::{EngineConfig, Environment, Store, StoreConfig};
use clap::{Parser, Subcommand};
use commands::query::QueryArgs;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

/// Brickstore key-value store tool.
#[derive(Parser)]
#[command(name = "brickstore")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the store's journal
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Store name
    #[arg(global = true, short, long)]
    name: Option<String>,

    /// Field holding each record's key (keyless if omitted)
    #[arg(global = true, short, long)]
    key: Option<String>,

    /// Whitespace-separated list of indexed fields
    #[arg(global = true, short, long)]
    index: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a record and print its key
    Insert {
        /// The record, as JSON
        record: String,
    },

    /// Add a JSON array of records in one transaction
    InsertMany {
        /// The records, as a JSON array
        records: String,
    },

    /// Store a record under a key, replacing any existing one
    Set {
        /// The key, as JSON or a bare string
        key: String,
        /// The record, as JSON
        record: String,
    },

    /// Print the record stored under a key
    Get {
        /// The key, as JSON or a bare string
        key: String,
    },

    /// Delete the record stored under a key
    Remove {
        /// The key, as JSON or a bare string
        key: String,
    },

    /// Print records in key or index order
    GetMany {
        /// Index to order by
        #[arg(long)]
        orderby: Option<String>,

        /// Descending order
        #[arg(short, long)]
        reverse: bool,

        /// Inclusive lower bound
        #[arg(long)]
        start: Option<String>,

        /// Inclusive upper bound
        #[arg(long)]
        end: Option<String>,

        /// Maximum number of records
        #[arg(short, long)]
        count: Option<usize>,

        /// Records to skip
        #[arg(short, long)]
        offset: Option<usize>,
    },

    /// Print the number of records
    Size,

    /// Delete every record
    Clear,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let path = cli.path.clone().ok_or("store directory required (--path)")?;
    let config = StoreConfig::from_attributes(|attr| match attr {
        "name" => cli.name.clone(),
        "key" => cli.key.clone(),
        "index" => cli.index.clone(),
        _ => None,
    });
    let env = Environment::persistent(&path, EngineConfig::default())?;
    let store = Store::open(&env, config);
    debug!(store = store.name(), path = %path.display(), "store opened");

    let output = match cli.command {
        Commands::Insert { record } => commands::records::insert(&store, &record).await?,
        Commands::InsertMany { records } => {
            commands::records::insert_many(&store, &records).await?
        }
        Commands::Set { key, record } => commands::records::set(&store, &key, &record).await?,
        Commands::Get { key } => commands::records::get(&store, &key).await?,
        Commands::Remove { key } => commands::records::remove(&store, &key).await?,
        Commands::GetMany {
            orderby,
            reverse,
            start,
            end,
            count,
            offset,
        } => {
            let args = QueryArgs {
                orderby,
                reverse,
                start,
                end,
                count,
                offset,
            };
            commands::query::run(&store, args).await?
        }
        Commands::Size => commands::maintenance::size(&store).await?,
        Commands::Clear => commands::maintenance::clear(&store).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
