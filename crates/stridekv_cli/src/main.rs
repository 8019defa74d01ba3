//! StrideKV CLI
//!
//! Command-line access to a StrideKV database.
//!
//! # Commands
//!
//! - `put` / `get` / `delete` - Batch point operations
//! - `scan` - Ordered range listing
//! - `size` - Range size estimates
//! - `collection` - Create, list and drop named collections
//! - `control` - Administrative commands (`clear`, `reset`, `compact`, `info`, `usage`)

mod commands;

use clap::{Parser, Subcommand};
use commands::{Format, Target};
use std::path::PathBuf;
use stridekv_core::Key;
use tracing_subscriber::EnvFilter;

/// StrideKV command-line database tools.
#[derive(Parser)]
#[command(name = "stridekv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a journaled database (in-memory if omitted)
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Full JSON configuration, overriding --path
    #[arg(global = true, long)]
    config: Option<String>,

    /// Collection to operate on (default collection if omitted)
    #[arg(global = true, short = 'C', long, default_value = "")]
    collection: String,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store values, given as KEY=VALUE pairs, in one atomic batch
    Put {
        /// Pairs to store
        #[arg(required = true)]
        pairs: Vec<String>,

        /// Force the batch to durable media
        #[arg(long)]
        flush: bool,
    },

    /// Look up keys
    Get {
        /// Keys to read
        #[arg(required = true, allow_negative_numbers = true)]
        keys: Vec<Key>,

        /// Report lengths instead of values
        #[arg(short, long)]
        lengths: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Delete keys in one atomic batch
    Delete {
        /// Keys to delete
        #[arg(required = true, allow_negative_numbers = true)]
        keys: Vec<Key>,
    },

    /// List keys in ascending order
    Scan {
        /// Smallest key to include
        #[arg(long, default_value_t = Key::MIN, allow_negative_numbers = true)]
        from: Key,

        /// Maximum number of keys
        #[arg(short = 'n', long, default_value_t = 100)]
        limit: u32,

        /// Report value lengths
        #[arg(short, long)]
        lengths: bool,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Estimate the size of a key range
    Size {
        /// Inclusive lower bound
        #[arg(long, default_value_t = Key::MIN, allow_negative_numbers = true)]
        from: Key,

        /// Exclusive upper bound
        #[arg(long, default_value_t = Key::MAX, allow_negative_numbers = true)]
        to: Key,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Manage named collections
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Run an administrative command
    Control {
        /// One of clear, reset, compact, info, usage
        request: String,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum CollectionAction {
    /// List named collections
    List,
    /// Create a collection if it does not exist
    Create {
        /// Collection name
        name: String,
    },
    /// Drop a collection and its contents
    Drop {
        /// Collection name
        name: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Commands::Version = cli.command {
        println!("StrideKV CLI v{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let db = commands::open(cli.config.as_deref(), cli.path.as_deref())?;
    let target = Target::new(&db, &cli.collection);
    let mut out = std::io::stdout().lock();

    match cli.command {
        Commands::Put { pairs, flush } => commands::kv::put(&target, &pairs, flush, &mut out)?,
        Commands::Get {
            keys,
            lengths,
            format,
        } => commands::kv::get(&target, &keys, lengths, format, &mut out)?,
        Commands::Delete { keys } => commands::kv::delete(&target, &keys, &mut out)?,
        Commands::Scan {
            from,
            limit,
            lengths,
            format,
        } => commands::range::scan(&target, from, limit, lengths, format, &mut out)?,
        Commands::Size { from, to, format } => {
            commands::range::size(&target, from, to, format, &mut out)?;
        }
        Commands::Collection { action } => match action {
            CollectionAction::List => commands::admin::list(&db, &mut out)?,
            CollectionAction::Create { name } => commands::admin::create(&db, &name, &mut out)?,
            CollectionAction::Drop { name } => commands::admin::remove(&db, &name, &mut out)?,
        },
        Commands::Control { request } => commands::admin::control(&db, &request, &mut out)?,
        Commands::Version => {}
    }

    db.close()?;
    Ok(())
}
