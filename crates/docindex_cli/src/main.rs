//! docindex CLI
//!
//! Command-line tools for a docindex snapshot directory.
//!
//! # Commands
//!
//! - `apply` - Index field records read from a JSON file
//! - `query` - Find document ids matching a condition
//! - `list` - Browse a namespace table
//! - `version` - Show version information

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// docindex command-line tools.
#[derive(Parser)]
#[command(name = "docindex")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the index directory
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index field records from a JSON array file
    Apply {
        /// JSON file holding an array of field records
        file: PathBuf,

        /// Target namespace
        #[arg(short, long)]
        namespace: String,

        /// Only touch the fields named by the records
        #[arg(long)]
        partial: bool,

        /// Remove instead of index
        #[arg(long)]
        delete: bool,
    },

    /// Find document ids matching a condition
    Query {
        /// Target namespace
        #[arg(short, long)]
        namespace: String,

        /// Parent path of the queried field
        #[arg(short, long, default_value = "")]
        scope: String,

        /// Condition as "field op value" (op: eq, gt, ge, lt, le, fm)
        #[arg(short, long)]
        condition: String,

        /// Second bound on the same field, as "field op value"
        #[arg(short, long)]
        range: Option<String>,

        /// Shard restriction as name=value
        #[arg(long)]
        shard: Option<String>,

        /// Continuation cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,

        /// Page size
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Browse a namespace table (index, ancestor, scope, shard, sequence)
    List {
        /// Target namespace
        #[arg(short, long)]
        namespace: String,

        /// Table to list
        #[arg(short, long)]
        table: String,

        /// Only keys starting with this prefix
        #[arg(long)]
        prefix: Option<String>,

        /// Continuation cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,

        /// Page size
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Show version information
    Version,
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

    match cli.command {
        Commands::Apply {
            file,
            namespace,
            partial,
            delete,
        } => {
            let path = cli.path.ok_or("Index path required for apply")?;
            commands::apply::run(&path, &file, &namespace, partial, delete)?;
        }
        Commands::Query {
            namespace,
            scope,
            condition,
            range,
            shard,
            cursor,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Index path required for query")?;
            let args = commands::query::QueryArgs {
                namespace,
                scope,
                condition,
                range,
                shard,
                cursor,
                limit,
            };
            commands::query::run(&path, &args, &format)?;
        }
        Commands::List {
            namespace,
            table,
            prefix,
            cursor,
            limit,
            format,
        } => {
            let path = cli.path.ok_or("Index path required for list")?;
            let args = commands::list::ListArgs {
                namespace,
                table,
                prefix,
                cursor,
                limit,
            };
            commands::list::run(&path, &args, &format)?;
        }
        Commands::Version => {
            println!("docindex CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("docindex core v{}", docindex_core::VERSION);
        }
    }

    Ok(())
}
