//! List command implementation.

use super::Workspace;
use docindex_core::{cursor, TablePage};
use std::path::Path;

/// Arguments of the list command.
#[derive(Debug, Clone, Default)]
pub struct ListArgs {
    /// Target namespace.
    pub namespace: String,
    /// Table name.
    pub table: String,
    /// Key prefix (raw text).
    pub prefix: Option<String>,
    /// Continuation cursor.
    pub cursor: Option<String>,
    /// Page size.
    pub limit: Option<usize>,
}

/// Lists one page of a table.
pub fn execute(path: &Path, args: &ListArgs) -> Result<TablePage, Box<dyn std::error::Error>> {
    let workspace = Workspace::open(path)?;
    Ok(workspace.service.list_table(
        &args.namespace,
        &args.table,
        args.prefix.as_deref().map(str::as_bytes),
        args.cursor.as_deref(),
        args.limit,
    )?)
}

/// Runs the list command.
pub fn run(path: &Path, args: &ListArgs, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let page = execute(path, args)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        _ => {
            println!("=== {}.{} ===", args.namespace, args.table);
            for raw in &page.entries {
                println!("{:<40} {}", cursor::encode(&raw.key), raw.entry);
            }
            println!("{} rows", page.entries.len());
            if let Some(cursor) = &page.next_cursor {
                println!("-- more rows, resume with --cursor {cursor}");
            }
        }
    }
    Ok(())
}
