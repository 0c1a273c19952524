//! Query command implementation.

use super::Workspace;
use docindex_core::{Condition, Query, QueryPage};
use std::path::Path;

/// Arguments of the query command.
#[derive(Debug, Clone, Default)]
pub struct QueryArgs {
    /// Target namespace.
    pub namespace: String,
    /// Parent path of the field.
    pub scope: String,
    /// Main condition, `field op value`.
    pub condition: String,
    /// Optional second bound.
    pub range: Option<String>,
    /// Shard restriction, `name=value`.
    pub shard: Option<String>,
    /// Continuation cursor.
    pub cursor: Option<String>,
    /// Page size.
    pub limit: Option<usize>,
}

impl QueryArgs {
    /// Builds the core query.
    pub fn to_query(&self) -> Result<Query, Box<dyn std::error::Error>> {
        let condition: Condition = self.condition.parse()?;
        let mut query = Query::new(self.scope.clone(), condition).cursor(self.cursor.clone());
        if let Some(range) = &self.range {
            query = query.range(range.parse()?);
        }
        if let Some(shard) = &self.shard {
            let (name, value) = shard
                .split_once('=')
                .ok_or_else(|| format!("Shard must be name=value, got {shard:?}"))?;
            query = query.shard(name, value);
        }
        query.limit = self.limit;
        Ok(query)
    }
}

/// Runs a query against an index directory.
pub fn execute(path: &Path, args: &QueryArgs) -> Result<QueryPage, Box<dyn std::error::Error>> {
    let query = args.to_query()?;
    let workspace = Workspace::open(path)?;
    Ok(workspace.service.query_keys(&args.namespace, &query)?)
}

/// Runs the query command.
pub fn run(path: &Path, args: &QueryArgs, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let page = execute(path, args)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&page)?);
        }
        _ => {
            for id in &page.ids {
                println!("{id}");
            }
            if let Some(cursor) = &page.next_cursor {
                println!("-- more results, resume with --cursor {cursor}");
            }
        }
    }
    Ok(())
}
