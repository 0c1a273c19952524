//! Apply command implementation.

use super::Workspace;
use docindex_core::{ApplyStats, FieldRecord};
use std::fs;
use std::path::Path;
use tracing::info;

/// Reads field records from a JSON array file.
pub fn read_records(file: &Path) -> Result<Vec<FieldRecord>, Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(file)
        .map_err(|e| format!("Cannot read {}: {e}", file.display()))?;
    let records: Vec<FieldRecord> = serde_json::from_str(&raw)?;
    Ok(records)
}

/// Applies records to a namespace and persists the result.
pub fn execute(
    path: &Path,
    records: Vec<FieldRecord>,
    namespace: &str,
    partial: bool,
    delete: bool,
) -> Result<ApplyStats, Box<dyn std::error::Error>> {
    let workspace = Workspace::open(path)?;
    let stats = workspace
        .service
        .apply_index(namespace, records, partial, delete)?;
    if !stats.is_noop() {
        workspace.save()?;
    }
    info!(namespace, documents = stats.documents, "apply finished");
    Ok(stats)
}

/// Runs the apply command.
pub fn run(
    path: &Path,
    file: &Path,
    namespace: &str,
    partial: bool,
    delete: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = read_records(file)?;
    let stats = execute(path, records, namespace, partial, delete)?;

    println!("Documents:         {}", stats.documents);
    println!("Postings added:    {}", stats.postings_added);
    println!("Postings removed:  {}", stats.postings_removed);
    println!("Ancestors written: {}", stats.ancestors_written);
    println!("Ancestors deleted: {}", stats.ancestors_deleted);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn apply_persists_between_runs() {
        let dir = TempDir::new().unwrap();
        let records = vec![FieldRecord::new("d1", "", "name", "alice")];

        let first = execute(dir.path(), records.clone(), "acme", false, false).unwrap();
        assert_eq!(first.postings_added, 1);

        let second = execute(dir.path(), records, "acme", false, false).unwrap();
        assert!(second.is_noop());
    }

    #[test]
    fn reads_json_records() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("records.json");
        fs::write(
            &file,
            r#"[{"document_id":"d1","field_name":"city","value":"oslo",
                 "shard_keys":[{"name":"region","value":"eu"}]}]"#,
        )
        .unwrap();
        let records = read_records(&file).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].shard_keys[0].value, "eu");
    }

    #[test]
    fn invalid_records_are_reported() {
        let dir = TempDir::new().unwrap();
        let records = vec![FieldRecord::new("d1", "", "", "x")];
        assert!(execute(dir.path(), records, "acme", false, false).is_err());
    }
}
