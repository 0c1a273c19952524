//! CLI command implementations.

pub mod apply;
pub mod list;
pub mod query;

use docindex_core::{IndexConfig, IndexService, ServiceConfig};
use docindex_kv::{InMemoryEngine, SnapshotDir};
use std::path::Path;

/// A service loaded from a locked snapshot directory.
pub struct Workspace {
    dir: SnapshotDir,
    /// Service over the loaded engine.
    pub service: IndexService<InMemoryEngine>,
}

impl Workspace {
    /// Opens (creating if needed) an index directory and loads its snapshot.
    ///
    /// Configuration comes from the `DOCINDEX_*` environment variables.
    pub fn open(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let dir = SnapshotDir::open(path, true)?;
        let engine = dir.load()?;
        let config = ServiceConfig::new(IndexConfig::from_env());
        Ok(Self {
            dir,
            service: IndexService::with_config(engine, config),
        })
    }

    /// Writes the engine state back to the directory.
    pub fn save(&self) -> Result<(), Box<dyn std::error::Error>> {
        self.dir.save(self.service.engine())?;
        Ok(())
    }
}
