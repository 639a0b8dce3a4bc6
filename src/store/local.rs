use crate::error::StoreError;
use crate::models::Listing;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default CSV file name, as the scraper has always written it
pub const DEFAULT_CSV: &str = "real.csv";

/// Flat CSV file holding every listing seen so far
#[derive(Debug, Clone)]
pub struct LocalTable {
    path: PathBuf,
}

impl LocalTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored rows; a missing file is an empty table
    pub fn load(&self) -> Result<Vec<Listing>, StoreError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let mut reader = csv::Reader::from_path(&self.path)?;
        let rows = reader
            .deserialize()
            .collect::<Result<Vec<Listing>, csv::Error>>()?;

        debug!(path = %self.path.display(), rows = rows.len(), "Loaded local table");
        Ok(rows)
    }

    /// Rewrite the whole file with `rows`, header included
    pub fn save(&self, rows: &[Listing]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut writer = csv::Writer::from_path(&self.path)?;
        for row in rows {
            writer.serialize(row)?;
        }
        writer.flush()?;

        debug!(path = %self.path.display(), rows = rows.len(), "Saved local table");
        Ok(())
    }
}
