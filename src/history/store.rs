//! Named JSON logs.
//!
//! A log is a JSON array of track records stored under a plain name
//! (`SpotifyRecentTracks`). The file store keeps one `<name>.json` per log.

use std::collections::HashMap;
use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::Track;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Log I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Log '{name}' is not valid JSON: {source}")]
    Serialize {
        name: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Where new entries go in [`LogStore::append_capped`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Begin,
    End,
}

pub trait LogStore {
    /// A log that does not exist yet reads as empty.
    fn read(&self, name: &str) -> Result<Vec<Track>, StoreError>;

    fn write(&mut self, name: &str, items: &[Track]) -> Result<(), StoreError>;

    fn exists(&self, name: &str) -> bool;

    /// Copies `name` to `target`. Returns false when `name` does not exist.
    fn copy(&mut self, name: &str, target: &str) -> Result<bool, StoreError> {
        if !self.exists(name) {
            return Ok(false);
        }
        let items = self.read(name)?;
        self.write(target, &items)?;
        Ok(true)
    }

    /// Adds `items` at `position`, then keeps only the first `cap` entries.
    /// Returns the stored length. Empty input leaves the log untouched.
    fn append_capped(
        &mut self,
        name: &str,
        items: Vec<Track>,
        position: Position,
        cap: usize,
    ) -> Result<usize, StoreError> {
        let current = self.read(name)?;
        if items.is_empty() {
            return Ok(current.len());
        }
        let mut merged = match position {
            Position::Begin => {
                let mut merged = items;
                merged.extend(current);
                merged
            }
            Position::End => {
                let mut merged = current;
                merged.extend(items);
                merged
            }
        };
        merged.truncate(cap);
        self.write(name, &merged)?;
        Ok(merged.len())
    }
}

/// One JSON file per log under a directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }
}

impl LogStore for JsonFileStore {
    fn read(&self, name: &str) -> Result<Vec<Track>, StoreError> {
        let path = self.path(name);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(fs::File::open(&path)?);
        serde_json::from_reader(reader).map_err(|source| StoreError::Serialize {
            name: name.to_string(),
            source,
        })
    }

    fn write(&mut self, name: &str, items: &[Track]) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(name);
        let staging = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(fs::File::create(&staging)?);
            serde_json::to_writer(&mut writer, items).map_err(|source| StoreError::Serialize {
                name: name.to_string(),
                source,
            })?;
            writer.flush()?;
        }
        fs::rename(&staging, &path)?;
        log::debug!("Wrote {} entries to {}", items.len(), path.display());
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.path(name).exists()
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    logs: HashMap<String, Vec<Track>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LogStore for MemoryStore {
    fn read(&self, name: &str) -> Result<Vec<Track>, StoreError> {
        Ok(self.logs.get(name).cloned().unwrap_or_default())
    }

    fn write(&mut self, name: &str, items: &[Track]) -> Result<(), StoreError> {
        self.logs.insert(name.to_string(), items.to_vec());
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.logs.contains_key(name)
    }
}
