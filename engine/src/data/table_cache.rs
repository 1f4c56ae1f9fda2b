// Memoized table loads, keyed by file name and content hash, so repeated
// filter changes never re-parse an unchanged upload.
use sha2::{Digest, Sha256};
use shared::models::Table;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use super::table_loader::TableLoader;
use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub file_name: String,
    pub digest: String,
}

impl CacheKey {
    pub fn new(file_name: &str, bytes: &[u8]) -> Self {
        CacheKey {
            file_name: file_name.to_string(),
            digest: hex::encode(Sha256::digest(bytes)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct TableCache {
    loader: TableLoader,
    entries: HashMap<CacheKey, Arc<Table>>,
    stats: CacheStats,
}

impl TableCache {
    pub fn new(loader: TableLoader) -> Self {
        TableCache {
            loader,
            entries: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    // Failed loads are not cached; the next call retries the parse.
    pub fn load(&mut self, file_name: &str, bytes: &[u8]) -> Result<Arc<Table>, LoadError> {
        let key = CacheKey::new(file_name, bytes);
        if let Some(table) = self.entries.get(&key) {
            self.stats.hits += 1;
            tracing::debug!(file = %file_name, digest = %key.digest, "Table cache hit");
            return Ok(Arc::clone(table));
        }

        self.stats.misses += 1;
        tracing::debug!(file = %file_name, digest = %key.digest, "Table cache miss, parsing");
        let table = match self.loader.load_bytes(file_name, bytes) {
            Ok(table) => Arc::new(table),
            Err(err) => {
                tracing::error!(file = %err.file(), error = %err, "Failed to load table");
                return Err(err);
            }
        };
        self.entries.insert(key, Arc::clone(&table));
        Ok(table)
    }

    pub fn load_path(&mut self, path: &Path) -> Result<Arc<Table>, LoadError> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let bytes = std::fs::read(path).map_err(|source| {
            tracing::error!(file = %file_name, error = %source, "Failed to read table file");
            LoadError::Io {
                file: file_name.clone(),
                source,
            }
        })?;
        self.load(&file_name, &bytes)
    }

    // Drops every cached version of a file. Returns how many entries went away.
    pub fn invalidate(&mut self, file_name: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| key.file_name != file_name);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(file = %file_name, removed, "Invalidated cached tables");
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }
}

impl Default for TableCache {
    fn default() -> Self {
        Self::new(TableLoader::default())
    }
}
