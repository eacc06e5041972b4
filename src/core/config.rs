use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::core::error::{Error, Result};

/// Which `ObjectStore` variant holds the committed index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackend {
    LocalFs,
    Memory,
}

/// Which text analysis chain turns documents and queries into terms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalyzerKind {
    Wikipedia,
    StandardEnglish,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage_path: PathBuf,
    pub staging_path: Option<PathBuf>,  // Defaults to <storage_path>/tmp
    pub backend: StorageBackend,
    pub analyzer: AnalyzerKind,

    // Index shape, fixed per build generation
    pub num_shards: u32,
    pub block_size: u64,
    pub min_doc_frequency: u32,

    // Build pipeline
    pub batch_size: usize,
    pub workers: usize,

    // Query
    pub min_doc_length: u32,
    pub max_results: usize,
    pub posting_cache_size: usize,      // 0 disables the cache
}

impl Default for Config {
    fn default() -> Self {
        Config {
            storage_path: PathBuf::from("./db"),
            staging_path: None,
            backend: StorageBackend::LocalFs,
            analyzer: AnalyzerKind::Wikipedia,

            num_shards: 1024,
            block_size: 100 * 1024 * 1024,     // 100MB per block file
            min_doc_frequency: 50,

            batch_size: 1000,
            workers: num_cpus::get(),

            min_doc_length: 100,
            max_results: 100,
            posting_cache_size: 1024,
        }
    }
}

impl Config {
    /// Config rooted at `path` with every other field at its default
    pub fn with_storage_path<P: Into<PathBuf>>(path: P) -> Self {
        Config {
            storage_path: path.into(),
            ..Config::default()
        }
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = std::fs::read(path)?;
        let config: Config = serde_json::from_slice(&data)?;
        config.validate()?;
        Ok(config)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.staging_path
            .clone()
            .unwrap_or_else(|| self.storage_path.join("tmp"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_shards == 0 {
            return Err(Error::invalid_arg("num_shards", "must be at least 1"));
        }
        if self.block_size == 0 {
            return Err(Error::invalid_arg("block_size", "must be at least 1 byte"));
        }
        if self.batch_size == 0 {
            return Err(Error::invalid_arg("batch_size", "must be at least 1"));
        }
        if self.workers == 0 {
            return Err(Error::invalid_arg("workers", "must be at least 1"));
        }
        Ok(())
    }
}
