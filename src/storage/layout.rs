use std::path::PathBuf;
use crate::core::config::Config;

/// Object names of the committed index, plus the local staging directory.
///
/// ```text
/// postings/00042_000.bin   block files of shard 42's posting stream
/// shards/00042.index       shard 42's term -> (count, locations) table
/// dict/terms.dict          term dictionary
/// meta/docs.meta           document titles and lengths
/// manifest.bin             written last; marks the build as queryable
/// <staging>/00042.dat      pass-2 triples for shard 42 (local only)
/// ```
#[derive(Debug, Clone)]
pub struct StorageLayout {
    pub staging_dir: PathBuf,
}

impl StorageLayout {
    pub fn new(config: &Config) -> Self {
        StorageLayout {
            staging_dir: config.staging_dir(),
        }
    }

    /// Logical block stream holding one shard's posting records
    pub fn posting_stream(&self, shard: u32) -> String {
        format!("postings/{:05}", shard)
    }

    pub fn block_file(stream: &str, seq: u32) -> String {
        format!("{}_{:03}.bin", stream, seq)
    }

    pub fn shard_index(&self, shard: u32) -> String {
        format!("shards/{:05}.index", shard)
    }

    pub fn dictionary(&self) -> String {
        "dict/terms.dict".to_string()
    }

    pub fn doc_meta(&self) -> String {
        "meta/docs.meta".to_string()
    }

    pub fn manifest(&self) -> String {
        "manifest.bin".to_string()
    }

    pub fn staging_file(&self, shard: u32) -> PathBuf {
        self.staging_dir.join(format!("{:05}.dat", shard))
    }

    pub fn lock_path(&self) -> PathBuf {
        self.staging_dir.join(".lock")
    }
}
