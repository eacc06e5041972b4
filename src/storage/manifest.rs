use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::storage::layout::StorageLayout;
use crate::storage::object_store::{read_object, write_object, ObjectStore};

/// Written after every shard has committed. Its presence is what makes a
/// build generation queryable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildManifest {
    pub version: u32,
    pub generation: Uuid,
    pub created_at: DateTime<Utc>,
    pub num_shards: u32,
    pub block_size: u64,
    pub min_doc_frequency: u32,
    pub terms: usize,
    pub total_documents: u64,
    pub documents: usize,
    pub total_postings: u64,
}

impl BuildManifest {
    pub const VERSION: u32 = 1;

    pub fn load(store: &dyn ObjectStore, layout: &StorageLayout) -> Result<Option<Self>> {
        let name = layout.manifest();
        if !store.exists(&name) {
            return Ok(None);
        }

        let data = read_object(store, &name)?;
        let manifest: BuildManifest = bincode::deserialize(&data)
            .map_err(|e| Error::corrupt(format!("manifest: {}", e)))?;
        if manifest.version != Self::VERSION {
            return Err(Error::corrupt(format!(
                "unsupported manifest version {}",
                manifest.version
            )));
        }
        Ok(Some(manifest))
    }

    pub fn save(&self, store: &dyn ObjectStore, layout: &StorageLayout) -> Result<()> {
        let data = bincode::serialize(self)?;
        write_object(store, &layout.manifest(), &data)
    }

    /// Withdraws the published generation, if any. Must run before a rebuild
    /// overwrites the dictionary, metadata or shard tables it describes.
    /// Returns whether a manifest was removed.
    pub fn retract(store: &dyn ObjectStore, layout: &StorageLayout) -> Result<bool> {
        let name = layout.manifest();
        if !store.exists(&name) {
            return Ok(false);
        }
        store.delete(&name)?;
        Ok(true)
    }

    /// Readers must agree with the writer on shard count and block size
    pub fn check_compatible(&self, config: &Config) -> Result<()> {
        if self.num_shards != config.num_shards || self.block_size != config.block_size {
            return Err(Error::new(
                ErrorKind::InvalidState,
                format!(
                    "index built with {} shards / {} byte blocks, config has {} / {}",
                    self.num_shards, self.block_size, config.num_shards, config.block_size
                ),
            ));
        }
        Ok(())
    }
}
