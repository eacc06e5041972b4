use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use crate::core::error::Result;
use crate::index::posting::{decode_triples, StagedTriple, TRIPLE_SIZE};
use crate::index::shard::shard_of;
use crate::storage::layout::StorageLayout;

const STAGING_BUFFER_SIZE: usize = 64 * 1024;

/// Per-shard append-only files of pass-2 triples on the local disk.
/// Writers are opened lazily, one per shard that receives a triple.
pub struct StagingArea {
    pub layout: StorageLayout,
    pub num_shards: u32,
    writers: HashMap<u32, BufWriter<File>>,
    triples_written: u64,
}

impl StagingArea {
    pub fn new(layout: StorageLayout, num_shards: u32) -> Result<Self> {
        fs::create_dir_all(&layout.staging_dir)?;
        Ok(StagingArea {
            layout,
            num_shards,
            writers: HashMap::new(),
            triples_written: 0,
        })
    }

    pub fn append(&mut self, triple: &StagedTriple) -> Result<()> {
        let shard = shard_of(triple.term_id, self.num_shards);
        let writer = match self.writers.get_mut(&shard) {
            Some(writer) => writer,
            None => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(self.layout.staging_file(shard))?;
                self.writers
                    .entry(shard)
                    .or_insert(BufWriter::with_capacity(STAGING_BUFFER_SIZE, file))
            }
        };

        let mut record = Vec::with_capacity(TRIPLE_SIZE);
        triple.encode_into(&mut record);
        writer.write_all(&record)?;
        self.triples_written += 1;
        Ok(())
    }

    /// Flushes and closes every open shard writer
    pub fn flush(&mut self) -> Result<()> {
        for (_, mut writer) in self.writers.drain() {
            writer.flush()?;
            writer.get_ref().sync_data()?;
        }
        Ok(())
    }

    /// Triples appended through this handle since creation or the last clear
    pub fn triples_written(&self) -> u64 {
        self.triples_written
    }

    /// Every triple staged for `shard`, in append order. A shard that never
    /// received a triple reads as empty.
    pub fn read_shard(&self, shard: u32) -> Result<Vec<StagedTriple>> {
        match fs::read(self.layout.staging_file(shard)) {
            Ok(data) => decode_triples(&data),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Drops open writers and deletes all staged triples
    pub fn clear(&mut self) -> Result<()> {
        self.writers.clear();
        for path in staged_files(&self.layout.staging_dir)? {
            fs::remove_file(path)?;
        }
        self.triples_written = 0;
        Ok(())
    }

    /// Whether any shard has staged data on disk
    pub fn has_staged_data(&self) -> Result<bool> {
        Ok(!staged_files(&self.layout.staging_dir)?.is_empty())
    }
}

fn staged_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    if !dir.exists() {
        return Ok(files);
    }
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|s| s.to_str()) == Some("dat") {
            files.push(path);
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Config;
    use crate::core::types::{DocId, TermId};

    fn staging(dir: &Path, num_shards: u32) -> StagingArea {
        let mut config = Config::with_storage_path(dir);
        config.staging_path = Some(dir.join("staging"));
        StagingArea::new(StorageLayout::new(&config), num_shards).unwrap()
    }

    fn triple(term: u32, doc: u32) -> StagedTriple {
        StagedTriple {
            term_id: TermId(term),
            doc_id: DocId(doc),
            weight: term as f32 / 10.0,
        }
    }

    #[test]
    fn routes_triples_by_term_shard() {
        let dir = tempfile::tempdir().unwrap();
        let mut area = staging(dir.path(), 3);

        for (term, doc) in [(0, 1), (4, 1), (3, 2), (1, 2)] {
            area.append(&triple(term, doc)).unwrap();
        }
        area.flush().unwrap();
        assert_eq!(area.triples_written(), 4);

        let shard0 = area.read_shard(0).unwrap();
        assert_eq!(shard0, vec![triple(0, 1), triple(3, 2)]);
        let shard1 = area.read_shard(1).unwrap();
        assert_eq!(shard1, vec![triple(4, 1), triple(1, 2)]);
        assert!(area.read_shard(2).unwrap().is_empty());
    }

    #[test]
    fn clear_removes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let mut area = staging(dir.path(), 2);
        area.append(&triple(1, 9)).unwrap();
        area.flush().unwrap();
        assert!(area.has_staged_data().unwrap());

        area.clear().unwrap();
        assert!(!area.has_staged_data().unwrap());
        assert!(area.read_shard(1).unwrap().is_empty());
        assert_eq!(area.triples_written(), 0);
    }

    #[test]
    fn torn_record_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let area = staging(dir.path(), 1);
        fs::write(area.layout.staging_file(0), [0u8; 13]).unwrap();
        assert!(area.read_shard(0).unwrap_err().is_corrupt());
    }
}
