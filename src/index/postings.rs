use std::collections::BTreeMap;
use std::sync::Arc;
use rayon::prelude::*;
use tracing::debug;
use crate::core::error::{Error, Result};
use crate::core::stats::ShardCommitStats;
use crate::core::types::TermId;
use crate::index::posting::{decode_postings, encode_postings, Posting, StagedTriple};
use crate::index::shard::{shard_of, ShardEntry, ShardIndex};
use crate::storage::block_store::{BlockReader, BlockWriter};
use crate::storage::layout::StorageLayout;
use crate::storage::object_store::ObjectStore;

/// Committed postings: every shard's table in memory, posting bytes read
/// from block files on demand
pub struct PostingsStore {
    layout: StorageLayout,
    num_shards: u32,
    shards: Vec<ShardIndex>,
    reader: BlockReader,
}

impl PostingsStore {
    /// Loads all `num_shards` shard tables. A missing table is an I/O error.
    pub fn open(
        store: Arc<dyn ObjectStore>,
        layout: StorageLayout,
        num_shards: u32,
        block_size: u64,
    ) -> Result<Self> {
        let shards = (0..num_shards)
            .into_par_iter()
            .map(|shard| ShardIndex::load(store.as_ref(), &layout, shard, num_shards))
            .collect::<Result<Vec<_>>>()?;

        Ok(PostingsStore {
            layout,
            num_shards,
            shards,
            reader: BlockReader::new(store, block_size),
        })
    }

    pub fn num_shards(&self) -> u32 {
        self.num_shards
    }

    pub fn shard(&self, shard: u32) -> Option<&ShardIndex> {
        self.shards.get(shard as usize)
    }

    /// Entries of one shard in term id order; empty for an out-of-range shard
    pub fn shard_entries(&self, shard: u32) -> Vec<(TermId, &ShardEntry)> {
        self.shard(shard).map(|index| index.entries()).unwrap_or_default()
    }

    pub fn entry(&self, term_id: TermId) -> Option<&ShardEntry> {
        self.shards
            .get(shard_of(term_id, self.num_shards) as usize)
            .and_then(|index| index.get(term_id))
    }

    pub fn posting_count(&self, term_id: TermId) -> u32 {
        self.entry(term_id).map(|e| e.posting_count).unwrap_or(0)
    }

    pub fn total_postings(&self) -> u64 {
        self.shards.iter().map(|s| s.total_postings()).sum()
    }

    /// Posting list of `term_id`, in commit order; empty when the term has none
    pub fn lookup(&self, term_id: TermId) -> Result<Vec<Posting>> {
        let entry = match self.entry(term_id) {
            Some(entry) => entry,
            None => return Ok(Vec::new()),
        };

        let stream = self.layout.posting_stream(shard_of(term_id, self.num_shards));
        let data = self.reader.read(&stream, &entry.locations, entry.byte_len())?;
        decode_postings(&data, entry.posting_count)
    }

    /// Packs one shard's staged triples into block files and publishes its
    /// table. The table is written only after every block file is sealed.
    pub fn commit_shard(
        store: &Arc<dyn ObjectStore>,
        layout: &StorageLayout,
        shard: u32,
        num_shards: u32,
        block_size: u64,
        triples: Vec<StagedTriple>,
    ) -> Result<(ShardIndex, ShardCommitStats)> {
        let mut grouped: BTreeMap<TermId, Vec<Posting>> = BTreeMap::new();
        for triple in triples {
            if shard_of(triple.term_id, num_shards) != shard {
                return Err(Error::corrupt(format!(
                    "staged term {} does not belong to shard {}",
                    triple.term_id.0, shard
                )));
            }
            grouped
                .entry(triple.term_id)
                .or_default()
                .push(Posting::new(triple.doc_id, triple.weight));
        }

        let stream = layout.posting_stream(shard);
        let mut writer = BlockWriter::new(store.clone(), stream.clone(), block_size);
        let mut index = ShardIndex::new(shard);
        let mut stats = ShardCommitStats {
            shard,
            ..Default::default()
        };

        for (term_id, postings) in grouped {
            let locations = writer.write(&encode_postings(&postings))?;
            stats.terms += 1;
            stats.postings += postings.len() as u64;
            index.insert(term_id, ShardEntry {
                posting_count: postings.len() as u32,
                locations,
            });
        }

        stats.bytes_written = writer.bytes_written();
        stats.block_files = writer.finish()?;

        // Block files left over from an earlier, larger generation
        let mut seq = stats.block_files;
        loop {
            let name = StorageLayout::block_file(&stream, seq);
            if !store.exists(&name) {
                break;
            }
            store.delete(&name)?;
            seq += 1;
        }

        index.save(store.as_ref(), layout)?;
        debug!(
            shard,
            terms = stats.terms,
            postings = stats.postings,
            files = stats.block_files,
            "shard committed"
        );

        Ok((index, stats))
    }
}
