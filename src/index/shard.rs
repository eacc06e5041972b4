use std::collections::HashMap;
use bytes::{Buf, BufMut};
use crate::core::error::{Error, Result};
use crate::core::types::TermId;
use crate::index::posting::POSTING_SIZE;
use crate::storage::block_store::BlockLocation;
use crate::storage::codec::{self, TableWriter};
use crate::storage::layout::StorageLayout;
use crate::storage::object_store::{read_object, write_object, ObjectStore};

const SHARD_MAGIC: &[u8; 4] = b"QDXS";

/// Shard owning `term_id`
pub fn shard_of(term_id: TermId, num_shards: u32) -> u32 {
    term_id.0 % num_shards
}

/// Where one term's posting list lives
#[derive(Debug, Clone, PartialEq)]
pub struct ShardEntry {
    pub posting_count: u32,
    pub locations: Vec<BlockLocation>,  // Fragments in read order
}

impl ShardEntry {
    pub fn byte_len(&self) -> u64 {
        self.posting_count as u64 * POSTING_SIZE as u64
    }
}

/// One shard's `term_id -> (posting_count, locations)` table
#[derive(Debug, Clone)]
pub struct ShardIndex {
    pub shard: u32,
    entries: HashMap<TermId, ShardEntry>,
}

impl ShardIndex {
    pub fn new(shard: u32) -> Self {
        ShardIndex {
            shard,
            entries: HashMap::new(),
        }
    }

    pub fn insert(&mut self, term_id: TermId, entry: ShardEntry) {
        self.entries.insert(term_id, entry);
    }

    pub fn get(&self, term_id: TermId) -> Option<&ShardEntry> {
        self.entries.get(&term_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_postings(&self) -> u64 {
        self.entries.values().map(|e| e.posting_count as u64).sum()
    }

    /// Entries in ascending term id order
    pub fn entries(&self) -> Vec<(TermId, &ShardEntry)> {
        let mut entries: Vec<(TermId, &ShardEntry)> =
            self.entries.iter().map(|(id, e)| (*id, e)).collect();
        entries.sort_by_key(|(id, _)| *id);
        entries
    }

    // [ shard: u32 ]
    // per term: [ term_id: u32 ][ posting_count: u32 ][ loc_count: u32 ]
    //           loc_count x [ file_seq: u32 ][ offset: u64 ]
    pub fn encode(&self) -> Vec<u8> {
        let mut table = TableWriter::new(SHARD_MAGIC, self.entries.len() as u64);
        table.body().put_u32(self.shard);

        for (term_id, entry) in self.entries() {
            let body = table.body();
            body.put_u32(term_id.0);
            body.put_u32(entry.posting_count);
            body.put_u32(entry.locations.len() as u32);
            for location in &entry.locations {
                body.put_u32(location.file_seq);
                body.put_u64(location.offset);
            }
        }

        table.finish()
    }

    /// Decodes and checks that every term really belongs to this shard
    pub fn decode(data: &[u8], num_shards: u32) -> Result<Self> {
        let (count, mut body) = codec::open_table(SHARD_MAGIC, data)?;
        codec::ensure_remaining(&body, 4, "shard header")?;
        let shard = body.get_u32();

        let mut entries = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            codec::ensure_remaining(&body, 12, "shard entry")?;
            let term_id = TermId(body.get_u32());
            let posting_count = body.get_u32();
            let loc_count = body.get_u32() as usize;

            if shard_of(term_id, num_shards) != shard {
                return Err(Error::corrupt(format!(
                    "term {} found in shard {}, belongs to shard {}",
                    term_id.0,
                    shard,
                    shard_of(term_id, num_shards)
                )));
            }

            codec::ensure_remaining(&body, loc_count * 12, "shard locations")?;
            let locations = (0..loc_count)
                .map(|_| BlockLocation {
                    file_seq: body.get_u32(),
                    offset: body.get_u64(),
                })
                .collect();

            entries.insert(term_id, ShardEntry { posting_count, locations });
        }
        if body.has_remaining() {
            return Err(Error::corrupt(format!("trailing bytes in shard {}", shard)));
        }

        Ok(ShardIndex { shard, entries })
    }

    pub fn save(&self, store: &dyn ObjectStore, layout: &StorageLayout) -> Result<()> {
        write_object(store, &layout.shard_index(self.shard), &self.encode())
    }

    pub fn load(
        store: &dyn ObjectStore,
        layout: &StorageLayout,
        shard: u32,
        num_shards: u32,
    ) -> Result<Self> {
        let data = read_object(store, &layout.shard_index(shard))?;
        let index = Self::decode(&data, num_shards)?;
        if index.shard != shard {
            return Err(Error::corrupt(format!(
                "{} holds shard {}",
                layout.shard_index(shard),
                index.shard
            )));
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_survives_encoding() {
        let mut index = ShardIndex::new(3);
        index.insert(TermId(3), ShardEntry {
            posting_count: 2,
            locations: vec![BlockLocation { file_seq: 0, offset: 0 }],
        });
        index.insert(TermId(11), ShardEntry {
            posting_count: 5,
            locations: vec![
                BlockLocation { file_seq: 0, offset: 16 },
                BlockLocation { file_seq: 1, offset: 0 },
            ],
        });

        let decoded = ShardIndex::decode(&index.encode(), 8).unwrap();
        assert_eq!(decoded.shard, 3);
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded.get(TermId(11)), index.get(TermId(11)));
        assert_eq!(decoded.total_postings(), 7);
        assert_eq!(decoded.get(TermId(11)).unwrap().byte_len(), 40);
    }

    #[test]
    fn misplaced_term_is_corrupt() {
        let mut index = ShardIndex::new(1);
        index.insert(TermId(2), ShardEntry { posting_count: 1, locations: vec![] });
        assert!(ShardIndex::decode(&index.encode(), 4).unwrap_err().is_corrupt());
    }
}
