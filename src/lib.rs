pub mod core;
pub mod storage;
pub mod analysis;
pub mod corpus;
pub mod index;
pub mod writer;
pub mod search;

pub use crate::analysis::analyzer::Analyzer;
pub use crate::core::config::{AnalyzerKind, Config, StorageBackend};
pub use crate::core::error::{Error, ErrorKind, Result};
pub use crate::core::stats::BuildReport;
pub use crate::core::types::{DocId, DocumentRecord, TermId};
pub use crate::corpus::{Corpus, JsonLinesCorpus, VecCorpus};
pub use crate::search::engine::QueryEngine;
pub use crate::search::results::SearchHit;
pub use crate::storage::object_store::{MemoryObjectStore, ObjectStore};
pub use crate::writer::builder::{IndexBuilder, PipelineState};

/*
┌──────────────────────────────────── BUILD (single writer) ───────────────────────────────────┐
│                                                                                              │
│  Corpus ──batches──► IndexBuilder                                                            │
│                      │ pass 1: Analyzer ─► DictionaryBuilder (doc freq) + DocumentMetadata   │
│                      │ commit_dictionary: TermDictionary (df > k, ids by term order)         │
│                      │ pass 2: tf * idf ─► StagingArea  <staging>/<shard>.dat (12B triples)  │
│                      │ commit_postings (rayon, per shard):                                   │
│                      │     triples ─group by term─► BlockWriter ─► postings/<shard>_<seq>    │
│                      │                             ShardIndex   ─► shards/<shard>.index      │
│                      └ BuildManifest ─► manifest.bin (last)                                  │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── QUERY (read only) ───────────────────────────────────────┐
│                                                                                              │
│  text ─► Analyzer ─► TermDictionary::id_of ─► PostingsStore::lookup (PostingCache)           │
│                                                 │ shard = term_id % S                        │
│                                                 │ BlockReader: locations ─► 8B postings      │
│          DocumentMetadataStore (length > min) ◄─┘                                            │
│          score = sum(w) * matches / query terms ─► TopKCollector ─► Vec<SearchHit>           │
└──────────────────────────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────────────── STORAGE ─────────────────────────────────────────────────┐
│                                                                                              │
│  trait ObjectStore { open -> ReadAt, create -> SealingWrite, exists, delete }                │
│      LocalFsStore        mmap reads, <name>.partial + rename on seal                         │
│      MemoryObjectStore   objects visible once sealed                                         │
│                                                                                              │
│  tables: magic[4] | version u16 | count u64 | body | crc32                                   │
└──────────────────────────────────────────────────────────────────────────────────────────────┘
*/
