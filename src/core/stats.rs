use serde::{Serialize, Deserialize};

/// Summary of one full build, returned by `IndexBuilder::commit_postings`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildReport {
    // Pass 1
    pub documents_ingested: usize,
    pub terms_observed: usize,
    pub terms_retained: usize,
    pub total_documents: u64,       // Sum of retained doc frequencies

    // Pass 2
    pub documents_weighted: usize,
    pub triples_staged: u64,

    // Commit
    pub postings_committed: u64,
    pub non_empty_shards: usize,
    pub elapsed_ms: u64,
}

/// Outcome of committing a single shard
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ShardCommitStats {
    pub shard: u32,
    pub terms: usize,
    pub postings: u64,
    pub bytes_written: u64,
    pub block_files: u32,
}
