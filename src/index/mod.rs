pub mod dictionary;
pub mod doc_meta;
pub mod posting;
pub mod postings;
pub mod shard;
