pub mod source;

pub use source::{Batches, Corpus, DocumentIter, JsonLinesCorpus, VecCorpus};
