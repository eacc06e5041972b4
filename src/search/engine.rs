use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};
use crate::analysis::analyzer::Analyzer;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::{DocId, TermId};
use crate::index::dictionary::TermDictionary;
use crate::index::doc_meta::DocumentMetadataStore;
use crate::index::posting::Posting;
use crate::index::postings::PostingsStore;
use crate::search::cache::{CacheStats, PostingCache};
use crate::search::results::{ScoredDocument, SearchHit, TopKCollector};
use crate::storage::layout::StorageLayout;
use crate::storage::manifest::BuildManifest;
use crate::storage::object_store::{open_store, ObjectStore};

/// Read-only query side of a committed index. Loaded once, shared freely
/// across threads.
pub struct QueryEngine {
    pub config: Config,
    analyzer: Arc<Analyzer>,
    dictionary: Arc<TermDictionary>,
    doc_meta: Arc<DocumentMetadataStore>,
    postings: Arc<PostingsStore>,
    cache: PostingCache,
    manifest: BuildManifest,
}

impl QueryEngine {
    pub fn open(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = open_store(config)?;
        let analyzer = Analyzer::from_kind(config.analyzer)?;
        Self::open_with_store(config.clone(), store, analyzer)
    }

    /// Opens the index in `store`. Fails with `NotFound` until a build has
    /// written its manifest.
    pub fn open_with_store(config: Config, store: Arc<dyn ObjectStore>, analyzer: Analyzer) -> Result<Self> {
        config.validate()?;
        let layout = StorageLayout::new(&config);

        let manifest = BuildManifest::load(store.as_ref(), &layout)?.ok_or_else(|| {
            Error::new(ErrorKind::NotFound, "no committed index: manifest missing".to_string())
        })?;
        manifest.check_compatible(&config)?;

        let dictionary = TermDictionary::load(store.as_ref(), &layout)?;
        let doc_meta = DocumentMetadataStore::load(store.as_ref(), &layout)?;
        let postings = PostingsStore::open(store, layout, config.num_shards, config.block_size)?;

        info!(
            generation = %manifest.generation,
            terms = dictionary.len(),
            documents = doc_meta.len(),
            postings = postings.total_postings(),
            "index opened"
        );

        Ok(QueryEngine {
            cache: PostingCache::new(config.posting_cache_size),
            config,
            analyzer: Arc::new(analyzer),
            dictionary: Arc::new(dictionary),
            doc_meta: Arc::new(doc_meta),
            postings: Arc::new(postings),
            manifest,
        })
    }

    /// Ranked documents for `text`, best first, at most `max_results`.
    ///
    /// Every query term occurrence counts, repeats included. A document's
    /// score is the sum of its matched weights times the number of matches,
    /// divided by the number of known query terms. Documents no longer than
    /// `min_doc_length` words are skipped.
    pub fn query(&self, text: &str) -> Result<Vec<SearchHit>> {
        let term_ids: Vec<TermId> = self.analyzer
            .terms(text)
            .iter()
            .filter_map(|term| self.dictionary.id_of(term))
            .collect();
        if term_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut matches: HashMap<DocId, (f64, u32)> = HashMap::new();
        for &term_id in &term_ids {
            let postings = match self.postings_of(term_id) {
                Ok(postings) => postings,
                Err(e) if e.is_corrupt() => {
                    warn!(
                        term = self.dictionary.term_of(term_id).unwrap_or_default(),
                        term_id = term_id.0,
                        error = %e,
                        "skipping unreadable posting list"
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            for posting in postings.iter() {
                match self.doc_meta.length_of(posting.doc_id) {
                    Some(length) if length > self.config.min_doc_length => {
                        let entry = matches.entry(posting.doc_id).or_insert((0.0, 0));
                        entry.0 += posting.weight as f64;
                        entry.1 += 1;
                    }
                    _ => {}
                }
            }
        }

        let query_len = term_ids.len() as f64;
        let mut collector = TopKCollector::new(self.config.max_results);
        for (doc_id, (sum, count)) in matches {
            collector.collect(ScoredDocument {
                doc_id,
                score: sum * count as f64 / query_len,
            });
        }

        Ok(collector
            .get_results()
            .into_iter()
            .map(|scored| SearchHit {
                doc_id: scored.doc_id,
                title: self.doc_meta.title_of(scored.doc_id).map(str::to_string),
                score: scored.score,
            })
            .collect())
    }

    fn postings_of(&self, term_id: TermId) -> Result<Arc<Vec<Posting>>> {
        if let Some(postings) = self.cache.get(term_id) {
            return Ok(postings);
        }
        let postings = Arc::new(self.postings.lookup(term_id)?);
        self.cache.put(term_id, postings.clone());
        Ok(postings)
    }

    pub fn dictionary(&self) -> &Arc<TermDictionary> {
        &self.dictionary
    }

    pub fn document_metadata(&self) -> &Arc<DocumentMetadataStore> {
        &self.doc_meta
    }

    pub fn postings(&self) -> &Arc<PostingsStore> {
        &self.postings
    }

    pub fn manifest(&self) -> &BuildManifest {
        &self.manifest
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}
