use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use chrono::Utc;
use rayon::prelude::*;
use rayon::ThreadPool;
use tracing::{debug, info};
use uuid::Uuid;
use crate::analysis::analyzer::Analyzer;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::{BuildReport, ShardCommitStats};
use crate::core::types::{DocumentRecord, TermId};
use crate::corpus::{Batches, Corpus};
use crate::index::dictionary::{DictionaryBuilder, TermDictionary};
use crate::index::doc_meta::DocumentMetadataStore;
use crate::index::posting::StagedTriple;
use crate::index::postings::PostingsStore;
use crate::storage::file_lock::BuildLock;
use crate::storage::layout::StorageLayout;
use crate::storage::manifest::BuildManifest;
use crate::storage::object_store::{open_store, ObjectStore};
use crate::writer::staging::StagingArea;

/// Where the build pipeline stands. Phases only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Collecting,             // Pass 1: counting document frequencies
    DictionaryCommitted,    // Term ids frozen, pass 2 may start
    PostingsStaged,         // Pass 2 wrote triples to staging
    Committed,              // Shards and manifest published
}

/// Two-pass index build.
///
/// Pass 1 (`ingest_dictionary`) counts document frequencies and records
/// document metadata. `commit_dictionary` freezes term ids. Pass 2
/// (`ingest_postings`) stages `(term, doc, tf-idf)` triples per shard, and
/// `commit_postings` turns each shard's triples into block files plus a
/// shard table, then writes the manifest.
pub struct IndexBuilder {
    pub config: Config,
    store: Arc<dyn ObjectStore>,
    layout: StorageLayout,
    analyzer: Arc<Analyzer>,
    pool: ThreadPool,
    state: PipelineState,
    terms: DictionaryBuilder,
    dictionary: Option<Arc<TermDictionary>>,
    doc_meta: DocumentMetadataStore,
    staging: StagingArea,
    resumed: bool,              // Dictionary came from a previous process
    report: BuildReport,
    started: Instant,
    _lock: BuildLock,
}

impl IndexBuilder {
    /// Builder over the store and analyzer named by `config`
    pub fn new(config: &Config) -> Result<Self> {
        config.validate()?;
        let store = open_store(config)?;
        let analyzer = Analyzer::from_kind(config.analyzer)?;
        Self::with_store(config.clone(), store, analyzer)
    }

    /// Builder over a caller-supplied store. Takes the build lock in the
    /// staging directory; a second builder on the same directory fails.
    pub fn with_store(config: Config, store: Arc<dyn ObjectStore>, analyzer: Analyzer) -> Result<Self> {
        config.validate()?;
        let layout = StorageLayout::new(&config);
        let lock = BuildLock::acquire(&layout.lock_path())?;
        let staging = StagingArea::new(layout.clone(), config.num_shards)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.workers)
            .build()
            .map_err(|e| Error::new(ErrorKind::Internal, format!("worker pool: {}", e)))?;

        Ok(IndexBuilder {
            config,
            store,
            layout,
            analyzer: Arc::new(analyzer),
            pool,
            state: PipelineState::Collecting,
            terms: DictionaryBuilder::new(),
            dictionary: None,
            doc_meta: DocumentMetadataStore::new(),
            staging,
            resumed: false,
            report: BuildReport::default(),
            started: Instant::now(),
            _lock: lock,
        })
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }

    pub fn layout(&self) -> &StorageLayout {
        &self.layout
    }

    pub fn dictionary(&self) -> Option<Arc<TermDictionary>> {
        self.dictionary.clone()
    }

    pub fn document_metadata(&self) -> &DocumentMetadataStore {
        &self.doc_meta
    }

    /// Runs every phase over `corpus`
    pub fn build(&mut self, corpus: &dyn Corpus) -> Result<BuildReport> {
        self.ingest_dictionary(corpus)?;
        self.commit_dictionary()?;
        self.ingest_postings(corpus)?;
        self.commit_postings()
    }

    /// Pass 1. May be called repeatedly before `commit_dictionary`; returns
    /// the number of documents read by this call.
    ///
    /// A failed call discards everything pass 1 has gathered, earlier calls
    /// included, so the corpus must be ingested again from the start.
    pub fn ingest_dictionary(&mut self, corpus: &dyn Corpus) -> Result<usize> {
        if self.state != PipelineState::Collecting {
            return Err(Error::pipeline(format!(
                "dictionary pass requires Collecting, builder is {:?}",
                self.state
            )));
        }

        let result = self.collect_dictionary(corpus);
        if result.is_err() {
            self.terms = DictionaryBuilder::new();
            self.doc_meta = DocumentMetadataStore::new();
            self.report.documents_ingested = 0;
        }
        result
    }

    fn collect_dictionary(&mut self, corpus: &dyn Corpus) -> Result<usize> {
        let mut ingested = 0;
        for (batch_no, batch) in Batches::new(corpus.documents()?, self.config.batch_size).enumerate() {
            let batch = batch?;
            let analyzed = self.analyze_batch(&batch);

            for (doc, terms) in batch.into_iter().zip(analyzed) {
                self.terms.observe_document(&terms);
                let length = doc.word_count();
                self.doc_meta.put(doc.id, doc.title, length);
                ingested += 1;
            }

            info!(
                corpus = corpus.name(),
                batch = batch_no,
                documents = ingested,
                terms = self.terms.len(),
                "dictionary pass progress"
            );
        }

        self.report.documents_ingested += ingested;
        Ok(ingested)
    }

    /// Freezes term ids and persists the dictionary and document metadata
    pub fn commit_dictionary(&mut self) -> Result<Arc<TermDictionary>> {
        if self.state != PipelineState::Collecting {
            return Err(Error::pipeline(format!(
                "dictionary already committed, builder is {:?}",
                self.state
            )));
        }

        // The dictionary, metadata and staged triples below all belong to a
        // new generation; the old one stops being queryable first.
        if BuildManifest::retract(self.store.as_ref(), &self.layout)? {
            info!("retracted previous index generation");
        }
        self.staging.clear()?;

        let builder = std::mem::take(&mut self.terms);
        let observed = builder.len();
        let documents = builder.documents_observed();
        let dictionary = Arc::new(builder.commit(self.config.min_doc_frequency));
        dictionary.save(self.store.as_ref(), &self.layout)?;
        self.doc_meta.save(self.store.as_ref(), &self.layout)?;

        self.report.terms_observed = observed;
        self.report.terms_retained = dictionary.len();
        self.report.total_documents = dictionary.total_documents();
        info!(
            observed,
            retained = dictionary.len(),
            min_doc_frequency = self.config.min_doc_frequency,
            documents,
            "dictionary committed"
        );

        self.dictionary = Some(dictionary.clone());
        self.state = PipelineState::DictionaryCommitted;
        Ok(dictionary)
    }

    /// Picks up a dictionary and document metadata persisted by an earlier
    /// builder, so pass 2 and the commit can run in a fresh process
    pub fn load_committed_dictionary(&mut self) -> Result<Arc<TermDictionary>> {
        if self.state != PipelineState::Collecting {
            return Err(Error::pipeline(format!(
                "cannot load a dictionary, builder is {:?}",
                self.state
            )));
        }

        let dictionary = Arc::new(TermDictionary::load(self.store.as_ref(), &self.layout)?);
        self.doc_meta = DocumentMetadataStore::load(self.store.as_ref(), &self.layout)?;

        self.report.documents_ingested = self.doc_meta.len();
        self.report.terms_retained = dictionary.len();
        self.report.total_documents = dictionary.total_documents();
        info!(
            terms = dictionary.len(),
            documents = self.doc_meta.len(),
            "loaded committed dictionary"
        );

        self.dictionary = Some(dictionary.clone());
        self.resumed = true;
        self.state = PipelineState::DictionaryCommitted;
        Ok(dictionary)
    }

    /// Pass 2. The first call clears whatever an earlier run left in
    /// staging; later calls append. Returns the triples staged by this call.
    pub fn ingest_postings(&mut self, corpus: &dyn Corpus) -> Result<u64> {
        let dictionary = match (self.state, &self.dictionary) {
            (PipelineState::DictionaryCommitted, Some(dict))
            | (PipelineState::PostingsStaged, Some(dict)) => dict.clone(),
            _ => {
                return Err(Error::pipeline(format!(
                    "postings pass requires a committed dictionary, builder is {:?}",
                    self.state
                )));
            }
        };

        if self.state == PipelineState::DictionaryCommitted {
            self.staging.clear()?;
        }
        // From here on staging holds this run's triples
        self.state = PipelineState::PostingsStaged;

        let staged_before = self.staging.triples_written();
        let mut weighted = 0;
        for (batch_no, batch) in Batches::new(corpus.documents()?, self.config.batch_size).enumerate() {
            let batch = batch?;
            let triples: Vec<Vec<StagedTriple>> = self.pool.install(|| {
                batch
                    .par_iter()
                    .map(|doc| weigh_document(doc, &self.analyzer, &dictionary))
                    .collect()
            });

            for doc_triples in &triples {
                if !doc_triples.is_empty() {
                    weighted += 1;
                }
                for triple in doc_triples {
                    self.staging.append(triple)?;
                }
            }

            info!(
                batch = batch_no,
                documents = weighted,
                triples = self.staging.triples_written() - staged_before,
                "postings pass progress"
            );
        }
        self.staging.flush()?;

        let staged = self.staging.triples_written() - staged_before;
        self.report.documents_weighted += weighted;
        self.report.triples_staged += staged;
        Ok(staged)
    }

    /// Commits every shard in parallel, removes staging, writes the manifest
    pub fn commit_postings(&mut self) -> Result<BuildReport> {
        let ready = match self.state {
            PipelineState::PostingsStaged => true,
            PipelineState::DictionaryCommitted => self.resumed && self.staging.has_staged_data()?,
            _ => false,
        };
        let dictionary = match (&self.dictionary, ready) {
            (Some(dict), true) => dict.clone(),
            _ => {
                return Err(Error::pipeline(format!(
                    "commit requires staged postings, builder is {:?}",
                    self.state
                )));
            }
        };
        self.staging.flush()?;
        // Shards are rewritten in place below
        if BuildManifest::retract(self.store.as_ref(), &self.layout)? {
            info!("retracted previous index generation");
        }

        let store = self.store.clone();
        let layout = &self.layout;
        let staging = &self.staging;
        let num_shards = self.config.num_shards;
        let block_size = self.config.block_size;

        let shard_stats: Vec<ShardCommitStats> = self.pool.install(|| {
            (0..num_shards)
                .into_par_iter()
                .map(|shard| {
                    let triples = staging.read_shard(shard)?;
                    let (_, stats) = PostingsStore::commit_shard(
                        &store, layout, shard, num_shards, block_size, triples,
                    )?;
                    Ok(stats)
                })
                .collect::<Result<Vec<_>>>()
        })?;

        let postings: u64 = shard_stats.iter().map(|s| s.postings).sum();
        let non_empty = shard_stats.iter().filter(|s| s.terms > 0).count();
        let bytes: u64 = shard_stats.iter().map(|s| s.bytes_written).sum();
        debug!(shards = num_shards, bytes, "all shards committed");

        self.staging.clear()?;

        let manifest = BuildManifest {
            version: BuildManifest::VERSION,
            generation: Uuid::new_v4(),
            created_at: Utc::now(),
            num_shards,
            block_size,
            min_doc_frequency: self.config.min_doc_frequency,
            terms: dictionary.len(),
            total_documents: dictionary.total_documents(),
            documents: self.doc_meta.len(),
            total_postings: postings,
        };
        manifest.save(self.store.as_ref(), &self.layout)?;

        self.report.postings_committed = postings;
        self.report.non_empty_shards = non_empty;
        self.report.elapsed_ms = self.started.elapsed().as_millis() as u64;
        self.state = PipelineState::Committed;

        info!(
            generation = %manifest.generation,
            postings,
            non_empty_shards = non_empty,
            elapsed_ms = self.report.elapsed_ms,
            "index committed"
        );
        Ok(self.report.clone())
    }

    fn analyze_batch(&self, batch: &[DocumentRecord]) -> Vec<Vec<String>> {
        let analyzer = &self.analyzer;
        self.pool.install(|| batch.par_iter().map(|doc| analyzer.terms(&doc.text)).collect())
    }
}

/// TF-IDF triples for one document. tf is the term's share of the
/// document's known tokens; a document with none produces nothing.
fn weigh_document(doc: &DocumentRecord, analyzer: &Analyzer, dictionary: &TermDictionary) -> Vec<StagedTriple> {
    let mut counts: BTreeMap<TermId, u32> = BTreeMap::new();
    let mut known = 0u32;
    for term in analyzer.terms(&doc.text) {
        if let Some(id) = dictionary.id_of(&term) {
            *counts.entry(id).or_insert(0) += 1;
            known += 1;
        }
    }
    if known == 0 {
        return Vec::new();
    }

    counts
        .into_iter()
        .map(|(term_id, count)| {
            let tf = count as f64 / known as f64;
            StagedTriple {
                term_id,
                doc_id: doc.id,
                weight: (tf * dictionary.idf(term_id)) as f32,
            }
        })
        .collect()
}
