use std::fs;
use std::path::Path;
use std::sync::Arc;
use quarrydex::index::shard::{shard_of, ShardEntry, ShardIndex};
use quarrydex::storage::layout::StorageLayout;
use quarrydex::{
    Analyzer, Config, DocId, DocumentRecord, ErrorKind, IndexBuilder, JsonLinesCorpus,
    MemoryObjectStore, ObjectStore, PipelineState, QueryEngine, StorageBackend, VecCorpus,
};

/// `words` followed by stopwords up to `total` whitespace-separated words
fn padded(words: &str, total: usize) -> String {
    let used = words.split_whitespace().count();
    let mut text = words.to_string();
    for _ in used..total {
        text.push_str(" the");
    }
    text
}

fn small_config(root: &Path) -> Config {
    let mut config = Config::with_storage_path(root);
    config.num_shards = 8;
    config.block_size = 64;
    config.min_doc_frequency = 0;
    config.batch_size = 2;
    config.workers = 2;
    config
}

fn castle_corpus() -> VecCorpus {
    VecCorpus::new(vec![
        DocumentRecord::new(
            1,
            "Castle A",
            &padded("castle castle castle moat tower wall gate keep stone bridge", 150),
        ),
        DocumentRecord::new(2, "Castle B", &padded("castle", 50)),
        DocumentRecord::new(3, "Valley C", &padded("river forest", 200)),
    ])
}

#[test]
fn castle_query_returns_only_long_matching_document() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    let mut builder = IndexBuilder::new(&config).unwrap();
    let report = builder.build(&castle_corpus()).unwrap();
    assert_eq!(report.documents_ingested, 3);
    drop(builder);

    let engine = QueryEngine::open(&config).unwrap();
    let hits = engine.query("castle").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, DocId(1));
    assert_eq!(hits[0].title.as_deref(), Some("Castle A"));
    assert_eq!(hits[0].document_url(), "https://en.wikipedia.org/?curid=1");

    let dict = engine.dictionary();
    let castle = dict.id_of("castle").unwrap();
    assert_eq!(dict.doc_frequency_of(castle), Some(2));
    // castle 2, seven other terms of A, river and forest of C
    assert_eq!(dict.total_documents(), 11);

    let expected = (3.0 / 10.0 * dict.idf(castle)) as f32 as f64;
    assert!((hits[0].score - expected).abs() < 1e-9);
}

#[test]
fn queries_are_deterministic_across_engines() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    IndexBuilder::new(&config).unwrap().build(&castle_corpus()).unwrap();

    let first = QueryEngine::open(&config).unwrap();
    let second = QueryEngine::open(&config).unwrap();
    for text in ["castle moat", "castle castle river", "stone bridge forest"] {
        let a = first.query(text).unwrap();
        assert_eq!(a, first.query(text).unwrap());
        assert_eq!(a, second.query(text).unwrap());
    }
}

#[test]
fn degenerate_queries_are_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    IndexBuilder::new(&config).unwrap().build(&castle_corpus()).unwrap();

    let engine = QueryEngine::open(&config).unwrap();
    assert!(engine.query("").unwrap().is_empty());
    assert!(engine.query("the which and of").unwrap().is_empty());
    assert!(engine.query("zeppelin airship").unwrap().is_empty());
}

#[test]
fn term_ids_survive_reload() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let mut builder = IndexBuilder::new(&config).unwrap();
    builder.build(&castle_corpus()).unwrap();
    let built = builder.dictionary().unwrap();
    drop(builder);

    let engine = QueryEngine::open(&config).unwrap();
    let loaded = engine.dictionary();
    assert_eq!(loaded.len(), built.len());
    for (id, info) in built.iter() {
        assert_eq!(loaded.id_of(&info.term), Some(id));
        assert_eq!(loaded.term_of(id), Some(info.term.as_str()));
    }
}

#[test]
fn every_term_lives_in_its_own_shard() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    let report = IndexBuilder::new(&config).unwrap().build(&castle_corpus()).unwrap();

    let engine = QueryEngine::open(&config).unwrap();
    let postings = engine.postings();
    let mut total = 0u64;
    for shard in 0..config.num_shards {
        for (term_id, entry) in postings.shard_entries(shard) {
            assert_eq!(shard_of(term_id, config.num_shards), shard);
            total += entry.posting_count as u64;
        }
    }
    assert_eq!(total, report.triples_staged);
    assert_eq!(total, engine.manifest().total_postings);
    assert_eq!(postings.total_postings(), total);
}

#[test]
fn memory_backend_builds_and_serves() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = small_config(dir.path());
    config.backend = StorageBackend::Memory;

    let store = MemoryObjectStore::new();
    let shared: Arc<dyn ObjectStore> = Arc::new(store.clone());
    let mut builder =
        IndexBuilder::with_store(config.clone(), shared.clone(), Analyzer::wikipedia().unwrap()).unwrap();
    builder.build(&castle_corpus()).unwrap();
    drop(builder);

    assert!(store.object_names().contains(&"manifest.bin".to_string()));
    assert!(store.object_names().iter().any(|name| name.starts_with("postings/")));

    let engine = QueryEngine::open_with_store(config, shared, Analyzer::wikipedia().unwrap()).unwrap();
    assert_eq!(engine.query("castle").unwrap()[0].doc_id, DocId(1));
}

#[test]
fn unreadable_term_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    IndexBuilder::new(&config).unwrap().build(&castle_corpus()).unwrap();

    let engine = QueryEngine::open(&config).unwrap();
    let moat = engine.dictionary().id_of("moat").unwrap();
    let baseline = engine.query("castle moat").unwrap();
    drop(engine);

    // Strip moat's locations: its postings can no longer be read in full
    let store: Arc<dyn ObjectStore> =
        Arc::new(quarrydex::storage::local_store::LocalFsStore::new(&config.storage_path).unwrap());
    let layout = StorageLayout::new(&config);
    let shard = shard_of(moat, config.num_shards);
    let mut table = ShardIndex::load(store.as_ref(), &layout, shard, config.num_shards).unwrap();
    table.insert(moat, ShardEntry { posting_count: 1, locations: vec![] });
    table.save(store.as_ref(), &layout).unwrap();

    let engine = QueryEngine::open(&config).unwrap();
    let hits = engine.query("castle moat").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, DocId(1));
    // Only castle matched now
    assert!(hits[0].score < baseline[0].score);
}

#[test]
fn pass_two_resumes_in_a_fresh_builder() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    let mut first = IndexBuilder::new(&config).unwrap();
    first.ingest_dictionary(&castle_corpus()).unwrap();
    first.commit_dictionary().unwrap();
    drop(first);

    let mut second = IndexBuilder::new(&config).unwrap();
    let err = second.commit_postings().unwrap_err();
    assert_eq!(err.kind, ErrorKind::PipelineState);

    second.load_committed_dictionary().unwrap();
    assert_eq!(second.state(), PipelineState::DictionaryCommitted);
    second.ingest_postings(&castle_corpus()).unwrap();
    let report = second.commit_postings().unwrap();
    assert_eq!(report.documents_ingested, 3);
    drop(second);

    let engine = QueryEngine::open(&config).unwrap();
    assert_eq!(engine.query("castle").unwrap().len(), 1);
}

fn rebuilt_corpus() -> VecCorpus {
    VecCorpus::new(vec![
        DocumentRecord::new(7, "Yak", &padded("yak castle", 150)),
        DocumentRecord::new(8, "Zebra", &padded("zebra aardvark", 150)),
    ])
}

#[test]
fn rebuild_hides_the_index_until_committed() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());
    IndexBuilder::new(&config).unwrap().build(&castle_corpus()).unwrap();
    assert_eq!(QueryEngine::open(&config).unwrap().query("castle").unwrap()[0].doc_id, DocId(1));

    let mut builder = IndexBuilder::new(&config).unwrap();
    builder.ingest_dictionary(&rebuilt_corpus()).unwrap();
    // Old generation still intact until the new dictionary lands
    assert!(QueryEngine::open(&config).is_ok());

    builder.commit_dictionary().unwrap();
    assert_eq!(QueryEngine::open(&config).err().unwrap().kind, ErrorKind::NotFound);
    builder.ingest_postings(&rebuilt_corpus()).unwrap();
    assert_eq!(QueryEngine::open(&config).err().unwrap().kind, ErrorKind::NotFound);

    builder.commit_postings().unwrap();
    let engine = QueryEngine::open(&config).unwrap();
    let hits = engine.query("castle").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].doc_id, DocId(7));
    assert!(engine.query("moat").unwrap().is_empty());
}

#[test]
fn staging_from_an_older_dictionary_is_never_committed() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    // Run 1 stages triples and stops before committing
    let mut first = IndexBuilder::new(&config).unwrap();
    first.ingest_dictionary(&castle_corpus()).unwrap();
    first.commit_dictionary().unwrap();
    first.ingest_postings(&castle_corpus()).unwrap();
    drop(first);

    // Run 2 commits a different dictionary
    let mut second = IndexBuilder::new(&config).unwrap();
    second.ingest_dictionary(&rebuilt_corpus()).unwrap();
    second.commit_dictionary().unwrap();
    drop(second);

    // Run 3 has nothing valid to commit without redoing pass 2
    let mut third = IndexBuilder::new(&config).unwrap();
    third.load_committed_dictionary().unwrap();
    assert_eq!(third.commit_postings().unwrap_err().kind, ErrorKind::PipelineState);
    assert_eq!(QueryEngine::open(&config).err().unwrap().kind, ErrorKind::NotFound);

    third.ingest_postings(&rebuilt_corpus()).unwrap();
    third.commit_postings().unwrap();
    drop(third);

    let engine = QueryEngine::open(&config).unwrap();
    for (text, doc) in [("castle", 7), ("yak", 7), ("zebra", 8), ("aardvark", 8)] {
        let hits = engine.query(text).unwrap();
        assert_eq!(hits.len(), 1, "{}", text);
        assert_eq!(hits[0].doc_id, DocId(doc));
    }
}

#[test]
fn query_before_manifest_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(dir.path());

    let mut builder = IndexBuilder::new(&config).unwrap();
    builder.ingest_dictionary(&castle_corpus()).unwrap();
    builder.commit_dictionary().unwrap();
    builder.ingest_postings(&castle_corpus()).unwrap();

    let err = QueryEngine::open(&config).err().unwrap();
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[test]
fn builds_from_jsonl_directory() {
    let dir = tempfile::tempdir().unwrap();
    let corpus_dir = dir.path().join("corpus");
    fs::create_dir_all(&corpus_dir).unwrap();

    let line = |id: u32, title: &str, text: &str| {
        serde_json::json!({ "id": id, "title": title, "text": text }).to_string()
    };
    fs::write(
        corpus_dir.join("part-000.jsonl"),
        format!(
            "{}\n{}\n",
            line(10, "Harbour", &padded("harbour lighthouse harbour", 120)),
            line(11, "Lighthouse", &padded("lighthouse", 130)),
        ),
    )
    .unwrap();
    fs::write(
        corpus_dir.join("part-001.jsonl"),
        format!("{}\n", line(12, "Dunes", &padded("dunes lighthouse", 140))),
    )
    .unwrap();

    let config = small_config(&dir.path().join("db"));
    let corpus = JsonLinesCorpus::open(&corpus_dir).unwrap();
    let report = IndexBuilder::new(&config).unwrap().build(&corpus).unwrap();
    assert_eq!(report.documents_ingested, 3);

    let engine = QueryEngine::open(&config).unwrap();
    let hits = engine.query("harbour").unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title.as_deref(), Some("Harbour"));
    // lighthouse appears everywhere; highest tf wins
    let hits = engine.query("lighthouse").unwrap();
    assert_eq!(hits[0].doc_id, DocId(11));
}
