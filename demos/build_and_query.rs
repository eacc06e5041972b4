/// Build an index from a JSON-lines corpus and run a few queries
///
/// Usage: build_and_query <corpus.jsonl | corpus_dir> [db_dir] [query...]
///
/// Set RUST_LOG=quarrydex=debug to see per-shard commit lines.

use quarrydex::{Config, IndexBuilder, JsonLinesCorpus, QueryEngine};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let corpus_path = args.next().ok_or("missing corpus path")?;
    let db_path = args.next().unwrap_or_else(|| "./db".to_string());
    let queries: Vec<String> = args.collect();

    // 1. Small corpora need a lower frequency cut than a full dump
    let mut config = Config::with_storage_path(db_path);
    config.min_doc_frequency = 1;
    config.min_doc_length = 10;

    // 2. Build both passes and commit
    let corpus = JsonLinesCorpus::open(&corpus_path)?;
    let report = {
        let mut builder = IndexBuilder::new(&config)?;
        builder.build(&corpus)?
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    // 3. Query
    let engine = QueryEngine::open(&config)?;
    let queries = if queries.is_empty() {
        vec!["castle".to_string()]
    } else {
        queries
    };
    for query in &queries {
        println!("\n> {}", query);
        for hit in engine.query(query)? {
            println!(
                "{:>10.6}  {}  {}",
                hit.score,
                hit.title.as_deref().unwrap_or("<untitled>"),
                hit.document_url()
            );
        }
    }

    Ok(())
}
