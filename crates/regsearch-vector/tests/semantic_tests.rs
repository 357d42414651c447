use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use regsearch_core::data_processor::ChunkingConfig;
use regsearch_core::doctree::TreeIndex;
use regsearch_core::error::Error;
use regsearch_core::traits::{Embedder, Retriever};
use regsearch_core::types::{FlatUnit, SourceKind, UnitId};
use regsearch_embed::FakeEmbedder;
use regsearch_vector::{CacheConfig, EmbeddingCache, SemanticIndex};

struct CountingEmbedder { inner: FakeEmbedder, texts: AtomicUsize }

impl CountingEmbedder {
    fn new() -> Self { Self { inner: FakeEmbedder::new(64), texts: AtomicUsize::new(0) } }
}

impl Embedder for CountingEmbedder {
    fn model_id(&self) -> &str { self.inner.model_id() }
    fn dim(&self) -> usize { self.inner.dim() }
    fn max_len(&self) -> usize { self.inner.max_len() }
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>> {
        self.texts.fetch_add(texts.len(), Ordering::SeqCst);
        self.inner.embed_batch(texts)
    }
}

fn unit(path: Vec<usize>, paragraph: usize, text: &str) -> FlatUnit {
    FlatUnit { id: UnitId { doc_id: "2023 Technical Regulations".into(), tree_index: TreeIndex::new(path), paragraph_index: paragraph, chunk_id: 0 }, text: text.into() }
}

fn units() -> Vec<FlatUnit> {
    vec![
        unit(vec![0], 0, "Tyre pressure must be at least 20 psi."),
        unit(vec![1, 0], 0, "The minimum weight of the car is 798 kg."),
        unit(vec![2], 0, "Drivers must attend the briefing."),
    ]
}

fn config(model: &str) -> CacheConfig { CacheConfig::new(false, model, ChunkingConfig::default()) }

#[test]
fn car_weight_query_ranks_weight_above_tyre_pressure() {
    let index = SemanticIndex::in_memory(units(), Arc::new(FakeEmbedder::new(1024))).expect("index");
    let results = index.search("What is the minimum car weight?", 3).expect("search");
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].text, "The minimum weight of the car is 798 kg.");
    let tyre = results.iter().position(|r| r.text.starts_with("Tyre")).expect("tyre unit present");
    assert!(tyre > 0);
    assert!(results.iter().all(|r| r.reranked_score.is_none()));
    assert!(results.windows(2).all(|w| w[0].similarity_score >= w[1].similarity_score));
}

#[test]
fn empty_corpus_yields_empty_results() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = EmbeddingCache::new(tmp.path());
    let index = SemanticIndex::build(Vec::new(), Arc::new(FakeEmbedder::new(64)), &cache, &config("fake-64")).expect("index");
    assert!(index.is_empty());
    assert!(index.search("anything", 5).expect("search").is_empty());
    assert_eq!(Retriever::kind(&index), SourceKind::Dense);
}

#[test]
fn equal_scores_keep_flatten_order() {
    let same = vec![unit(vec![0], 0, "identical text"), unit(vec![1], 0, "identical text"), unit(vec![2], 0, "identical text")];
    let index = SemanticIndex::in_memory(same, Arc::new(FakeEmbedder::new(64))).expect("index");
    let results = index.search("identical text", 3).expect("search");
    let order: Vec<usize> = results.iter().map(|r| r.unit.tree_index.as_slice()[0]).collect();
    assert_eq!(order, vec![0, 1, 2]);
}

#[test]
fn cache_is_reused_for_unchanged_config() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = EmbeddingCache::new(tmp.path());
    let embedder = Arc::new(CountingEmbedder::new());
    let cfg = config(embedder.model_id());

    let first = SemanticIndex::build(units(), embedder.clone(), &cache, &cfg).expect("first build");
    assert_eq!(embedder.texts.load(Ordering::SeqCst), 3);
    assert!(cache.run_dir(&cfg).unwrap().join("config.json").exists());

    let second = SemanticIndex::build(units(), embedder.clone(), &cache, &cfg).expect("second build");
    assert_eq!(embedder.texts.load(Ordering::SeqCst), 3, "no re-encoding on a cache hit");
    let a = first.search("minimum car weight", 1).unwrap();
    let b = second.search("minimum car weight", 1).unwrap();
    assert_eq!(a[0].unit, b[0].unit);
    assert!((a[0].similarity_score - b[0].similarity_score).abs() < 1e-6);
}

#[test]
fn config_change_uses_a_different_run_dir() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = EmbeddingCache::new(tmp.path());
    let plain = config("fake-64");
    let expanded = CacheConfig::new(true, "fake-64", ChunkingConfig::default());
    assert_ne!(cache.run_dir(&plain).unwrap(), cache.run_dir(&expanded).unwrap());
    assert_eq!(plain.hash().unwrap(), config("fake-64").hash().unwrap());
}

#[test]
fn changed_text_regenerates_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = EmbeddingCache::new(tmp.path());
    let embedder = Arc::new(CountingEmbedder::new());
    let cfg = config(embedder.model_id());
    SemanticIndex::build(units(), embedder.clone(), &cache, &cfg).expect("first build");

    let mut edited = units();
    edited[2].text = "Drivers must attend every briefing.".into();
    assert!(cache.load(&cfg, &edited).expect("load").is_none());
    SemanticIndex::build(edited.clone(), embedder.clone(), &cache, &cfg).expect("rebuild");
    assert_eq!(embedder.texts.load(Ordering::SeqCst), 6);
    assert!(cache.load(&cfg, &edited).expect("load").is_some());
}

#[test]
fn grown_corpus_regenerates_cache() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = EmbeddingCache::new(tmp.path());
    let embedder = Arc::new(CountingEmbedder::new());
    let cfg = config(embedder.model_id());
    SemanticIndex::build(units()[..2].to_vec(), embedder.clone(), &cache, &cfg).expect("first build");

    assert!(cache.load(&cfg, &units()).expect("load").is_none());
    let index = SemanticIndex::build(units(), embedder.clone(), &cache, &cfg).expect("rebuild");
    assert_eq!(index.len(), 3);
    assert_eq!(embedder.texts.load(Ordering::SeqCst), 5);
    assert_eq!(cache.load(&cfg, &units()).expect("load").map(|v| v.len()), Some(3));
    assert!(cache.load(&cfg, &units()[..1]).expect("load").is_none(), "shrinking regenerates too");
}

#[test]
fn vector_count_mismatch_is_fatal() {
    let tmp = tempfile::tempdir().unwrap();
    let cache = EmbeddingCache::new(tmp.path());
    let embedder = Arc::new(FakeEmbedder::new(64));
    let cfg = config(embedder.model_id());
    SemanticIndex::build(units()[..2].to_vec(), embedder.clone(), &cache, &cfg).expect("build");

    // Record claims three units while the table holds two rows.
    let record_path = cache.run_dir(&cfg).unwrap().join("config.json");
    let mut record: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&record_path).unwrap()).unwrap();
    record["units"] = serde_json::json!(3);
    std::fs::write(&record_path, record.to_string()).unwrap();

    let err = SemanticIndex::build(units(), embedder, &cache, &cfg).err().expect("count mismatch must fail");
    match err.downcast_ref::<Error>() {
        Some(Error::CacheCorrupt { expected, found }) => { assert_eq!((*expected, *found), (3, 2)); }
        other => panic!("expected CacheCorrupt, got {:?}", other),
    }
}
