use std::sync::Arc;

use regsearch_core::config::RetrievalSettings;
use regsearch_core::data_processor::{Corpus, DataProcessor, Document};
use regsearch_core::doctree::{DocTree, Section};
use regsearch_core::traits::{CrossEncoder, Embedder};
use regsearch_core::types::DefinitionEntry;
use regsearch_embed::{FakeCrossEncoder, FakeEmbedder};
use regsearch_hybrid::{RetrievalEngine, REG_DIVIDER};
use regsearch_vector::EmbeddingCache;

const DOC: &str = "2023 Technical Regulations";

fn corpus() -> Arc<Corpus> {
    let tree = DocTree::from_section(Section::new(DOC, vec![]).with_children(vec![
        Section::new("ARTICLE 4: CAR WEIGHT", vec!["General provisions apply to every Car.".into()]).with_children(vec![
            Section::new("4.1 Weight", vec!["The minimum weight of the car is 798 kg.".into()]),
        ]),
        Section::new("ARTICLE 10: TYRES", vec!["Tyre pressure must be at least 20 psi.".into()]),
    ]));
    let definitions = vec![
        DefinitionEntry::new("\"Car\": A single-seat, open-wheel vehicle.", DOC),
        DefinitionEntry::new("\"Tyre Warmers\": Devices used to heat tyres before use.", "Glossary"),
    ];
    Arc::new(Corpus::new(vec![Document { id: DOC.into(), tree }], definitions))
}

fn settings(rerank: bool) -> RetrievalSettings {
    RetrievalSettings { top_k: 3, rerank, similarity_floor: 0.05, ..Default::default() }
}

fn engine(rerank: bool, cache_root: &std::path::Path) -> RetrievalEngine {
    let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder::new(256));
    let cross_encoder: Option<Arc<dyn CrossEncoder>> = rerank.then(|| Arc::new(FakeCrossEncoder::new()) as Arc<dyn CrossEncoder>);
    RetrievalEngine::build(corpus(), &DataProcessor::new(), embedder, cross_encoder, &EmbeddingCache::new(cache_root), &settings(rerank)).expect("engine")
}

#[test]
fn regulation_search_formats_breadcrumbs_and_context() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine(false, tmp.path());
    let formatted = engine.search_regulations("What is the minimum car weight?").expect("search");
    assert!(!formatted.is_empty());
    let top = &formatted[0];
    assert!(top.starts_with("2023 Technical Regulations Regulation: ARTICLE 4: CAR WEIGHT, 4.1 Weight\n\n"), "{top}");
    assert!(top.contains("ARTICLE 4: CAR WEIGHT\nGeneral provisions apply to every Car.\n\n**The minimum weight of the car is 798 kg.**"));
    assert!(top.ends_with('\n'));
}

#[test]
fn reranked_search_scores_and_orders_candidates() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine(true, tmp.path());
    let results = engine.compound().regulations().search("minimum car weight").expect("search");
    assert!(results.iter().all(|r| r.reranked_score.is_some_and(|s| s > -2.0)));
    assert!(results.windows(2).all(|w| w[0].reranked_score >= w[1].reranked_score));
    assert_eq!(results[0].text, "The minimum weight of the car is 798 kg.");
}

#[test]
fn definition_search_formats_source() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine(false, tmp.path());
    let defs = engine.search_definitions("What is the minimum Car weight?").expect("definitions");
    assert_eq!(defs[0], "\"Car\": A single-seat, open-wheel vehicle. (from 2023 Technical Regulations)");
}

#[test]
fn compound_search_deduplicates_definitions() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine(false, tmp.path());
    let bundle = engine.context("What is the minimum car weight?").expect("bundle");
    let car = "\"Car\": A single-seat, open-wheel vehicle. (from 2023 Technical Regulations)";
    assert_eq!(bundle.definitions.iter().filter(|d| d.as_str() == car).count(), 1);
    assert!(!bundle.regulations.is_empty());
    assert_eq!(bundle.regulations_text().matches(REG_DIVIDER).count(), bundle.regulations.len() - 1);
    let ctx = bundle.to_context(true);
    assert!(ctx.starts_with("Here are some potentially useful definitions:\n\n"));
    assert!(!bundle.to_context(false).contains("definitions:"));
}

#[test]
fn empty_corpus_searches_cleanly() {
    let tmp = tempfile::tempdir().unwrap();
    let empty = Arc::new(Corpus::default());
    let engine = RetrievalEngine::build(empty, &DataProcessor::new(), Arc::new(FakeEmbedder::new(64)), None, &EmbeddingCache::new(tmp.path()), &settings(false)).expect("engine");
    assert!(engine.search_regulations("anything").expect("search").is_empty());
    assert!(engine.search_definitions("anything").expect("search").is_empty());
    let bundle = engine.context("anything").expect("bundle");
    assert!(bundle.regulations.is_empty() && bundle.definitions.is_empty());
}
