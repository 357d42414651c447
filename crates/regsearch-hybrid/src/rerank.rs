use anyhow::{anyhow, Result};
use std::sync::Arc;
use tracing::debug;

use regsearch_core::data_processor::Corpus;
use regsearch_core::traits::{CrossEncoder, Retriever};
use regsearch_core::types::{SearchResult, SourceKind};

/// Cross-encoder pass over a candidate set.
pub struct Reranker {
    cross_encoder: Arc<dyn CrossEncoder>,
    corpus: Arc<Corpus>,
    post_expand: bool,
}

impl Reranker {
    pub fn new(cross_encoder: Arc<dyn CrossEncoder>, corpus: Arc<Corpus>, post_expand: bool) -> Self {
        Self { cross_encoder, corpus, post_expand }
    }

    /// Score every `(query, candidate)` pair, write the score back into each
    /// result and reorder by it. Equal scores keep their incoming order.
    pub fn rerank(&self, query: &str, mut results: Vec<SearchResult>) -> Result<Vec<SearchResult>> {
        if results.is_empty() { return Ok(results); }
        let pairs: Vec<(String, String)> = results.iter().map(|r| (query.to_string(), self.passage(r))).collect();
        let scores = self.cross_encoder.score(&pairs)?;
        if scores.len() != results.len() {
            return Err(anyhow!("cross-encoder returned {} scores for {} pairs", scores.len(), results.len()));
        }
        for (result, score) in results.iter_mut().zip(scores) { result.reranked_score = Some(score); }
        results.sort_by(|a, b| {
            let (sa, sb) = (a.reranked_score.unwrap_or(f32::MIN), b.reranked_score.unwrap_or(f32::MIN));
            sb.partial_cmp(&sa).unwrap_or(std::cmp::Ordering::Equal)
        });
        debug!(candidates = results.len(), model = self.cross_encoder.model_id(), "reranked");
        Ok(results)
    }

    fn passage(&self, result: &SearchResult) -> String {
        if !self.post_expand { return result.text.clone(); }
        match self.corpus.tree(&result.unit.doc_id) {
            Some(tree) => tree.expand(&result.text, &result.unit.tree_index),
            None => result.text.clone(),
        }
    }
}

/// Dense candidates reordered by a cross-encoder.
pub struct RerankedRetriever {
    dense: Arc<dyn Retriever<Hit = SearchResult>>,
    reranker: Reranker,
}

impl RerankedRetriever {
    pub fn new(dense: Arc<dyn Retriever<Hit = SearchResult>>, reranker: Reranker) -> Self { Self { dense, reranker } }
}

impl Retriever for RerankedRetriever {
    type Hit = SearchResult;

    fn kind(&self) -> SourceKind { SourceKind::Reranked }

    fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let candidates = self.dense.search(query, k)?;
        self.reranker.rerank(query, candidates)
    }
}

/// Deterministic cut applied by whoever surfaces regulation results.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreFloor {
    pub reranked: f32,
    pub similarity: f32,
}

impl Default for ScoreFloor {
    fn default() -> Self { Self { reranked: -2.0, similarity: 0.3 } }
}

impl ScoreFloor {
    pub fn keeps(&self, result: &SearchResult) -> bool {
        match result.reranked_score {
            Some(score) => score > self.reranked,
            None => result.similarity_score > self.similarity,
        }
    }

    pub fn apply(&self, results: Vec<SearchResult>) -> Vec<SearchResult> {
        results.into_iter().filter(|r| self.keeps(r)).collect()
    }
}
