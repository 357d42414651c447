use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use regsearch_core::data_processor::Corpus;
use regsearch_core::traits::Retriever;
use regsearch_core::types::{DefinitionHit, SearchResult};

use crate::context::{result_to_string, ContextBundle};
use crate::fusion::{dedup_preserving_order, phrase_definitions, reciprocal_rank_fusion};
use crate::rerank::ScoreFloor;

/// Regulations retrieved from one strategy and cut at the score floor.
pub struct RegulationSearch {
    retriever: Arc<dyn Retriever<Hit = SearchResult>>,
    floor: ScoreFloor,
    top_k: usize,
    corpus: Arc<Corpus>,
}

impl RegulationSearch {
    pub fn new(retriever: Arc<dyn Retriever<Hit = SearchResult>>, floor: ScoreFloor, top_k: usize, corpus: Arc<Corpus>) -> Self {
        Self { retriever, floor, top_k, corpus }
    }

    pub fn search(&self, query: &str) -> Result<Vec<SearchResult>> {
        info!(kind = ?self.retriever.kind(), "searching regulations: {}", preview(query));
        let results = self.floor.apply(self.retriever.search(query, self.top_k)?);
        debug!(results = results.len(), "regulation results above floor");
        Ok(results)
    }

    /// Results with breadcrumb headings and one level of context.
    pub fn search_formatted(&self, query: &str) -> Result<Vec<String>> {
        Ok(self.search(query)?.iter().map(|r| result_to_string(r, &self.corpus)).collect())
    }

    pub fn corpus(&self) -> &Corpus { &self.corpus }
}

/// Keyword lookup over definitions, formatted as `text (from source)`.
pub struct DefinitionSearch {
    retriever: Arc<dyn Retriever<Hit = DefinitionHit>>,
    k: usize,
}

impl DefinitionSearch {
    pub fn new(retriever: Arc<dyn Retriever<Hit = DefinitionHit>>, k: usize) -> Self { Self { retriever, k } }

    pub fn search(&self, query: &str) -> Result<Vec<String>> {
        debug!("searching definitions: {}", preview(query));
        Ok(self.retriever.search(query, self.k)?.into_iter().map(|h| h.entry.formatted()).collect())
    }
}

/// How many entries each definition source contributes to the bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FusionLimits {
    pub from_regulations: usize,
    pub from_query: usize,
}

impl Default for FusionLimits {
    fn default() -> Self { Self { from_regulations: 5, from_query: 2 } }
}

/// Regulation search plus the three definition strategies, fused.
pub struct CompoundSearch {
    regulations: RegulationSearch,
    definitions: DefinitionSearch,
    limits: FusionLimits,
}

impl CompoundSearch {
    pub fn new(regulations: RegulationSearch, definitions: DefinitionSearch) -> Self {
        Self { regulations, definitions, limits: FusionLimits::default() }
    }

    pub fn with_limits(mut self, limits: FusionLimits) -> Self { self.limits = limits; self }

    pub fn regulations(&self) -> &RegulationSearch { &self.regulations }

    pub fn definitions(&self) -> &DefinitionSearch { &self.definitions }

    pub fn search(&self, query: &str) -> Result<ContextBundle> {
        let regulation_results = self.regulations.search(query)?;
        let query_definitions = self.definitions.search(query)?;

        let corpus = self.regulations.corpus();
        let phrase_defs = phrase_definitions(regulation_results.iter().map(|r| r.text.as_str()), corpus.definitions());
        debug!(count = phrase_defs.len(), "phrase definitions");

        let mut per_passage = Vec::with_capacity(regulation_results.len());
        for result in &regulation_results { per_passage.push(self.definitions.search(&result.text)?); }
        let regulation_definitions = reciprocal_rank_fusion(&per_passage);
        debug!(count = regulation_definitions.len(), "regulation definitions");

        let definitions = dedup_preserving_order(
            regulation_definitions.into_iter().take(self.limits.from_regulations)
                .chain(phrase_defs)
                .chain(query_definitions.into_iter().take(self.limits.from_query)),
        );
        let regulations = regulation_results.iter().map(|r| result_to_string(r, corpus)).collect();
        Ok(ContextBundle { regulations, definitions })
    }
}

fn preview(query: &str) -> String {
    let head: String = query.chars().take(20).collect();
    if head.len() < query.len() { format!("{}...", head) } else { head }
}
