use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use regsearch_core::config::{RetrievalSettings, Settings};
use regsearch_core::data_processor::{Corpus, DataProcessor};
use regsearch_core::traits::{CrossEncoder, Embedder, Retriever};
use regsearch_core::types::SearchResult;
use regsearch_embed::{cross_encoder_from_settings, embedder_from_settings};
use regsearch_text::DefinitionIndex;
use regsearch_vector::{CacheConfig, EmbeddingCache, SemanticIndex};

use crate::context::ContextBundle;
use crate::rerank::{RerankedRetriever, Reranker, ScoreFloor};
use crate::search::{CompoundSearch, DefinitionSearch, RegulationSearch};

/// The index set for one corpus and configuration. Immutable once built.
pub struct RetrievalEngine {
    corpus: Arc<Corpus>,
    semantic: Arc<SemanticIndex>,
    keyword: Arc<DefinitionIndex>,
    compound: CompoundSearch,
}

impl RetrievalEngine {
    /// Load the corpus and models named by `settings`, then build every index.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let processor = DataProcessor::with_chunking(settings.chunking.clone());
        let corpus = Arc::new(processor.load_corpus(&settings.corpus)?);
        let embedder: Arc<dyn Embedder> = Arc::from(embedder_from_settings(&settings.models, &settings.retrieval.similarity_model)?);
        let cross_encoder: Option<Arc<dyn CrossEncoder>> = if settings.retrieval.rerank {
            Some(Arc::from(cross_encoder_from_settings(&settings.models, &settings.retrieval.cross_encoder)?))
        } else {
            None
        };
        let cache = EmbeddingCache::new(&settings.retrieval.cache_dir);
        Self::build(corpus, &processor, embedder, cross_encoder, &cache, &settings.retrieval)
    }

    pub fn build(
        corpus: Arc<Corpus>,
        processor: &DataProcessor,
        embedder: Arc<dyn Embedder>,
        cross_encoder: Option<Arc<dyn CrossEncoder>>,
        cache: &EmbeddingCache,
        retrieval: &RetrievalSettings,
    ) -> Result<Self> {
        let units = processor.units(&corpus, retrieval.pre_expand);
        let config = CacheConfig::new(retrieval.pre_expand, embedder.model_id(), processor.chunking().clone());
        let semantic = Arc::new(SemanticIndex::build(units, embedder, cache, &config)?);
        let keyword = Arc::new(DefinitionIndex::build(corpus.definitions().to_vec())?);

        let regulation_retriever: Arc<dyn Retriever<Hit = SearchResult>> = match cross_encoder {
            Some(cross_encoder) => {
                let reranker = Reranker::new(cross_encoder, corpus.clone(), retrieval.post_expand);
                Arc::new(RerankedRetriever::new(semantic.clone(), reranker))
            }
            None => semantic.clone(),
        };
        let floor = ScoreFloor { reranked: retrieval.rerank_floor, similarity: retrieval.similarity_floor };
        let regulations = RegulationSearch::new(regulation_retriever, floor, retrieval.top_k, corpus.clone());
        let definitions = DefinitionSearch::new(keyword.clone(), retrieval.definitions_k);
        info!(units = semantic.len(), definitions = keyword.len(), "retrieval engine ready");
        Ok(Self { corpus, semantic, keyword, compound: CompoundSearch::new(regulations, definitions) })
    }

    pub fn corpus(&self) -> &Corpus { &self.corpus }

    pub fn semantic(&self) -> &SemanticIndex { &self.semantic }

    pub fn keyword(&self) -> &DefinitionIndex { &self.keyword }

    pub fn compound(&self) -> &CompoundSearch { &self.compound }

    pub fn search_regulations(&self, query: &str) -> Result<Vec<String>> { self.compound.regulations().search_formatted(query) }

    pub fn search_definitions(&self, query: &str) -> Result<Vec<String>> { self.compound.definitions().search(query) }

    pub fn context(&self, query: &str) -> Result<ContextBundle> { self.compound.search(query) }
}
