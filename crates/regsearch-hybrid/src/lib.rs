//! Hybrid retrieval: dense, sparse and reranked strategies behind one
//! `Retriever` capability, plus definition fusion and context assembly.

pub mod context;
pub mod engine;
pub mod fusion;
pub mod rerank;
pub mod search;

pub use context::{build_context, result_to_string, results_to_string, ContextBundle, DEFINITION_DIVIDER, REG_DIVIDER};
pub use engine::RetrievalEngine;
pub use fusion::{capitalized_phrases, dedup_preserving_order, phrase_definitions, phrase_matches, reciprocal_rank_fusion, rrf_scores, RRF_K};
pub use rerank::{RerankedRetriever, Reranker, ScoreFloor};
pub use search::{CompoundSearch, DefinitionSearch, FusionLimits, RegulationSearch};
