//! Domain types shared by the retrieval engines.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::doctree::TreeIndex;

/// Identity of a flattened unit.
///
/// - `doc_id`: document title the tree is keyed by
/// - `tree_index`: section position inside the tree
/// - `paragraph_index`: paragraph position inside the section
/// - `chunk_id`: window number when a long paragraph is split
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnitId {
    pub doc_id: String,
    pub tree_index: TreeIndex,
    pub paragraph_index: usize,
    pub chunk_id: usize,
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}/p{}/c{}", self.doc_id, self.tree_index, self.paragraph_index, self.chunk_id)
    }
}

/// A retrievable unit: identity plus the text that was embedded.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatUnit {
    pub id: UnitId,
    pub text: String,
}

/// Indicates which retrieval strategy produced a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SourceKind {
    Dense,
    Sparse,
    Reranked,
}

/// A regulation hit. `reranked_score` stays `None` until a cross-encoder
/// has scored the candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub similarity_score: f32,
    pub unit: UnitId,
    pub text: String,
    pub reranked_score: Option<f32>,
}

impl SearchResult {
    pub fn is_reranked(&self) -> bool { self.reranked_score.is_some() }
}

/// A glossary/definition string and the document it came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefinitionEntry {
    pub text: String,
    pub source: String,
}

impl DefinitionEntry {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        Self { text: text.into(), source: source.into() }
    }

    /// Form handed to the language model and used as the dedup key.
    pub fn formatted(&self) -> String { format!("{} (from {})", self.text, self.source) }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DefinitionHit {
    pub entry: DefinitionEntry,
    pub score: f32,
}
