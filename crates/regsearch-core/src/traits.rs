use crate::types::SourceKind;

/// Dense text encoder. Vectors are L2-normalized and `dim()` long.
pub trait Embedder: Send + Sync {
    /// Stable identifier that participates in the cache key.
    fn model_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Pairwise (query, passage) relevance scorer. Higher is more relevant.
pub trait CrossEncoder: Send + Sync {
    fn model_id(&self) -> &str;
    fn score(&self, pairs: &[(String, String)]) -> anyhow::Result<Vec<f32>>;
}

/// The one search capability every strategy exposes.
pub trait Retriever: Send + Sync {
    type Hit;
    fn kind(&self) -> SourceKind;
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<Self::Hit>>;
}
