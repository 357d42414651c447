//! Semantic (dense) index and its Lance-backed embedding cache.

pub mod cache;
pub mod schema;
pub mod search;
pub mod table;

pub use cache::{content_hash, CacheConfig, EmbeddingCache};
pub use search::{cosine, SemanticIndex};
