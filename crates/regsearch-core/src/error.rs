use thiserror::Error;

use crate::doctree::TreeIndex;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Tree index {0} is out of range")]
    IndexOutOfRange(TreeIndex),

    /// Persisted vectors do not line up with the flattened units.
    #[error("Embedding cache is corrupt: expected {expected} vectors, found {found}")]
    CacheCorrupt { expected: usize, found: usize },

    #[error("Tool failed: {0}")]
    Tool(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
