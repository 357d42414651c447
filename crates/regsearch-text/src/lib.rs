//! BM25 keyword index over the definitions list.
//!
//! Definitions are short and keyword-dense, so they are searched lexically
//! with tantivy rather than by dense similarity. The index lives in RAM and is
//! rebuilt once per process.

pub mod tantivy_utils;
pub mod index;

pub use index::DefinitionIndex;
