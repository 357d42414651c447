use arrow_schema::{Schema, Field, DataType};
use std::sync::Arc;

pub const EMBEDDINGS_TABLE: &str = "embeddings";

/// One row per flattened unit, `position` being its flatten order.
pub fn build_embeddings_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("position", DataType::Int32, false),
		Field::new("unit_key", DataType::Utf8, false),
		Field::new("content_hash", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}
