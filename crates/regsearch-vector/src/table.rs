//! LanceDB connection and row helpers for the embeddings table.

use anyhow::{anyhow, Result};
use arrow_array::cast::AsArray;
use arrow_array::{FixedSizeListArray, Int32Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::query::ExecutableQuery;
use lancedb::{connect, Connection};
use std::sync::Arc;

use crate::schema::build_embeddings_schema;

/// A persisted vector and the identity of the unit it encodes.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedRow {
	pub position: usize,
	pub unit_key: String,
	pub content_hash: String,
	pub vector: Vec<f32>,
}

pub async fn open_db(uri: &str) -> Result<Connection> {
	Ok(connect(uri).execute().await?)
}

pub async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
	Ok(conn.table_names().execute().await?.iter().any(|n| n == name))
}

/// Create `name` holding `rows`. The table must not exist yet.
pub async fn create_with_rows(conn: &Connection, name: &str, rows: &[CachedRow], dim: usize) -> Result<()> {
	let schema = build_embeddings_schema(dim as i32);
	let mut positions = Vec::new(); let mut keys = Vec::new(); let mut hashes = Vec::new(); let mut vectors: Vec<Option<Vec<Option<f32>>>> = Vec::new();
	for r in rows {
		if r.vector.len() != dim { return Err(anyhow!("row {} has {} dims, expected {}", r.position, r.vector.len(), dim)); }
		positions.push(r.position as i32); keys.push(r.unit_key.clone()); hashes.push(r.content_hash.clone());
		vectors.push(Some(r.vector.iter().map(|&x| Some(x)).collect()));
	}
	let batch = RecordBatch::try_new(schema.clone(), vec![
		Arc::new(Int32Array::from(positions)),
		Arc::new(StringArray::from(keys)),
		Arc::new(StringArray::from(hashes)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), dim as i32)),
	])?;
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
	conn.create_table(name, reader).execute().await?;
	Ok(())
}

/// Every row of `name`, ordered by position.
pub async fn read_rows(conn: &Connection, name: &str) -> Result<Vec<CachedRow>> {
	let t = conn.open_table(name).execute().await?;
	let mut stream = t.query().execute().await?;
	let mut rows = Vec::new();
	while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await? {
		let pos_col = batch.column_by_name("position").and_then(|c| c.as_any().downcast_ref::<Int32Array>()).ok_or_else(|| anyhow!("position column missing"))?;
		let key_col = batch.column_by_name("unit_key").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("unit_key column missing"))?;
		let hash_col = batch.column_by_name("content_hash").and_then(|c| c.as_any().downcast_ref::<StringArray>()).ok_or_else(|| anyhow!("content_hash column missing"))?;
		let vec_col = batch.column_by_name("vector").and_then(|c| c.as_any().downcast_ref::<FixedSizeListArray>()).ok_or_else(|| anyhow!("vector column missing"))?;
		for i in 0..batch.num_rows() {
			let list = vec_col.value(i);
			let vector = list.as_primitive::<arrow_array::types::Float32Type>().values().iter().copied().collect::<Vec<f32>>();
			rows.push(CachedRow { position: pos_col.value(i) as usize, unit_key: key_col.value(i).to_string(), content_hash: hash_col.value(i).to_string(), vector });
		}
	}
	rows.sort_by_key(|r| r.position);
	Ok(rows)
}
