//! On-disk embedding cache.
//!
//! A run directory `<root>/<hash>/` is named by the blake3 hash of the build
//! configuration and holds `config.json` plus a Lance `embeddings` table with
//! one row per flattened unit in flatten order. A different configuration
//! hashes to a different directory, so stale vectors are never reused.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use regsearch_core::data_processor::ChunkingConfig;
use regsearch_core::error::Error;
use regsearch_core::types::FlatUnit;

use crate::schema::EMBEDDINGS_TABLE;
use crate::table::{create_with_rows, open_db, read_rows, table_exists, CachedRow};

const CONFIG_FILE: &str = "config.json";
const LANCE_DIR: &str = "lance";

/// Everything that changes which vectors a build produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
	pub pre_expand: bool,
	pub similarity_model_name: String,
	pub chunking: ChunkingConfig,
}

impl CacheConfig {
	pub fn new(pre_expand: bool, similarity_model_name: impl Into<String>, chunking: ChunkingConfig) -> Self {
		Self { pre_expand, similarity_model_name: similarity_model_name.into(), chunking }
	}

	/// Deterministic directory name for this configuration.
	pub fn hash(&self) -> Result<String> {
		let bytes = serde_json::to_vec(self)?;
		Ok(blake3::hash(&bytes).to_hex()[..16].to_string())
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheRecord {
	#[serde(flatten)]
	config: CacheConfig,
	units: usize,
	created_at: DateTime<Utc>,
}

pub fn content_hash(text: &str) -> String { blake3::hash(text.as_bytes()).to_hex().to_string() }

/// Handle onto a cache root, passed explicitly to whoever builds an index.
#[derive(Debug, Clone)]
pub struct EmbeddingCache { root: PathBuf }

impl EmbeddingCache {
	pub fn new(root: impl Into<PathBuf>) -> Self { Self { root: root.into() } }

	pub fn root(&self) -> &Path { &self.root }

	pub fn run_dir(&self, config: &CacheConfig) -> Result<PathBuf> { Ok(self.root.join(config.hash()?)) }

	/// Cached vectors for `units`, or `None` when they must be regenerated.
	/// A corpus that grew or shrank regenerates; a table whose row count
	/// disagrees with its own config record is fatal.
	pub fn load(&self, config: &CacheConfig, units: &[FlatUnit]) -> Result<Option<Vec<Vec<f32>>>> {
		let dir = self.run_dir(config)?;
		let config_path = dir.join(CONFIG_FILE);
		if !config_path.exists() { debug!(dir = %dir.display(), "no cached config"); return Ok(None); }
		let record: CacheRecord = match serde_json::from_str(&fs::read_to_string(&config_path)?) {
			Ok(r) => r,
			Err(e) => { warn!("unreadable cache config {}: {}", config_path.display(), e); return Ok(None); }
		};
		if record.config != *config { warn!(dir = %dir.display(), "cache config mismatch, regenerating"); return Ok(None); }
		if record.units != units.len() {
			warn!(cached = record.units, current = units.len(), "unit count changed, regenerating");
			return Ok(None);
		}
		if units.is_empty() { return Ok(Some(Vec::new())); }

		let rows = block_on(async {
			let conn = open_db(&dir.join(LANCE_DIR).to_string_lossy()).await?;
			if !table_exists(&conn, EMBEDDINGS_TABLE).await? { return Ok::<_, anyhow::Error>(None); }
			Ok(Some(read_rows(&conn, EMBEDDINGS_TABLE).await?))
		})?;
		let Some(rows) = rows else { warn!(dir = %dir.display(), "cache table missing, regenerating"); return Ok(None); };
		if rows.len() != record.units { return Err(Error::CacheCorrupt { expected: record.units, found: rows.len() }.into()); }
		for (row, unit) in rows.iter().zip(units) {
			if row.unit_key != unit.id.to_string() || row.content_hash != content_hash(&unit.text) {
				warn!(unit = %unit.id, "cached text changed, regenerating");
				return Ok(None);
			}
		}
		info!(vectors = rows.len(), dir = %dir.display(), "loaded cached embeddings");
		Ok(Some(rows.into_iter().map(|r| r.vector).collect()))
	}

	/// Replace whatever is cached for `config` with `vectors`, then write a
	/// fresh config record.
	pub fn store(&self, config: &CacheConfig, units: &[FlatUnit], vectors: &[Vec<f32>], dim: usize) -> Result<()> {
		if units.len() != vectors.len() { return Err(Error::CacheCorrupt { expected: units.len(), found: vectors.len() }.into()); }
		let dir = self.run_dir(config)?;
		let lance_dir = dir.join(LANCE_DIR);
		if lance_dir.exists() { fs::remove_dir_all(&lance_dir)?; }
		fs::create_dir_all(&dir)?;
		if !units.is_empty() {
			let rows: Vec<CachedRow> = units.iter().zip(vectors).enumerate()
				.map(|(position, (unit, vector))| CachedRow { position, unit_key: unit.id.to_string(), content_hash: content_hash(&unit.text), vector: vector.clone() })
				.collect();
			block_on(async {
				let conn = open_db(&lance_dir.to_string_lossy()).await?;
				create_with_rows(&conn, EMBEDDINGS_TABLE, &rows, dim).await
			})?;
		}
		let record = CacheRecord { config: config.clone(), units: units.len(), created_at: Utc::now() };
		fs::write(dir.join(CONFIG_FILE), serde_json::to_string_pretty(&record)?)?;
		info!(vectors = units.len(), dir = %dir.display(), "stored embeddings");
		Ok(())
	}
}

fn block_on<T>(fut: impl std::future::Future<Output = Result<T>>) -> Result<T> {
	let rt = tokio::runtime::Runtime::new()?;
	rt.block_on(fut)
}
