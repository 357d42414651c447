use anyhow::{anyhow, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use tracing::{debug, info};

use regsearch_core::traits::{Embedder, Retriever};
use regsearch_core::types::{FlatUnit, SearchResult, SourceKind};

use crate::cache::{CacheConfig, EmbeddingCache};

const EMBED_BATCH: usize = 32;

/// Dense index over flattened units. Vectors are aligned with `units` by position.
pub struct SemanticIndex {
	units: Vec<FlatUnit>,
	vectors: Vec<Vec<f32>>,
	embedder: Arc<dyn Embedder>,
}

impl SemanticIndex {
	/// Load vectors from `cache` when its config matches, otherwise encode every
	/// unit and write the cache before returning.
	pub fn build(units: Vec<FlatUnit>, embedder: Arc<dyn Embedder>, cache: &EmbeddingCache, config: &CacheConfig) -> Result<Self> {
		if let Some(vectors) = cache.load(config, &units)? {
			return Ok(Self { units, vectors, embedder });
		}
		info!(units = units.len(), model = embedder.model_id(), "building semantic index");
		let vectors = encode_all(embedder.as_ref(), &units)?;
		cache.store(config, &units, &vectors, embedder.dim())?;
		Ok(Self { units, vectors, embedder })
	}

	/// Encode without touching disk.
	pub fn in_memory(units: Vec<FlatUnit>, embedder: Arc<dyn Embedder>) -> Result<Self> {
		let vectors = encode_all(embedder.as_ref(), &units)?;
		Ok(Self { units, vectors, embedder })
	}

	pub fn len(&self) -> usize { self.units.len() }

	pub fn is_empty(&self) -> bool { self.units.is_empty() }

	pub fn units(&self) -> &[FlatUnit] { &self.units }

	pub fn embedder(&self) -> &dyn Embedder { self.embedder.as_ref() }

	pub fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
		if self.is_empty() || k == 0 { return Ok(Vec::new()); }
		let q = self.embedder.embed_batch(&[query.to_string()])?.into_iter().next().ok_or_else(|| anyhow!("embedder returned no vector"))?;
		Ok(self.search_vec(&q, k))
	}

	/// Top `k` by cosine similarity; equal scores keep flatten order.
	pub fn search_vec(&self, q_vec: &[f32], k: usize) -> Vec<SearchResult> {
		let mut scored: Vec<(usize, f32)> = self.vectors.iter().enumerate().map(|(i, v)| (i, cosine(q_vec, v))).collect();
		scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
		scored.truncate(k);
		debug!(hits = scored.len(), "semantic search");
		scored.into_iter().map(|(i, score)| SearchResult {
			similarity_score: score,
			unit: self.units[i].id.clone(),
			text: self.units[i].text.clone(),
			reranked_score: None,
		}).collect()
	}
}

impl Retriever for SemanticIndex {
	type Hit = SearchResult;

	fn kind(&self) -> SourceKind { SourceKind::Dense }

	fn search(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> { SemanticIndex::search(self, query, k) }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
	if na <= f32::EPSILON || nb <= f32::EPSILON { return 0.0; }
	dot / (na * nb)
}

fn encode_all(embedder: &dyn Embedder, units: &[FlatUnit]) -> Result<Vec<Vec<f32>>> {
	if units.is_empty() { return Ok(Vec::new()); }
	let pb = ProgressBar::new(units.len() as u64);
	pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} units ({percent}%) {msg}")?.progress_chars("#>-"));
	let mut vectors = Vec::with_capacity(units.len());
	for batch in units.chunks(EMBED_BATCH) {
		let texts: Vec<String> = batch.iter().map(|u| u.text.clone()).collect();
		let embs = embedder.embed_batch(&texts)?;
		if embs.len() != texts.len() { return Err(anyhow!("embedder returned {} vectors for {} texts", embs.len(), texts.len())); }
		vectors.extend(embs);
		pb.inc(batch.len() as u64);
	}
	pb.finish_with_message("✅ embeddings ready");
	Ok(vectors)
}
