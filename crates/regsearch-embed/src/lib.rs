//! Embedding and cross-encoder scorers.
//!
//! `EmbeddingModel` runs BGE-M3 (XLM-RoBERTa) through candle with masked mean
//! pooling; `BertCrossEncoder` scores (query, passage) pairs with a BERT
//! sequence-classification head. The `Fake*` variants are deterministic and
//! model-free, selected with `APP_USE_FAKE_EMBEDDINGS=1` or `models.use_fake`.

use anyhow::{Result, anyhow};
use std::path::{Path, PathBuf};
use std::time::Instant;

use candle_core::{Device, DType};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{XLMRobertaModel, Config as XLMRobertaConfig};
use tokenizers::Tokenizer;
use tracing::{info, warn};

use regsearch_core::config::ModelSettings;
use regsearch_core::traits::{CrossEncoder, Embedder};

pub mod cross_encoder;
pub mod device;
pub mod pool;
pub mod tokenize;

pub use cross_encoder::{BertCrossEncoder, FakeCrossEncoder};
pub use pool::{l2_normalize, masked_mean_l2};

const XLMR_PAD_ID: u32 = 1;
pub const FAKE_DIM: usize = 1024;

pub struct EmbeddingModel { model: XLMRobertaModel, tokenizer: Tokenizer, device: Device, model_id: String, dim: usize, max_len: usize }

impl EmbeddingModel {
    pub fn load(model_dir: &Path, model_id: &str) -> Result<Self> {
        let device = device::select_device();
        info!("🔄 Loading {} from {}", model_id, model_dir.display());
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)?;
        let vb = load_weights(model_dir, &device)?;
        let model = XLMRobertaModel::new(&config, vb)?;
        info!("✅ {} loaded (dim={})", model_id, config.hidden_size);
        Ok(Self { model, tokenizer, device, model_id: model_id.to_string(), dim: config.hidden_size, max_len: 256 })
    }

    pub fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize::tokenize_on_device(&self.tokenizer, text, self.max_len, XLMR_PAD_ID, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden_states = self.model.forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)?;
        let pooled = masked_mean_l2(&hidden_states, &attention_mask)?;
        let emb: Vec<f32> = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_dtype(DType::F32)?.to_vec1()?;
        if emb.len() != self.dim { return Err(anyhow!("expected {} dims, model produced {}", self.dim, emb.len())); }
        if start.elapsed().as_millis() > 100 { warn!("⚠️  Slow embedding ({} ms)", start.elapsed().as_millis()); }
        Ok(emb)
    }
}

impl Embedder for EmbeddingModel {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { texts.iter().map(|t| self.embed_text(t)).collect() }
}

/// Hashed bag of lowercase words. Texts sharing words land close together.
pub struct FakeEmbedder { dim: usize, model_id: String }

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self { Self { dim, model_id: format!("fake-{}", dim) } }

    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher}; use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for (i, token) in words(text).enumerate() {
            let mut hasher = XxHash64::with_seed(0); token.hash(&mut hasher); let h = hasher.finish();
            let idx = (h as usize) % self.dim; let val = 0.5 + (((h >> 32) as u32) as f32) / (u32::MAX as f32);
            v[idx] += val + (i as f32 % 3.0) * 0.01;
        }
        l2_normalize(&mut v);
        v
    }
}

impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str { &self.model_id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> { Ok(texts.iter().map(|t| self.embed_text(t)).collect()) }
}

/// Lowercased alphanumeric words; punctuation splits words.
pub(crate) fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()).map(|w| w.to_lowercase())
}

pub fn use_fake_models() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false)
}

pub fn embedder_from_settings(settings: &ModelSettings, model_id: &str) -> Result<Box<dyn Embedder>> {
    if settings.use_fake || use_fake_models() { info!("🧪 Using FakeEmbedder"); return Ok(Box::new(FakeEmbedder::new(FAKE_DIM))); }
    let dir = resolve_model_dir(settings.embed_dir.as_deref(), model_id)?;
    Ok(Box::new(EmbeddingModel::load(&dir, model_id)?))
}

pub fn cross_encoder_from_settings(settings: &ModelSettings, model_id: &str) -> Result<Box<dyn CrossEncoder>> {
    if settings.use_fake || use_fake_models() { info!("🧪 Using FakeCrossEncoder"); return Ok(Box::new(FakeCrossEncoder::new())); }
    let dir = resolve_model_dir(settings.cross_encoder_dir.as_deref(), model_id)?;
    Ok(Box::new(BertCrossEncoder::load(&dir, model_id)?))
}

/// `model.safetensors` when present, else the PyTorch pickle.
pub(crate) fn load_weights(model_dir: &Path, device: &Device) -> Result<VarBuilder<'static>> {
    let safetensors = model_dir.join("model.safetensors");
    let weights_map: std::collections::HashMap<String, candle_core::Tensor> = if safetensors.exists() {
        candle_core::safetensors::load(&safetensors, device)?
    } else {
        candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?.into_iter().collect()
    };
    Ok(VarBuilder::from_tensors(weights_map, DType::F32, device))
}

fn resolve_model_dir(configured: Option<&Path>, model_id: &str) -> Result<PathBuf> {
    if let Some(p) = configured { if p.exists() { info!("📦 Using configured model dir: {}", p.display()); return Ok(p.to_path_buf()); } }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") { let p = PathBuf::from(&dir).join(model_id); if p.exists() { info!("📦 Using APP_MODEL_DIR: {}", p.display()); return Ok(p); } }
    for root in ["models", "../models"] { let p = Path::new(root).join(model_id); if p.exists() { info!("📦 Using model dir: {}", p.display()); return Ok(p); } }
    Err(anyhow!("Could not locate model directory for {}", model_id))
}
