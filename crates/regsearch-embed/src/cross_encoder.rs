use anyhow::{Result, anyhow};
use std::path::Path;

use candle_core::{Device, DType};
use candle_nn::{Linear, Module};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::info;

use regsearch_core::traits::CrossEncoder;

use crate::{device, load_weights, tokenize, words};

const BERT_PAD_ID: u32 = 0;

/// BERT with the sequence-classification head used by ms-marco cross-encoders:
/// `[CLS] -> pooler(tanh) -> classifier -> 1 logit`.
pub struct BertCrossEncoder { model: BertModel, pooler: Linear, classifier: Linear, tokenizer: Tokenizer, device: Device, model_id: String, max_len: usize }

impl BertCrossEncoder {
    pub fn load(model_dir: &Path, model_id: &str) -> Result<Self> {
        let device = device::select_device();
        info!("🔄 Loading cross-encoder {} from {}", model_id, model_dir.display());
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config: BertConfig = serde_json::from_str(&std::fs::read_to_string(model_dir.join("config.json"))?)?;
        let vb = load_weights(model_dir, &device)?;
        let model = BertModel::load(vb.clone(), &config)?;
        let pooler = candle_nn::linear(config.hidden_size, config.hidden_size, vb.pp("bert.pooler.dense"))?;
        let classifier = candle_nn::linear(config.hidden_size, 1, vb.pp("classifier"))?;
        info!("✅ cross-encoder {} loaded", model_id);
        Ok(Self { model, pooler, classifier, tokenizer, device, model_id: model_id.to_string(), max_len: 512 })
    }

    fn score_pair(&self, query: &str, passage: &str) -> Result<f32> {
        let (input_ids, token_type_ids, attention_mask) = tokenize::tokenize_pair_on_device(&self.tokenizer, query, passage, self.max_len, BERT_PAD_ID, &self.device)?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let cls = hidden.narrow(1, 0, 1)?.squeeze(1)?;
        let pooled = self.pooler.forward(&cls)?.tanh()?;
        let logits = self.classifier.forward(&pooled)?;
        let values: Vec<f32> = logits.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.flatten_all()?.to_vec1()?;
        values.first().copied().ok_or_else(|| anyhow!("cross-encoder produced no logit"))
    }
}

impl CrossEncoder for BertCrossEncoder {
    fn model_id(&self) -> &str { &self.model_id }
    fn score(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> { pairs.iter().map(|(q, p)| self.score_pair(q, p)).collect() }
}

/// Share of query words present in the passage, mapped onto `[-5, 5]`.
#[derive(Default)]
pub struct FakeCrossEncoder;

impl FakeCrossEncoder {
    pub fn new() -> Self { Self }

    pub fn score_pair(&self, query: &str, passage: &str) -> f32 {
        let passage_words: std::collections::HashSet<String> = words(passage).collect();
        let query_words: Vec<String> = words(query).collect();
        if query_words.is_empty() { return -5.0; }
        let hits = query_words.iter().filter(|w| passage_words.contains(*w)).count();
        10.0 * hits as f32 / query_words.len() as f32 - 5.0
    }
}

impl CrossEncoder for FakeCrossEncoder {
    fn model_id(&self) -> &str { "fake-cross-encoder" }
    fn score(&self, pairs: &[(String, String)]) -> Result<Vec<f32>> { Ok(pairs.iter().map(|(q, p)| self.score_pair(q, p)).collect()) }
}
