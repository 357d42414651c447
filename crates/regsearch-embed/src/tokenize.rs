use anyhow::{Result, anyhow};
use candle_core::{Device, Tensor};
use tokenizers::Tokenizer;

fn pad_to(values: &mut Vec<u32>, max_len: usize, pad: u32) {
    if values.len() > max_len { values.truncate(max_len); }
    if values.len() < max_len { let n = max_len - values.len(); values.extend(std::iter::repeat(pad).take(n)); }
}

/// Single text -> `(input_ids, attention_mask)`, each `[1, max_len]`.
pub fn tokenize_on_device(tokenizer: &Tokenizer, text: &str, max_len: usize, pad_id: u32, device: &Device) -> Result<(Tensor, Tensor)> {
    let enc = tokenizer.encode(text, true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let mut ids = enc.get_ids().to_vec();
    let mut mask = enc.get_attention_mask().to_vec();
    pad_to(&mut ids, max_len, pad_id);
    pad_to(&mut mask, max_len, 0);
    let input_ids = Tensor::from_iter(ids, device)?.reshape((1, max_len))?;
    let attention_mask = Tensor::from_iter(mask, device)?.reshape((1, max_len))?;
    Ok((input_ids, attention_mask))
}

/// Sentence pair -> `(input_ids, token_type_ids, attention_mask)`, each `[1, max_len]`.
pub fn tokenize_pair_on_device(tokenizer: &Tokenizer, first: &str, second: &str, max_len: usize, pad_id: u32, device: &Device) -> Result<(Tensor, Tensor, Tensor)> {
    let enc = tokenizer.encode((first, second), true).map_err(|e| anyhow!("Tokenization failed: {}", e))?;
    let mut ids = enc.get_ids().to_vec();
    let mut type_ids = enc.get_type_ids().to_vec();
    let mut mask = enc.get_attention_mask().to_vec();
    pad_to(&mut ids, max_len, pad_id);
    pad_to(&mut type_ids, max_len, 0);
    pad_to(&mut mask, max_len, 0);
    let input_ids = Tensor::from_iter(ids, device)?.reshape((1, max_len))?;
    let token_type_ids = Tensor::from_iter(type_ids, device)?.reshape((1, max_len))?;
    let attention_mask = Tensor::from_iter(mask, device)?.reshape((1, max_len))?;
    Ok((input_ids, token_type_ids, attention_mask))
}
