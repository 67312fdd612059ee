//! Local sentence-embedding backend: a BERT-family model run in-process
//! with candle. Weights load once at construction; a build-time corpus is
//! embedded in a single batched forward pass.

use anyhow::{anyhow, Result as AnyResult};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use cvrag_core::error::{Error, Result};
use cvrag_core::traits::Embedder;
use std::fs;
use std::path::Path;
use tokenizers::Tokenizer;
use tracing::{debug, info};

use crate::pooling::masked_mean_l2;

const MAX_LEN: usize = 256;
const PAD_TOKEN_ID: u32 = 0;

fn select_device() -> Device {
    #[cfg(feature = "metal")]
    {
        if let Ok(dev) = Device::new_metal(0) {
            info!("embedding device: Metal");
            return dev;
        }
    }
    info!("embedding device: CPU");
    Device::Cpu
}

pub struct LocalEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dim: usize,
    id: String,
}

impl std::fmt::Debug for LocalEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalEmbedder")
            .field("device", &self.device)
            .field("dim", &self.dim)
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

impl LocalEmbedder {
    /// Load tokenizer, config and weights from `model_dir`. Weights may be
    /// `model.safetensors` or a legacy `pytorch_model.bin`.
    pub fn load(model_dir: &Path) -> Result<Self> {
        Self::load_inner(model_dir).map_err(|e| {
            Error::Configuration(format!(
                "cannot load embedding model from {}: {e}",
                model_dir.display()
            ))
        })
    }

    fn load_inner(model_dir: &Path) -> AnyResult<Self> {
        let device = select_device();
        info!("loading embedding model from {}", model_dir.display());
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("{}: {e}", tokenizer_path.display()))?;
        let config: BertConfig =
            serde_json::from_str(&fs::read_to_string(model_dir.join("config.json"))?)?;
        let dim = config.hidden_size;
        let safetensors_path = model_dir.join("model.safetensors");
        let vb = if safetensors_path.exists() {
            unsafe { VarBuilder::from_mmaped_safetensors(&[safetensors_path], DTYPE, &device)? }
        } else {
            let weights = candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?;
            let weights: std::collections::HashMap<String, Tensor> =
                weights.into_iter().collect();
            VarBuilder::from_tensors(weights, DTYPE, &device)
        };
        let model = BertModel::load(vb, &config)?;
        let name = model_dir
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "bert".to_string());
        let id = format!("local:{name}:d{dim}");
        info!("embedding model ready ({id})");
        Ok(Self { model, tokenizer, device, dim, id })
    }

    fn forward_batch(&self, texts: &[String]) -> AnyResult<Vec<Vec<f32>>> {
        let mut encoded = Vec::with_capacity(texts.len());
        let mut batch_len = 1usize;
        for text in texts {
            let enc = self
                .tokenizer
                .encode(text.as_str(), true)
                .map_err(|e| anyhow!("tokenization failed: {e}"))?;
            let mut ids = enc.get_ids().to_vec();
            let mut mask = enc.get_attention_mask().to_vec();
            if ids.len() > MAX_LEN {
                ids.truncate(MAX_LEN);
                mask.truncate(MAX_LEN);
            }
            batch_len = batch_len.max(ids.len());
            encoded.push((ids, mask));
        }

        let mut flat_ids = Vec::with_capacity(texts.len() * batch_len);
        let mut flat_mask = Vec::with_capacity(texts.len() * batch_len);
        for (ids, mask) in &encoded {
            let pad = batch_len - ids.len();
            flat_ids.extend_from_slice(ids);
            flat_ids.extend(std::iter::repeat(PAD_TOKEN_ID).take(pad));
            flat_mask.extend_from_slice(mask);
            flat_mask.extend(std::iter::repeat(0u32).take(pad));
        }

        let input_ids = Tensor::from_vec(flat_ids, (texts.len(), batch_len), &self.device)?;
        let attention_mask = Tensor::from_vec(flat_mask, (texts.len(), batch_len), &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let rows = pooled
            .to_device(&Device::Cpu)?
            .to_dtype(DType::F32)?
            .to_vec2::<f32>()?;
        Ok(rows)
    }
}

impl Embedder for LocalEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!("embedding batch of {}", texts.len());
        self.forward_batch(texts)
            .map_err(|e| Error::EmbeddingBackend(format!("local inference failed: {e}")))
    }
}
