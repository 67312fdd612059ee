//! Embedding backends for the retrieval engine.
//!
//! One backend is constructed per process via [`embedder_from_config`]:
//! either the local in-process model or the remote embeddings API, decided
//! eagerly so a misconfiguration fails at startup rather than at the first
//! query. `APP_USE_FAKE_EMBEDDINGS=1` switches to the deterministic fake
//! embedder for fast tests and development.

pub mod local;
pub mod pooling;
pub mod remote;

pub use local::LocalEmbedder;
pub use remote::RemoteEmbedder;

use cvrag_core::config::{expand_path, EmbeddingConfig};
use cvrag_core::error::{Error, Result};
use cvrag_core::traits::Embedder;
use std::path::PathBuf;
use tracing::{info, warn};

/// Dimension of the fake embedder, matching the default local model.
pub const FAKE_DIM: usize = 384;

const DEFAULT_MODEL_DIR: &str = "models/all-MiniLM-L6-v2";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Local,
    Remote,
}

impl BackendKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            other => Err(Error::Configuration(format!(
                "unknown embedding backend '{other}' (expected 'local' or 'remote')"
            ))),
        }
    }
}

/// Deterministic token-hash embedder. Same input, same vector; no model
/// download, no network.
#[derive(Debug)]
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            id: format!("fake:xxhash:d{dim}"),
        }
    }
}

impl Embedder for FakeEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_embed(t, self.dim)).collect())
    }
}

fn hash_embed(text: &str, dim: usize) -> Vec<f32> {
    use std::hash::{Hash, Hasher};
    use twox_hash::XxHash64;

    let mut v = vec![0f32; dim];
    for (i, token) in text.split_whitespace().enumerate() {
        let mut hasher = XxHash64::with_seed(0);
        token.to_ascii_lowercase().hash(&mut hasher);
        let h = hasher.finish();
        let idx = (h as usize) % dim;
        let val = (((h >> 32) as u32) as f32) / (u32::MAX as f32);
        v[idx] += val + (i as f32 % 3.0) * 0.01;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
    for x in &mut v {
        *x /= norm;
    }
    v
}

pub fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Construct the embedding backend for this process.
///
/// An explicit `embedding.backend` setting is validated as-is; otherwise a
/// present local model directory wins over a configured remote credential.
/// Fails with `Error::Configuration` when the chosen backend is unusable,
/// or when no backend is.
pub fn embedder_from_config(cfg: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    if use_fake_embeddings() {
        warn!("APP_USE_FAKE_EMBEDDINGS is set; using the deterministic fake embedder");
        return Ok(Box::new(FakeEmbedder::new(FAKE_DIM)));
    }
    let kind = match cfg.backend.as_deref() {
        Some(s) => BackendKind::parse(s)?,
        None => resolve_backend(cfg)?,
    };
    match kind {
        BackendKind::Local => {
            let dir = local_model_dir(cfg).ok_or_else(|| {
                Error::Configuration(
                    "local backend selected but no model directory found (set embedding.model_dir or APP_MODEL_DIR)".to_string(),
                )
            })?;
            info!("embedding backend: local model at {}", dir.display());
            Ok(Box::new(LocalEmbedder::load(&dir)?))
        }
        BackendKind::Remote => {
            let api_key = remote_api_key(cfg).ok_or_else(|| {
                Error::Configuration(
                    "remote backend selected but no credential found (set embedding.api_key or OPENAI_API_KEY)".to_string(),
                )
            })?;
            info!("embedding backend: remote embeddings API");
            Ok(Box::new(RemoteEmbedder::new(api_key, cfg)?))
        }
    }
}

fn resolve_backend(cfg: &EmbeddingConfig) -> Result<BackendKind> {
    if local_model_dir(cfg).is_some() {
        return Ok(BackendKind::Local);
    }
    if remote_api_key(cfg).is_some() {
        return Ok(BackendKind::Remote);
    }
    Err(Error::Configuration(
        "no usable embedding backend: install a local model directory or configure an API key".to_string(),
    ))
}

fn local_model_dir(cfg: &EmbeddingConfig) -> Option<PathBuf> {
    if let Some(dir) = &cfg.model_dir {
        let p = expand_path(dir);
        if p.exists() {
            return Some(p);
        }
        return None;
    }
    if let Ok(dir) = std::env::var("APP_MODEL_DIR") {
        let p = PathBuf::from(dir);
        if p.exists() {
            return Some(p);
        }
    }
    let fallback = PathBuf::from(DEFAULT_MODEL_DIR);
    if fallback.exists() {
        return Some(fallback);
    }
    None
}

fn remote_api_key(cfg: &EmbeddingConfig) -> Option<String> {
    cfg.api_key
        .clone()
        .filter(|k| !k.is_empty())
        .or_else(|| std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()))
}
