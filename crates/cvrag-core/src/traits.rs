use crate::error::Result;

/// Text-to-vector backend. One backend is chosen at process start and
/// never mixed with another within a single index's lifetime.
pub trait Embedder: Send + Sync + std::fmt::Debug {
    /// Stable identifier for the backend/model (e.g.
    /// `local:all-MiniLM-L6-v2:d384`), recorded with persisted indexes.
    fn id(&self) -> &str;

    /// Embedding dimensionality (D).
    fn dim(&self) -> usize;

    /// Compute embeddings for a batch of input texts: one vector per
    /// input, order preserved, every vector of length `dim()`.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
