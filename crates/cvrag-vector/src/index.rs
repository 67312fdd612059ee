//! Exact nearest-neighbor index over embedding vectors.

use cvrag_core::error::{Error, Result};
use cvrag_core::types::Chunk;

/// Vectors plus their chunks in one insertion order; the position of an
/// entry is its implicit id. Populated once via [`VectorIndex::build`],
/// never mutated afterwards — a rebuild replaces the whole index.
pub struct VectorIndex {
    dim: usize,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<Chunk>,
}

impl VectorIndex {
    /// Initialize from parallel vectors and chunks. Empty input, a length
    /// mismatch, or a vector of the wrong dimension is a `Validation`
    /// error; nothing is constructed in that case.
    pub fn build(dim: usize, vectors: Vec<Vec<f32>>, chunks: Vec<Chunk>) -> Result<Self> {
        if vectors.is_empty() {
            return Err(Error::Validation(
                "cannot build an index from zero vectors".to_string(),
            ));
        }
        if vectors.len() != chunks.len() {
            return Err(Error::Validation(format!(
                "{} vectors for {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dim {
                return Err(Error::Validation(format!(
                    "vector {i} has dimension {}, expected {dim}",
                    v.len()
                )));
            }
        }
        Ok(Self { dim, vectors, chunks })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk(&self, position: usize) -> &Chunk {
        &self.chunks[position]
    }

    pub(crate) fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    /// Up to `min(k, len)` nearest neighbors as `(position, squared L2
    /// distance)`, ascending by distance; equal distances keep insertion
    /// order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dim {
            return Err(Error::Validation(format!(
                "query vector has dimension {}, expected {}",
                query.len(),
                self.dim
            )));
        }
        let mut hits: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .map(|v| squared_l2(query, v))
            .enumerate()
            .collect();
        hits.sort_by(|a, b| a.1.total_cmp(&b.1));
        hits.truncate(k);
        Ok(hits)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
