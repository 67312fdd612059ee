//! Retrieval orchestration: embed, search, score, filter.

use cvrag_core::error::{Error, Result};
use cvrag_core::traits::Embedder;
use cvrag_core::types::{keys, meta_value, Chunk, RetrievedResult};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};
use tracing::{debug, info};

use crate::index::VectorIndex;
use crate::persist;

/// Orchestrates one embedding backend and one vector index.
///
/// Starts without an index; `build_index` or a successful `load_index`
/// makes it queryable. An installed index is only ever replaced, never
/// removed. Concurrent queries share the index through a readers-writer
/// lock; build/load prepare the replacement entirely outside the lock and
/// only the swap is exclusive.
pub struct RetrievalEngine {
    embedder: Box<dyn Embedder>,
    index: RwLock<Option<VectorIndex>>,
}

impl RetrievalEngine {
    pub fn new(embedder: Box<dyn Embedder>) -> Self {
        Self {
            embedder,
            index: RwLock::new(None),
        }
    }

    /// Whether an index is currently built or loaded. Collaborators use
    /// this to gate retrieval attempts.
    pub fn is_ready(&self) -> bool {
        self.read_index().is_some()
    }

    /// Number of chunks in the current index (0 when not ready).
    pub fn chunk_count(&self) -> usize {
        self.read_index().as_ref().map_or(0, VectorIndex::len)
    }

    fn read_index(&self) -> RwLockReadGuard<'_, Option<VectorIndex>> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Embed `chunks` in one batch and install a fresh index, replacing
    /// any previous one. A failed embedding installs nothing.
    pub fn build_index(&self, chunks: Vec<Chunk>) -> Result<()> {
        if chunks.is_empty() {
            return Err(Error::Validation(
                "cannot build an index from an empty corpus".to_string(),
            ));
        }
        if let Some(pos) = chunks.iter().position(|c| c.text.trim().is_empty()) {
            return Err(Error::Validation(format!("chunk {pos} has empty text")));
        }
        info!("building index from {} chunks", chunks.len());
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;
        let index = VectorIndex::build(self.embedder.dim(), vectors, chunks)?;
        let mut guard = self.index.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Some(index);
        Ok(())
    }

    /// Persist the current index as a vector blob plus sidecar under `dir`.
    pub fn save_index(&self, dir: &Path) -> Result<()> {
        let guard = self.read_index();
        let index = guard.as_ref().ok_or_else(not_initialized)?;
        persist::save(dir, index, self.embedder.id())
    }

    /// Load a persisted index. `Ok(false)` when nothing is stored at
    /// `dir`; corrupt or dimension-mismatched artifacts fail with
    /// `Error::IndexCorrupt`. Any current index is left untouched unless
    /// the load fully succeeds.
    pub fn load_index(&self, dir: &Path) -> Result<bool> {
        match persist::load(dir, self.embedder.dim(), self.embedder.id())? {
            Some(index) => {
                let mut guard = self.index.write().unwrap_or_else(PoisonError::into_inner);
                *guard = Some(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Top-k retrieval for `query`: ascending distance, `similarity =
    /// 1/(1+d)`, 1-based ranks.
    pub fn retrieve_context(&self, query: &str, k: usize) -> Result<Vec<RetrievedResult>> {
        if !self.is_ready() {
            return Err(not_initialized());
        }
        let vector = self
            .embedder
            .embed_batch(&[query.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                Error::EmbeddingBackend("backend returned no vector for the query".to_string())
            })?;

        let guard = self.read_index();
        let index = guard.as_ref().ok_or_else(not_initialized)?;
        let hits = index.search(&vector, k)?;
        debug!("query matched {} of {} chunks", hits.len(), index.len());
        Ok(hits
            .into_iter()
            .enumerate()
            .map(|(i, (position, distance))| {
                let chunk = index.chunk(position);
                RetrievedResult {
                    text: chunk.text.clone(),
                    metadata: chunk.metadata.clone(),
                    similarity_score: 1.0 / (1.0 + distance),
                    rank: i + 1,
                }
            })
            .collect())
    }

    /// Role-filtered retrieval: over-fetch `2*k` candidates, keep
    /// case-insensitive `role` metadata matches, truncate to `k`. The 2x
    /// over-fetch is a heuristic and does not guarantee `k` results even
    /// when `k` matching chunks exist. Ranks are the pre-filter ranks.
    pub fn retrieve_by_role(
        &self,
        role: &str,
        query: Option<&str>,
        k: usize,
    ) -> Result<Vec<RetrievedResult>> {
        let query = query.unwrap_or(role);
        let mut results: Vec<RetrievedResult> = self
            .retrieve_context(query, k.saturating_mul(2))?
            .into_iter()
            .filter(|r| {
                meta_value(&r.metadata, keys::ROLE)
                    .is_some_and(|v| v.eq_ignore_ascii_case(role))
            })
            .collect();
        results.truncate(k);
        Ok(results)
    }

    /// Sorted, de-duplicated role labels present in the current index.
    pub fn roles(&self) -> Result<Vec<String>> {
        let guard = self.read_index();
        let index = guard.as_ref().ok_or_else(not_initialized)?;
        let roles: BTreeSet<String> = index
            .chunks()
            .iter()
            .filter_map(|c| c.role().map(str::to_string))
            .collect();
        Ok(roles.into_iter().collect())
    }
}

fn not_initialized() -> Error {
    Error::Precondition("index not initialized; build or load an index first".to_string())
}
