//! On-disk index format: an opaque vector blob plus a JSON sidecar.
//!
//! Layout under the index directory:
//! - `vectors.bin` — bincode-encoded `{dim, vectors}` blob
//! - `chunks.json` — manifest (dim, count, embedder id, blob checksum,
//!   build timestamp) plus the ordered chunks
//!
//! Both files must be present and mutually consistent for a load to
//! succeed. A missing file means "no index here"; anything present but
//! unreadable or inconsistent is `Error::IndexCorrupt`, and a process
//! killed mid-save is detected through the checksum on the next load.

use cvrag_core::error::{Error, Result};
use cvrag_core::types::Chunk;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::index::VectorIndex;

pub const VECTORS_FILE: &str = "vectors.bin";
pub const CHUNKS_FILE: &str = "chunks.json";

#[derive(Serialize, Deserialize)]
struct VectorBlob {
    dim: usize,
    vectors: Vec<Vec<f32>>,
}

#[derive(Serialize, Deserialize)]
struct Sidecar {
    dim: usize,
    count: usize,
    embedder_id: String,
    checksum: String,
    built_at: String,
    chunks: Vec<Chunk>,
}

pub fn save(dir: &Path, index: &VectorIndex, embedder_id: &str) -> Result<()> {
    fs::create_dir_all(dir)?;
    let blob = VectorBlob {
        dim: index.dim(),
        vectors: index.vectors().to_vec(),
    };
    let bytes = bincode::serde::encode_to_vec(&blob, bincode::config::standard())
        .map_err(|e| Error::IndexCorrupt(format!("cannot encode vector blob: {e}")))?;
    let checksum = blake3::hash(&bytes).to_hex().to_string();
    fs::write(dir.join(VECTORS_FILE), &bytes)?;

    let sidecar = Sidecar {
        dim: index.dim(),
        count: index.len(),
        embedder_id: embedder_id.to_string(),
        checksum,
        built_at: chrono::Utc::now().to_rfc3339(),
        chunks: index.chunks().to_vec(),
    };
    // Written after the blob: a reader treats a missing sidecar as "no index",
    // so an interrupted save never looks like a complete one.
    let sidecar_bytes = serde_json::to_vec(&sidecar)
        .map_err(|e| Error::IndexCorrupt(format!("cannot encode sidecar: {e}")))?;
    fs::write(dir.join(CHUNKS_FILE), sidecar_bytes)?;
    info!(
        "index saved to {} ({} vectors, dim {})",
        dir.display(),
        index.len(),
        index.dim()
    );
    Ok(())
}

/// `Ok(None)` when either artifact is absent — the normal "not yet built"
/// case. Present-but-inconsistent artifacts fail with `Error::IndexCorrupt`.
pub fn load(dir: &Path, expected_dim: usize, expected_embedder_id: &str) -> Result<Option<VectorIndex>> {
    let blob_path = dir.join(VECTORS_FILE);
    let sidecar_path = dir.join(CHUNKS_FILE);
    if !blob_path.exists() || !sidecar_path.exists() {
        return Ok(None);
    }

    let bytes = fs::read(&blob_path)?;
    let sidecar: Sidecar = serde_json::from_slice(&fs::read(&sidecar_path)?)
        .map_err(|e| Error::IndexCorrupt(format!("{}: {e}", sidecar_path.display())))?;

    let checksum = blake3::hash(&bytes).to_hex().to_string();
    if checksum != sidecar.checksum {
        return Err(Error::IndexCorrupt(format!(
            "{} does not match the sidecar checksum",
            blob_path.display()
        )));
    }
    let (blob, _): (VectorBlob, usize) =
        bincode::serde::decode_from_slice(&bytes, bincode::config::standard())
            .map_err(|e| Error::IndexCorrupt(format!("{}: {e}", blob_path.display())))?;

    if blob.dim != sidecar.dim
        || blob.vectors.len() != sidecar.count
        || sidecar.chunks.len() != sidecar.count
    {
        return Err(Error::IndexCorrupt(format!(
            "blob and sidecar disagree on shape ({} x {} vs {} x {})",
            blob.vectors.len(),
            blob.dim,
            sidecar.count,
            sidecar.dim
        )));
    }
    if blob.dim != expected_dim {
        return Err(Error::IndexCorrupt(format!(
            "index dimension {} does not match embedder dimension {expected_dim}",
            blob.dim
        )));
    }
    if sidecar.embedder_id != expected_embedder_id {
        warn!(
            "index was built with embedder '{}', current embedder is '{}'",
            sidecar.embedder_id, expected_embedder_id
        );
    }

    let index = VectorIndex::build(blob.dim, blob.vectors, sidecar.chunks)
        .map_err(|e| Error::IndexCorrupt(format!("persisted index rejected: {e}")))?;
    info!(
        "index loaded from {} ({} vectors, dim {})",
        dir.display(),
        index.len(),
        index.dim()
    );
    Ok(Some(index))
}
