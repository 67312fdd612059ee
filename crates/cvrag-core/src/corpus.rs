//! Corpus record loader.
//!
//! The retrieval engine consumes already-extracted `(text, metadata)`
//! pairs; this collaborator reads them from `.jsonl` files, one JSON
//! record per line: `{"text": "...", "metadata": {"source": "resume",
//! "role": "engineer", ...}}`.

use crate::error::{Error, Result};
use crate::types::{Chunk, Meta};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct CorpusRecord {
    text: String,
    #[serde(default)]
    metadata: Meta,
}

#[derive(Default)]
pub struct CorpusLoader;

impl CorpusLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load every `.jsonl` file under `dir` (recursively), in sorted path
    /// order. Returns an empty vec when no corpus files are present.
    pub fn load_directory(&self, dir: &Path) -> Result<Vec<Chunk>> {
        let files = list_jsonl_files(dir);
        if files.is_empty() {
            warn!("no .jsonl corpus files under {}", dir.display());
            return Ok(Vec::new());
        }
        let mut chunks = Vec::new();
        for path in &files {
            let loaded = self.load_file(path)?;
            info!("loaded {} records from {}", loaded.len(), path.display());
            chunks.extend(loaded);
        }
        Ok(chunks)
    }

    /// Load one `.jsonl` file. Blank lines and records with empty text are
    /// skipped; a malformed line is a `Validation` error.
    pub fn load_file(&self, path: &Path) -> Result<Vec<Chunk>> {
        let content = fs::read_to_string(path)?;
        let mut chunks = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: CorpusRecord = serde_json::from_str(line).map_err(|e| {
                Error::Validation(format!("{}:{}: {e}", path.display(), lineno + 1))
            })?;
            if record.text.trim().is_empty() {
                warn!("{}:{}: skipping record with empty text", path.display(), lineno + 1);
                continue;
            }
            chunks.push(Chunk {
                text: record.text,
                metadata: record.metadata,
            });
        }
        Ok(chunks)
    }
}

fn list_jsonl_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
            files.push(path.to_path_buf());
        }
    }
    files.sort();
    files
}
