//! Domain types shared by the embedding and retrieval crates.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Chunk metadata. Values are optional because corpus rows routinely have
/// missing fields.
pub type Meta = HashMap<String, Option<String>>;

/// Well-known metadata keys.
pub mod keys {
    /// Origin category: "resume", "job_description" or "skill_mapping".
    pub const SOURCE: &str = "source";
    /// Free-text job-role label, compared case-insensitively.
    pub const ROLE: &str = "role";
    pub const EXPERIENCE_TYPE: &str = "experience_type";
}

/// A unit of retrievable corpus content.
///
/// Chunks are stored in insertion order; the position of a chunk in the
/// index is its implicit id and matches the position of its vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(default)]
    pub metadata: Meta,
}

impl Chunk {
    pub fn role(&self) -> Option<&str> {
        meta_value(&self.metadata, keys::ROLE)
    }

    pub fn source(&self) -> Option<&str> {
        meta_value(&self.metadata, keys::SOURCE)
    }
}

/// Look up a metadata value, treating explicit nulls as absent.
pub fn meta_value<'a>(meta: &'a Meta, key: &str) -> Option<&'a str> {
    meta.get(key).and_then(|v| v.as_deref())
}

/// One ranked hit of a retrieval query. Ephemeral, never persisted.
///
/// `similarity_score` is `1/(1+distance)` over squared L2 distance: in
/// `(0, 1]`, exactly 1 only at zero distance, monotone in relevance but
/// not a probability. `rank` starts at 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedResult {
    pub text: String,
    pub metadata: Meta,
    pub similarity_score: f32,
    pub rank: usize,
}
