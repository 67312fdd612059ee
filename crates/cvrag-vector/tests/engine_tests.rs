use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

use cvrag_core::error::{Error, Result};
use cvrag_core::traits::Embedder;
use cvrag_core::types::{keys, meta_value, Chunk, Meta};
use cvrag_vector::RetrievalEngine;

/// Embedder with a fixed text-to-vector table. Unknown text is an error so
/// a test cannot silently query with an unmapped string.
#[derive(Debug)]
struct StubEmbedder {
    id: String,
    dim: usize,
    table: HashMap<String, Vec<f32>>,
}

impl StubEmbedder {
    fn new(dim: usize, entries: &[(&str, &[f32])]) -> Self {
        let table = entries
            .iter()
            .map(|(t, v)| (t.to_string(), v.to_vec()))
            .collect();
        Self {
            id: format!("stub:test:d{dim}"),
            dim,
            table,
        }
    }
}

impl Embedder for StubEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts
            .iter()
            .map(|t| {
                self.table.get(t).cloned().ok_or_else(|| {
                    Error::EmbeddingBackend(format!("no stub vector for '{t}'"))
                })
            })
            .collect()
    }
}

fn chunk(text: &str, source: &str, role: &str) -> Chunk {
    let mut metadata = Meta::new();
    metadata.insert(keys::SOURCE.to_string(), Some(source.to_string()));
    metadata.insert(keys::ROLE.to_string(), Some(role.to_string()));
    Chunk {
        text: text.to_string(),
        metadata,
    }
}

fn sample_embedder() -> StubEmbedder {
    StubEmbedder::new(
        3,
        &[
            ("I love python backend development", &[1.0, 0.0, 0.0]),
            ("Data science and ML pipelines", &[0.0, 1.0, 0.0]),
            ("Marketing and sales outreach", &[0.0, 0.0, 1.0]),
            ("machine learning", &[0.1, 0.9, 0.0]),
            ("anything", &[0.4, 0.4, 0.2]),
        ],
    )
}

fn sample_chunks() -> Vec<Chunk> {
    vec![
        chunk("I love python backend development", "resume", "engineer"),
        chunk("Data science and ML pipelines", "resume", "scientist"),
        chunk("Marketing and sales outreach", "job_description", "marketer"),
    ]
}

fn built_engine() -> RetrievalEngine {
    let engine = RetrievalEngine::new(Box::new(sample_embedder()));
    engine.build_index(sample_chunks()).expect("build");
    engine
}

#[test]
fn engine_starts_unready_and_refuses_operations() {
    let engine = RetrievalEngine::new(Box::new(sample_embedder()));
    assert!(!engine.is_ready());
    assert_eq!(engine.chunk_count(), 0);
    assert!(matches!(
        engine.retrieve_context("anything", 3),
        Err(Error::Precondition(_))
    ));
    assert!(matches!(
        engine.save_index(TempDir::new().unwrap().path()),
        Err(Error::Precondition(_))
    ));
    assert!(matches!(engine.roles(), Err(Error::Precondition(_))));
}

#[test]
fn build_rejects_empty_or_blank_corpus() {
    let engine = RetrievalEngine::new(Box::new(sample_embedder()));
    assert!(matches!(
        engine.build_index(vec![]),
        Err(Error::Validation(_))
    ));
    assert!(matches!(
        engine.build_index(vec![chunk("  ", "resume", "engineer")]),
        Err(Error::Validation(_))
    ));
    assert!(!engine.is_ready(), "failed builds install nothing");
}

#[test]
fn retrieve_returns_all_chunks_for_large_k_with_bounded_scores() {
    let engine = built_engine();
    assert!(engine.is_ready());
    assert_eq!(engine.chunk_count(), 3);

    let results = engine.retrieve_context("anything", 10).expect("retrieve");
    assert_eq!(results.len(), 3, "k >= size returns exactly size results");
    for (i, r) in results.iter().enumerate() {
        assert!(r.similarity_score > 0.0 && r.similarity_score <= 1.0);
        assert_eq!(r.rank, i + 1);
    }
    assert!(results
        .windows(2)
        .all(|w| w[0].similarity_score >= w[1].similarity_score));
}

#[test]
fn retrieve_is_idempotent() {
    let engine = built_engine();
    let first = engine.retrieve_context("machine learning", 3).expect("retrieve");
    let second = engine.retrieve_context("machine learning", 3).expect("retrieve");
    assert_eq!(first, second);
}

#[test]
fn ml_query_ranks_the_ml_chunk_first() {
    let engine = built_engine();
    let results = engine.retrieve_context("machine learning", 1).expect("retrieve");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].text, "Data science and ML pipelines");
    assert_eq!(results[0].rank, 1);
}

#[test]
fn rebuild_replaces_the_previous_index() {
    let engine = built_engine();
    engine
        .build_index(vec![chunk("Data science and ML pipelines", "resume", "scientist")])
        .expect("rebuild");
    assert_eq!(engine.chunk_count(), 1);
    let results = engine.retrieve_context("machine learning", 5).expect("retrieve");
    assert_eq!(results.len(), 1);
}

#[test]
fn roles_lists_sorted_unique_labels() {
    let engine = built_engine();
    assert_eq!(
        engine.roles().expect("roles"),
        vec!["engineer".to_string(), "marketer".to_string(), "scientist".to_string()]
    );
}

#[test]
fn role_filter_returns_only_matching_chunks() {
    let embedder = StubEmbedder::new(
        2,
        &[
            ("applied statistics and modeling", &[1.0, 0.0]),
            ("feature engineering for models", &[0.9, 0.1]),
            ("backend services in python", &[0.0, 1.0]),
            ("infrastructure and deployment", &[0.1, 1.0]),
            ("data_scientist", &[1.0, 0.05]),
        ],
    );
    let engine = RetrievalEngine::new(Box::new(embedder));
    engine
        .build_index(vec![
            chunk("applied statistics and modeling", "resume", "Data_Scientist"),
            chunk("feature engineering for models", "resume", "data_scientist"),
            chunk("backend services in python", "resume", "engineer"),
            chunk("infrastructure and deployment", "job_description", "engineer"),
        ])
        .expect("build");

    // Only 2 chunks carry the role; k=3 must return exactly those 2.
    let results = engine
        .retrieve_by_role("data_scientist", None, 3)
        .expect("retrieve");
    assert_eq!(results.len(), 2);
    for r in &results {
        let role = meta_value(&r.metadata, keys::ROLE).expect("role present");
        assert!(role.eq_ignore_ascii_case("data_scientist"));
    }
}

#[test]
fn save_and_load_round_trip_preserves_results() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("index");

    let engine = built_engine();
    engine.save_index(&dir).expect("save");

    let fresh = RetrievalEngine::new(Box::new(sample_embedder()));
    assert!(fresh.load_index(&dir).expect("load"));
    assert_eq!(fresh.chunk_count(), 3);
    assert_eq!(fresh.roles().expect("roles"), engine.roles().expect("roles"));

    let before = engine.retrieve_context("anything", 3).expect("retrieve");
    let after = fresh.retrieve_context("anything", 3).expect("retrieve");
    assert_eq!(before, after);
}

#[test]
fn load_from_empty_or_missing_directory_is_false() {
    let engine = RetrievalEngine::new(Box::new(sample_embedder()));

    let tmp = TempDir::new().unwrap();
    assert!(!engine.load_index(tmp.path()).expect("load"));
    assert!(!engine
        .load_index(&tmp.path().join("never-created"))
        .expect("load"));
    assert!(!engine.is_ready());
}

#[test]
fn load_with_missing_sidecar_is_false() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("index");
    built_engine().save_index(&dir).expect("save");
    fs::remove_file(dir.join("chunks.json")).unwrap();

    let engine = RetrievalEngine::new(Box::new(sample_embedder()));
    assert!(!engine.load_index(&dir).expect("load"));
    assert!(!engine.is_ready());
}

#[test]
fn load_with_corrupt_sidecar_fails_and_preserves_state() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("index");
    built_engine().save_index(&dir).expect("save");
    fs::write(dir.join("chunks.json"), b"definitely not json").unwrap();

    // the engine already serves another corpus; the failed load must not
    // disturb it
    let engine = built_engine();
    let err = engine.load_index(&dir).unwrap_err();
    assert!(matches!(err, Error::IndexCorrupt(_)), "got {err:?}");
    assert!(engine.is_ready());
    assert_eq!(engine.chunk_count(), 3);
    assert_eq!(
        engine.retrieve_context("machine learning", 1).expect("retrieve")[0].text,
        "Data science and ML pipelines"
    );
}

#[test]
fn load_with_tampered_blob_fails_checksum() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("index");
    built_engine().save_index(&dir).expect("save");
    fs::write(dir.join("vectors.bin"), b"garbage").unwrap();

    let engine = RetrievalEngine::new(Box::new(sample_embedder()));
    let err = engine.load_index(&dir).unwrap_err();
    assert!(matches!(err, Error::IndexCorrupt(_)), "got {err:?}");
    assert!(!engine.is_ready());
}

#[test]
fn load_with_mismatched_dimension_fails() {
    let tmp = TempDir::new().unwrap();
    let dir = tmp.path().join("index");
    built_engine().save_index(&dir).expect("save");

    // an engine whose backend produces 4-dim vectors must refuse the
    // 3-dim index instead of searching garbage
    let wide = StubEmbedder::new(4, &[("anything", &[0.0, 0.0, 0.0, 0.0])]);
    let engine = RetrievalEngine::new(Box::new(wide));
    let err = engine.load_index(&dir).unwrap_err();
    assert!(matches!(err, Error::IndexCorrupt(_)), "got {err:?}");
    assert!(!engine.is_ready());
}
