use cvrag_core::config::EmbeddingConfig;
use cvrag_core::error::Error;
use cvrag_core::traits::Embedder;
use cvrag_embed::{embedder_from_config, BackendKind, FakeEmbedder, RemoteEmbedder};

#[test]
fn fake_embedder_shapes_and_determinism() {
    let embedder = FakeEmbedder::new(384);
    let texts = vec![
        "hello world".to_string(),
        "hello world".to_string(),
        "something else entirely".to_string(),
    ];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");

    assert_eq!(embs.len(), 3);
    assert_eq!(embs[0].len(), 384, "embedding dim is 384");

    let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    // Deterministic for same input, distinct for different input
    for (a, b) in embs[0].iter().zip(embs[1].iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
    assert_ne!(embs[0], embs[2]);
}

#[test]
fn backend_kind_parses_case_insensitively() {
    assert_eq!(BackendKind::parse("local").unwrap(), BackendKind::Local);
    assert_eq!(BackendKind::parse("Remote").unwrap(), BackendKind::Remote);
    assert!(matches!(
        BackendKind::parse("faiss"),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn backend_selection_is_eager() {
    // An explicitly selected local backend with a missing model directory
    // fails at construction, not at first use.
    std::env::remove_var("APP_USE_FAKE_EMBEDDINGS");
    let cfg = EmbeddingConfig {
        backend: Some("local".to_string()),
        model_dir: Some("/definitely/not/here".to_string()),
        ..Default::default()
    };
    let err = embedder_from_config(&cfg).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)), "got {err:?}");

    // The fake-embeddings switch takes precedence for tests.
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");
    let embedder = embedder_from_config(&EmbeddingConfig::default()).expect("fake embedder");
    assert_eq!(embedder.dim(), 384);
    assert!(embedder.id().starts_with("fake:"));
    std::env::remove_var("APP_USE_FAKE_EMBEDDINGS");
}

#[test]
fn remote_embedder_identity_and_defaults() {
    let cfg = EmbeddingConfig {
        timeout_secs: Some(5),
        ..Default::default()
    };
    let embedder = RemoteEmbedder::new("sk-test".to_string(), &cfg).expect("client");
    assert_eq!(embedder.dim(), 1536);
    assert_eq!(embedder.id(), "remote:text-embedding-3-small:d1536");
}
