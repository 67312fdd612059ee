use std::{env, path::PathBuf, process};

use cvrag_core::config::{expand_path, Config};
use cvrag_core::corpus::CorpusLoader;
use cvrag_core::types::{keys, meta_value};
use cvrag_embed::embedder_from_config;
use cvrag_vector::RetrievalEngine;
use indicatif::{ProgressBar, ProgressStyle};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut corpus_dir = None;
    let mut index_dir = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--index-dir" => {
                if i + 1 < args.len() {
                    index_dir = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --index-dir requires a path");
                    process::exit(1);
                }
            }
            arg if !arg.starts_with('-') => corpus_dir = Some(PathBuf::from(arg)),
            other => eprintln!("Ignoring unknown flag {other}"),
        }
        i += 1;
    }
    let corpus_dir = corpus_dir.unwrap_or_else(|| {
        let dir: String = config
            .get("data.corpus_dir")
            .unwrap_or_else(|_| "./data/corpus".to_string());
        expand_path(dir)
    });
    let index_dir = index_dir.unwrap_or_else(|| {
        let dir: String = config
            .get("index.dir")
            .unwrap_or_else(|_| "./data/index".to_string());
        expand_path(dir)
    });

    println!("CVRAG Indexer\n=============");
    println!("Corpus directory: {}", corpus_dir.display());
    println!("Index directory:  {}", index_dir.display());

    let chunks = CorpusLoader::new().load_directory(&corpus_dir)?;
    if chunks.is_empty() {
        eprintln!("No corpus records found under {}", corpus_dir.display());
        process::exit(1);
    }
    println!("Loaded {} chunks", chunks.len());

    let embedder = embedder_from_config(&config.embedding())?;
    let engine = RetrievalEngine::new(embedder);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Embedding {} chunks...", chunks.len()));
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));
    engine.build_index(chunks)?;
    spinner.finish_with_message("Index built");

    engine.save_index(&index_dir)?;
    println!("Index saved to {}", index_dir.display());

    let results = engine.retrieve_context("software engineer", 3)?;
    println!("\nSmoke query 'software engineer' returned {} results:", results.len());
    for r in &results {
        println!(
            "  #{} score={:.3} role={}",
            r.rank,
            r.similarity_score,
            meta_value(&r.metadata, keys::ROLE).unwrap_or("-")
        );
    }
    println!("\nDone. Query with: cargo run --bin cvrag-query -- '<query>'");
    Ok(())
}
