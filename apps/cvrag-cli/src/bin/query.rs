use std::{env, path::PathBuf, process};

use cvrag_core::config::{expand_path, Config};
use cvrag_core::types::{keys, meta_value};
use cvrag_embed::embedder_from_config;
use cvrag_vector::RetrievalEngine;

const PREVIEW_CHARS: usize = 160;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let config = Config::load().map_err(|e| {
        eprintln!("Error loading config: {e}");
        e
    })?;

    let args: Vec<String> = env::args().skip(1).collect();
    let mut words = Vec::new();
    let mut role = None;
    let mut k = None;
    let mut index_dir = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--role" => {
                if i + 1 < args.len() {
                    role = Some(args[i + 1].clone());
                    i += 1;
                } else {
                    eprintln!("Error: --role requires a value");
                    process::exit(1);
                }
            }
            "-k" => {
                if i + 1 < args.len() {
                    match args[i + 1].parse::<usize>() {
                        Ok(n) => {
                            k = Some(n);
                            i += 1;
                        }
                        Err(_) => {
                            eprintln!("Error: -k requires a number");
                            process::exit(1);
                        }
                    }
                } else {
                    eprintln!("Error: -k requires a number");
                    process::exit(1);
                }
            }
            "--index-dir" => {
                if i + 1 < args.len() {
                    index_dir = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --index-dir requires a path");
                    process::exit(1);
                }
            }
            arg if !arg.starts_with('-') => words.push(arg.to_string()),
            other => eprintln!("Ignoring unknown flag {other}"),
        }
        i += 1;
    }
    let query = words.join(" ");
    if query.is_empty() && role.is_none() {
        eprintln!("Usage: cvrag-query [--role <role>] [-k <n>] [--index-dir <dir>] '<query>'");
        process::exit(1);
    }
    let k = k.unwrap_or_else(|| config.get("retrieval.top_k").unwrap_or(5));
    let index_dir = index_dir.unwrap_or_else(|| {
        let dir: String = config
            .get("index.dir")
            .unwrap_or_else(|_| "./data/index".to_string());
        expand_path(dir)
    });

    let embedder = embedder_from_config(&config.embedding())?;
    let engine = RetrievalEngine::new(embedder);
    match engine.load_index(&index_dir) {
        Ok(true) => {}
        Ok(false) => {
            eprintln!(
                "No index found at {}. Run cvrag-indexer first.",
                index_dir.display()
            );
            process::exit(1);
        }
        Err(e) => {
            eprintln!(
                "Index at {} is unusable: {e}. Rebuild with cvrag-indexer.",
                index_dir.display()
            );
            process::exit(1);
        }
    }
    println!(
        "Index ready: {} chunks, roles: {}",
        engine.chunk_count(),
        engine.roles()?.join(", ")
    );

    let results = match &role {
        Some(role) => {
            let query = if query.is_empty() { None } else { Some(query.as_str()) };
            engine.retrieve_by_role(role, query, k)?
        }
        None => engine.retrieve_context(&query, k)?,
    };
    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }
    for r in &results {
        let preview: String = r.text.chars().take(PREVIEW_CHARS).collect();
        println!(
            "#{} score={:.3} source={} role={}",
            r.rank,
            r.similarity_score,
            meta_value(&r.metadata, keys::SOURCE).unwrap_or("-"),
            meta_value(&r.metadata, keys::ROLE).unwrap_or("-")
        );
        println!("   {preview}");
    }
    Ok(())
}
