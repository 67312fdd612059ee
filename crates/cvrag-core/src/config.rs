//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env
//! vars. Provides helpers to expand `~` and `${VAR}` and typed access to
//! the embedding section.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new().merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_"));

        Ok(Self { figment })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    /// The `[embedding]` section, defaulted when absent.
    pub fn embedding(&self) -> EmbeddingConfig {
        self.get("embedding").unwrap_or_default()
    }
}

/// Embedding backend settings. All fields optional; unset fields fall back
/// to backend defaults or environment lookups at construction time.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EmbeddingConfig {
    /// "local" or "remote"; auto-resolved when unset.
    pub backend: Option<String>,
    /// Directory holding tokenizer.json, config.json and model weights.
    pub model_dir: Option<String>,
    /// Credential for the remote API; `OPENAI_API_KEY` is also honored.
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub model: Option<String>,
    pub dim: Option<usize>,
    pub timeout_secs: Option<u64>,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
