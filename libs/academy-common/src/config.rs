// Application configuration loaded from the environment (and an optional .env file)

use anyhow::{bail, Context, Result};
use std::path::PathBuf;

pub const DEFAULT_PREAMBLE: &str =
    "import torch;import torch.nn as nn;import torch.nn.functional as F;import numpy as np";

/// Settings for the code execution engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub python_bin: String,
    /// Scratch files are written here; it is also the child's working directory
    pub scratch_dir: PathBuf,
    pub max_timeout_secs: u64,
    pub default_timeout_secs: u64,
    pub validation_timeout_secs: u64,
    /// Statements run before learner code, one import per entry
    pub preamble: Vec<String>,
    pub max_source_bytes: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            python_bin: "python3".to_string(),
            scratch_dir: std::env::temp_dir(),
            max_timeout_secs: 30,
            default_timeout_secs: 10,
            validation_timeout_secs: 10,
            preamble: parse_preamble(DEFAULT_PREAMBLE),
            max_source_bytes: 1024 * 1024,
        }
    }
}

/// Settings for the documentation lookup proxy
#[derive(Debug, Clone)]
pub struct DocsSettings {
    /// Root of the generated API reference, without a trailing slash
    pub base_url: String,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
    pub fetch_timeout_secs: u64,
}

impl Default for DocsSettings {
    fn default() -> Self {
        Self {
            base_url: "https://pytorch.org/docs/stable".to_string(),
            cache_ttl_secs: 24 * 60 * 60,
            cache_max_entries: 1000,
            fetch_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub app_name: String,
    pub host: String,
    pub port: u16,
    pub content_dir: PathBuf,
    pub cors_origins: Vec<String>,
    pub engine: EngineSettings,
    pub docs: DocsSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "PyTorch Academy API".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8000,
            content_dir: PathBuf::from("content"),
            cors_origins: vec![
                "http://localhost:5173".to_string(),
                "http://localhost:3000".to_string(),
            ],
            engine: EngineSettings::default(),
            docs: DocsSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from `.env` and process environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source, falling back to defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();
        let engine_defaults = defaults.engine;
        let docs_defaults = defaults.docs;

        let engine = EngineSettings {
            python_bin: lookup("PYTHON_BIN").unwrap_or(engine_defaults.python_bin),
            scratch_dir: lookup("SCRATCH_DIR")
                .map(PathBuf::from)
                .unwrap_or(engine_defaults.scratch_dir),
            max_timeout_secs: parse_var(&lookup, "EXECUTION_MAX_TIMEOUT")?
                .unwrap_or(engine_defaults.max_timeout_secs),
            default_timeout_secs: parse_var(&lookup, "EXECUTION_DEFAULT_TIMEOUT")?
                .unwrap_or(engine_defaults.default_timeout_secs),
            validation_timeout_secs: parse_var(&lookup, "VALIDATION_TIMEOUT")?
                .unwrap_or(engine_defaults.validation_timeout_secs),
            preamble: lookup("PREAMBLE_IMPORTS")
                .map(|s| parse_preamble(&s))
                .unwrap_or(engine_defaults.preamble),
            max_source_bytes: parse_var(&lookup, "MAX_SOURCE_BYTES")?
                .unwrap_or(engine_defaults.max_source_bytes),
        };

        let docs = DocsSettings {
            base_url: lookup("DOCS_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or(docs_defaults.base_url),
            cache_ttl_secs: parse_var(&lookup, "DOCS_CACHE_TTL")?.unwrap_or(docs_defaults.cache_ttl_secs),
            cache_max_entries: parse_var(&lookup, "DOCS_CACHE_MAX_ENTRIES")?
                .unwrap_or(docs_defaults.cache_max_entries),
            fetch_timeout_secs: parse_var(&lookup, "DOCS_FETCH_TIMEOUT")?
                .unwrap_or(docs_defaults.fetch_timeout_secs),
        };

        let settings = Settings {
            app_name: lookup("APP_NAME").unwrap_or(defaults.app_name),
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT")?.unwrap_or(defaults.port),
            content_dir: lookup("CONTENT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.content_dir),
            cors_origins: lookup("CORS_ORIGINS")
                .map(|s| {
                    s.split(',')
                        .map(|o| o.trim().to_string())
                        .filter(|o| !o.is_empty())
                        .collect()
                })
                .unwrap_or(defaults.cors_origins),
            engine,
            docs,
        };

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        let engine = &self.engine;
        if engine.max_timeout_secs == 0 {
            bail!("EXECUTION_MAX_TIMEOUT must be at least 1 second");
        }
        if engine.default_timeout_secs == 0 || engine.default_timeout_secs > engine.max_timeout_secs {
            bail!(
                "EXECUTION_DEFAULT_TIMEOUT must be between 1 and {} seconds",
                engine.max_timeout_secs
            );
        }
        if engine.validation_timeout_secs == 0
            || engine.validation_timeout_secs > engine.max_timeout_secs
        {
            bail!(
                "VALIDATION_TIMEOUT must be between 1 and {} seconds",
                engine.max_timeout_secs
            );
        }
        if engine.python_bin.trim().is_empty() {
            bail!("PYTHON_BIN cannot be empty");
        }
        if self.docs.base_url.is_empty() {
            bail!("DOCS_BASE_URL cannot be empty");
        }
        if self.docs.fetch_timeout_secs == 0 {
            bail!("DOCS_FETCH_TIMEOUT must be at least 1 second");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: '{}'", key, raw)),
        None => Ok(None),
    }
}

/// Split a `;`-separated list of import statements
pub fn parse_preamble(raw: &str) -> Vec<String> {
    raw.split(';')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
