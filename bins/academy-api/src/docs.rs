// PyTorch documentation lookup: fetch a generated reference page, extract the
// signature and first paragraph, keep successes in an in-memory TTL cache

use academy_common::config::DocsSettings;
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

pub const DESCRIPTION_MAX_CHARS: usize = 300;

const DESCRIPTION_PATTERN: &str = r"(?s)<dd[^>]*>.*?<p>([^<]+(?:<[^>]+>[^<]*)*?)</p>";
const TAG_PATTERN: &str = r"<[^>]+>";
const WHITESPACE_PATTERN: &str = r"\s+";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocInfo {
    pub symbol: String,
    pub signature: Option<String>,
    pub description: Option<String>,
    pub url: String,
}

/// Source of documentation pages
#[async_trait]
pub trait DocFetcher: Send + Sync {
    /// Page body, or `None` when the server answers with anything but 200
    async fn fetch(&self, url: &str) -> Result<Option<String>>;
}

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Option<String>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        if response.status() != reqwest::StatusCode::OK {
            debug!(url, status = %response.status(), "Documentation page unavailable");
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .with_context(|| format!("Failed to read body of {}", url))?;
        Ok(Some(body))
    }
}

struct CachedDoc {
    stored_at: Instant,
    info: DocInfo,
}

pub struct DocsService {
    fetcher: Arc<dyn DocFetcher>,
    base_url: String,
    ttl: Duration,
    max_entries: usize,
    cache: RwLock<HashMap<String, CachedDoc>>,
    description: Regex,
    tags: Regex,
    whitespace: Regex,
}

impl DocsService {
    pub fn new(settings: &DocsSettings, fetcher: Arc<dyn DocFetcher>) -> Result<Self> {
        Ok(Self {
            fetcher,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            ttl: Duration::from_secs(settings.cache_ttl_secs),
            max_entries: settings.cache_max_entries,
            cache: RwLock::new(HashMap::new()),
            description: Regex::new(DESCRIPTION_PATTERN)?,
            tags: Regex::new(TAG_PATTERN)?,
            whitespace: Regex::new(WHITESPACE_PATTERN)?,
        })
    }

    pub fn doc_url(&self, symbol: &str) -> String {
        format!("{}/generated/{}.html", self.base_url, symbol)
    }

    /// Documentation for `symbol`, served from cache while fresh.
    /// Unknown symbols, non-200 pages and fetch errors all yield `None` and are not cached.
    pub async fn lookup(&self, symbol: &str) -> Option<DocInfo> {
        if !is_valid_symbol(symbol) {
            debug!(symbol, "Rejected documentation symbol");
            return None;
        }

        if let Some(cached) = self.cache.read().await.get(symbol) {
            if cached.stored_at.elapsed() < self.ttl {
                return Some(cached.info.clone());
            }
        }

        let url = self.doc_url(symbol);
        let html = match self.fetcher.fetch(&url).await {
            Ok(Some(html)) => html,
            Ok(None) => return None,
            Err(e) => {
                warn!(symbol, error = %format!("{:#}", e), "Failed to fetch documentation");
                return None;
            }
        };

        let info = DocInfo {
            symbol: symbol.to_string(),
            signature: self.extract_signature(&html, symbol),
            description: self.extract_description(&html),
            url,
        };
        self.remember(info.clone()).await;
        Some(info)
    }

    /// Symbols with a fresh cache entry, sorted
    pub async fn cached_symbols(&self) -> Vec<String> {
        let cache = self.cache.read().await;
        let mut symbols: Vec<String> = cache
            .iter()
            .filter(|(_, entry)| entry.stored_at.elapsed() < self.ttl)
            .map(|(symbol, _)| symbol.clone())
            .collect();
        symbols.sort();
        symbols
    }

    async fn remember(&self, info: DocInfo) {
        if self.max_entries == 0 || self.ttl.is_zero() {
            return;
        }

        let mut cache = self.cache.write().await;
        let ttl = self.ttl;
        cache.retain(|_, entry| entry.stored_at.elapsed() < ttl);

        if cache.len() >= self.max_entries && !cache.contains_key(&info.symbol) {
            let oldest = cache
                .iter()
                .min_by_key(|(_, entry)| entry.stored_at)
                .map(|(symbol, _)| symbol.clone());
            if let Some(oldest) = oldest {
                cache.remove(&oldest);
            }
        }

        cache.insert(
            info.symbol.clone(),
            CachedDoc {
                stored_at: Instant::now(),
                info,
            },
        );
    }

    fn extract_signature(&self, html: &str, symbol: &str) -> Option<String> {
        let name = regex::escape(symbol.rsplit('.').next().unwrap_or(symbol));
        let patterns = [
            format!(
                r#"(?si)<dt[^>]*class="[^"]*sig[^"]*"[^>]*>.*?<span class="sig-name[^"]*">([^<]*{name}[^<]*)</span>.*?</dt>"#
            ),
            format!(
                r#"(?si)class="sig-prename[^"]*">[^<]*</span>\s*<span class="sig-name[^"]*">({name})</span>\s*<span class="sig-paren">\(</span>([^)]*)<span class="sig-paren">\)</span>"#
            ),
        ];

        patterns.iter().find_map(|pattern| {
            let regex = Regex::new(pattern).ok()?;
            let found = regex.find(html)?;
            Some(self.clean(found.as_str()))
        })
    }

    fn extract_description(&self, html: &str) -> Option<String> {
        let captures = self.description.captures(html)?;
        let text = self.clean(captures.get(1)?.as_str());

        if text.chars().count() > DESCRIPTION_MAX_CHARS {
            let cut: String = text.chars().take(DESCRIPTION_MAX_CHARS - 3).collect();
            return Some(format!("{}...", cut));
        }
        Some(text)
    }

    /// Drop markup and collapse whitespace runs
    fn clean(&self, fragment: &str) -> String {
        let text = self.tags.replace_all(fragment, "");
        self.whitespace.replace_all(&text, " ").trim().to_string()
    }
}

/// Dotted Python identifier path such as `torch.nn.Linear`
pub fn is_valid_symbol(symbol: &str) -> bool {
    !symbol.is_empty()
        && symbol
            .split('.')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'))
}
