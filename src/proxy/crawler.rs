//! Proxy source aggregation
//!
//! This module provides functionality for:
//! - Loading proxies from a local `address|transport` file
//! - Fetching operator-configured remote proxy lists
//! - Appending everything to the matching pool partition

use crate::config::ProxySettings;
use crate::proxy::models::{Proxy, Transport};
use crate::proxy::parser::ProxyParser;
use crate::proxy::pool::ProxyPool;
use crate::{Error, Result};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for HTTP requests in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Default number of remote lists fetched at the same time
const DEFAULT_WORKERS: usize = 8;

/// Default user agent for HTTP requests
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Result of crawling a single source
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// The source that was crawled
    pub source: ProxySource,
    /// Proxies extracted from the source
    pub proxies: Vec<Proxy>,
    /// Error message if crawling failed
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn success(source: ProxySource, proxies: Vec<Proxy>) -> Self {
        Self {
            source,
            proxies,
            error: None,
        }
    }

    pub fn failure(source: ProxySource, error: String) -> Self {
        Self {
            source,
            proxies: Vec::new(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Configuration for proxy crawler
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Timeout for HTTP requests
    pub timeout: Duration,
    /// User agent for HTTP requests
    pub user_agent: String,
    /// Remote lists fetched at the same time
    pub workers: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl CrawlerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &ProxySettings) -> Self {
        Self::new()
            .with_timeout(settings.fetch_timeout())
            .with_workers(settings.fetch_workers)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }
}

/// A remote list and the transport of every address it serves
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySource {
    pub url: String,
    pub transport: Transport,
}

impl ProxySource {
    pub fn new(url: &str, transport: Transport) -> Self {
        Self {
            url: url.to_string(),
            transport,
        }
    }

    /// Sources from the `[proxy.links]` table
    pub fn from_settings(settings: &ProxySettings) -> Vec<Self> {
        settings
            .links
            .iter()
            .map(|(url, transport)| Self::new(url, *transport))
            .collect()
    }
}

/// Fills the proxy pool from the configured file or remote lists
pub struct ProxyCrawler {
    config: CrawlerConfig,
    client: Client,
}

impl ProxyCrawler {
    pub fn new() -> Result<Self> {
        Self::with_config(CrawlerConfig::default())
    }

    pub fn with_config(config: CrawlerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .no_proxy()
            .build()?;

        Ok(Self { config, client })
    }

    /// Fetch one remote list. Network errors and non-2xx statuses are
    /// reported as [`Error::SourceFetch`].
    pub async fn crawl_source(&self, source: &ProxySource) -> Result<Vec<Proxy>> {
        let fetch_error = |reason: String| Error::SourceFetch {
            url: source.url.clone(),
            reason,
        };

        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_error(format!("HTTP status: {}", response.status())));
        }
        let content = response
            .text()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;

        Ok(ProxyParser::parse_list(&content, source.transport))
    }

    /// Fetch several lists, at most `workers` at a time. Results keep the
    /// order of `sources`.
    pub async fn crawl_sources_with_results(&self, sources: &[ProxySource]) -> Vec<CrawlResult> {
        stream::iter(sources)
            .map(|source| async move {
                match self.crawl_source(source).await {
                    Ok(proxies) => CrawlResult::success(source.clone(), proxies),
                    Err(e) => CrawlResult::failure(source.clone(), e.to_string()),
                }
            })
            .buffered(self.config.workers)
            .collect::<Vec<_>>()
            .await
    }

    /// Populate `pool` from the configured sources.
    ///
    /// With a proxy file configured, only the file is read (after clearing
    /// the pool when `only_file` is set) and any bad line fails the whole
    /// load. Otherwise, when proxies are activated, every remote list is
    /// fetched and failing lists are skipped with a warning. Entries are
    /// appended, never removed or deduplicated.
    pub async fn load(&self, settings: &ProxySettings, pool: &mut ProxyPool) -> Result<()> {
        if let Some(file) = &settings.file {
            if settings.only_file {
                pool.clear();
            }
            let proxies = ProxyParser::parse_file(file)?;
            info!("Loaded {} proxies from {}", proxies.len(), file.display());
            pool.extend(proxies);
            return Ok(());
        }

        if !settings.activate {
            debug!("Proxy disabled, no source loaded");
            return Ok(());
        }

        let sources = ProxySource::from_settings(settings);
        info!("Proxy activated, fetching {} remote lists", sources.len());

        for result in self.crawl_sources_with_results(&sources).await {
            if result.is_success() {
                debug!(
                    "Found {} {} proxies from {}",
                    result.proxies.len(),
                    result.source.transport,
                    result.source.url
                );
                pool.extend(result.proxies);
            } else {
                warn!(
                    "Skipping proxy source: {}",
                    result.error.unwrap_or_default()
                );
            }
        }

        Ok(())
    }
}
