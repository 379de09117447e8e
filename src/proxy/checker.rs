//! Proxy checker for pruning dead proxies from the pool
//!
//! Every candidate is probed once through itself against a randomly chosen
//! liveness URL. Probes run as spawned tasks, at most `workers` at a time,
//! and only return a verdict. The pool is modified afterwards, in a single
//! pass over the collected verdicts.

use crate::config::ValidationSettings;
use crate::proxy::models::{ProbeVerdict, Proxy, Transport};
use crate::proxy::pool::{PoolCounts, ProxyPool};
use crate::{Error, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::seq::IndexedRandom;
use reqwest::{Client, Proxy as ReqwestProxy, StatusCode};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default timeout for proxy checks in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 3;

/// Default number of concurrent checks
const DEFAULT_WORKERS: usize = 100;

/// Hard cap on in-flight probes, whatever the operator configures
pub const MAX_WORKERS: usize = 512;

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Timeout for each proxy check
    pub timeout: Duration,
    /// Requested number of concurrent checks
    pub workers: usize,
    /// Candidate URLs, one is picked at random per proxy
    pub liveness_urls: Vec<String>,
    /// Partitions that get probed
    pub transports: Vec<Transport>,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            workers: DEFAULT_WORKERS,
            liveness_urls: Vec::new(),
            transports: vec![Transport::Https, Transport::Socks],
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &ValidationSettings, liveness_urls: Vec<String>) -> Self {
        Self::new()
            .with_timeout(settings.timeout())
            .with_workers(settings.workers)
            .with_liveness_urls(liveness_urls)
            .with_http(settings.include_http)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_liveness_urls(mut self, urls: Vec<String>) -> Self {
        self.liveness_urls = urls;
        self
    }

    /// Also probe the http partition, which is skipped by default
    pub fn with_http(mut self, include: bool) -> Self {
        self.transports.retain(|t| *t != Transport::Http);
        if include {
            self.transports.insert(0, Transport::Http);
        }
        self
    }

    /// Effective parallelism, between 1 and [`MAX_WORKERS`]
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, MAX_WORKERS)
    }
}

/// Liveness check of a single proxy
#[async_trait]
pub trait LivenessProbe: Send + Sync {
    async fn probe(&self, proxy: &Proxy, url: &str) -> ProbeVerdict;
}

/// Probe issuing one GET through the proxy; alive only on status 200
#[derive(Debug, Clone)]
pub struct HttpProbe {
    timeout: Duration,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn create_client(&self, proxy: &Proxy) -> Result<Client> {
        let client = Client::builder()
            .proxy(ReqwestProxy::all(proxy.url())?)
            .timeout(self.timeout)
            .build()?;

        Ok(client)
    }

    async fn check(&self, proxy: &Proxy, url: &str) -> Result<()> {
        let failure = |reason: String| Error::Probe {
            proxy: proxy.to_string(),
            reason,
        };

        let client = self.create_client(proxy).map_err(|e| failure(e.to_string()))?;
        let response = tokio::time::timeout(self.timeout, client.get(url).send())
            .await
            .map_err(|_| failure("timed out".to_string()))?
            .map_err(|e| failure(e.to_string()))?;

        if response.status() == StatusCode::OK {
            Ok(())
        } else {
            Err(failure(format!("HTTP status: {}", response.status())))
        }
    }
}

#[async_trait]
impl LivenessProbe for HttpProbe {
    async fn probe(&self, proxy: &Proxy, url: &str) -> ProbeVerdict {
        match self.check(proxy, url).await {
            Ok(()) => ProbeVerdict::Keep,
            Err(e) => ProbeVerdict::Drop(e.to_string()),
        }
    }
}

/// What a validation pass did to the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ValidationSummary {
    pub probed: usize,
    pub dropped: usize,
    /// Pool contents after pruning
    pub counts: PoolCounts,
}

/// One probe to run: position in its partition plus the URL to fetch
struct ProbeJob {
    transport: Transport,
    index: usize,
    proxy: Proxy,
    url: String,
}

/// Proxy checker validating the pool
pub struct ProxyChecker {
    config: CheckerConfig,
    probe: Arc<dyn LivenessProbe>,
}

impl ProxyChecker {
    /// Checker probing over HTTP with the configured timeout
    pub fn new(config: CheckerConfig) -> Self {
        let probe = Arc::new(HttpProbe::new(config.timeout));
        Self::with_probe(config, probe)
    }

    pub fn with_probe(config: CheckerConfig, probe: Arc<dyn LivenessProbe>) -> Self {
        if config.workers > MAX_WORKERS {
            warn!(
                "{} validation workers requested, capping at {}",
                config.workers, MAX_WORKERS
            );
        }
        Self { config, probe }
    }

    /// Liveness URLs without a scheme take the default one of the transport
    pub fn target_url(url: &str, transport: Transport) -> String {
        if url.contains("://") {
            url.to_string()
        } else {
            format!("{}://{}", transport.default_target_scheme(), url)
        }
    }

    fn jobs(&self, pool: &ProxyPool) -> Vec<ProbeJob> {
        let mut rng = rand::rng();
        let mut jobs = Vec::new();

        for transport in &self.config.transports {
            for (index, proxy) in pool.partition(*transport).iter().enumerate() {
                if let Some(url) = self.config.liveness_urls.choose(&mut rng) {
                    jobs.push(ProbeJob {
                        transport: *transport,
                        index,
                        proxy: proxy.clone(),
                        url: Self::target_url(url, *transport),
                    });
                }
            }
        }

        jobs
    }

    /// Run every job and return its verdict. Completion order is arbitrary.
    async fn run(&self, jobs: Vec<ProbeJob>) -> Vec<(Transport, usize, ProbeVerdict)> {
        stream::iter(jobs)
            .map(|job| {
                let probe = Arc::clone(&self.probe);
                async move {
                    let ProbeJob {
                        transport,
                        index,
                        proxy,
                        url,
                    } = job;
                    let task = tokio::spawn(async move { probe.probe(&proxy, &url).await });
                    let verdict = match task.await {
                        Ok(verdict) => verdict,
                        Err(e) => ProbeVerdict::Drop(format!("probe task failed: {}", e)),
                    };
                    (transport, index, verdict)
                }
            })
            .buffer_unordered(self.config.effective_workers())
            .collect::<Vec<_>>()
            .await
    }

    /// Probe the selected partitions and remove every proxy that failed.
    ///
    /// Returns once all probes have finished. Individual failures only remove
    /// the proxy; the only error is having candidates but no liveness URL.
    pub async fn validate(&self, pool: &mut ProxyPool) -> Result<ValidationSummary> {
        let candidates: usize = self
            .config
            .transports
            .iter()
            .map(|t| pool.partition(*t).len())
            .sum();
        if candidates == 0 {
            return Ok(ValidationSummary {
                counts: pool.counts(),
                ..Default::default()
            });
        }
        if self.config.liveness_urls.is_empty() {
            return Err(Error::config("no liveness URL configured for proxy validation"));
        }

        info!(
            "Checking {} proxies with {} workers",
            candidates,
            self.config.effective_workers()
        );
        let verdicts = self.run(self.jobs(pool)).await;

        let mut dead: HashMap<Transport, HashSet<usize>> = HashMap::new();
        for (transport, index, verdict) in verdicts {
            if let ProbeVerdict::Drop(reason) = verdict {
                debug!("{}", reason);
                dead.entry(transport).or_default().insert(index);
            }
        }
        for (transport, indices) in &dead {
            pool.remove_indices(*transport, indices);
        }

        let summary = ValidationSummary {
            probed: candidates,
            dropped: dead.values().map(HashSet::len).sum(),
            counts: pool.counts(),
        };
        info!("Proxy checked");
        info!("Total proxy: {}", summary.counts.total());
        info!("Http proxy: {}", summary.counts.http);
        info!("Https proxy: {}", summary.counts.https);
        info!("Socks proxy: {}", summary.counts.socks);

        Ok(summary)
    }
}
