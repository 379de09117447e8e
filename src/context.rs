//! Run context owning the settings, the scope matcher and the proxy pool

use crate::config::Settings;
use crate::health::WebServerValidator;
use crate::proxy::{
    CheckerConfig, CrawlerConfig, Proxy, ProxyChecker, ProxyCrawler, ProxyPool, Transport,
    ValidationSummary,
};
use crate::scope::{Category, ScopeMatcher};
use crate::Result;
use std::path::Path;
use tracing::info;

/// Everything a scan needs from configuration.
///
/// Built once by the driver and handed to scanners by reference. Scanners
/// only read from it: the pool is filled during [`Context::from_settings`]
/// and pruned by [`Context::validate_proxies`].
pub struct Context {
    settings: Settings,
    scope: ScopeMatcher,
    pool: ProxyPool,
    web_server_validator: WebServerValidator,
}

impl Context {
    /// Load settings from a TOML file and build the context
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings = Settings::load(path)?;
        Self::from_settings(settings).await
    }

    /// Validate settings, compile the scope and fill the proxy pool
    pub async fn from_settings(settings: Settings) -> Result<Self> {
        settings.validate()?;
        let scope = ScopeMatcher::new(&settings.scope)?;

        let mut pool = ProxyPool::new();
        let crawler = ProxyCrawler::with_config(CrawlerConfig::from_settings(&settings.proxy))?;
        crawler.load(&settings.proxy, &mut pool).await?;
        info!("Proxy pool loaded ({})", pool.counts());

        Ok(Self {
            settings,
            scope,
            pool,
            web_server_validator: WebServerValidator::new(),
        })
    }

    /// Probe the pool and drop dead proxies
    pub async fn validate_proxies(&mut self) -> Result<ValidationSummary> {
        let urls = self.settings.validation.liveness_urls()?;
        let config = CheckerConfig::from_settings(&self.settings.validation, urls);
        ProxyChecker::new(config).validate(&mut self.pool).await
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn scope(&self) -> &ScopeMatcher {
        &self.scope
    }

    pub fn pool(&self) -> &ProxyPool {
        &self.pool
    }

    pub fn web_server_validator(&self) -> &WebServerValidator {
        &self.web_server_validator
    }

    /// Random proxy for the transport, `None` when the partition is empty
    pub fn pick(&self, transport: Transport) -> Option<&Proxy> {
        self.pool.pick(transport)
    }

    pub fn is_in_scope(&self, identifier: &str, category: Category) -> bool {
        self.scope.is_in_scope(identifier, category)
    }

    pub fn has_any_scope_defined(&self) -> bool {
        self.scope.has_any_scope_defined()
    }
}
