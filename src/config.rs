//! Operator settings
//!
//! Settings are read once from a TOML file into typed structs. Every field
//! except `version` has an explicit default, and [`Settings::validate`]
//! reports all problems in a single [`Error::Configuration`].

use crate::proxy::models::Transport;
use crate::scope::{Category, ScopeRule};
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Oldest configuration file version this build understands
pub const SUPPORTED_CONFIG_VERSION: u32 = 2;

/// Default configuration file name
pub const DEFAULT_CONFIG_PATH: &str = "configuration.toml";

const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_FETCH_WORKERS: usize = 8;
const DEFAULT_VALIDATION_WORKERS: usize = 100;
const DEFAULT_VALIDATION_TIMEOUT_SECS: u64 = 3;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Configuration file version, checked against [`SUPPORTED_CONFIG_VERSION`]
    pub version: Option<u32>,
    #[serde(default)]
    pub proxy: ProxySettings,
    #[serde(default)]
    pub validation: ValidationSettings,
    #[serde(default)]
    pub scope: ScopeSettings,
}

/// Where proxies come from
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProxySettings {
    /// Fetch the remote lists when no proxy file is configured
    pub activate: bool,
    /// Local proxy file; when set, remote lists are not fetched
    pub file: Option<PathBuf>,
    /// Clear the pool before applying the proxy file
    pub only_file: bool,
    pub fetch_timeout_secs: u64,
    /// Remote lists fetched at the same time
    pub fetch_workers: usize,
    /// Remote list URL -> transport of every address it serves
    pub links: BTreeMap<String, Transport>,
}

impl Default for ProxySettings {
    fn default() -> Self {
        Self {
            activate: false,
            file: None,
            only_file: false,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            fetch_workers: DEFAULT_FETCH_WORKERS,
            links: BTreeMap::new(),
        }
    }
}

impl ProxySettings {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

/// How proxies are probed
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ValidationSettings {
    /// Upper bound on in-flight probes, clamped by the validator
    pub workers: usize,
    pub timeout_secs: u64,
    /// File with one liveness URL per line
    pub test_urls_file: Option<PathBuf>,
    pub test_urls: Vec<String>,
    /// Probe the http partition as well
    pub include_http: bool,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_VALIDATION_WORKERS,
            timeout_secs: DEFAULT_VALIDATION_TIMEOUT_SECS,
            test_urls_file: None,
            test_urls: Vec::new(),
            include_http: false,
        }
    }
}

impl ValidationSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Liveness URLs from the configured file followed by the inline list
    pub fn liveness_urls(&self) -> Result<Vec<String>> {
        let mut urls = Vec::new();

        if let Some(path) = &self.test_urls_file {
            if !path.is_file() {
                return Err(Error::config(format!(
                    "liveness URL file {} not found",
                    path.display()
                )));
            }
            let content = fs::read_to_string(path)
                .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
            urls.extend(
                content
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string),
            );
        }

        urls.extend(self.test_urls.iter().cloned());
        Ok(urls)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScopeSettings {
    pub ip: ScopeRule,
    pub fqdn: ScopeRule,
}

impl ScopeSettings {
    pub fn rule(&self, category: Category) -> &ScopeRule {
        match category {
            Category::Ip => &self.ip,
            Category::Fqdn => &self.fqdn,
        }
    }
}

impl Settings {
    /// Read and validate a configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            Error::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration text
    pub fn from_toml(content: &str) -> Result<Self> {
        let settings: Settings =
            toml::from_str(content).map_err(|e| Error::config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check every setting and report all problems at once
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        match self.version {
            None => problems.push("missing `version`".to_string()),
            Some(v) if v < SUPPORTED_CONFIG_VERSION => problems.push(format!(
                "configuration version {} is outdated, {} or newer is required",
                v, SUPPORTED_CONFIG_VERSION
            )),
            Some(_) => {}
        }

        if let Some(file) = &self.proxy.file {
            if !file.is_file() {
                problems.push(format!("proxy file {} not found", file.display()));
            }
        }
        if self.proxy.fetch_timeout_secs == 0 {
            problems.push("proxy.fetch_timeout_secs must be at least 1".to_string());
        }
        if self.proxy.fetch_workers == 0 {
            problems.push("proxy.fetch_workers must be at least 1".to_string());
        }

        if self.validation.workers == 0 {
            problems.push("validation.workers must be at least 1".to_string());
        }
        if self.validation.timeout_secs == 0 {
            problems.push("validation.timeout_secs must be at least 1".to_string());
        }
        if let Some(file) = &self.validation.test_urls_file {
            if !file.is_file() {
                problems.push(format!("liveness URL file {} not found", file.display()));
            }
        }

        for category in Category::ALL {
            problems.extend(self.scope.rule(category).problems(category));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::Configuration(problems))
        }
    }
}
