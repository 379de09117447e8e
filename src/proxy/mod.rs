//! Proxy module for acquiring, validating and serving proxies
//!
//! This module provides functionality for:
//! - Parsing proxy files and remote proxy lists
//! - Fetching operator-configured remote sources
//! - Checking proxy liveness with a bounded number of concurrent probes
//! - Holding validated proxies in per-transport partitions

pub mod checker;
pub mod crawler;
pub mod models;
pub mod parser;
pub mod pool;

pub use checker::{
    CheckerConfig, HttpProbe, LivenessProbe, ProxyChecker, ValidationSummary, MAX_WORKERS,
};
pub use crawler::{CrawlResult, CrawlerConfig, ProxyCrawler, ProxySource};
pub use models::{ProbeVerdict, Proxy, Transport};
pub use parser::ProxyParser;
pub use pool::{PoolCounts, ProxyPool};
