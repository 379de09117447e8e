//! Target web server health check

use crate::proxy::models::Transport;
use crate::proxy::pool::ProxyPool;
use crate::scope::{Category, ScopeMatcher};
use crate::{Error, Result};
use reqwest::{Client, Proxy as ReqwestProxy, Url};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Default timeout for the health request in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// A web server to reach: `protocol://host:port`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

impl Target {
    pub fn new(protocol: &str, host: &str, port: u16) -> Self {
        Self {
            protocol: protocol.to_string(),
            host: host.to_string(),
            port,
        }
    }

    pub fn url(&self) -> String {
        if self.host.contains(':') {
            format!("{}://[{}]:{}", self.protocol, self.host, self.port)
        } else {
            format!("{}://{}:{}", self.protocol, self.host, self.port)
        }
    }

    /// Pool partition used to reach this target
    pub fn transport(&self) -> Transport {
        if self.protocol == "https" {
            Transport::Https
        } else {
            Transport::Http
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

impl FromStr for Target {
    type Err = Error;

    /// Accepts `host`, `host:port` or `protocol://host[:port]`; the protocol
    /// defaults to http and the port to the protocol's default
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let with_scheme = if s.contains("://") {
            s.to_string()
        } else {
            format!("http://{}", s)
        };
        let invalid = || Error::config(format!("invalid target `{}`", s));

        let url = Url::parse(&with_scheme).map_err(|_| invalid())?;
        let host = url
            .host_str()
            .ok_or_else(invalid)?
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_string();
        let port = url.port_or_known_default().ok_or_else(invalid)?;

        Ok(Self {
            protocol: url.scheme().to_string(),
            host,
            port,
        })
    }
}

/// Checks that a target web server answers before it is scanned.
///
/// Owned by the [`Context`](crate::Context); there is one per run.
#[derive(Debug, Clone)]
pub struct WebServerValidator {
    timeout: Duration,
}

impl Default for WebServerValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl WebServerValidator {
    pub fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn client(&self, pool: &ProxyPool, transport: Transport) -> Result<Client> {
        let builder = Client::builder().timeout(self.timeout);
        let builder = match pool.pick(transport) {
            Some(proxy) => {
                debug!("Reaching target through {}", proxy);
                builder.proxy(ReqwestProxy::all(proxy.url())?)
            }
            None => builder.no_proxy(),
        };
        Ok(builder.build()?)
    }

    /// Send one GET to the target, through a pooled proxy when one is
    /// available. Any HTTP response counts as reachable. Out-of-scope targets
    /// are refused without sending anything.
    pub async fn validate_target(
        &self,
        target: &Target,
        scope: &ScopeMatcher,
        pool: &ProxyPool,
    ) -> Result<()> {
        if !scope.is_in_scope(&target.host, Category::infer(&target.host)) {
            return Err(Error::OutOfScope {
                target: target.to_string(),
            });
        }

        let unreachable = |reason: String| Error::WebServer {
            target: target.to_string(),
            reason,
        };

        let client = self
            .client(pool, target.transport())
            .map_err(|e| unreachable(e.to_string()))?;
        let response = client
            .get(target.url())
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;

        debug!("{} answered {}", target, response.status());
        Ok(())
    }

    /// Check targets one after another; results follow the order of `targets`
    pub async fn validate_targets(
        &self,
        targets: &[Target],
        scope: &ScopeMatcher,
        pool: &ProxyPool,
    ) -> Vec<Result<()>> {
        let mut results = Vec::with_capacity(targets.len());
        for target in targets {
            results.push(self.validate_target(target, scope, pool).await);
        }
        results
    }
}
