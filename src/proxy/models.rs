//! Proxy data models

use crate::Error;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Transport protocol a proxy is used for. Each transport owns one
/// partition of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    Http,
    Https,
    Socks,
}

impl Transport {
    pub const ALL: [Transport; 3] = [Transport::Http, Transport::Https, Transport::Socks];

    /// Scheme used when a liveness URL carries none
    pub fn default_target_scheme(&self) -> &'static str {
        match self {
            Transport::Http => "http",
            Transport::Https | Transport::Socks => "https",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Http => write!(f, "http"),
            Transport::Https => write!(f, "https"),
            Transport::Socks => write!(f, "socks"),
        }
    }
}

impl FromStr for Transport {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "http" => Ok(Transport::Http),
            "https" => Ok(Transport::Https),
            "socks" => Ok(Transport::Socks),
            other => Err(Error::config(format!(
                "invalid transport `{}`, use: http, https, socks",
                other
            ))),
        }
    }
}

/// A proxy endpoint, identified by its `host:port` address and transport
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Proxy {
    pub address: String,
    pub transport: Transport,
}

impl Proxy {
    pub fn new(address: impl Into<String>, transport: Transport) -> Self {
        Self {
            address: address.into(),
            transport,
        }
    }

    /// Proxy URL handed to the HTTP client.
    ///
    /// `http` and `https` entries are CONNECT-capable HTTP proxies, `socks`
    /// entries are spoken to as SOCKS5.
    pub fn url(&self) -> String {
        match self.transport {
            Transport::Http | Transport::Https => format!("http://{}", self.address),
            Transport::Socks => format!("socks5://{}", self.address),
        }
    }

    /// Line in the proxy file format: `address|transport`
    pub fn to_line(&self) -> String {
        format!("{}|{}", self.address, self.transport)
    }
}

impl fmt::Display for Proxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url())
    }
}

/// Outcome of a single liveness probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeVerdict {
    Keep,
    Drop(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_creation() {
        let proxy = Proxy::new("127.0.0.1:8080", Transport::Http);
        assert_eq!(proxy.address, "127.0.0.1:8080");
        assert_eq!(proxy.transport, Transport::Http);
    }

    #[test]
    fn test_proxy_url() {
        assert_eq!(
            Proxy::new("127.0.0.1:8080", Transport::Http).url(),
            "http://127.0.0.1:8080"
        );
        assert_eq!(
            Proxy::new("10.0.0.1:3128", Transport::Https).url(),
            "http://10.0.0.1:3128"
        );
        assert_eq!(
            Proxy::new("192.168.1.1:1080", Transport::Socks).url(),
            "socks5://192.168.1.1:1080"
        );
    }

    #[test]
    fn test_proxy_line() {
        let proxy = Proxy::new("1.2.3.4:8080", Transport::Socks);
        assert_eq!(proxy.to_line(), "1.2.3.4:8080|socks");
    }

    #[test]
    fn test_transport_from_str() {
        assert_eq!("http".parse::<Transport>().unwrap(), Transport::Http);
        assert_eq!("HTTPS".parse::<Transport>().unwrap(), Transport::Https);
        assert_eq!(" socks ".parse::<Transport>().unwrap(), Transport::Socks);
        assert!("socks5".parse::<Transport>().is_err());
    }

    #[test]
    fn test_transport_target_scheme() {
        assert_eq!(Transport::Http.default_target_scheme(), "http");
        assert_eq!(Transport::Https.default_target_scheme(), "https");
        assert_eq!(Transport::Socks.default_target_scheme(), "https");
    }
}
