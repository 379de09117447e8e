//! Proxy parser for proxy files and remote list bodies

use crate::proxy::models::{Proxy, Transport};
use crate::{Error, Result};
use std::fs;
use std::path::Path;

/// Separator between address and transport in the proxy file format
const FIELD_SEPARATOR: char = '|';

pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single `address|transport` line.
    ///
    /// Returns `Ok(None)` for blank lines. A missing separator, an empty
    /// address or an unknown transport is an error: one bad line invalidates
    /// the whole file.
    pub fn parse_line(line: &str) -> Result<Option<Proxy>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (address, transport) = line
            .split_once(FIELD_SEPARATOR)
            .ok_or_else(|| Error::config(format!("missing `{}` separator", FIELD_SEPARATOR)))?;

        let address = address.trim();
        if address.is_empty() {
            return Err(Error::config("empty proxy address"));
        }
        let transport: Transport = transport.parse()?;

        Ok(Some(Proxy::new(address, transport)))
    }

    /// Parse proxy file content. `origin` names the source in error messages.
    pub fn parse_string(content: &str, origin: &str) -> Result<Vec<Proxy>> {
        let mut proxies = Vec::new();

        for (number, line) in content.lines().enumerate() {
            match Self::parse_line(line) {
                Ok(Some(proxy)) => proxies.push(proxy),
                Ok(None) => {}
                Err(Error::Configuration(problems)) => {
                    return Err(Error::config(format!(
                        "{}:{}: {}",
                        origin,
                        number + 1,
                        problems.join(", ")
                    )));
                }
                Err(e) => return Err(e),
            }
        }

        Ok(proxies)
    }

    /// Parse a proxy file. A missing file is a configuration error.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<Proxy>> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::config(format!(
                "proxy file {} not found",
                path.display()
            )));
        }
        let content = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?;
        Self::parse_string(&content, &path.display().to_string())
    }

    /// Parse a remote list body: every non-blank line is one address of the
    /// given transport
    pub fn parse_list(content: &str, transport: Transport) -> Vec<Proxy> {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| Proxy::new(line, transport))
            .collect()
    }
}
