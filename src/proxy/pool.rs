//! Protocol-partitioned proxy pool
//!
//! The pool is filled by the source aggregator, pruned by the validator and
//! then only read. Every proxy lives in the partition of its own transport,
//! so partitions never overlap.

use crate::proxy::models::{Proxy, Transport};
use crate::Result;
use rand::seq::IndexedRandom;
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

/// Number of proxies per partition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolCounts {
    pub http: usize,
    pub https: usize,
    pub socks: usize,
}

impl PoolCounts {
    pub fn total(&self) -> usize {
        self.http + self.https + self.socks
    }
}

impl fmt::Display for PoolCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total: {}, http: {}, https: {}, socks: {}",
            self.total(),
            self.http,
            self.https,
            self.socks
        )
    }
}

#[derive(Debug, Clone, Default)]
pub struct ProxyPool {
    http: Vec<Proxy>,
    https: Vec<Proxy>,
    socks: Vec<Proxy>,
}

impl ProxyPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a proxy to the partition matching its transport
    pub fn push(&mut self, proxy: Proxy) {
        self.partition_mut(proxy.transport).push(proxy);
    }

    pub fn extend<I: IntoIterator<Item = Proxy>>(&mut self, proxies: I) {
        for proxy in proxies {
            self.push(proxy);
        }
    }

    /// Empty all three partitions
    pub fn clear(&mut self) {
        self.http.clear();
        self.https.clear();
        self.socks.clear();
    }

    pub fn partition(&self, transport: Transport) -> &[Proxy] {
        match transport {
            Transport::Http => &self.http,
            Transport::Https => &self.https,
            Transport::Socks => &self.socks,
        }
    }

    fn partition_mut(&mut self, transport: Transport) -> &mut Vec<Proxy> {
        match transport {
            Transport::Http => &mut self.http,
            Transport::Https => &mut self.https,
            Transport::Socks => &mut self.socks,
        }
    }

    pub fn len(&self) -> usize {
        self.http.len() + self.https.len() + self.socks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn counts(&self) -> PoolCounts {
        PoolCounts {
            http: self.http.len(),
            https: self.https.len(),
            socks: self.socks.len(),
        }
    }

    /// Uniformly random proxy of the requested transport.
    ///
    /// `None` means the partition is empty; callers fall back to a direct
    /// connection.
    pub fn pick(&self, transport: Transport) -> Option<&Proxy> {
        self.partition(transport).choose(&mut rand::rng())
    }

    /// Remove the entries at the given positions of one partition.
    ///
    /// Positions refer to the partition as it was when the validator took its
    /// snapshot; the pool is not touched between snapshot and removal.
    pub(crate) fn remove_indices(&mut self, transport: Transport, dead: &HashSet<usize>) {
        if dead.is_empty() {
            return;
        }
        let partition = self.partition_mut(transport);
        let mut index = 0;
        partition.retain(|_| {
            let keep = !dead.contains(&index);
            index += 1;
            keep
        });
    }

    /// Write the pool in the proxy file format, one `address|transport` per line
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content: String = Transport::ALL
            .iter()
            .flat_map(|transport| self.partition(*transport))
            .map(|p| p.to_line())
            .collect::<Vec<_>>()
            .join("\n");

        fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pool() -> ProxyPool {
        let mut pool = ProxyPool::new();
        pool.push(Proxy::new("10.0.0.1:80", Transport::Http));
        pool.push(Proxy::new("10.0.0.2:443", Transport::Https));
        pool.push(Proxy::new("10.0.0.3:443", Transport::Https));
        pool.push(Proxy::new("10.0.0.4:1080", Transport::Socks));
        pool
    }

    #[test]
    fn test_push_routes_to_partition() {
        let pool = sample_pool();
        assert_eq!(pool.partition(Transport::Http).len(), 1);
        assert_eq!(pool.partition(Transport::Https).len(), 2);
        assert_eq!(pool.partition(Transport::Socks).len(), 1);
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn test_counts() {
        let counts = sample_pool().counts();
        assert_eq!(counts.http, 1);
        assert_eq!(counts.https, 2);
        assert_eq!(counts.socks, 1);
        assert_eq!(counts.total(), 4);
        assert_eq!(counts.to_string(), "total: 4, http: 1, https: 2, socks: 1");
    }

    #[test]
    fn test_duplicates_are_kept() {
        let mut pool = ProxyPool::new();
        pool.push(Proxy::new("1.1.1.1:80", Transport::Http));
        pool.push(Proxy::new("1.1.1.1:80", Transport::Http));
        assert_eq!(pool.partition(Transport::Http).len(), 2);
    }

    #[test]
    fn test_clear() {
        let mut pool = sample_pool();
        pool.clear();
        assert!(pool.is_empty());
        assert_eq!(pool.counts(), PoolCounts::default());
    }

    #[test]
    fn test_pick_empty_partition() {
        let pool = ProxyPool::new();
        for transport in Transport::ALL {
            assert!(pool.pick(transport).is_none());
        }
    }

    #[test]
    fn test_pick_returns_member_of_partition() {
        let pool = sample_pool();
        for _ in 0..20 {
            let picked = pool.pick(Transport::Https).unwrap();
            assert_eq!(picked.transport, Transport::Https);
            assert!(pool.partition(Transport::Https).contains(picked));
        }
        assert_eq!(pool.pick(Transport::Socks).unwrap().address, "10.0.0.4:1080");
    }

    #[test]
    fn test_remove_indices() {
        let mut pool = sample_pool();
        let dead: HashSet<usize> = [0].into_iter().collect();
        pool.remove_indices(Transport::Https, &dead);
        assert_eq!(pool.partition(Transport::Https).len(), 1);
        assert_eq!(pool.partition(Transport::Https)[0].address, "10.0.0.3:443");
        // other partitions untouched
        assert_eq!(pool.partition(Transport::Http).len(), 1);
        assert_eq!(pool.partition(Transport::Socks).len(), 1);
    }

    #[test]
    fn test_remove_indices_with_duplicates() {
        let mut pool = ProxyPool::new();
        pool.push(Proxy::new("1.1.1.1:80", Transport::Socks));
        pool.push(Proxy::new("1.1.1.1:80", Transport::Socks));
        pool.push(Proxy::new("2.2.2.2:80", Transport::Socks));
        let dead: HashSet<usize> = [1, 2].into_iter().collect();
        pool.remove_indices(Transport::Socks, &dead);
        assert_eq!(
            pool.partition(Transport::Socks),
            &[Proxy::new("1.1.1.1:80", Transport::Socks)]
        );
    }

    #[test]
    fn test_save_to_file() {
        let path = std::env::temp_dir().join(format!("pool-{}.txt", uuid::Uuid::new_v4()));
        sample_pool().save_to_file(&path).unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec![
                "10.0.0.1:80|http",
                "10.0.0.2:443|https",
                "10.0.0.3:443|https",
                "10.0.0.4:1080|socks",
            ]
        );
    }
}
