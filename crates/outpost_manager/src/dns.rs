//! The DNS provider boundary.
//!
//! The actual record store (a cloud DNS zone) is an external collaborator;
//! the binder only needs an upsert. Implementations must refuse obviously
//! wrong updates - an empty ip set or a local-only domain - without failing
//! the caller.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Errors from the DNS provider.
#[derive(Debug, thiserror::Error)]
pub enum DnsError {
    #[error("dns provider unavailable: {0}")]
    Unavailable(String),

    #[error("dns provider rejected {domain}: {reason}")]
    Rejected { domain: String, reason: String },
}

/// Upserts A-records for task domains.
#[async_trait]
pub trait Dns: Send + Sync {
    /// Creates or replaces the A-record mapping `domain` to `ips`.
    async fn create_or_update(&self, domain: &str, ips: &BTreeSet<String>) -> Result<(), DnsError>;
}

/// In-memory record table. Stands in for a real zone in local deployments
/// and tests; reads back what was upserted.
#[derive(Debug, Default)]
pub struct MemoryDns {
    records: DashMap<String, BTreeSet<String>>,
}

impl MemoryDns {
    pub fn new() -> Self {
        Self::default()
    }

    /// The ips currently bound to a domain.
    pub fn record(&self, domain: &str) -> Option<BTreeSet<String>> {
        self.records.get(domain).map(|r| r.value().clone())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Dns for MemoryDns {
    async fn create_or_update(&self, domain: &str, ips: &BTreeSet<String>) -> Result<(), DnsError> {
        if ips.is_empty() || domain.contains("localhost") {
            warn!("Ignoring attempt to set DNS! domain={} ips={:?}", domain, ips);
            return Ok(());
        }

        info!("Updating DNS entry: domain={} ips={:?}", domain, ips);
        self.records.insert(domain.to_owned(), ips.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ips(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[tokio::test]
    async fn test_upsert_replaces_the_record() {
        let dns = MemoryDns::new();
        dns.create_or_update("play.outpost.example", &ips(&["203.0.113.1"]))
            .await
            .unwrap();
        dns.create_or_update("play.outpost.example", &ips(&["203.0.113.2", "203.0.113.3"]))
            .await
            .unwrap();

        assert_eq!(
            dns.record("play.outpost.example"),
            Some(ips(&["203.0.113.2", "203.0.113.3"]))
        );
        assert_eq!(dns.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_ips_and_local_domains_are_ignored() {
        let dns = MemoryDns::new();
        dns.create_or_update("play.outpost.example", &BTreeSet::new())
            .await
            .unwrap();
        dns.create_or_update("localhost", &ips(&["127.0.0.1"]))
            .await
            .unwrap();
        assert!(dns.is_empty());
    }
}
