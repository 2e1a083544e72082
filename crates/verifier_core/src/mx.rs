//! Cached MX resolution.
//!
//! Answers "does this domain accept mail, and at which host" while bounding
//! DNS query volume. Verdicts (positive and negative) are cached for a fixed
//! TTL and evicted lazily on read. Concurrent resolutions for the same
//! domain are coalesced: callers queue on a per-domain slot, so only the
//! first issues a DNS query and the rest observe its cached verdict.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hickory_resolver::{
    config::{ResolverConfig, ResolverOpts},
    error::ResolveErrorKind,
    AsyncResolver, TokioAsyncResolver,
};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::FailureReason;

/// One MX answer: preference value and exchange hostname.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxRecord {
    pub preference: u16,
    /// Lower-cased exchange host, trailing dot stripped.
    pub exchange: String,
}

/// Classified MX lookup failure.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum MxLookupError {
    #[error("no MX records")]
    NoRecords,
    #[error("MX lookup timed out")]
    Timeout,
    #[error("MX lookup failed: {0}")]
    Other(String),
}

/// Performs the actual MX query. Consulted only on cache miss.
#[async_trait]
pub trait MxResolve: Send + Sync {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, MxLookupError>;
}

/// Verdict for a domain: whether it accepts mail and at which host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxVerdict {
    pub has_mx: bool,
    pub mx_host: Option<String>,
    /// Set when `has_mx` is false: [`FailureReason::NoMxRecord`] or
    /// [`FailureReason::DnsTimeout`].
    pub reason: Option<FailureReason>,
}

impl MxVerdict {
    fn accepts_mail(host: String) -> Self {
        Self {
            has_mx: true,
            mx_host: Some(host),
            reason: None,
        }
    }

    fn no_mail(reason: FailureReason) -> Self {
        Self {
            has_mx: false,
            mx_host: None,
            reason: Some(reason),
        }
    }
}

/// MX resolver backed by hickory-resolver.
pub struct HickoryMxResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryMxResolver {
    pub fn new(timeout_ms: u64, attempts: usize) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = Duration::from_millis(timeout_ms);
        opts.attempts = attempts;

        let resolver = AsyncResolver::tokio(ResolverConfig::default(), opts);
        info!(timeout_ms, attempts, "DNS resolver initialized");

        Self { resolver }
    }
}

#[async_trait]
impl MxResolve for HickoryMxResolver {
    async fn lookup_mx(&self, domain: &str) -> Result<Vec<MxRecord>, MxLookupError> {
        match self.resolver.mx_lookup(domain).await {
            Ok(lookup) => Ok(lookup
                .iter()
                .map(|mx| MxRecord {
                    preference: mx.preference(),
                    exchange: mx
                        .exchange()
                        .to_utf8()
                        .trim_end_matches('.')
                        .to_ascii_lowercase(),
                })
                .collect()),
            Err(e) => match e.kind() {
                ResolveErrorKind::NoRecordsFound { .. } => Err(MxLookupError::NoRecords),
                ResolveErrorKind::Timeout => Err(MxLookupError::Timeout),
                _ => Err(MxLookupError::Other(e.to_string())),
            },
        }
    }
}

struct StoredVerdict {
    verdict: MxVerdict,
    expires_at: Instant,
}

type Slot = Arc<tokio::sync::Mutex<Option<StoredVerdict>>>;

/// Time-bounded memo of domain → MX verdict, shared and thread-safe.
///
/// Entries are replaced wholesale and never partially updated; expiry is
/// checked on read. One slot exists per domain, and resolution holds the
/// slot lock, which gives the single-flight guarantee for free.
pub struct MxCache {
    resolver: Arc<dyn MxResolve>,
    ttl: Duration,
    slots: Mutex<HashMap<String, Slot>>,
}

impl MxCache {
    pub fn new(resolver: Arc<dyn MxResolve>, ttl: Duration) -> Self {
        Self {
            resolver,
            ttl,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a domain through the cache.
    ///
    /// Cache hit within the TTL returns the stored verdict with no DNS
    /// traffic. On miss or expiry one caller queries while concurrent
    /// callers for the same domain wait on its slot.
    pub async fn resolve(&self, domain: &str) -> MxVerdict {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(slots.entry(domain.to_owned()).or_default())
        };

        let mut guard = slot.lock().await;
        if let Some(stored) = guard.as_ref() {
            if Instant::now() < stored.expires_at {
                debug!(domain, "MX cache hit");
                return stored.verdict.clone();
            }
            debug!(domain, "MX cache entry expired");
        }

        let verdict = self.query(domain).await;
        *guard = Some(StoredVerdict {
            verdict: verdict.clone(),
            expires_at: Instant::now() + self.ttl,
        });
        verdict
    }

    async fn query(&self, domain: &str) -> MxVerdict {
        match self.resolver.lookup_mx(domain).await {
            Ok(records) => match select_exchange(&records) {
                Some(host) => {
                    debug!(domain, host = %host, "MX resolved");
                    MxVerdict::accepts_mail(host)
                }
                None => {
                    debug!(domain, "empty MX answer set");
                    MxVerdict::no_mail(FailureReason::NoMxRecord)
                }
            },
            Err(MxLookupError::Timeout) => {
                warn!(domain, "MX lookup timed out");
                MxVerdict::no_mail(FailureReason::DnsTimeout)
            }
            Err(e) => {
                debug!(domain, error = %e, "MX lookup failed");
                MxVerdict::no_mail(FailureReason::NoMxRecord)
            }
        }
    }

    /// Number of cached domains, expired entries included.
    pub fn len(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Pick the lowest-preference exchange; equal preferences tie-break on the
/// lexicographically first hostname, for determinism.
fn select_exchange(records: &[MxRecord]) -> Option<String> {
    records
        .iter()
        .min_by(|a, b| {
            a.preference
                .cmp(&b.preference)
                .then_with(|| a.exchange.cmp(&b.exchange))
        })
        .map(|mx| mx.exchange.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingResolver {
        calls: AtomicUsize,
        response: Result<Vec<MxRecord>, MxLookupError>,
        delay: Duration,
    }

    impl CountingResolver {
        fn new(response: Result<Vec<MxRecord>, MxLookupError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response,
                delay: Duration::ZERO,
            })
        }

        fn slow(response: Result<Vec<MxRecord>, MxLookupError>, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                response,
                delay,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl MxResolve for CountingResolver {
        async fn lookup_mx(&self, _domain: &str) -> Result<Vec<MxRecord>, MxLookupError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.delay > Duration::ZERO {
                tokio::time::sleep(self.delay).await;
            }
            self.response.clone()
        }
    }

    fn mx(pref: u16, host: &str) -> MxRecord {
        MxRecord {
            preference: pref,
            exchange: host.to_owned(),
        }
    }

    #[test]
    fn selects_lowest_preference() {
        let records = vec![mx(20, "backup.example.com"), mx(10, "mail.example.com")];
        assert_eq!(
            select_exchange(&records),
            Some("mail.example.com".to_owned())
        );
    }

    #[test]
    fn equal_preference_breaks_tie_lexicographically() {
        let records = vec![mx(10, "mx2.example.com"), mx(10, "mx1.example.com")];
        assert_eq!(select_exchange(&records), Some("mx1.example.com".to_owned()));
    }

    #[tokio::test]
    async fn repeated_resolution_within_ttl_queries_once() {
        let resolver = CountingResolver::new(Ok(vec![mx(10, "mail.example.com")]));
        let cache = MxCache::new(resolver.clone(), Duration::from_secs(300));

        let first = cache.resolve("example.com").await;
        let second = cache.resolve("example.com").await;

        assert_eq!(resolver.calls(), 1);
        assert!(first.has_mx);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn negative_verdicts_are_cached_too() {
        let resolver = CountingResolver::new(Err(MxLookupError::NoRecords));
        let cache = MxCache::new(resolver.clone(), Duration::from_secs(300));

        let first = cache.resolve("nomx.example").await;
        let second = cache.resolve("nomx.example").await;

        assert_eq!(resolver.calls(), 1);
        assert!(!first.has_mx);
        assert_eq!(first.reason, Some(FailureReason::NoMxRecord));
        assert_eq!(first, second);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_triggers_fresh_query() {
        let resolver = CountingResolver::new(Ok(vec![mx(10, "mail.example.com")]));
        let cache = MxCache::new(resolver.clone(), Duration::from_secs(300));

        cache.resolve("example.com").await;
        tokio::time::advance(Duration::from_secs(301)).await;
        cache.resolve("example.com").await;

        assert_eq!(resolver.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_same_domain_resolutions_coalesce() {
        let resolver = CountingResolver::slow(
            Ok(vec![mx(10, "mail.example.com")]),
            Duration::from_millis(50),
        );
        let cache = Arc::new(MxCache::new(resolver.clone(), Duration::from_secs(300)));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            handles.push(tokio::spawn(
                async move { cache.resolve("example.com").await },
            ));
        }
        for handle in handles {
            let verdict = handle.await.expect("task panicked");
            assert_eq!(verdict.mx_host.as_deref(), Some("mail.example.com"));
        }

        assert_eq!(resolver.calls(), 1, "concurrent lookups must coalesce");
    }

    #[tokio::test]
    async fn distinct_domains_query_independently() {
        let resolver = CountingResolver::new(Ok(vec![mx(10, "mail.example.com")]));
        let cache = MxCache::new(resolver.clone(), Duration::from_secs(300));

        cache.resolve("a.example").await;
        cache.resolve("b.example").await;

        assert_eq!(resolver.calls(), 2);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn timeout_is_classified_as_dns_timeout() {
        let resolver = CountingResolver::new(Err(MxLookupError::Timeout));
        let cache = MxCache::new(resolver, Duration::from_secs(300));

        let verdict = cache.resolve("slow.example").await;
        assert!(!verdict.has_mx);
        assert_eq!(verdict.reason, Some(FailureReason::DnsTimeout));
    }
}
