//! TTL cache with single-flight deduplication for remote calls.
//!
//! Both platform clients funnel their GETs through a [`RequestCache`]: a
//! fresh entry short-circuits the network entirely, and concurrent calls for
//! the same key share one in-flight future instead of issuing duplicate
//! requests. The cache is an explicitly constructed object owned by whoever
//! builds the client; there is no process-wide singleton.
//!
//! Keys combine the logical endpoint with a non-reversible fragment of the
//! credential, so two accounts never share a cache slot while the full
//! secret never sits in a map key.
//!
//! Under the cooperative scheduler the only ordering hazard is a suspension
//! between "check cache" and "register in-flight"; both happen under a single
//! synchronous mutex guard with no await point in between.

use crate::error::{Error, NetworkError};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Entries older than this are treated as absent.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Bounded per-call timeout wrapped around every loader.
pub const DEFAULT_LOADER_TIMEOUT: Duration = Duration::from_secs(4);

/// Cache key: logical endpoint plus a credential fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    endpoint: String,
    credential_fingerprint: String,
}

impl CacheKey {
    pub fn new(endpoint: impl Into<String>, credential: &str) -> Self {
        Self {
            endpoint: endpoint.into(),
            credential_fingerprint: fingerprint(credential),
        }
    }
}

/// Non-reversible fragment of a credential: the first eight bytes of its
/// SHA-256 digest, hex-encoded. Enough to separate accounts, useless for
/// recovering the secret.
pub fn fingerprint(credential: &str) -> String {
    let digest = Sha256::digest(credential.as_bytes());
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

struct CacheEntry<T> {
    data: T,
    fetched_at: Instant,
}

type SharedLoad<T> = Shared<BoxFuture<'static, Result<T, Error>>>;

struct Inner<T> {
    entries: HashMap<CacheKey, CacheEntry<T>>,
    in_flight: HashMap<CacheKey, SharedLoad<T>>,
}

/// TTL + single-flight cache for values of type `T`.
///
/// Entries are created on first successful fetch, read-only until expiry,
/// and replaced (not mutated) on refresh. Failed loads cache nothing.
pub struct RequestCache<T: Clone> {
    ttl: Duration,
    loader_timeout: Duration,
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T: Clone> Clone for RequestCache<T> {
    fn clone(&self) -> Self {
        Self {
            ttl: self.ttl,
            loader_timeout: self.loader_timeout,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Default for RequestCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> RequestCache<T> {
    pub fn new() -> Self {
        Self::with_config(DEFAULT_TTL, DEFAULT_LOADER_TIMEOUT)
    }

    pub fn with_config(ttl: Duration, loader_timeout: Duration) -> Self {
        Self {
            ttl,
            loader_timeout,
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                in_flight: HashMap::new(),
            })),
        }
    }
}

impl<T> RequestCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Return the cached value for `key`, or run `loader` to produce it.
    ///
    /// - Fresh entry (`age < ttl`): returned without invoking `loader`.
    /// - In-flight load for the same key: awaited and shared, no second
    ///   network call.
    /// - Otherwise `loader` runs under the bounded timeout; expiry maps to
    ///   [`NetworkError::Timeout`]. On settlement the in-flight registration
    ///   is removed unconditionally; the entry is written only on success.
    pub async fn fetch<F, Fut>(&self, key: CacheKey, loader: F) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>> + Send + 'static,
    {
        let shared = {
            let mut inner = self.inner.lock().expect("cache lock poisoned");

            if let Some(entry) = inner.entries.get(&key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    trace!(?key, "cache hit");
                    return Ok(entry.data.clone());
                }
                // Expired entries are absent; drop the stale copy now.
                inner.entries.remove(&key);
            }

            if let Some(existing) = inner.in_flight.get(&key) {
                debug!(?key, "joining in-flight request");
                existing.clone()
            } else {
                debug!(?key, "starting loader");
                let fut = Self::run_loader(
                    Arc::clone(&self.inner),
                    key.clone(),
                    self.loader_timeout,
                    loader(),
                );
                let shared = fut.boxed().shared();
                inner.in_flight.insert(key, shared.clone());
                shared
            }
            // Guard drops here; check and registration were atomic.
        };

        shared.await
    }

    async fn run_loader<Fut>(
        inner: Arc<Mutex<Inner<T>>>,
        key: CacheKey,
        loader_timeout: Duration,
        fut: Fut,
    ) -> Result<T, Error>
    where
        Fut: Future<Output = Result<T, Error>>,
    {
        let result = match tokio::time::timeout(loader_timeout, fut).await {
            Ok(settled) => settled,
            Err(_) => Err(Error::Network(NetworkError::Timeout(loader_timeout))),
        };

        let mut guard = inner.lock().expect("cache lock poisoned");
        guard.in_flight.remove(&key);
        if let Ok(ref data) = result {
            guard.entries.insert(
                key,
                CacheEntry {
                    data: data.clone(),
                    fetched_at: Instant::now(),
                },
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_loader(
        calls: Arc<AtomicUsize>,
        value: &'static str,
        delay: Duration,
    ) -> impl Future<Output = Result<String, Error>> + Send + 'static {
        async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            Ok(value.to_string())
        }
    }

    #[tokio::test]
    async fn test_fresh_entry_skips_loader() {
        let cache: RequestCache<String> = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::new("/api/v1/courses", "token-a");

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let got = cache
                .fetch(key.clone(), move || {
                    counting_loader(calls, "payload", Duration::ZERO)
                })
                .await
                .unwrap();
            assert_eq!(got, "payload");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_share_one_flight() {
        let cache: RequestCache<String> = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::new("/api/v1/courses", "token-a");

        let (a, b) = tokio::join!(
            cache.fetch(key.clone(), {
                let calls = Arc::clone(&calls);
                move || counting_loader(calls, "shared", Duration::from_millis(50))
            }),
            cache.fetch(key.clone(), {
                let calls = Arc::clone(&calls);
                move || counting_loader(calls, "shared", Duration::from_millis(50))
            }),
        );

        assert_eq!(a.unwrap(), "shared");
        assert_eq!(b.unwrap(), "shared");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_reloads() {
        let cache: RequestCache<String> =
            RequestCache::with_config(Duration::from_millis(10), DEFAULT_LOADER_TIMEOUT);
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::new("/api/v1/courses", "token-a");

        let first = Arc::clone(&calls);
        cache
            .fetch(key.clone(), move || {
                counting_loader(first, "v1", Duration::ZERO)
            })
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(25)).await;

        let second = Arc::clone(&calls);
        cache
            .fetch(key.clone(), move || {
                counting_loader(second, "v2", Duration::ZERO)
            })
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_load_caches_nothing() {
        let cache: RequestCache<String> = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::new("/api/v1/courses", "token-a");

        let first = Arc::clone(&calls);
        let err = cache
            .fetch(key.clone(), move || async move {
                first.fetch_add(1, Ordering::SeqCst);
                Err::<String, _>(Error::Network(NetworkError::ConnectionFailed(
                    "refused".to_string(),
                )))
            })
            .await;
        assert!(err.is_err());

        let second = Arc::clone(&calls);
        let ok = cache
            .fetch(key.clone(), move || {
                counting_loader(second, "recovered", Duration::ZERO)
            })
            .await
            .unwrap();

        assert_eq!(ok, "recovered");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_slow_loader_times_out() {
        let cache: RequestCache<String> =
            RequestCache::with_config(DEFAULT_TTL, Duration::from_millis(10));
        let calls = Arc::new(AtomicUsize::new(0));
        let key = CacheKey::new("/api/v1/courses", "token-a");

        let got = cache
            .fetch(key, move || {
                counting_loader(calls, "too slow", Duration::from_secs(5))
            })
            .await;

        assert_eq!(
            got,
            Err(Error::Network(NetworkError::Timeout(
                Duration::from_millis(10)
            )))
        );
    }

    #[tokio::test]
    async fn test_accounts_never_share_a_slot() {
        let cache: RequestCache<String> = RequestCache::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let a = Arc::clone(&calls);
        cache
            .fetch(CacheKey::new("/api/v1/courses", "token-a"), move || {
                counting_loader(a, "alice", Duration::ZERO)
            })
            .await
            .unwrap();

        let b = Arc::clone(&calls);
        let got = cache
            .fetch(CacheKey::new("/api/v1/courses", "token-b"), move || {
                counting_loader(b, "bob", Duration::ZERO)
            })
            .await
            .unwrap();

        assert_eq!(got, "bob");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fingerprint_never_contains_credential() {
        let fp = fingerprint("hunter2-very-secret");
        assert_eq!(fp.len(), 16);
        assert!(!fp.contains("hunter2"));
        assert_ne!(fingerprint("token-a"), fingerprint("token-b"));
    }
}
