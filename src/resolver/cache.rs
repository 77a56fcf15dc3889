//! TTL cache in front of another resolver.

use quick_cache::sync::Cache;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::Resolver;
use crate::Result;

/// Default cache capacity (number of hostnames).
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Default lifetime of a cached answer.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
struct CacheEntry {
    addrs: Arc<[IpAddr]>,
    expires_at: Instant,
}

/// Caches successful lookups of an inner resolver for a fixed TTL.
///
/// Failed and empty lookups are not cached, so the next dial retries them.
pub struct CachingResolver<R> {
    inner: R,
    cache: Cache<String, CacheEntry>,
    ttl: Duration,
}

impl<R: Resolver> CachingResolver<R> {
    /// Wrap `inner` with the default capacity and TTL.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, DEFAULT_CACHE_CAPACITY, DEFAULT_TTL)
    }

    /// Wrap `inner` with an explicit capacity and TTL.
    pub fn with_config(inner: R, capacity: usize, ttl: Duration) -> Self {
        Self {
            inner,
            cache: Cache::new(capacity.max(1)),
            ttl,
        }
    }

    /// Get the wrapped resolver.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Get how long an answer stays cached.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Number of cached hostnames, expired ones included.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached answer.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl<R: Resolver> Resolver for CachingResolver<R> {
    fn lookup_ip(&self, host: &str) -> Result<Vec<IpAddr>> {
        let key = host.to_ascii_lowercase();

        if let Some(entry) = self.cache.get(&key) {
            if Instant::now() < entry.expires_at {
                return Ok(entry.addrs.to_vec());
            }
            self.cache.remove(&key);
        }

        let addrs = self.inner.lookup_ip(host)?;
        if !addrs.is_empty() {
            self.cache.insert(
                key,
                CacheEntry {
                    addrs: addrs.as_slice().into(),
                    expires_at: Instant::now() + self.ttl,
                },
            );
        }
        Ok(addrs)
    }
}
