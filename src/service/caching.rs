//! Response caching.
//!
//! # Responsibilities
//! - Serve repeated requests from a [`RequestCache`] keyed by `ServiceRequest::cache_key`
//! - Store successful responses with the request's TTL (or the cache default)
//!
//! # Design Decisions
//! - Cache misses and failed writes never fail the call; failed writes are logged
//! - Entries are type-erased; a hit of the wrong type counts as a miss
//! - Expired entries are dropped lazily on read, and swept every
//!   [`MemoryCache::SWEEP_EVERY`] writes so keys that are never read again go too

use std::any::Any;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

use crate::service::chain::{ChainError, Wrapper, WrapperCategory};
use crate::service::{BoxService, Service, ServiceError, ServiceRequest};

/// A cached response.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

#[derive(Debug, Error)]
#[error("cache failed to save: {0}")]
pub struct CacheError(pub String);

/// Storage backend for the caching wrapper.
#[async_trait]
pub trait RequestCache: Send + Sync + 'static {
    async fn get(&self, key: &str) -> Option<CachedValue>;

    async fn put(&self, key: &str, value: CachedValue, ttl: Option<Duration>) -> Result<(), CacheError>;
}

struct Entry {
    value: CachedValue,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// In-process cache on a concurrent map.
pub struct MemoryCache {
    entries: DashMap<String, Entry>,
    default_ttl: Option<Duration>,
    writes: AtomicUsize,
}

impl MemoryCache {
    /// Writes between two full sweeps of expired entries.
    pub const SWEEP_EVERY: usize = 128;

    /// `default_ttl` applies when a request gives none; `None` keeps entries forever.
    pub fn new(default_ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
            writes: AtomicUsize::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry.
    pub fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }
}

#[async_trait]
impl RequestCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<CachedValue> {
        let now = Instant::now();
        let hit = self.entries.get(key).map(|entry| {
            if entry.is_expired(now) {
                None
            } else {
                Some(Arc::clone(&entry.value))
            }
        })?;
        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        hit
    }

    async fn put(&self, key: &str, value: CachedValue, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = ttl
            .or(self.default_ttl)
            .map(|ttl| Instant::now() + ttl);
        self.entries.insert(key.to_string(), Entry { value, expires_at });
        if (self.writes.fetch_add(1, Ordering::Relaxed) + 1) % Self::SWEEP_EVERY == 0 {
            self.purge_expired();
        }
        Ok(())
    }
}

/// Wraps a unit with a read-through cache.
pub struct CachingWrapper<Req, Resp> {
    cache: Arc<dyn RequestCache>,
    _types: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp> CachingWrapper<Req, Resp> {
    pub fn new(cache: Arc<dyn RequestCache>) -> Self {
        Self {
            cache,
            _types: PhantomData,
        }
    }
}

impl<Req, Resp> Wrapper<Req, Resp> for CachingWrapper<Req, Resp>
where
    Req: ServiceRequest,
    Resp: Clone + Send + Sync + 'static,
{
    fn category(&self) -> WrapperCategory {
        WrapperCategory::Caching
    }

    fn wrap(&self, inner: BoxService<Req, Resp>, _unit: &str) -> Result<BoxService<Req, Resp>, ChainError> {
        Ok(Arc::new(CachedService {
            cache: Arc::clone(&self.cache),
            next: inner,
        }))
    }
}

struct CachedService<Req, Resp> {
    cache: Arc<dyn RequestCache>,
    next: BoxService<Req, Resp>,
}

#[async_trait]
impl<Req, Resp> Service<Req, Resp> for CachedService<Req, Resp>
where
    Req: ServiceRequest,
    Resp: Clone + Send + Sync + 'static,
{
    async fn execute(&self, request: Req) -> Result<Resp, ServiceError> {
        let Some(key) = request.cache_key() else {
            return self.next.execute(request).await;
        };

        if let Some(hit) = self.cache.get(&key).await {
            match hit.downcast::<Resp>() {
                Ok(response) => {
                    tracing::debug!(key = %key, "Cache hit");
                    return Ok(Resp::clone(&response));
                }
                Err(_) => tracing::debug!(key = %key, "Cached value has another type, ignoring"),
            }
        }

        let ttl = request.cache_ttl();
        let response = self.next.execute(request).await?;
        if let Err(e) = self.cache.put(&key, Arc::new(response.clone()), ttl).await {
            tracing::warn!(key = %key, error = %e, "Failed to store response in cache");
        }
        Ok(response)
    }

    fn opts_out(&self, category: &WrapperCategory) -> bool {
        self.next.opts_out(category)
    }

    fn expected_statuses(&self) -> Option<Vec<u16>> {
        self.next.expected_statuses()
    }

    fn record_metrics(&self, endpoint: &'static str, outcome: &Result<Resp, ServiceError>, elapsed: Duration) {
        self.next.record_metrics(endpoint, outcome, elapsed)
    }
}
