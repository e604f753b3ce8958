//! # Expiring Cache
//!
//! Memoises an expensive, argument-keyed computation (directory scans,
//! shelling out to `df`, reading `/proc`) for a fixed lifetime.
//!
//! ## Expiry policy
//!
//! Every entry records its own expiry, but expiry is acted on for the cache
//! as a whole: the first lookup that finds *any* entry past its expiry clears
//! the entire cache before computing. A caller therefore never sees a value
//! older than one lifetime, and all keys refresh together.
//!
//! When the cache is full the least recently used entry is evicted.
//!
//! ## Usage
//!
//! ```
//! use rms_telemetry::cache::TtlCache;
//! use std::time::Duration;
//!
//! let mut cache = TtlCache::new(8, Duration::from_secs(60));
//! let value = cache.get_or_insert_with("disk".to_string(), || 42);
//! assert_eq!(value, 42);
//! ```

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Source of the current time, injectable for tests.
#[cfg_attr(test, mockall::automock)]
pub trait Clock {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
    last_used: u64,
}

/// Bounded map of `key -> (value, expiry)`.
#[derive(Debug)]
pub struct TtlCache<K, V, C = SystemClock> {
    entries: HashMap<K, Entry<V>>,
    capacity: usize,
    lifetime: Duration,
    clock: C,
    tick: u64,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V, SystemClock> {
    /// Creates a cache holding at most `capacity` keys for `lifetime` each.
    #[must_use]
    pub fn new(capacity: usize, lifetime: Duration) -> Self {
        Self::with_clock(capacity, lifetime, SystemClock)
    }
}

impl<K: Eq + Hash + Clone, V: Clone, C: Clock> TtlCache<K, V, C> {
    /// Creates a cache reading time from `clock`.
    ///
    /// A capacity of zero is treated as one.
    #[must_use]
    pub fn with_clock(capacity: usize, lifetime: Duration, clock: C) -> Self {
        Self {
            entries: HashMap::new(),
            capacity: capacity.max(1),
            lifetime,
            clock,
            tick: 0,
        }
    }

    /// Number of cached keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every cached value.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Return the cached value for `key`, computing it with `compute` when
    /// absent or expired.
    pub fn get_or_insert_with<F>(&mut self, key: K, compute: F) -> V
    where
        F: FnOnce() -> V,
    {
        self.try_get_or_insert_with(key, || Ok::<V, std::convert::Infallible>(compute()))
            .unwrap_or_else(|never| match never {})
    }

    /// Like [`get_or_insert_with`](Self::get_or_insert_with) for fallible
    /// computations. Errors are returned to the caller and not cached.
    ///
    /// # Errors
    ///
    /// Returns whatever `compute` returns
    pub fn try_get_or_insert_with<F, E>(&mut self, key: K, compute: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        let now = self.clock.now();
        if self.entries.values().any(|entry| now >= entry.expires_at) {
            self.entries.clear();
        }

        self.tick += 1;
        if let Some(entry) = self.entries.get_mut(&key) {
            entry.last_used = self.tick;
            return Ok(entry.value.clone());
        }

        let value = compute()?;

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_used)
                .map(|(key, _)| key.clone())
            {
                self.entries.remove(&oldest);
            }
        }

        self.entries.insert(
            key,
            Entry {
                value: value.clone(),
                expires_at: now + self.lifetime,
                last_used: self.tick,
            },
        );
        Ok(value)
    }
}
