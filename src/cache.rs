//! Content-addressed result cache.
//!
//! Keys are SHA-256 hashes of the serialized inputs plus the lookback
//! window, so identical requests hit identical entries. Entries expire on a
//! TTL and are disposable copies, never shared mutable references. A key
//! being computed admits exactly one computation: concurrent requests for
//! the same key block on the in-flight slot instead of duplicating work.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::error::Result;

/// Minimum and maximum TTLs; staleness tolerance varies with input
/// volatility but stays inside this band.
pub const MIN_TTL: Duration = Duration::from_secs(2 * 60);
pub const MAX_TTL: Duration = Duration::from_secs(60 * 60);

/// Compute the SHA-256 hex digest of any serializable value.
pub fn content_hash<T: Serialize>(value: &T) -> String {
    let serialized = serde_json::to_string(value).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Cache key for a computation over some inputs and a lookback window.
pub fn cache_key<T: Serialize>(inputs: &T, window: usize) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content_hash(inputs).as_bytes());
    hasher.update(window.to_le_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Clone)]
enum Slot<V> {
    InFlight,
    Ready { value: V, expires_at: Instant },
}

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10 * 60),
            max_entries: 256,
        }
    }
}

impl CacheConfig {
    /// Clamp the TTL into the supported staleness band.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl.clamp(MIN_TTL, MAX_TTL);
        self
    }
}

/// Bounded TTL cache with at-most-once computation per key.
pub struct ComputeCache<V: Clone> {
    config: CacheConfig,
    slots: Mutex<HashMap<String, Slot<V>>>,
    ready: Condvar,
}

impl<V: Clone> ComputeCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            slots: Mutex::new(HashMap::new()),
            ready: Condvar::new(),
        }
    }

    /// Look up `key`, computing and caching on a miss. A concurrent request
    /// for an in-flight key waits for the winner's value. Errors are not
    /// cached; the slot is released so a later request can retry.
    pub fn get_or_compute<F>(&self, key: &str, compute: F) -> Result<V>
    where
        F: FnOnce() -> Result<V>,
    {
        {
            let mut slots = self.slots.lock().unwrap();
            loop {
                match slots.get(key) {
                    Some(Slot::Ready { value, expires_at }) => {
                        if *expires_at > Instant::now() {
                            return Ok(value.clone());
                        }
                        // Expired: this thread takes over the slot.
                        slots.insert(key.to_string(), Slot::InFlight);
                        break;
                    }
                    Some(Slot::InFlight) => {
                        slots = self.ready.wait(slots).unwrap();
                    }
                    None => {
                        slots.insert(key.to_string(), Slot::InFlight);
                        break;
                    }
                }
            }
        }

        // Compute outside the lock.
        match compute() {
            Ok(value) => {
                let mut slots = self.slots.lock().unwrap();
                slots.insert(
                    key.to_string(),
                    Slot::Ready {
                        value: value.clone(),
                        expires_at: Instant::now() + self.config.ttl,
                    },
                );
                Self::evict_overflow(&mut slots, self.config.max_entries);
                self.ready.notify_all();
                Ok(value)
            }
            Err(error) => {
                let mut slots = self.slots.lock().unwrap();
                slots.remove(key);
                self.ready.notify_all();
                Err(error)
            }
        }
    }

    /// Peek without computing.
    pub fn get(&self, key: &str) -> Option<V> {
        let slots = self.slots.lock().unwrap();
        match slots.get(key) {
            Some(Slot::Ready { value, expires_at }) if *expires_at > Instant::now() => {
                Some(value.clone())
            }
            _ => None,
        }
    }

    /// Number of live (unexpired, completed) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        let slots = self.slots.lock().unwrap();
        slots
            .values()
            .filter(|slot| matches!(slot, Slot::Ready { expires_at, .. } if *expires_at > now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.slots.lock().unwrap().clear();
    }

    /// Drop expired entries; if still over capacity, drop the entries
    /// closest to expiry. In-flight slots are never evicted.
    fn evict_overflow(slots: &mut HashMap<String, Slot<V>>, max_entries: usize) {
        let now = Instant::now();
        slots.retain(|_, slot| match slot {
            Slot::Ready { expires_at, .. } => *expires_at > now,
            Slot::InFlight => true,
        });

        let ready_count = slots
            .values()
            .filter(|s| matches!(s, Slot::Ready { .. }))
            .count();
        if ready_count <= max_entries {
            return;
        }

        let mut by_expiry: Vec<(String, Instant)> = slots
            .iter()
            .filter_map(|(k, slot)| match slot {
                Slot::Ready { expires_at, .. } => Some((k.clone(), *expires_at)),
                Slot::InFlight => None,
            })
            .collect();
        by_expiry.sort_by_key(|(_, expires_at)| *expires_at);
        for (key, _) in by_expiry.iter().take(ready_count - max_entries) {
            slots.remove(key);
        }
    }
}
