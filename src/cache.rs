// src/cache.rs
//! Process-local TTL cache. Entries expire lazily on read; there is no size
//! cap. A `Clock` is injected so expiry can be tested without sleeping.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

/// Millisecond clock. Production uses `SystemClock`; tests drive a manual one.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Manually-advanced clock for tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<u64>,
}

impl ManualClock {
    pub fn at(ms: u64) -> Self {
        Self { now: Mutex::new(ms) }
    }

    pub fn advance(&self, ms: u64) {
        *self.now.lock().expect("clock mutex poisoned") += ms;
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        *self.now.lock().expect("clock mutex poisoned")
    }
}

struct Entry<V> {
    value: V,
    expires_at_ms: u64,
}

/// String-keyed TTL cache, safe for concurrent use. Coarse locking is fine
/// here: contention is low and the critical sections are tiny.
pub struct TtlCache<V> {
    clock: Arc<dyn Clock>,
    inner: Mutex<HashMap<String, Entry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            inner: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached value, dropping it first if its TTL has elapsed.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now_ms();
        let mut map = self.inner.lock().expect("cache mutex poisoned");
        match map.get(key) {
            Some(e) if e.expires_at_ms > now => Some(e.value.clone()),
            Some(_) => {
                map.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn set(&self, key: impl Into<String>, value: V, ttl_ms: u64) {
        let expires_at_ms = self.clock.now_ms().saturating_add(ttl_ms);
        let mut map = self.inner.lock().expect("cache mutex poisoned");
        map.insert(key.into(), Entry { value, expires_at_ms });
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("cache mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
