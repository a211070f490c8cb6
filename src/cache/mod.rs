use std::time::{ Duration, Instant };

#[derive(Clone, Debug)]
pub struct CacheEntry<T> {
    pub value: T,
    pub fetched_at: Instant,
}

/// Single-value cache that expires `ttl` after the last store. No other invalidation.
#[derive(Debug)]
pub struct TimedCache<T> {
    ttl: Duration,
    entry: Option<CacheEntry<T>>,
}

impl<T: Clone> TimedCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, entry: None }
    }

    pub fn get_fresh(&self, now: Instant) -> Option<T> {
        let entry = self.entry.as_ref()?;
        if now.saturating_duration_since(entry.fetched_at) < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn store(&mut self, value: T, now: Instant) {
        self.entry = Some(CacheEntry { value, fetched_at: now });
    }
}
