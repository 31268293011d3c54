//! Bucket lookup for a resource, optionally keyed by a hotkey value.
//!
//! Resources without a hotkey dimension have one lazily created bucket.
//! Hotkey resources keep one bucket per distinct value in an LRU table
//! capped at `hotkey_capacity`; an evicted value starts over with fresh
//! counters if it shows up again.
//!
//! Only idle buckets are evicted: no call in flight and the circuit closed.
//! When the table is full of busy buckets, a new value is accounted on the
//! resource-wide bucket until a slot frees up.

use std::num::NonZeroUsize;
use std::sync::{Arc, OnceLock};

use lru::LruCache;
use parking_lot::Mutex;

use crate::resilience::bucket::Bucket;
use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::descriptor::ResourceDescriptor;

#[derive(Debug)]
pub struct BucketTable {
    global: OnceLock<Arc<Bucket>>,
    keyed: Option<Mutex<LruCache<String, Arc<Bucket>>>>,
}

impl BucketTable {
    pub fn new(descriptor: &ResourceDescriptor) -> Self {
        let keyed = descriptor.hotkey_dimension.map(|_| {
            let capacity = NonZeroUsize::new(descriptor.hotkey_capacity).unwrap_or(NonZeroUsize::MIN);
            Mutex::new(LruCache::new(capacity))
        });
        Self {
            global: OnceLock::new(),
            keyed,
        }
    }

    /// The bucket that tracks `hotkey`, or the resource-wide one.
    pub fn bucket(&self, descriptor: &ResourceDescriptor, hotkey: Option<&str>) -> Arc<Bucket> {
        let (Some(keyed), Some(key)) = (&self.keyed, hotkey) else {
            return self.resource_wide(descriptor);
        };

        let mut keyed = keyed.lock();
        if let Some(bucket) = keyed.get(key) {
            return bucket.clone();
        }

        if keyed.len() >= keyed.cap().get() {
            let victim = keyed
                .iter()
                .rev()
                .find(|(_, bucket)| bucket.is_idle())
                .map(|(key, _)| key.clone());
            let Some(victim) = victim else {
                tracing::warn!(
                    resource = %descriptor.name,
                    hotkey = %key,
                    "Hotkey table full of busy buckets, using resource-wide bucket"
                );
                drop(keyed);
                return self.resource_wide(descriptor);
            };
            keyed.pop(&victim);
            tracing::debug!(resource = %descriptor.name, hotkey = %victim, "Hotkey bucket evicted");
        }

        let bucket = Arc::new(Bucket::new(descriptor));
        keyed.put(key.to_string(), bucket.clone());
        bucket
    }

    fn resource_wide(&self, descriptor: &ResourceDescriptor) -> Arc<Bucket> {
        self.global
            .get_or_init(|| Arc::new(Bucket::new(descriptor)))
            .clone()
    }

    /// The resource-wide bucket, if a call has created it yet.
    pub fn global(&self) -> Option<&Arc<Bucket>> {
        self.global.get()
    }

    pub fn tracked_hotkeys(&self) -> usize {
        self.keyed.as_ref().map_or(0, |keyed| keyed.lock().len())
    }

    /// Hotkey values whose circuit is not closed.
    pub fn tripped_hotkeys(&self) -> Vec<String> {
        let Some(keyed) = &self.keyed else {
            return Vec::new();
        };
        keyed
            .lock()
            .iter()
            .filter(|(_, bucket)| bucket.circuit_state() != CircuitState::Closed)
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use super::*;
    use crate::resilience::admission::BlockReason;

    #[test]
    fn test_buckets_are_isolated_per_hotkey() {
        let descriptor = ResourceDescriptor::new("product-hotkey").hotkey(0, 16);
        let table = BucketTable::new(&descriptor);

        let a1 = table.bucket(&descriptor, Some("a"));
        let a2 = table.bucket(&descriptor, Some("a"));
        let b = table.bucket(&descriptor, Some("b"));

        assert!(Arc::ptr_eq(&a1, &a2));
        assert!(!Arc::ptr_eq(&a1, &b));
        assert_eq!(table.tracked_hotkeys(), 2);
    }

    #[test]
    fn test_lru_eviction_caps_tracked_values() {
        let descriptor = ResourceDescriptor::new("product-hotkey").hotkey(0, 2);
        let table = BucketTable::new(&descriptor);

        let a = table.bucket(&descriptor, Some("a"));
        table.bucket(&descriptor, Some("b"));
        table.bucket(&descriptor, Some("a"));
        table.bucket(&descriptor, Some("c"));

        assert_eq!(table.tracked_hotkeys(), 2);
        // "b" was least recently used; "a" survives.
        assert!(Arc::ptr_eq(&a, &table.bucket(&descriptor, Some("a"))));
    }

    #[test]
    fn test_busy_buckets_are_never_evicted() {
        let descriptor = ResourceDescriptor::new("product-hotkey")
            .concurrency_limit(1)
            .hotkey(0, 1);
        let table = BucketTable::new(&descriptor);
        let now = Instant::now();

        let a = table.bucket(&descriptor, Some("a"));
        let grant = a.try_admit(&descriptor, now).0.unwrap();

        // "a" is busy, so "b" is accounted on the resource-wide bucket.
        let b = table.bucket(&descriptor, Some("b"));
        assert!(!Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&b, table.global().unwrap()));
        assert!(Arc::ptr_eq(&a, &table.bucket(&descriptor, Some("a"))));
        assert_eq!(
            a.try_admit(&descriptor, now).0,
            Err(BlockReason::Concurrency)
        );

        a.settle(&descriptor, grant, false, Duration::ZERO, now);
        let b = table.bucket(&descriptor, Some("b"));
        assert!(!Arc::ptr_eq(&b, table.global().unwrap()));
        assert_eq!(table.tracked_hotkeys(), 1);
        assert!(!Arc::ptr_eq(&a, &table.bucket(&descriptor, Some("a"))));
    }

    #[test]
    fn test_open_circuit_survives_eviction_pressure() {
        let descriptor = ResourceDescriptor::new("product-hotkey")
            .error_ratio(0.5, Duration::from_secs(10))
            .min_request_amount(1)
            .hotkey(0, 1);
        let table = BucketTable::new(&descriptor);
        let now = Instant::now();

        let a = table.bucket(&descriptor, Some("a"));
        let grant = a.try_admit(&descriptor, now).0.unwrap();
        a.settle(&descriptor, grant, true, Duration::ZERO, now);
        assert_eq!(a.circuit_state(), CircuitState::Open);

        table.bucket(&descriptor, Some("b"));
        let again = table.bucket(&descriptor, Some("a"));
        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(table.tripped_hotkeys(), vec!["a".to_string()]);
    }

    #[test]
    fn test_global_bucket_without_dimension() {
        let descriptor = ResourceDescriptor::new("user-test");
        let table = BucketTable::new(&descriptor);
        assert!(table.global().is_none());

        let first = table.bucket(&descriptor, Some("ignored"));
        let second = table.bucket(&descriptor, None);
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.tracked_hotkeys(), 0);
    }
}
