//! Process-wide resource registry.
//!
//! # Responsibilities
//! - Map resource names to descriptors and their live buckets
//! - Reject conflicting re-registration, accept identical re-registration
//! - Serve lookups without ever waiting on a writer
//!
//! # Design Decisions
//! - Copy-on-write map behind `ArcSwap`: readers load a snapshot, writers
//!   serialize on a mutex and publish a new map
//! - Registration is a startup activity, so copying the map is acceptable

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use serde::Serialize;

use crate::resilience::circuit_breaker::CircuitState;
use crate::resilience::descriptor::ResourceDescriptor;
use crate::resilience::error::GuardError;
use crate::resilience::hotkey::BucketTable;

/// A registered resource and its live state.
#[derive(Debug)]
pub struct ResourceEntry {
    descriptor: ResourceDescriptor,
    buckets: BucketTable,
}

impl ResourceEntry {
    fn new(descriptor: ResourceDescriptor) -> Self {
        let buckets = BucketTable::new(&descriptor);
        Self { descriptor, buckets }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    pub fn buckets(&self) -> &BucketTable {
        &self.buckets
    }

    /// Point-in-time view for diagnostics.
    pub fn snapshot(&self) -> ResourceSnapshot {
        let (circuit, in_flight) = self
            .buckets
            .global()
            .map(|bucket| (bucket.circuit_state(), bucket.in_flight()))
            .unwrap_or((CircuitState::Closed, 0));

        ResourceSnapshot {
            name: self.descriptor.name.clone(),
            circuit,
            in_flight,
            qps_limit: self.descriptor.qps_limit,
            concurrency_limit: self.descriptor.concurrency_limit,
            tracked_hotkeys: self.buckets.tracked_hotkeys(),
            tripped_hotkeys: self.buckets.tripped_hotkeys(),
            block_handler: self.descriptor.block_handler.as_ref().map(|h| h.name().to_string()),
            fallback_handler: self
                .descriptor
                .fallback_handler
                .as_ref()
                .map(|h| h.name().to_string()),
        }
    }
}

/// Serializable state of one resource.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceSnapshot {
    pub name: String,
    pub circuit: CircuitState,
    pub in_flight: u32,
    pub qps_limit: u32,
    pub concurrency_limit: u32,
    pub tracked_hotkeys: usize,
    pub tripped_hotkeys: Vec<String>,
    pub block_handler: Option<String>,
    pub fallback_handler: Option<String>,
}

#[derive(Debug, Default)]
pub struct ResourceRegistry {
    resources: ArcSwap<HashMap<String, Arc<ResourceEntry>>>,
    write_lock: Mutex<()>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource.
    ///
    /// Registering the same content twice returns the existing entry.
    pub fn register(&self, descriptor: ResourceDescriptor) -> Result<Arc<ResourceEntry>, GuardError> {
        descriptor.validate()?;

        let _writer = self.write_lock.lock();
        let current = self.resources.load();
        if let Some(existing) = current.get(&descriptor.name) {
            if existing.descriptor.same_content(&descriptor) {
                return Ok(existing.clone());
            }
            return Err(GuardError::DuplicateResource(descriptor.name));
        }

        let name = descriptor.name.clone();
        let entry = Arc::new(ResourceEntry::new(descriptor));
        let mut next = HashMap::clone(&current);
        next.insert(name.clone(), entry.clone());
        let next_len = next.len();
        self.resources.store(Arc::new(next));

        tracing::debug!(resource = %name, resources = next_len, "Registry updated");
        Ok(entry)
    }

    pub fn lookup(&self, name: &str) -> Result<Arc<ResourceEntry>, GuardError> {
        self.resources
            .load()
            .get(name)
            .cloned()
            .ok_or_else(|| GuardError::NotFound(name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.resources.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshots of every resource, sorted by name.
    pub fn snapshot(&self) -> Vec<ResourceSnapshot> {
        let mut snapshots: Vec<_> = self
            .resources
            .load()
            .values()
            .map(|entry| entry.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}
