//! In-memory product and user storage with read-through caches.
//!
//! # Design Decisions
//! - `Storage` is keyed by numeric id and sharded through `DashMap`
//! - The cache is LRU-bounded and kept coherent on every write
//! - Ids are assigned by the storage on create, never by the caller

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    #[serde(default)]
    pub stock: u32,
    /// Id of the user who listed the product.
    pub category_id: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: u64,
    pub username: String,
    pub email: String,
}

/// Anything stored by numeric id.
pub trait Entity: Clone + Send + Sync + 'static {
    fn id(&self) -> u64;
    fn set_id(&mut self, id: u64);
}

impl Entity for Product {
    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

impl Entity for User {
    fn id(&self) -> u64 {
        self.id
    }

    fn set_id(&mut self, id: u64) {
        self.id = id;
    }
}

pub trait Storage<T: Entity>: Send + Sync {
    fn get(&self, id: u64) -> Option<T>;
    fn list(&self) -> Vec<T>;
    /// Store `item` under a fresh id and return it with the id set.
    fn create(&self, item: T) -> T;
    /// Replace an existing entry. Returns `None` if `id` is unknown.
    fn update(&self, id: u64, item: T) -> Option<T>;
    fn delete(&self, id: u64) -> bool;
}

#[derive(Debug)]
pub struct MemoryStorage<T> {
    items: DashMap<u64, T>,
    next_id: AtomicU64,
}

impl<T: Entity> Default for MemoryStorage<T> {
    fn default() -> Self {
        Self {
            items: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<T: Entity> MemoryStorage<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seeded(items: impl IntoIterator<Item = T>) -> Self {
        let storage = Self::new();
        for item in items {
            storage.create(item);
        }
        storage
    }
}

impl<T: Entity> Storage<T> for MemoryStorage<T> {
    fn get(&self, id: u64) -> Option<T> {
        self.items.get(&id).map(|entry| entry.value().clone())
    }

    fn list(&self) -> Vec<T> {
        let mut items: Vec<T> = self.items.iter().map(|entry| entry.value().clone()).collect();
        items.sort_by_key(|item| item.id());
        items
    }

    fn create(&self, mut item: T) -> T {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        item.set_id(id);
        self.items.insert(id, item.clone());
        item
    }

    fn update(&self, id: u64, mut item: T) -> Option<T> {
        let mut entry = self.items.get_mut(&id)?;
        item.set_id(id);
        *entry = item.clone();
        Some(item)
    }

    fn delete(&self, id: u64) -> bool {
        self.items.remove(&id).is_some()
    }
}

pub trait Cache<V>: Send + Sync {
    fn get(&self, key: u64) -> Option<V>;
    fn put(&self, key: u64, value: V);
    fn evict(&self, key: u64);
}

pub struct MemoryCache<V> {
    entries: Mutex<LruCache<u64, V>>,
}

impl<V> MemoryCache<V> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl<V: Clone + Send> Cache<V> for MemoryCache<V> {
    fn get(&self, key: u64) -> Option<V> {
        self.entries.lock().get(&key).cloned()
    }

    fn put(&self, key: u64, value: V) {
        self.entries.lock().put(key, value);
    }

    fn evict(&self, key: u64) {
        self.entries.lock().pop(&key);
    }
}

const CACHE_CAPACITY: NonZeroUsize = match NonZeroUsize::new(256) {
    Some(n) => n,
    None => unreachable!(),
};

/// Entity storage fronted by a cache.
#[derive(Clone)]
pub struct Catalog<T: Entity> {
    storage: Arc<dyn Storage<T>>,
    cache: Arc<dyn Cache<T>>,
}

pub type ProductCatalog = Catalog<Product>;
pub type UserDirectory = Catalog<User>;

impl Catalog<Product> {
    /// Catalog over in-memory storage with a few sample products.
    pub fn in_memory() -> Self {
        Self::seeded(sample_products())
    }
}

impl Catalog<User> {
    /// Directory over in-memory storage with the sample users.
    pub fn in_memory() -> Self {
        Self::seeded(sample_users())
    }
}

impl<T: Entity> Catalog<T> {
    pub fn new(storage: Arc<dyn Storage<T>>, cache: Arc<dyn Cache<T>>) -> Self {
        Self { storage, cache }
    }

    fn seeded(items: Vec<T>) -> Self {
        Self::new(
            Arc::new(MemoryStorage::seeded(items)),
            Arc::new(MemoryCache::new(CACHE_CAPACITY)),
        )
    }

    pub fn get(&self, id: u64) -> Option<T> {
        if let Some(item) = self.cache.get(id) {
            tracing::debug!(id, "Cache hit");
            return Some(item);
        }
        let item = self.storage.get(id)?;
        self.cache.put(id, item.clone());
        Some(item)
    }

    pub fn list(&self) -> Vec<T> {
        self.storage.list()
    }

    pub fn create(&self, item: T) -> T {
        let item = self.storage.create(item);
        self.cache.put(item.id(), item.clone());
        item
    }

    pub fn update(&self, id: u64, item: T) -> Option<T> {
        let item = self.storage.update(id, item)?;
        self.cache.put(id, item.clone());
        Some(item)
    }

    pub fn delete(&self, id: u64) -> bool {
        self.cache.evict(id);
        self.storage.delete(id)
    }
}

pub fn sample_products() -> Vec<Product> {
    let product = |name: &str, price: f64, stock: u32, category_id: u64| Product {
        id: 0,
        name: name.to_string(),
        description: format!("{name} (sample)"),
        price,
        stock,
        category_id,
    };
    vec![
        product("Mechanical Keyboard", 89.0, 120, 1),
        product("Wireless Mouse", 25.5, 300, 2),
        product("4K Monitor", 329.99, 40, 1),
    ]
}

pub fn sample_users() -> Vec<User> {
    let user = |username: &str| User {
        id: 0,
        username: username.to_string(),
        email: format!("{username}@example.com"),
    };
    vec![user("alice"), user("bob")]
}
