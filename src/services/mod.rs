//! Application services behind the gateway.
//!
//! # Data Flow
//! ```text
//! http router
//!     → demo.rs (guarded /api/sentinel endpoints)
//!     → products.rs (catalog + remote user composition)
//!         → catalog.rs (Storage, Cache, cached Catalog per entity)
//!         → remote.rs (RemoteService over reqwest, guarded by "lookup-user")
//!     → gateway.rs (health, info, config properties)
//! ```

pub mod catalog;
pub mod demo;
pub mod gateway;
pub mod products;
pub mod remote;

pub use catalog::{
    Cache, Catalog, MemoryCache, MemoryStorage, Product, ProductCatalog, Storage, User, UserDirectory,
};
pub use remote::{HttpUserClient, RemoteError, RemoteService};
