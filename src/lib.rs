//! Service guard library.
//!
//! Admission control, circuit breaking and fallback for named resources,
//! plus the gateway interceptor chain and demo services built on it.

// Core
pub mod resilience;

// Edge
pub mod http;
pub mod services;
pub mod admin;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use resilience::{ResilientInvoker, ResourceDescriptor, ResourceRegistry, Response};
