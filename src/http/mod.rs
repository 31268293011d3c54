//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → interceptor.rs (before hooks, handler, after hooks)
//!         → middleware/ (source tag, access log)
//!     → services (handlers)
//!     → response.rs (guard responses and errors → HTTP)
//!     → Send to client
//! ```

pub mod interceptor;
pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use interceptor::{Completion, Flow, Interceptor, InterceptorChain, Outcome};
pub use request::{RequestContext, X_REQUEST_ID};
pub use server::{AppState, HttpServer};

use crate::config::GatewayConfig;

/// The chain every gateway starts with.
pub fn baseline_chain(gateway: &GatewayConfig) -> InterceptorChain {
    let mut chain = InterceptorChain::new();
    chain
        .register(middleware::SourceTag::new(gateway.source_tag.clone()))
        .register(middleware::AccessLog);
    chain
}
