//! Startup orchestration.
//!
//! Config → handler table → resource registry → application state →
//! interceptor chain → server. Any failure is fatal.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::{ResourceConfig, ServiceConfig};
use crate::http::{baseline_chain, AppState, HttpServer};
use crate::resilience::{GuardError, HandlerTable, ResilientInvoker, ResourceDescriptor, ResourceRegistry};
use crate::services::{demo, HttpUserClient, ProductCatalog, UserDirectory};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("guard configuration: {0}")]
    Guard(#[from] GuardError),

    #[error("http client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Every handler a resource config may name.
pub fn handler_table(config: &ServiceConfig) -> HandlerTable {
    let mut table = HandlerTable::new();
    demo::register_handlers(&mut table, &config.app.service_name);
    table
}

/// Register every configured resource, or the demo set when none are.
pub fn build_registry(
    config: &ServiceConfig,
    table: &HandlerTable,
) -> Result<Arc<ResourceRegistry>, GuardError> {
    let resources = if config.resources.is_empty() {
        ResourceConfig::demo_set(&config.app.service_name)
    } else {
        config.resources.clone()
    };

    let registry = Arc::new(ResourceRegistry::new());
    for resource in &resources {
        let descriptor = ResourceDescriptor::from_config(resource, &config.guard, table)?;
        tracing::info!(
            resource = %descriptor.name,
            qps_limit = descriptor.qps_limit,
            concurrency_limit = descriptor.concurrency_limit,
            hotkey = ?descriptor.hotkey_dimension,
            "Resource registered"
        );
        registry.register(descriptor)?;
    }
    Ok(registry)
}

pub fn build_state(config: ServiceConfig) -> Result<AppState, StartupError> {
    let table = handler_table(&config);
    let registry = build_registry(&config, &table)?;
    let users = HttpUserClient::new(
        config.upstreams.user_service_url.clone(),
        Duration::from_millis(config.upstreams.timeout_ms),
    )?;

    Ok(AppState {
        config: Arc::new(config),
        invoker: ResilientInvoker::new(registry),
        catalog: ProductCatalog::in_memory(),
        user_directory: UserDirectory::in_memory(),
        users: Arc::new(users),
    })
}

pub fn build_server(config: ServiceConfig) -> Result<HttpServer, StartupError> {
    let chain = baseline_chain(&config.gateway);
    tracing::debug!(interceptors = ?chain.names(), "Interceptor chain ready");
    let state = build_state(config)?;
    Ok(HttpServer::new(state, chain))
}
