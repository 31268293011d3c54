//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (interceptor chain, timeout, tracing)
//! - Bind server to listener
//! - Serve until the shutdown signal fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{http::Uri, middleware, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin;
use crate::config::ServiceConfig;
use crate::http::interceptor::{intercept, InterceptorChain};
use crate::http::response::ApiError;
use crate::resilience::ResilientInvoker;
use crate::services::{demo, gateway, products, ProductCatalog, RemoteService, UserDirectory};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub invoker: ResilientInvoker,
    pub catalog: ProductCatalog,
    pub user_directory: UserDirectory,
    pub users: Arc<dyn RemoteService>,
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("no route for {}", uri.path()))
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<ServiceConfig>,
}

impl HttpServer {
    /// Create a new HTTP server from prepared state and interceptors.
    pub fn new(state: AppState, chain: InterceptorChain) -> Self {
        let config = state.config.clone();
        let router = Self::build_router(state, chain);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState, chain: InterceptorChain) -> Router {
        let timeout = Duration::from_secs(state.config.gateway.request_timeout_secs);

        let mut router = Router::new()
            .merge(demo::router())
            .merge(products::router())
            .merge(gateway::router());
        if state.config.admin.enabled {
            router = router.merge(admin::router(state.clone()));
        }

        router
            .fallback(not_found)
            .with_state(state)
            .layer(TimeoutLayer::new(timeout))
            .layer(middleware::from_fn_with_state(Arc::new(chain), intercept))
            .layer(TraceLayer::new_for_http())
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }
}
