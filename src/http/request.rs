//! Per-request context carried through the interceptor chain.
//!
//! Created when the request enters the gateway, mutated by `before` hooks,
//! read by `after` hooks, dropped once the response is emitted.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, HeaderValue, Method, Request};
use tokio::time::Instant;
use uuid::Uuid;

/// Header name for request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Attributes set by interceptors, visible to handlers as a request extension.
#[derive(Debug, Clone, Default)]
pub struct RequestAttributes(pub HashMap<String, String>);

impl RequestAttributes {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    pub remote_addr: Option<SocketAddr>,
    pub headers: HeaderMap,
    pub attributes: HashMap<String, String>,
    request_id: String,
    received_at_ms: u64,
    started: Instant,
}

impl RequestContext {
    pub fn new(method: Method, path: impl Into<String>, remote_addr: Option<SocketAddr>, headers: HeaderMap) -> Self {
        let request_id = headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let received_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();

        Self {
            method,
            path: path.into(),
            remote_addr,
            headers,
            attributes: HashMap::new(),
            request_id,
            received_at_ms,
            started: Instant::now(),
        }
    }

    pub fn from_request<B>(request: &Request<B>) -> Self {
        let remote_addr = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);
        Self::new(
            request.method().clone(),
            request.uri().path(),
            remote_addr,
            request.headers().clone(),
        )
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wall-clock capture time, milliseconds since the Unix epoch.
    pub fn received_at_ms(&self) -> u64 {
        self.received_at_ms
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Set a header, ignoring values that are not valid header text.
    pub fn set_header(&mut self, name: &'static str, value: &str) {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.insert(name, value);
            }
            Err(_) => tracing::warn!(header = name, "Dropping invalid header value"),
        }
    }

    pub fn set_attribute(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Copy the (possibly mutated) headers and attributes onto the request
    /// that is dispatched downstream.
    pub fn apply_to<B>(&self, request: &mut Request<B>) {
        *request.headers_mut() = self.headers.clone();
        if let Ok(value) = HeaderValue::from_str(&self.request_id) {
            request.headers_mut().insert(X_REQUEST_ID, value);
        }
        request
            .extensions_mut()
            .insert(RequestAttributes(self.attributes.clone()));
    }
}
