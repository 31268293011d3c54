//! Remote user lookups and the product-with-user composition.
//!
//! # Data Flow
//! ```text
//! GET /products/{id}/with-user
//!     → ProductCatalog::get (404 if unknown)
//!     → ResilientInvoker::invoke("lookup-user", args = [user_id])
//!         → RemoteService::fetch_user (HTTP GET {base}/users/{id})
//!     → success:  { product, user }
//!     → anything else: { product, user: null, userError }
//! ```

use std::time::Duration;

use futures_util::future::BoxFuture;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::http::response::ApiError;
use crate::resilience::{CallArgs, InvokeError, ResilientInvoker, Response};
use crate::services::catalog::{Product, ProductCatalog, User};

/// Resource guarding the user service.
pub const LOOKUP_USER: &str = "lookup-user";

/// Fallback registered for [`LOOKUP_USER`].
pub const USER_UNAVAILABLE: &str = "user-unavailable";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered {status}")]
    Status { url: String, status: u16 },

    #[error("invalid response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// A typed remote call boundary.
pub trait RemoteService: Send + Sync {
    fn fetch_user(&self, id: u64) -> BoxFuture<'_, Result<User, RemoteError>>;
}

/// User service client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpUserClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_user(&self, id: u64) -> Result<User, RemoteError> {
        let url = format!("{}/users/{id}", self.base_url);
        let response = self.client.get(&url).send().await.map_err(|source| {
            if source.is_timeout() {
                RemoteError::Timeout { url: url.clone() }
            } else {
                RemoteError::Network {
                    url: url.clone(),
                    source,
                }
            }
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(RemoteError::Status {
                url,
                status: status.as_u16(),
            });
        }
        response
            .json::<User>()
            .await
            .map_err(|source| RemoteError::Decode { url, source })
    }
}

impl RemoteService for HttpUserClient {
    fn fetch_user(&self, id: u64) -> BoxFuture<'_, Result<User, RemoteError>> {
        Box::pin(self.get_user(id))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductWithUser {
    pub product: Product,
    pub user: Option<User>,
    #[serde(rename = "userError", skip_serializing_if = "Option::is_none")]
    pub user_error: Option<String>,
}

impl ProductWithUser {
    fn degraded(product: Product, error: String) -> Self {
        Self {
            product,
            user: None,
            user_error: Some(error),
        }
    }
}

/// Product lookup enriched with its owner, degrading to `user: null`.
pub async fn product_with_user(
    catalog: &ProductCatalog,
    invoker: &ResilientInvoker,
    users: &dyn RemoteService,
    product_id: u64,
) -> Result<ProductWithUser, ApiError> {
    let product = catalog
        .get(product_id)
        .ok_or_else(|| ApiError::NotFound(format!("product {product_id} not found")))?;
    let user_id = product.category_id;

    let outcome = invoker
        .invoke(LOOKUP_USER, None, CallArgs::new().with(user_id), || users.fetch_user(user_id))
        .await;

    let composed = match outcome {
        Ok(Response::Success { data }) => ProductWithUser {
            product,
            user: Some(data),
            user_error: None,
        },
        Ok(Response::Degraded { body }) | Ok(Response::Blocked { body, .. }) => {
            ProductWithUser::degraded(product, describe(&body))
        }
        Ok(Response::Busy { message, .. }) => ProductWithUser::degraded(product, message.to_string()),
        Err(InvokeError::Operation(cause)) => ProductWithUser::degraded(product, cause.to_string()),
        Err(other) => return Err(other.into()),
    };
    Ok(composed)
}

/// Pull `userError` out of a handler body, or render the body itself.
fn describe(body: &Value) -> String {
    match body.get("userError").and_then(Value::as_str) {
        Some(message) => message.to_string(),
        None => match body {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

/// Fallback body for [`USER_UNAVAILABLE`].
pub fn user_unavailable(cause: &dyn std::error::Error) -> Value {
    serde_json::json!({
        "user": null,
        "userError": format!("user service temporarily unavailable: {cause}"),
    })
}
