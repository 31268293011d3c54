//! Request interceptor chain.
//!
//! # Data Flow
//! ```text
//! request → RequestContext
//!     → before() of each interceptor, lowest priority first
//!         Flow::Respond → skip the rest and the handler
//!     → handler
//!     → after() of every interceptor whose before() ran, in reverse
//! ```
//!
//! After-hooks run on every exit path: normal completion, short-circuit,
//! handler panic (recorded as 500) and cancellation of the request future.

use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;
use serde::Serialize;

use crate::http::request::RequestContext;

/// Status recorded when the client goes away before a response exists.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Returned by [`Interceptor::before`].
#[derive(Debug)]
pub enum Flow {
    Continue,
    /// Answer with this response; downstream interceptors and the handler are skipped.
    Respond(Response),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outcome {
    Completed,
    ShortCircuited { by: String },
    Failed,
    Cancelled,
}

/// What an `after` hook observes.
#[derive(Debug, Clone)]
pub struct Completion {
    pub status: u16,
    pub elapsed: Duration,
    pub outcome: Outcome,
}

pub trait Interceptor: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> i32;

    fn before(&self, _ctx: &mut RequestContext) -> Flow {
        Flow::Continue
    }

    fn after(&self, _ctx: &RequestContext, _completion: &Completion) {}
}

/// Interceptors in execution order.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an interceptor. Equal priorities keep registration order.
    pub fn register(&mut self, interceptor: impl Interceptor + 'static) -> &mut Self {
        self.interceptors.push(Arc::new(interceptor));
        // stable sort: ties stay in registration order
        self.interceptors.sort_by_key(|i| i.priority());
        self
    }

    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Run `ctx` through the chain and `dispatch` through the handler.
    ///
    /// `dispatch` receives the context after every `before` hook ran.
    pub async fn execute<F, Fut>(&self, ctx: RequestContext, dispatch: F) -> Response
    where
        F: FnOnce(&RequestContext) -> Fut,
        Fut: Future<Output = Response>,
    {
        let mut observation = Observation {
            interceptors: &self.interceptors,
            entered: 0,
            ctx,
            completion: None,
        };

        for interceptor in &self.interceptors {
            observation.entered += 1;
            if let Flow::Respond(response) = interceptor.before(&mut observation.ctx) {
                tracing::debug!(
                    request_id = %observation.ctx.request_id(),
                    interceptor = %interceptor.name(),
                    status = response.status().as_u16(),
                    "Request short-circuited"
                );
                observation.finish(
                    response.status().as_u16(),
                    Outcome::ShortCircuited {
                        by: interceptor.name().to_string(),
                    },
                );
                return response;
            }
        }

        let pending = dispatch(&observation.ctx);
        match AssertUnwindSafe(pending).catch_unwind().await {
            Ok(response) => {
                observation.finish(response.status().as_u16(), Outcome::Completed);
                response
            }
            Err(_) => {
                tracing::error!(
                    request_id = %observation.ctx.request_id(),
                    path = %observation.ctx.path,
                    "Handler panicked"
                );
                observation.finish(StatusCode::INTERNAL_SERVER_ERROR.as_u16(), Outcome::Failed);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Runs the after-hooks when dropped, so cancellation is observed too.
struct Observation<'a> {
    interceptors: &'a [Arc<dyn Interceptor>],
    entered: usize,
    ctx: RequestContext,
    completion: Option<Completion>,
}

impl Observation<'_> {
    fn finish(&mut self, status: u16, outcome: Outcome) {
        self.completion = Some(Completion {
            status,
            elapsed: self.ctx.elapsed(),
            outcome,
        });
    }
}

impl Drop for Observation<'_> {
    fn drop(&mut self) {
        let completion = self.completion.take().unwrap_or_else(|| Completion {
            status: CLIENT_CLOSED_REQUEST,
            elapsed: self.ctx.elapsed(),
            outcome: Outcome::Cancelled,
        });
        for interceptor in self.interceptors[..self.entered].iter().rev() {
            interceptor.after(&self.ctx, &completion);
        }
    }
}

/// Axum middleware running every request through the chain.
pub async fn intercept(
    State(chain): State<Arc<InterceptorChain>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let ctx = RequestContext::from_request(&request);
    chain
        .execute(ctx, move |ctx| {
            ctx.apply_to(&mut request);
            next.run(request)
        })
        .await
}
