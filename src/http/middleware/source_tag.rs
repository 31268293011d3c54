//! Tags every request with its gateway source and capture time.

use crate::http::interceptor::{Flow, Interceptor};
use crate::http::request::RequestContext;

pub const X_GATEWAY_SOURCE: &str = "x-gateway-source";
pub const X_REQUEST_TIME: &str = "x-request-time";

#[derive(Debug, Clone)]
pub struct SourceTag {
    source: String,
}

impl SourceTag {
    pub const PRIORITY: i32 = -100;

    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }
}

impl Interceptor for SourceTag {
    fn name(&self) -> &str {
        "source-tag"
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    fn before(&self, ctx: &mut RequestContext) -> Flow {
        let received_at = ctx.received_at_ms().to_string();
        ctx.set_header(X_GATEWAY_SOURCE, &self.source);
        ctx.set_header(X_REQUEST_TIME, &received_at);
        ctx.set_attribute(X_GATEWAY_SOURCE, self.source.clone());
        ctx.set_attribute(X_REQUEST_TIME, received_at);
        Flow::Continue
    }
}
