//! Baseline interceptors installed on every gateway.

pub mod access_log;
pub mod source_tag;

pub use access_log::AccessLog;
pub use source_tag::{SourceTag, X_GATEWAY_SOURCE, X_REQUEST_TIME};
