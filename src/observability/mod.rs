//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! resilience + http produce:
//!     → logging.rs (structured events via tracing)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint
//! ```

pub mod logging;
pub mod metrics;
