//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a guarded resource:
//!     → invoke.rs (single call surface)
//!     → registry.rs (resource name → descriptor + buckets)
//!     → admission.rs (ALLOW / BLOCK, takes an in-flight slot)
//!         → bucket.rs (per resource / per hotkey state, one lock each)
//!         → circuit_breaker.rs (Closed / Open / Half-Open)
//!         → window.rs (rolling outcome counters, trailing-second admits)
//!     → unit of work
//!     → recorder.rs (release slot, feed window, trip circuit)
//!     → fallback.rs (block handler / fallback handler / propagate)
//! ```
//!
//! # Design Decisions
//! - Blocks are responses, not errors; only handler failures and
//!   configuration mistakes are hard errors
//! - Block and fallback are separate paths with separate handlers
//! - Handlers are resolved by name at startup (handlers.rs)
//! - No global lock: registry reads are lock-free, buckets lock individually

pub mod admission;
pub mod bucket;
pub mod circuit_breaker;
pub mod descriptor;
pub mod error;
pub mod fallback;
pub mod handlers;
pub mod hotkey;
pub mod invoke;
pub mod recorder;
pub mod registry;
pub mod response;
pub mod window;

pub use admission::{AdmissionController, BlockReason, Decision, Permit};
pub use circuit_breaker::CircuitState;
pub use descriptor::ResourceDescriptor;
pub use error::{BoxError, GuardError, HandlerFailure, HandlerPhase, InvokeError};
pub use handlers::{BlockHandler, CallArgs, FallbackHandler, HandlerTable};
pub use invoke::ResilientInvoker;
pub use recorder::{CallOutcome, OutcomeRecorder};
pub use registry::{ResourceRegistry, ResourceSnapshot};
pub use response::{Response, ResponseStatus};
