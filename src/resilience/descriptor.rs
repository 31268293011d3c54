//! Resource descriptors.

use std::time::Duration;

use crate::config::schema::{
    GuardConfig, ResourceConfig, DEFAULT_COOLDOWN_MS, DEFAULT_HOTKEY_CAPACITY,
    DEFAULT_MIN_REQUEST_AMOUNT, DEFAULT_PROBE_QUOTA, DEFAULT_STAT_WINDOW_MS,
};
use crate::resilience::error::GuardError;
use crate::resilience::handlers::{BlockHandler, FallbackHandler, HandlerTable};

/// Describes one guarded operation and the policy protecting it.
///
/// Limits of `0` mean unlimited. Ratio thresholds are fractions in `[0, 1]`;
/// `None` disables that breaking strategy.
#[derive(Debug, Clone)]
pub struct ResourceDescriptor {
    pub name: String,
    pub qps_limit: u32,
    pub concurrency_limit: u32,
    pub error_ratio_threshold: Option<f64>,
    pub error_ratio_window: Duration,
    pub slow_call_threshold: Option<Duration>,
    pub slow_call_ratio_threshold: Option<f64>,
    /// Index of the call argument that keys per-value limiting.
    pub hotkey_dimension: Option<usize>,
    /// Bound on the number of tracked hotkey values.
    pub hotkey_capacity: usize,
    /// Time spent in `Open` before probing.
    pub cooldown: Duration,
    /// Calls required in the window before a ratio may trip the circuit.
    pub min_request_amount: u32,
    /// Consecutive probe successes needed to close from `HalfOpen`.
    pub probe_quota: u32,
    pub block_handler: Option<BlockHandler>,
    pub fallback_handler: Option<FallbackHandler>,
}

impl ResourceDescriptor {
    /// A descriptor with no limits and no handlers.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qps_limit: 0,
            concurrency_limit: 0,
            error_ratio_threshold: None,
            error_ratio_window: Duration::from_millis(DEFAULT_STAT_WINDOW_MS),
            slow_call_threshold: None,
            slow_call_ratio_threshold: None,
            hotkey_dimension: None,
            hotkey_capacity: DEFAULT_HOTKEY_CAPACITY,
            cooldown: Duration::from_millis(DEFAULT_COOLDOWN_MS),
            min_request_amount: DEFAULT_MIN_REQUEST_AMOUNT,
            probe_quota: DEFAULT_PROBE_QUOTA,
            block_handler: None,
            fallback_handler: None,
        }
    }

    pub fn qps_limit(mut self, limit: u32) -> Self {
        self.qps_limit = limit;
        self
    }

    pub fn concurrency_limit(mut self, limit: u32) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn error_ratio(mut self, threshold: f64, window: Duration) -> Self {
        self.error_ratio_threshold = Some(threshold);
        self.error_ratio_window = window;
        self
    }

    pub fn slow_calls(mut self, threshold: Duration, ratio: f64) -> Self {
        self.slow_call_threshold = Some(threshold);
        self.slow_call_ratio_threshold = Some(ratio);
        self
    }

    pub fn hotkey(mut self, arg_index: usize, capacity: usize) -> Self {
        self.hotkey_dimension = Some(arg_index);
        self.hotkey_capacity = capacity;
        self
    }

    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn min_request_amount(mut self, amount: u32) -> Self {
        self.min_request_amount = amount;
        self
    }

    pub fn probe_quota(mut self, quota: u32) -> Self {
        self.probe_quota = quota;
        self
    }

    pub fn block_handler(mut self, handler: BlockHandler) -> Self {
        self.block_handler = Some(handler);
        self
    }

    pub fn fallback_handler(mut self, handler: FallbackHandler) -> Self {
        self.fallback_handler = Some(handler);
        self
    }

    /// Build a descriptor from config, resolving handler names against `table`.
    pub fn from_config(
        config: &ResourceConfig,
        guard: &GuardConfig,
        table: &HandlerTable,
    ) -> Result<Self, GuardError> {
        let block_handler = config
            .block_handler
            .as_deref()
            .map(|name| table.block(&config.name, name))
            .transpose()?;
        let fallback_handler = config
            .fallback_handler
            .as_deref()
            .map(|name| table.fallback(&config.name, name))
            .transpose()?;

        let descriptor = Self {
            name: config.name.clone(),
            qps_limit: config.qps_limit,
            concurrency_limit: config.concurrency_limit,
            error_ratio_threshold: config.error_ratio_threshold,
            error_ratio_window: Duration::from_millis(
                config.error_ratio_window_ms.unwrap_or(guard.stat_window_ms),
            ),
            slow_call_threshold: config.slow_call_threshold_ms.map(Duration::from_millis),
            slow_call_ratio_threshold: config.slow_call_ratio_threshold,
            hotkey_dimension: config.hotkey_index,
            hotkey_capacity: guard.hotkey_capacity,
            cooldown: Duration::from_millis(config.cooldown_ms.unwrap_or(guard.cooldown_ms)),
            min_request_amount: guard.min_request_amount,
            probe_quota: guard.probe_quota,
            block_handler,
            fallback_handler,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Check the invariants the admission controller relies on.
    pub fn validate(&self) -> Result<(), GuardError> {
        let invalid = |reason: &str| GuardError::InvalidDescriptor {
            resource: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.is_empty() {
            return Err(invalid("name must not be empty"));
        }
        for ratio in [self.error_ratio_threshold, self.slow_call_ratio_threshold]
            .into_iter()
            .flatten()
        {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(invalid("ratio thresholds must be within [0, 1]"));
            }
        }
        if self.slow_call_ratio_threshold.is_some() && self.slow_call_threshold.is_none() {
            return Err(invalid("slow call ratio requires a slow call threshold"));
        }
        if self.error_ratio_window.is_zero() {
            return Err(invalid("error ratio window must be non-zero"));
        }
        if self.probe_quota == 0 {
            return Err(invalid("probe quota must be at least 1"));
        }
        if self.hotkey_dimension.is_some() && self.hotkey_capacity == 0 {
            return Err(invalid("hotkey capacity must be at least 1"));
        }
        Ok(())
    }

    /// True when `other` carries the same policy and handlers.
    ///
    /// Used to make re-registration idempotent.
    pub fn same_content(&self, other: &Self) -> bool {
        fn same<H>(a: &Option<H>, b: &Option<H>, eq: impl Fn(&H, &H) -> bool) -> bool {
            match (a, b) {
                (None, None) => true,
                (Some(a), Some(b)) => eq(a, b),
                _ => false,
            }
        }

        self.name == other.name
            && self.qps_limit == other.qps_limit
            && self.concurrency_limit == other.concurrency_limit
            && self.error_ratio_threshold == other.error_ratio_threshold
            && self.error_ratio_window == other.error_ratio_window
            && self.slow_call_threshold == other.slow_call_threshold
            && self.slow_call_ratio_threshold == other.slow_call_ratio_threshold
            && self.hotkey_dimension == other.hotkey_dimension
            && self.hotkey_capacity == other.hotkey_capacity
            && self.cooldown == other.cooldown
            && self.min_request_amount == other.min_request_amount
            && self.probe_quota == other.probe_quota
            && same(&self.block_handler, &other.block_handler, BlockHandler::same_as)
            && same(&self.fallback_handler, &other.fallback_handler, FallbackHandler::same_as)
    }
}
