//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Defaults shared by every guarded resource.
    pub guard: GuardConfig,

    /// Guarded resources. When empty, the demo set for `app.service_name`
    /// is registered.
    pub resources: Vec<ResourceConfig>,

    /// Gateway interceptor settings.
    pub gateway: GatewayConfig,

    /// Remote services called through the guard.
    pub upstreams: UpstreamConfig,

    /// Application properties surfaced by the config endpoints.
    pub app: AppConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Guard-wide defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GuardConfig {
    /// How long a tripped circuit stays open, in milliseconds.
    pub cooldown_ms: u64,

    /// Minimum calls in the window before ratios are evaluated.
    pub min_request_amount: u32,

    /// Probe calls admitted per half-open cycle.
    pub probe_quota: u32,

    /// Maximum tracked values per hotkey resource (LRU evicted).
    pub hotkey_capacity: usize,

    /// Default error / slow ratio window, in milliseconds.
    pub stat_window_ms: u64,
}

pub const DEFAULT_COOLDOWN_MS: u64 = 5_000;
pub const DEFAULT_MIN_REQUEST_AMOUNT: u32 = 5;
pub const DEFAULT_PROBE_QUOTA: u32 = 1;
pub const DEFAULT_HOTKEY_CAPACITY: usize = 1024;
pub const DEFAULT_STAT_WINDOW_MS: u64 = 1_000;

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: DEFAULT_COOLDOWN_MS,
            min_request_amount: DEFAULT_MIN_REQUEST_AMOUNT,
            probe_quota: DEFAULT_PROBE_QUOTA,
            hotkey_capacity: DEFAULT_HOTKEY_CAPACITY,
            stat_window_ms: DEFAULT_STAT_WINDOW_MS,
        }
    }
}

/// One guarded resource. Zero limits mean unlimited.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ResourceConfig {
    /// Unique resource name.
    pub name: String,

    #[serde(default)]
    pub qps_limit: u32,

    #[serde(default)]
    pub concurrency_limit: u32,

    /// Trip when errors / total in the window reach this ratio.
    #[serde(default)]
    pub error_ratio_threshold: Option<f64>,

    /// Overrides `guard.stat_window_ms`.
    #[serde(default)]
    pub error_ratio_window_ms: Option<u64>,

    /// Calls at or above this latency count as slow.
    #[serde(default)]
    pub slow_call_threshold_ms: Option<u64>,

    #[serde(default)]
    pub slow_call_ratio_threshold: Option<f64>,

    /// Overrides `guard.cooldown_ms`.
    #[serde(default)]
    pub cooldown_ms: Option<u64>,

    /// Argument position used as the hotkey value.
    #[serde(default)]
    pub hotkey_index: Option<usize>,

    /// Block handler name, resolved against the handler table.
    #[serde(default)]
    pub block_handler: Option<String>,

    /// Fallback handler name, resolved against the handler table.
    #[serde(default)]
    pub fallback_handler: Option<String>,
}

impl ResourceConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// The resources behind the demo endpoints of `service` ("product" or "user").
    pub fn demo_set(service: &str) -> Vec<ResourceConfig> {
        let handler = |suffix: &str| Some(format!("{service}-{suffix}"));
        vec![
            ResourceConfig {
                qps_limit: 5,
                block_handler: handler("test-block"),
                ..Self::named(format!("{service}-test"))
            },
            ResourceConfig {
                slow_call_threshold_ms: Some(1_000),
                slow_call_ratio_threshold: Some(0.5),
                block_handler: handler("slow-block"),
                fallback_handler: handler("slow-fallback"),
                ..Self::named(format!("{service}-slow"))
            },
            ResourceConfig {
                error_ratio_threshold: Some(0.5),
                block_handler: handler("exception-block"),
                fallback_handler: handler("exception-fallback"),
                ..Self::named(format!("{service}-exception"))
            },
            ResourceConfig {
                qps_limit: 2,
                hotkey_index: Some(0),
                block_handler: handler("hotkey-block"),
                ..Self::named(format!("{service}-hotkey"))
            },
            ResourceConfig {
                concurrency_limit: 10,
                block_handler: handler("inventory-block"),
                fallback_handler: handler("inventory-fallback"),
                ..Self::named(format!("{service}-inventory"))
            },
            ResourceConfig {
                error_ratio_threshold: Some(0.5),
                fallback_handler: Some("user-unavailable".to_string()),
                ..Self::named("lookup-user")
            },
        ]
    }
}

/// Gateway interceptor settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Value injected as `X-Gateway-Source`.
    pub source_tag: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            source_tag: "gateway-service".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Remote service endpoints.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the user service (e.g., "http://127.0.0.1:8082").
    pub user_service_url: String,

    /// Per-call timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            user_service_url: "http://127.0.0.1:8082".to_string(),
            timeout_ms: 3_000,
        }
    }
}

/// Application properties.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Demo flavour: "product" or "user".
    pub service_name: String,
    pub app_name: String,
    pub version: String,
    pub environment: String,
    pub greeting: String,
    pub feature_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            service_name: "product".to_string(),
            app_name: "Product Service".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            environment: "development".to_string(),
            greeting: "Hello, Default!".to_string(),
            feature_enabled: false,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Mount the `/admin` routes.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: ServiceConfig = toml::from_str(
            r#"
            [[resources]]
            name = "checkout"
            qps_limit = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.guard.cooldown_ms, 5_000);
        assert_eq!(config.gateway.source_tag, "gateway-service");
        assert_eq!(config.resources.len(), 1);
        assert_eq!(config.resources[0].qps_limit, 5);
        assert_eq!(config.resources[0].concurrency_limit, 0);
        assert!(config.resources[0].block_handler.is_none());
    }

    #[test]
    fn test_demo_set_names_follow_service() {
        let names: Vec<_> = ResourceConfig::demo_set("user")
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert!(names.contains(&"user-hotkey".to_string()));
        assert!(names.contains(&"lookup-user".to_string()));
    }
}
