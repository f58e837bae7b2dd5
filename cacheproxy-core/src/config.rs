//! Proxy configuration knobs (spec §6), read from the environment.
//!
//! Deliberately smaller than the teacher's dotted-YAML `ConfigValue` engine
//! (`r2e_core::config`) — see DESIGN.md for the scoping-down rationale. Five
//! fixed knobs, five environment variables, sensible defaults.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Soft cap on per-page payload size for the paged cursor engine (C7).
    pub transfer_threshold: usize,
    /// Per-stream event buffer size before RESOURCE_EXHAUSTED (C8).
    pub event_buffer_high_water: usize,
    /// Size of the dedicated executor pool (C5).
    pub worker_threads: usize,
    /// Scope used when a request omits one.
    pub default_scope: String,
    /// Client-side ensure-cache wait, used by `cacheproxy-client` (C9).
    pub request_deadline: Duration,
}

impl ProxyConfig {
    pub fn from_env() -> Self {
        Self {
            transfer_threshold: env_usize("CACHEPROXY_TRANSFER_THRESHOLD", 16 * 1024),
            event_buffer_high_water: env_usize("CACHEPROXY_EVENT_BUFFER_HIGH_WATER", 1024),
            worker_threads: env_usize("CACHEPROXY_WORKER_THREADS", 4),
            default_scope: std::env::var("CACHEPROXY_DEFAULT_SCOPE").unwrap_or_default(),
            request_deadline: Duration::from_millis(env_usize(
                "CACHEPROXY_REQUEST_DEADLINE_MILLIS",
                5_000,
            ) as u64),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            transfer_threshold: 16 * 1024,
            event_buffer_high_water: 1024,
            worker_threads: 4,
            default_scope: String::new(),
            request_deadline: Duration::from_millis(5_000),
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_knobs() {
        let cfg = ProxyConfig::default();
        assert_eq!(cfg.transfer_threshold, 16384);
        assert_eq!(cfg.event_buffer_high_water, 1024);
        assert_eq!(cfg.default_scope, "");
        assert_eq!(cfg.request_deadline, Duration::from_millis(5_000));
    }
}
