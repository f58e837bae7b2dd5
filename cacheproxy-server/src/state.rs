//! Shared state handed to every dispatcher handler and the event
//! multiplexer: the cache resolver (C4), codec registry (C2) and executor
//! pool (C5) behind one `Arc`, plus the config knobs that shaped them.

use std::sync::Arc;

use cacheproxy_core::{CacheResolver, CodecRegistry, ExecutorPool, ProxyConfig, ProxyError, RequestHolder};

pub struct AppState {
    pub resolver: CacheResolver,
    pub codecs: CodecRegistry,
    pub executor: ExecutorPool,
    pub config: ProxyConfig,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> std::io::Result<Arc<Self>> {
        let resolver = CacheResolver::new(config.default_scope.clone(), None, 1);
        let executor = ExecutorPool::new(config.worker_threads)?;
        Ok(Arc::new(Self {
            resolver,
            codecs: CodecRegistry::with_defaults(),
            executor,
            config,
        }))
    }

    /// Resolves `(scope, cache)` and builds the per-request holder (C3) for
    /// `client_format`.
    pub fn holder_for(&self, scope: &str, cache: &str, client_format: String) -> Result<RequestHolder, ProxyError> {
        let cache_handle = self.resolver.resolve(scope, cache)?;
        Ok(RequestHolder::new(cache_handle, self.codecs.clone(), client_format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn holder_for_resolves_and_carries_client_format() {
        let state = AppState::new(ProxyConfig::default()).unwrap();
        let holder = state.holder_for("", "people", "json".to_string()).unwrap();
        assert_eq!(holder.client_format(), "json");
    }

    #[test]
    fn empty_cache_name_is_rejected_before_holder_construction() {
        let state = AppState::new(ProxyConfig::default()).unwrap();
        let err = state.holder_for("", "", "raw".to_string()).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidArgument(_)));
    }
}
