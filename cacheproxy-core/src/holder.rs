//! Request holder (C3): a short-lived per-request context bundling the
//! resolved cache handle, the client's format, and the byte-conversion
//! helpers every dispatcher handler needs. Created per request, discarded
//! once the response completes (spec §3) — it owns no cache state of its
//! own, only a clone of an `Arc<PartitionedCache>`.
//!
//! The source models `runAsync`/continuation-attachment as its own
//! completion-stage primitive; in Tokio that collapses into spawning the
//! closure directly on the [`crate::executor::ExecutorPool`] (C5) — there is
//! no separate "holder with attached result" type to carry across `.await`
//! points the way a Java `CompletionStage` needs one.

use bytes::Bytes;
use std::sync::Arc;

use crate::backend::PartitionedCache;
use crate::codec::CodecRegistry;
use crate::error::ProxyError;

#[derive(Clone)]
pub struct RequestHolder {
    cache: Arc<PartitionedCache>,
    codecs: CodecRegistry,
    client_format: String,
}

impl RequestHolder {
    pub fn new(cache: Arc<PartitionedCache>, codecs: CodecRegistry, client_format: String) -> Self {
        Self { cache, codecs, client_format }
    }

    pub fn cache(&self) -> &Arc<PartitionedCache> {
        &self.cache
    }

    pub fn client_format(&self) -> &str {
        &self.client_format
    }

    /// `convertKeyDown`/`convertDown` — client bytes to the backend's native
    /// format, short-circuited when the formats already match (§4.2).
    pub fn convert_down(&self, bytes: &Bytes) -> Result<Bytes, ProxyError> {
        self.codecs.down(&self.client_format, bytes)
    }

    /// `convertUp` — backend-native bytes to the client's format.
    pub fn convert_up(&self, bytes: &Bytes) -> Result<Bytes, ProxyError> {
        self.codecs.up(&self.client_format, bytes)
    }

    /// Converts an optional backend value to the client's format, preserving
    /// the presence/absence distinction (`toOptionalValue`, §4.3).
    pub fn convert_up_optional(&self, value: Option<Bytes>) -> Result<Option<Bytes>, ProxyError> {
        value.map(|b| self.convert_up(&b)).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn holder(client_format: &str) -> RequestHolder {
        RequestHolder::new(
            Arc::new(PartitionedCache::new(1)),
            CodecRegistry::with_defaults(),
            client_format.to_string(),
        )
    }

    #[test]
    fn matching_formats_are_identity_conversions() {
        let holder = holder("raw");
        let bytes = Bytes::from_static(b"\x01\x02");
        assert_eq!(holder.convert_down(&bytes).unwrap(), bytes);
        assert_eq!(holder.convert_up(&bytes).unwrap(), bytes);
    }

    #[test]
    fn absent_value_stays_absent_through_conversion() {
        let holder = holder("json");
        assert_eq!(holder.convert_up_optional(None).unwrap(), None);
    }

    #[test]
    fn present_value_round_trips_through_conversion() {
        let holder = holder("json");
        let stored = holder.convert_down(&Bytes::from_static(br#"{"id":1}"#)).unwrap();
        let back = holder.convert_up_optional(Some(stored)).unwrap().unwrap();
        let original: serde_json::Value = serde_json::from_slice(br#"{"id":1}"#).unwrap();
        let round_tripped: serde_json::Value = serde_json::from_slice(&back).unwrap();
        assert_eq!(original, round_tripped);
    }
}
