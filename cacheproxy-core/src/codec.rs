//! Serializer registry (C2).
//!
//! Resolves a client-supplied format name to a [`Codec`]; bridges bytes
//! between a client's format and the backend's native format. Grounded on
//! the "pluggable backend, trait + default impls" shape of
//! `r2e_cache::CacheStore`/`InMemoryStore`.
//!
//! Non-goal (spec.md §1): defining a new serialization format. Two codecs
//! ship here — `raw` (the backend's native, identity) format and `json` — a
//! real production registry would add `pof`/`msgpack`/etc. the same way.

use bytes::Bytes;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ProxyError;

/// The logical value a codec round-trips through. Stands in for whatever
/// concrete value type a real serializer format would produce.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Json(serde_json::Value),
    Raw(Bytes),
}

pub trait Codec: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn encode(&self, value: &Value) -> Result<Bytes, ProxyError>;
    fn decode(&self, bytes: &Bytes) -> Result<Value, ProxyError>;
}

/// Identity codec — the backend's native format. `encode`/`decode` treat
/// bytes as already-encoded opaque payloads.
pub struct RawCodec;

impl Codec for RawCodec {
    fn name(&self) -> &'static str {
        "raw"
    }

    fn encode(&self, value: &Value) -> Result<Bytes, ProxyError> {
        match value {
            Value::Raw(b) => Ok(b.clone()),
            Value::Json(v) => Ok(Bytes::from(
                serde_json::to_vec(v)
                    .map_err(|e| ProxyError::invalid_argument(e.to_string()))?,
            )),
        }
    }

    fn decode(&self, bytes: &Bytes) -> Result<Value, ProxyError> {
        Ok(Value::Raw(bytes.clone()))
    }
}

pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<Bytes, ProxyError> {
        let json = match value {
            Value::Json(v) => v.clone(),
            Value::Raw(b) => serde_json::from_slice(b)
                .map_err(|e| ProxyError::invalid_argument(format!("not valid json: {e}")))?,
        };
        Ok(Bytes::from(
            serde_json::to_vec(&json).map_err(|e| ProxyError::invalid_argument(e.to_string()))?,
        ))
    }

    fn decode(&self, bytes: &Bytes) -> Result<Value, ProxyError> {
        let json: serde_json::Value = serde_json::from_slice(bytes)
            .map_err(|e| ProxyError::invalid_argument(format!("not valid json: {e}")))?;
        Ok(Value::Json(json))
    }
}

/// Resolves format names to codecs. The registry also knows the backend's
/// native format so `down`/`up` conversions (§4.2) can short-circuit.
#[derive(Clone)]
pub struct CodecRegistry {
    codecs: Arc<HashMap<&'static str, Arc<dyn Codec>>>,
    native_format: &'static str,
}

impl CodecRegistry {
    pub fn with_defaults() -> Self {
        let mut codecs: HashMap<&'static str, Arc<dyn Codec>> = HashMap::new();
        codecs.insert("raw", Arc::new(RawCodec));
        codecs.insert("json", Arc::new(JsonCodec));
        Self {
            codecs: Arc::new(codecs),
            native_format: "raw",
        }
    }

    pub fn native_format(&self) -> &'static str {
        self.native_format
    }

    pub fn resolve(&self, format: &str) -> Result<Arc<dyn Codec>, ProxyError> {
        let key = if format.is_empty() {
            self.native_format
        } else {
            format
        };
        self.codecs
            .get(key)
            .cloned()
            .ok_or_else(|| ProxyError::invalid_argument(format!("unknown format: {key}")))
    }

    /// `down(clientBytes) -> backendBytes`: identity when formats match,
    /// otherwise decode-then-encode through the opposite codec (§4.2).
    pub fn down(&self, client_format: &str, bytes: &Bytes) -> Result<Bytes, ProxyError> {
        self.convert(client_format, self.native_format, bytes)
    }

    /// `up(backendBytes) -> clientBytes`.
    pub fn up(&self, client_format: &str, bytes: &Bytes) -> Result<Bytes, ProxyError> {
        self.convert(self.native_format, client_format, bytes)
    }

    fn convert(&self, from: &str, to: &str, bytes: &Bytes) -> Result<Bytes, ProxyError> {
        let from_key = if from.is_empty() { self.native_format } else { from };
        let to_key = if to.is_empty() { self.native_format } else { to };
        if from_key == to_key {
            return Ok(bytes.clone());
        }
        let from_codec = self.resolve(from_key)?;
        let to_codec = self.resolve(to_key)?;
        let value = from_codec.decode(bytes)?;
        to_codec.encode(&value)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_formats_are_identity() {
        let reg = CodecRegistry::with_defaults();
        let bytes = Bytes::from_static(b"\xAA\xBB");
        let out = reg.down("raw", &bytes).unwrap();
        assert_eq!(out, bytes);
    }

    #[test]
    fn cross_format_round_trip_is_lossless() {
        // testable property 1: put via json, read back via json elsewhere,
        // having passed through the backend's native "raw" format.
        let reg = CodecRegistry::with_defaults();
        let original = Bytes::from_static(br#"{"id":1}"#);

        let stored = reg.down("json", &original).unwrap();
        let back = reg.up("json", &stored).unwrap();

        let original_value: serde_json::Value = serde_json::from_slice(&original).unwrap();
        let back_value: serde_json::Value = serde_json::from_slice(&back).unwrap();
        assert_eq!(original_value, back_value);
    }

    #[test]
    fn unknown_format_is_invalid_argument() {
        let reg = CodecRegistry::with_defaults();
        let err = reg.resolve("pof").unwrap_err();
        assert!(matches!(err, ProxyError::InvalidArgument(_)));
    }

    #[test]
    fn empty_format_defaults_to_native() {
        let reg = CodecRegistry::with_defaults();
        let bytes = Bytes::from_static(b"abc");
        assert_eq!(reg.down("", &bytes).unwrap(), bytes);
    }
}
