//! Entry-processor polymorphism (spec §9): point mutations are represented
//! as a tagged variant transmitted to the backend rather than modeled via
//! inheritance. `put`/`putIfAbsent`/`replace`/`replaceMapping`/`remove`/
//! `removeMapping`/`get`/`containsValue` (spec §4.6) all funnel through
//! [`EntryProcessor`] so the prior value comes back in one round-trip.

use bytes::Bytes;
use serde_json::Value as Json;
use std::time::Duration;

use crate::error::ProxyError;

#[derive(Debug, Clone)]
pub enum EntryProcessor {
    Put {
        value: Bytes,
        ttl: Option<Duration>,
    },
    PutIfAbsent {
        value: Bytes,
        ttl: Option<Duration>,
    },
    Replace {
        value: Bytes,
    },
    ReplaceMapping {
        expect: Bytes,
        new: Bytes,
    },
    Remove,
    RemoveMapping {
        expect: Bytes,
    },
    Get,
    ContainsValue {
        expect: Bytes,
    },
}

/// Result of applying an [`EntryProcessor`]. `Value` carries the prior
/// mapping (or the current one, for `Get`); `Flag` carries a boolean outcome
/// for the mapping-conditioned operations.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryResult {
    Value(Option<Bytes>),
    Flag(bool),
}

impl EntryResult {
    pub fn into_optional(self) -> Option<Bytes> {
        match self {
            EntryResult::Value(v) => v,
            EntryResult::Flag(_) => None,
        }
    }

    pub fn into_bool(self) -> bool {
        match self {
            EntryResult::Flag(b) => b,
            EntryResult::Value(v) => v.is_some(),
        }
    }
}

/// User-supplied processor bytes for the explicit `invoke`/`invokeAll` RPCs
/// (spec §4.6). These are opaque on the wire; the reference backend decodes
/// them as a tiny JSON DSL standing in for whatever logical processor
/// representation a production serializer format would carry.
#[derive(Debug, Clone)]
pub enum UserProcessor {
    Get,
    Remove,
    Touch,
    Increment { amount: i64 },
}

impl UserProcessor {
    pub fn from_bytes(bytes: &Bytes) -> Result<Self, ProxyError> {
        if bytes.is_empty() {
            return Err(ProxyError::invalid_argument("empty processor bytes"));
        }
        let json: Json = serde_json::from_slice(bytes)
            .map_err(|e| ProxyError::invalid_argument(format!("malformed processor: {e}")))?;
        match json.get("op").and_then(Json::as_str) {
            Some("get") => Ok(UserProcessor::Get),
            Some("remove") => Ok(UserProcessor::Remove),
            Some("touch") => Ok(UserProcessor::Touch),
            Some("increment") => {
                let amount = json.get("amount").and_then(Json::as_i64).unwrap_or(1);
                Ok(UserProcessor::Increment { amount })
            }
            _ => Err(ProxyError::invalid_argument("unrecognized processor op")),
        }
    }
}

/// Aggregator bytes, likewise opaque on the wire; decoded as a tiny DSL.
#[derive(Debug, Clone)]
pub enum Aggregator {
    Count,
    Sum,
}

impl Aggregator {
    pub fn from_bytes(bytes: &Bytes) -> Result<Self, ProxyError> {
        if bytes.is_empty() {
            return Err(ProxyError::invalid_argument("empty aggregator bytes"));
        }
        let json: Json = serde_json::from_slice(bytes)
            .map_err(|e| ProxyError::invalid_argument(format!("malformed aggregator: {e}")))?;
        match json.get("op").and_then(Json::as_str) {
            Some("count") => Ok(Aggregator::Count),
            Some("sum") => Ok(Aggregator::Sum),
            _ => Err(ProxyError::invalid_argument("unrecognized aggregator op")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_result_value_into_optional() {
        let result = EntryResult::Value(Some(Bytes::from_static(b"v")));
        assert_eq!(result.into_optional(), Some(Bytes::from_static(b"v")));
    }

    #[test]
    fn empty_processor_bytes_rejected() {
        let err = UserProcessor::from_bytes(&Bytes::new()).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidArgument(_)));
    }

    #[test]
    fn increment_processor_defaults_amount_to_one() {
        let proc = UserProcessor::from_bytes(&Bytes::from_static(br#"{"op":"increment"}"#)).unwrap();
        assert!(matches!(proc, UserProcessor::Increment { amount: 1 }));
    }

    #[test]
    fn empty_aggregator_bytes_rejected() {
        let err = Aggregator::from_bytes(&Bytes::new()).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidArgument(_)));
    }
}
