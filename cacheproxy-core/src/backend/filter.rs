//! Filter bytes are opaque on the wire (spec §4.1: "empty filter bytes mean
//! 'match all'"). The reference backend decodes them as a tiny JSON DSL —
//! a real backend would decode whatever logical filter representation its
//! serializer format carries.

use bytes::Bytes;
use serde_json::Value as Json;

use crate::error::ProxyError;

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    All,
    ValueEquals(Bytes),
    ValueGreaterThan(i64),
}

impl Filter {
    pub fn from_bytes(bytes: &Bytes) -> Result<Self, ProxyError> {
        if bytes.is_empty() {
            return Ok(Filter::All);
        }
        let json: Json = serde_json::from_slice(bytes)
            .map_err(|e| ProxyError::invalid_argument(format!("malformed filter: {e}")))?;
        if let Some(eq) = json.get("eq").and_then(Json::as_str) {
            return Ok(Filter::ValueEquals(Bytes::copy_from_slice(eq.as_bytes())));
        }
        if let Some(gt) = json.get("gt").and_then(Json::as_i64) {
            return Ok(Filter::ValueGreaterThan(gt));
        }
        if json.as_object().map(|o| o.is_empty()).unwrap_or(false) {
            return Ok(Filter::All);
        }
        Err(ProxyError::invalid_argument("unrecognized filter shape"))
    }

    pub fn matches(&self, value: &Bytes) -> bool {
        match self {
            Filter::All => true,
            Filter::ValueEquals(expected) => value == expected,
            Filter::ValueGreaterThan(threshold) => value_as_i64(value)
                .map(|v| v > *threshold)
                .unwrap_or(false),
        }
    }
}

pub(crate) fn value_as_i64(value: &Bytes) -> Option<i64> {
    std::str::from_utf8(value).ok()?.parse::<i64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bytes_match_all() {
        assert_eq!(Filter::from_bytes(&Bytes::new()).unwrap(), Filter::All);
    }

    #[test]
    fn equality_filter_matches_exact_value() {
        let filter = Filter::from_bytes(&Bytes::from_static(br#"{"eq":"abc"}"#)).unwrap();
        assert!(filter.matches(&Bytes::from_static(b"abc")));
        assert!(!filter.matches(&Bytes::from_static(b"xyz")));
    }

    #[test]
    fn greater_than_filter_parses_numeric_values() {
        let filter = Filter::from_bytes(&Bytes::from_static(br#"{"gt":0}"#)).unwrap();
        assert!(filter.matches(&Bytes::from_static(b"1")));
        assert!(!filter.matches(&Bytes::from_static(b"0")));
        assert!(!filter.matches(&Bytes::from_static(b"not-a-number")));
    }

    #[test]
    fn malformed_filter_is_invalid_argument() {
        let err = Filter::from_bytes(&Bytes::from_static(b"not json")).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidArgument(_)));
    }
}
