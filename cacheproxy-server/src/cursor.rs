//! Paged cursor engine (C7): byte-budgeted, ordered iteration over a cache's
//! keys/entries. The cookie is self-describing — `(resume_key, epoch)` — so
//! there is no server-side cursor table to expire or leak; every `NextPage`
//! call takes a fresh sorted snapshot from [`PartitionedCache::page_after`]
//! and resumes strictly after the last key the client has seen (spec §4.7).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use cacheproxy_core::ProxyError;

/// An opaque-to-the-client cursor position. Encoded as
/// `epoch(u64 BE) || resume_key_len(u32 BE) || resume_key`; an empty
/// `resume_key` with `resume_key_len == 0` means "start of iteration".
pub struct Cookie {
    pub resume_key: Option<Bytes>,
    pub epoch: u64,
}

impl Cookie {
    pub fn start(epoch: u64) -> Self {
        Self { resume_key: None, epoch }
    }

    pub fn encode(&self) -> Bytes {
        let key = self.resume_key.as_deref().unwrap_or(&[]);
        let mut buf = BytesMut::with_capacity(12 + key.len());
        buf.put_u64(self.epoch);
        buf.put_u32(key.len() as u32);
        buf.put_slice(key);
        buf.freeze()
    }

    /// Decodes a cookie, or treats empty bytes as "start a new iteration at
    /// the given epoch" — callers pass the cache's current epoch so a fresh
    /// iteration always observes the live snapshot.
    pub fn decode_or_start(bytes: &Bytes, current_epoch: u64) -> Result<Self, ProxyError> {
        if bytes.is_empty() {
            return Ok(Self::start(current_epoch));
        }
        let mut cursor = bytes.clone();
        if cursor.remaining() < 12 {
            return Err(ProxyError::invalid_argument("malformed page cookie"));
        }
        let epoch = cursor.get_u64();
        let key_len = cursor.get_u32() as usize;
        if cursor.remaining() < key_len {
            return Err(ProxyError::invalid_argument("malformed page cookie"));
        }
        let resume_key = if key_len == 0 {
            None
        } else {
            Some(cursor.copy_to_bytes(key_len))
        };
        Ok(Self { resume_key, epoch })
    }

    /// A truncation bumps the epoch; a cookie minted before that point is
    /// stale and iteration restarts from the beginning rather than erroring,
    /// matching the best-effort-consistent semantics spec.md §9 commits to.
    pub fn is_stale(&self, current_epoch: u64) -> bool {
        self.epoch != current_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_bytes_start_a_fresh_iteration() {
        let cookie = Cookie::decode_or_start(&Bytes::new(), 7).unwrap();
        assert_eq!(cookie.resume_key, None);
        assert_eq!(cookie.epoch, 7);
    }

    #[test]
    fn round_trips_resume_key_and_epoch() {
        let original = Cookie { resume_key: Some(Bytes::from_static(b"k042")), epoch: 3 };
        let encoded = original.encode();
        let decoded = Cookie::decode_or_start(&encoded, 99).unwrap();
        assert_eq!(decoded.resume_key, Some(Bytes::from_static(b"k042")));
        assert_eq!(decoded.epoch, 3);
    }

    #[test]
    fn truncated_bytes_are_rejected() {
        let err = Cookie::decode_or_start(&Bytes::from_static(b"\x00"), 0).unwrap_err();
        assert!(matches!(err, ProxyError::InvalidArgument(_)));
    }

    #[test]
    fn stale_epoch_is_detected() {
        let cookie = Cookie { resume_key: None, epoch: 1 };
        assert!(cookie.is_stale(2));
        assert!(!cookie.is_stale(1));
    }
}
