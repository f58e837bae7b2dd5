//! Client-side error kinds (spec.md §4.9/§5). Distinct from
//! `cacheproxy_core::ProxyError`, which only ever lives server-side: a
//! client call either comes back as a `tonic::Status` from the wire, times
//! out locally while waiting on the per-name construction lock, or is
//! rejected locally because the channel has already been closed.

use std::fmt;

#[derive(Debug, Clone)]
pub enum ClientError {
    /// The RPC itself failed; carries the status code and message.
    Status(tonic::Code, String),
    /// `ensureCache` exceeded the configured request deadline waiting for
    /// the per-name construction lock (spec.md §4.9 rule 1).
    Timeout,
    /// The underlying channel was closed; every handle is inactive and any
    /// further use surfaces this (spec.md §4.9 rule 5).
    ServiceStopped,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Status(code, msg) => write!(f, "{code:?}: {msg}"),
            ClientError::Timeout => write!(f, "timed out waiting for ensureCache"),
            ClientError::ServiceStopped => write!(f, "service stopped: channel is closed"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<tonic::Status> for ClientError {
    fn from(status: tonic::Status) -> Self {
        ClientError::Status(status.code(), status.message().to_string())
    }
}
