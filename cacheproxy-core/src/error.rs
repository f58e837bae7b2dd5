//! Error kinds for the proxy (spec §7), mapped 1:1 onto gRPC status codes.
//!
//! Every asynchronous stage funnels through `ProxyError` before it reaches
//! the transport: non-`ProxyError` failures (codec errors, joins, etc.) are
//! wrapped as `Internal` at the single adapter point this type's `From`
//! impls provide, mirroring the `AppError` → `StatusCode` match in
//! `r2e_core::error`.

use std::fmt;

#[derive(Debug, Clone)]
pub enum ProxyError {
    InvalidArgument(String),
    NotFound(String),
    FailedPrecondition(String),
    DeadlineExceeded,
    Cancelled,
    ResourceExhausted(String),
    Unavailable(String),
    Internal(String),
}

impl ProxyError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn failed_precondition(msg: impl Into<String>) -> Self {
        Self::FailedPrecondition(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            ProxyError::NotFound(msg) => write!(f, "not found: {msg}"),
            ProxyError::FailedPrecondition(msg) => write!(f, "failed precondition: {msg}"),
            ProxyError::DeadlineExceeded => write!(f, "deadline exceeded"),
            ProxyError::Cancelled => write!(f, "cancelled"),
            ProxyError::ResourceExhausted(msg) => write!(f, "resource exhausted: {msg}"),
            ProxyError::Unavailable(msg) => write!(f, "unavailable: {msg}"),
            ProxyError::Internal(msg) => write!(f, "internal: {msg}"),
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<ProxyError> for tonic::Status {
    fn from(err: ProxyError) -> Self {
        match err {
            ProxyError::InvalidArgument(msg) => tonic::Status::invalid_argument(msg),
            ProxyError::NotFound(msg) => tonic::Status::not_found(msg),
            ProxyError::FailedPrecondition(msg) => tonic::Status::failed_precondition(msg),
            ProxyError::DeadlineExceeded => tonic::Status::deadline_exceeded("deadline exceeded"),
            ProxyError::Cancelled => tonic::Status::cancelled("cancelled"),
            ProxyError::ResourceExhausted(msg) => tonic::Status::resource_exhausted(msg),
            ProxyError::Unavailable(msg) => tonic::Status::unavailable(msg),
            ProxyError::Internal(msg) => tonic::Status::internal(msg),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_argument_maps_to_status() {
        let status: tonic::Status = ProxyError::invalid_argument("missing processor").into();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(status.message(), "missing processor");
    }

    #[test]
    fn failed_precondition_maps_to_status() {
        let status: tonic::Status = ProxyError::failed_precondition("cache destroyed").into();
        assert_eq!(status.code(), tonic::Code::FailedPrecondition);
    }

    #[test]
    fn resource_exhausted_maps_to_status() {
        let status: tonic::Status =
            ProxyError::ResourceExhausted("event buffer full".into()).into();
        assert_eq!(status.code(), tonic::Code::ResourceExhausted);
    }

    #[test]
    fn deadline_exceeded_maps_to_status() {
        let status: tonic::Status = ProxyError::DeadlineExceeded.into();
        assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
    }
}
