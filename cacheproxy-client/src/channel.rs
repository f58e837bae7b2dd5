//! Channel lifecycle (spec.md SPEC_FULL §4.9): `Connected | Closed` behind a
//! `tokio::sync::RwLock`, matching the teacher's preference for
//! `tokio::sync` primitives over hand-rolled atomics or `parking_lot`
//! (`r2e_cache`/`r2e_rate_limit` both reach for `DashMap`/`RwLock`).

use tokio::sync::RwLock;
use tonic::transport::Channel;

use cacheproxy_wire::cache_service_client::CacheServiceClient;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    Connected,
    Closed,
}

/// Owns the transport channel and tracks whether it has been closed. Every
/// operation issued through a [`crate::NamedCacheHandle`] checks this first.
pub struct ProxyChannel {
    channel: Channel,
    state: RwLock<ChannelState>,
}

impl ProxyChannel {
    pub fn new(channel: Channel) -> Self {
        Self { channel, state: RwLock::new(ChannelState::Connected) }
    }

    /// Returns a client stub bound to this channel, or `ServiceStopped` if
    /// the channel has already been closed (rule 5).
    pub async fn client(&self) -> Result<CacheServiceClient<Channel>, ClientError> {
        if *self.state.read().await == ChannelState::Closed {
            return Err(ClientError::ServiceStopped);
        }
        Ok(CacheServiceClient::new(self.channel.clone()))
    }

    pub async fn is_closed(&self) -> bool {
        *self.state.read().await == ChannelState::Closed
    }

    /// Transitions to `Closed`. Idempotent.
    pub async fn close(&self) {
        *self.state.write().await = ChannelState::Closed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_channel() -> Channel {
        Channel::from_static("http://127.0.0.1:1").connect_lazy()
    }

    #[tokio::test]
    async fn client_is_available_while_connected() {
        let proxy = ProxyChannel::new(test_channel());
        assert!(proxy.client().await.is_ok());
    }

    #[tokio::test]
    async fn client_is_rejected_after_close() {
        let proxy = ProxyChannel::new(test_channel());
        proxy.close().await;
        assert!(proxy.is_closed().await);
        assert!(matches!(proxy.client().await, Err(ClientError::ServiceStopped)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let proxy = ProxyChannel::new(test_channel());
        proxy.close().await;
        proxy.close().await;
        assert!(proxy.is_closed().await);
    }
}
