//! The client cache proxy (C9, spec.md §4.9): a scoped store of active
//! named-cache handles plus the shared event stream that drives remote
//! truncate/destroy notifications back onto local listeners. Grounded on
//! `r2e_core::service::ServiceComponent`'s shutdown-token pattern for the
//! channel-closed lifecycle transition (rule 5), generalized here from
//! "one background component" to "every live handle".

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::Mutex as AsyncMutex;
use tonic::transport::Channel;
use tonic::Request;

use cacheproxy_core::ProxyConfig;
use cacheproxy_wire::proto;

use crate::channel::ProxyChannel;
use crate::error::ClientError;
use crate::handle::NamedCacheHandle;
use crate::listener::LifecycleEvent;

/// Implements the embedded cache contract client-side: `ensureCache`,
/// `release`, `destroy`, and remote truncation dispatch (spec.md §4.9 rules
/// 1–5). Handles are keyed by cache name; there is no Rust analogue of the
/// Java classloader scoping the original contract uses, so one proxy
/// instance serves exactly one logical scope/format pair (documented open
/// decision, see DESIGN.md).
pub struct CacheProxy {
    channel: Arc<ProxyChannel>,
    scope: String,
    format: String,
    request_deadline: Duration,
    handles: DashMap<String, Arc<NamedCacheHandle>>,
    construction_locks: DashMap<String, Arc<AsyncMutex<()>>>,
}

impl CacheProxy {
    pub fn new(channel: Channel, scope: impl Into<String>, format: impl Into<String>, config: &ProxyConfig) -> Self {
        Self {
            channel: Arc::new(ProxyChannel::new(channel)),
            scope: scope.into(),
            format: format.into(),
            request_deadline: config.request_deadline,
            handles: DashMap::new(),
            construction_locks: DashMap::new(),
        }
    }

    /// Rule 1: returns an existing active handle, or constructs a new one
    /// under a per-name lock. Blocking longer than `request_deadline` on
    /// that lock surfaces as [`ClientError::Timeout`].
    pub async fn ensure_cache(&self, name: &str) -> Result<Arc<NamedCacheHandle>, ClientError> {
        if self.channel.is_closed().await {
            return Err(ClientError::ServiceStopped);
        }
        if let Some(existing) = self.handles.get(name) {
            if existing.is_active() {
                return Ok(existing.clone());
            }
        }

        let lock = self.construction_locks.entry(name.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone();
        let _guard = tokio::time::timeout(self.request_deadline, lock.lock()).await.map_err(|_| ClientError::Timeout)?;

        if let Some(existing) = self.handles.get(name) {
            if existing.is_active() {
                return Ok(existing.clone());
            }
        }

        let handle = NamedCacheHandle::new(self.scope.clone(), name.to_string(), self.format.clone(), self.channel.clone());
        self.handles.insert(name.to_string(), handle.clone());
        tracing::debug!(cache = name, "constructed named cache handle");
        Ok(handle)
    }

    /// Rule 2: deactivates the handle, drops it from the store, fires
    /// `Released` to its listeners. A no-op if the name has no live handle.
    pub fn release(&self, name: &str) {
        if let Some((_, handle)) = self.handles.remove(name) {
            handle.deactivate();
            handle.fire(LifecycleEvent::Released);
            tracing::debug!(cache = name, "released named cache handle");
        }
    }

    /// Rule 3: sends the remote `Destroy` RPC, then additionally dispatches
    /// `Destroyed` to the handle's own listeners and removes it locally.
    pub async fn destroy(&self, name: &str) -> Result<(), ClientError> {
        let handle = self.ensure_cache(name).await?;
        handle.destroy_remote().await?;
        if let Some((_, handle)) = self.handles.remove(name) {
            handle.deactivate();
            handle.fire(LifecycleEvent::Destroyed);
        }
        tracing::info!(cache = name, "destroyed named cache");
        Ok(())
    }

    /// Rule 4: called by the event-stream pump when a `TRUNCATED`/`DESTROYED`
    /// notification arrives for a cache this proxy has a live local handle
    /// for.
    fn dispatch_remote_event(&self, name: &str, event: LifecycleEvent) {
        if let Some(handle) = self.handles.get(name) {
            handle.fire(event);
            if event == LifecycleEvent::Destroyed {
                handle.deactivate();
            }
        }
    }

    /// Rule 5: closes the underlying channel; every live handle transitions
    /// to inactive and subsequent use surfaces `ServiceStopped`.
    pub async fn close(&self) {
        self.channel.close().await;
        for entry in self.handles.iter() {
            entry.value().deactivate();
        }
        tracing::info!("cache proxy channel closed, all handles deactivated");
    }

    /// Drives the shared `Events` bidi stream: subscribes (lite, match-all)
    /// to every cache this proxy ensures, and routes `TRUNCATED`/`DESTROYED`
    /// notifications back onto the owning handle's listeners. Runs until
    /// the channel is closed or the stream ends.
    pub async fn run_event_pump(self: Arc<Self>) -> Result<(), ClientError> {
        let mut client = self.channel.client().await?;
        let (tx, rx) = tokio::sync::mpsc::channel::<proto::EventRequest>(16);
        tx.send(proto::EventRequest {
            kind: Some(proto::event_request::Kind::Init(proto::InitRequest {
                scope: self.scope.clone(),
                format: self.format.clone(),
            })),
        })
        .await
        .map_err(|_| ClientError::ServiceStopped)?;

        let mut response_stream = client.events(Request::new(tokio_stream::wrappers::ReceiverStream::new(rx))).await?.into_inner();

        let mut next_filter_id: u64 = 1;
        for handle_name in self.handles.iter().map(|e| e.key().clone()).collect::<Vec<_>>() {
            let filter_id = next_filter_id;
            next_filter_id += 1;
            let _ = tx
                .send(proto::EventRequest {
                    kind: Some(proto::event_request::Kind::Subscribe(proto::SubscribeRequest {
                        filter_id,
                        cache: handle_name,
                        filter: Bytes::new(),
                        key: Bytes::new(),
                        lite: true,
                        priming: false,
                    })),
                })
                .await;
        }

        use futures_util::StreamExt;
        while let Some(message) = response_stream.next().await {
            let Ok(message) = message else { break };
            match message.kind {
                Some(proto::event_response::Kind::Truncated(t)) => {
                    self.dispatch_remote_event(&t.cache, LifecycleEvent::Truncated);
                }
                Some(proto::event_response::Kind::Destroyed(d)) => {
                    self.dispatch_remote_event(&d.cache, LifecycleEvent::Destroyed);
                }
                _ => {}
            }
        }
        tracing::warn!("event stream pump ended");
        Ok(())
    }
}
