//! A single named-cache handle (spec.md §4.9): implements the embedded
//! cache contract by delegating every operation to the wire schema,
//! never touching cache state directly. Created by `CacheProxy::ensure_cache`;
//! discarded (but not necessarily dropped from memory — callers may still
//! hold an `Arc`) on `release`/`destroy`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tonic::Request;

use cacheproxy_wire::proto;

use crate::channel::ProxyChannel;
use crate::error::ClientError;
use crate::listener::{LifecycleEvent, LifecycleListener};

/// A (key, value) pair as handed back from `entrySet`/`getAll`.
pub type KeyValue = (Bytes, Bytes);

pub struct NamedCacheHandle {
    scope: String,
    name: String,
    format: String,
    channel: Arc<ProxyChannel>,
    active: AtomicBool,
    listeners: RwLock<Vec<Arc<dyn LifecycleListener>>>,
}

impl NamedCacheHandle {
    pub(crate) fn new(scope: String, name: String, format: String, channel: Arc<ProxyChannel>) -> Arc<Self> {
        Arc::new(Self {
            scope,
            name,
            format,
            channel,
            active: AtomicBool::new(true),
            listeners: RwLock::new(Vec::new()),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub(crate) fn deactivate(&self) {
        self.active.store(false, Ordering::Release);
    }

    pub fn add_lifecycle_listener(&self, listener: Arc<dyn LifecycleListener>) {
        self.listeners.write().unwrap().push(listener);
    }

    pub(crate) fn fire(&self, event: LifecycleEvent) {
        for listener in self.listeners.read().unwrap().iter() {
            listener.on_event(&self.name, event);
        }
    }

    fn guard(&self) -> Result<(), ClientError> {
        if !self.is_active() {
            return Err(ClientError::ServiceStopped);
        }
        Ok(())
    }

    async fn client(&self) -> Result<cacheproxy_wire::cache_service_client::CacheServiceClient<tonic::transport::Channel>, ClientError> {
        self.guard()?;
        self.channel.client().await
    }

    pub async fn get(&self, key: Bytes) -> Result<Option<Bytes>, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::GetRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            key,
        });
        let response = client.get(request).await?.into_inner();
        Ok(response.present.then_some(response.value))
    }

    pub async fn get_all(&self, keys: Vec<Bytes>) -> Result<Vec<KeyValue>, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::GetAllRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            keys,
        });
        collect_entries(client.get_all(request).await?.into_inner()).await
    }

    pub async fn put(&self, key: Bytes, value: Bytes, ttl_millis: i64) -> Result<Option<Bytes>, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::PutRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            key,
            value,
            ttl_millis,
        });
        let response = client.put(request).await?.into_inner();
        Ok(response.present.then_some(response.value))
    }

    pub async fn put_if_absent(&self, key: Bytes, value: Bytes, ttl_millis: i64) -> Result<Option<Bytes>, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::PutRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            key,
            value,
            ttl_millis,
        });
        let response = client.put_if_absent(request).await?.into_inner();
        Ok(response.present.then_some(response.value))
    }

    pub async fn put_all(&self, entries: Vec<KeyValue>, ttl_millis: i64) -> Result<u32, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::PutAllRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            entries: entries.into_iter().map(|(key, value)| proto::Entry { key, value }).collect(),
            ttl_millis,
        });
        Ok(client.put_all(request).await?.into_inner().shards_written)
    }

    pub async fn replace(&self, key: Bytes, value: Bytes) -> Result<Option<Bytes>, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::ReplaceRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            key,
            value,
        });
        let response = client.replace(request).await?.into_inner();
        Ok(response.present.then_some(response.value))
    }

    pub async fn replace_mapping(&self, key: Bytes, previous_value: Bytes, new_value: Bytes) -> Result<bool, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::ReplaceMappingRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            key,
            previous_value,
            new_value,
        });
        Ok(client.replace_mapping(request).await?.into_inner().value)
    }

    pub async fn remove(&self, key: Bytes) -> Result<Option<Bytes>, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::KeyRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            key,
        });
        let response = client.remove(request).await?.into_inner();
        Ok(response.present.then_some(response.value))
    }

    pub async fn remove_mapping(&self, key: Bytes, value: Bytes) -> Result<bool, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::RemoveMappingRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            key,
            value,
        });
        Ok(client.remove_mapping(request).await?.into_inner().value)
    }

    pub async fn contains_entry(&self, key: Bytes, value: Bytes) -> Result<bool, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::ContainsEntryRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            key,
            value,
        });
        Ok(client.contains_entry(request).await?.into_inner().value)
    }

    pub async fn contains_value(&self, value: Bytes) -> Result<bool, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::ContainsValueRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            value,
        });
        Ok(client.contains_value(request).await?.into_inner().value)
    }

    pub async fn clear(&self) -> Result<(), ClientError> {
        let mut client = self.client().await?;
        client.clear(Request::new(self.cache_request())).await?;
        Ok(())
    }

    pub async fn truncate(&self) -> Result<(), ClientError> {
        let mut client = self.client().await?;
        client.truncate(Request::new(self.cache_request())).await?;
        Ok(())
    }

    pub async fn destroy_remote(&self) -> Result<(), ClientError> {
        let mut client = self.client().await?;
        client.destroy(Request::new(self.cache_request())).await?;
        Ok(())
    }

    pub async fn is_empty(&self) -> Result<bool, ClientError> {
        let mut client = self.client().await?;
        Ok(client.is_empty(Request::new(self.cache_request())).await?.into_inner().value)
    }

    pub async fn is_ready(&self) -> Result<bool, ClientError> {
        let mut client = self.client().await?;
        Ok(client.is_ready(Request::new(self.cache_request())).await?.into_inner().value)
    }

    pub async fn size(&self) -> Result<i64, ClientError> {
        let mut client = self.client().await?;
        Ok(client.size(Request::new(self.cache_request())).await?.into_inner().value)
    }

    pub async fn add_index(&self, extractor: Bytes, comparator: Bytes, sorted: bool) -> Result<(), ClientError> {
        let mut client = self.client().await?;
        client
            .add_index(Request::new(proto::IndexRequest {
                scope: self.scope.clone(),
                cache: self.name.clone(),
                format: self.format.clone(),
                extractor,
                comparator,
                sorted,
            }))
            .await?;
        Ok(())
    }

    pub async fn remove_index(&self, extractor: Bytes) -> Result<(), ClientError> {
        let mut client = self.client().await?;
        client
            .remove_index(Request::new(proto::IndexRequest {
                scope: self.scope.clone(),
                cache: self.name.clone(),
                format: self.format.clone(),
                extractor,
                comparator: Bytes::new(),
                sorted: false,
            }))
            .await?;
        Ok(())
    }

    pub async fn invoke(&self, key: Bytes, processor: Bytes) -> Result<Bytes, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::InvokeRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            key,
            processor,
        });
        Ok(client.invoke(request).await?.into_inner().value)
    }

    pub async fn invoke_all(&self, keys: Vec<Bytes>, filter: Bytes, processor: Bytes) -> Result<Vec<KeyValue>, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::InvokeAllRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            keys,
            filter,
            processor,
        });
        collect_entries(client.invoke_all(request).await?.into_inner()).await
    }

    pub async fn aggregate(&self, keys: Vec<Bytes>, filter: Bytes, aggregator: Bytes) -> Result<Bytes, ClientError> {
        let mut client = self.client().await?;
        let request = Request::new(proto::AggregateRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            keys,
            filter,
            aggregator,
        });
        Ok(client.aggregate(request).await?.into_inner().value)
    }

    pub async fn entry_set(&self, filter: Bytes, comparator: Bytes) -> Result<Vec<KeyValue>, ClientError> {
        let mut client = self.client().await?;
        collect_entries(client.entry_set(Request::new(self.query_request(filter, comparator))).await?.into_inner()).await
    }

    pub async fn key_set(&self, filter: Bytes) -> Result<Vec<Bytes>, ClientError> {
        let mut client = self.client().await?;
        collect_values(client.key_set(Request::new(self.query_request(filter, Bytes::new()))).await?.into_inner()).await
    }

    pub async fn values(&self, filter: Bytes, comparator: Bytes) -> Result<Vec<Bytes>, ClientError> {
        let mut client = self.client().await?;
        collect_values(client.values(Request::new(self.query_request(filter, comparator))).await?.into_inner()).await
    }

    /// Drives the paged cursor engine (C7) to completion, returning every
    /// key in the (best-effort-consistent) snapshot exactly once.
    pub async fn drain_key_pages(&self) -> Result<Vec<Bytes>, ClientError> {
        let mut client = self.client().await?;
        let mut cookie = Bytes::new();
        let mut out = Vec::new();
        loop {
            let response = client
                .next_page(Request::new(proto::PageRequest {
                    scope: self.scope.clone(),
                    cache: self.name.clone(),
                    format: self.format.clone(),
                    cookie: cookie.clone(),
                    entries: false,
                }))
                .await?
                .into_inner();
            out.extend(response.keys);
            if response.cookie.is_empty() {
                break;
            }
            cookie = response.cookie;
        }
        Ok(out)
    }

    fn cache_request(&self) -> proto::CacheRequest {
        proto::CacheRequest { scope: self.scope.clone(), cache: self.name.clone(), format: self.format.clone() }
    }

    fn query_request(&self, filter: Bytes, comparator: Bytes) -> proto::QueryRequest {
        proto::QueryRequest {
            scope: self.scope.clone(),
            cache: self.name.clone(),
            format: self.format.clone(),
            filter,
            comparator,
        }
    }
}

async fn collect_entries(
    mut stream: impl Stream<Item = Result<proto::Entry, tonic::Status>> + Unpin,
) -> Result<Vec<KeyValue>, ClientError> {
    let mut out = Vec::new();
    while let Some(entry) = stream.next().await {
        let entry = entry?;
        out.push((entry.key, entry.value));
    }
    Ok(out)
}

async fn collect_values(
    mut stream: impl Stream<Item = Result<proto::BytesValue, tonic::Status>> + Unpin,
) -> Result<Vec<Bytes>, ClientError> {
    let mut out = Vec::new();
    while let Some(value) = stream.next().await {
        out.push(value?.value);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn test_handle() -> Arc<NamedCacheHandle> {
        let channel = Arc::new(ProxyChannel::new(tonic::transport::Channel::from_static("http://127.0.0.1:1").connect_lazy()));
        NamedCacheHandle::new("".into(), "people".into(), "raw".into(), channel)
    }

    #[tokio::test]
    async fn a_deactivated_handle_rejects_further_use() {
        let handle = test_handle();
        assert!(handle.is_active());
        handle.deactivate();
        assert!(!handle.is_active());
        let err = handle.get(Bytes::from_static(b"k")).await.unwrap_err();
        assert!(matches!(err, ClientError::ServiceStopped));
    }

    #[test]
    fn lifecycle_listeners_are_notified_in_registration_order() {
        let handle = test_handle();
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_clone = seen.clone();
        handle.add_lifecycle_listener(Arc::new(move |_: &str, event: LifecycleEvent| {
            assert_eq!(event, LifecycleEvent::Released);
            seen_clone.fetch_add(1, Ordering::SeqCst);
        }));
        handle.fire(LifecycleEvent::Released);
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn cache_request_carries_scope_cache_and_format() {
        let handle = test_handle();
        let request = handle.cache_request();
        assert_eq!(request.scope, "");
        assert_eq!(request.cache, "people");
        assert_eq!(request.format, "raw");
    }
}
