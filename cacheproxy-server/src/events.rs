//! Event stream multiplexer (C8, spec §4.8): one bidirectional stream
//! carries any number of SUBSCRIBE/UNSUBSCRIBE registrations. Grounded on
//! `r2e-events::LocalEventBus`'s `Arc<RwLock<HashMap<_, Vec<Handler>>>>`
//! dispatch shape, generalized from global typed pub/sub to per-stream
//! filtered registrations against a single cache, and from the bus's
//! semaphore-permit backpressure to a bounded channel that fails the whole
//! stream with RESOURCE_EXHAUSTED on overflow — spec.md §4.8 commits to
//! reject-on-overflow, not block-until-permit.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tonic::Status;

use cacheproxy_core::{
    CacheEvent, Filter, ListenerId, ListenerSpec, PartitionedCache, ProxyError, RegistrationKey, RequestHolder,
};
use cacheproxy_wire::proto;

use crate::state::AppState;

struct Registration {
    cache: Arc<PartitionedCache>,
    listener_id: ListenerId,
}

/// Spawns the session loop reading `inbound` and returns the stream of
/// responses `Events` should hand back to tonic.
pub fn spawn_session(
    state: Arc<AppState>,
    mut inbound: tonic::Streaming<proto::EventRequest>,
) -> ReceiverStream<Result<proto::EventResponse, Status>> {
    let (out_tx, out_rx) = mpsc::channel(state.config.event_buffer_high_water.max(1));
    let cancel = CancellationToken::new();

    tokio::spawn(async move {
        let mut scope = String::new();
        let mut format = String::new();
        let mut init_done = false;
        let mut by_filter: HashMap<u64, Registration> = HashMap::new();
        let mut by_key: HashMap<Bytes, Registration> = HashMap::new();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                next = inbound.next() => {
                    let Some(message) = next else { break };
                    let Ok(message) = message else { break };
                    match message.kind {
                        Some(proto::event_request::Kind::Init(init)) => {
                            if !init_done {
                                scope = init.scope;
                                format = init.format;
                                init_done = true;
                            }
                        }
                        Some(proto::event_request::Kind::Subscribe(sub)) => {
                            handle_subscribe(
                                &state,
                                &scope,
                                &format,
                                sub,
                                &mut by_filter,
                                &mut by_key,
                                out_tx.clone(),
                                cancel.clone(),
                            )
                            .await;
                        }
                        Some(proto::event_request::Kind::Unsubscribe(unsub)) => {
                            handle_unsubscribe(unsub, &mut by_filter, &mut by_key, &out_tx).await;
                        }
                        None => {}
                    }
                }
            }
        }
    });

    ReceiverStream::new(out_rx)
}

#[allow(clippy::too_many_arguments)]
async fn handle_subscribe(
    state: &Arc<AppState>,
    scope: &str,
    format: &str,
    sub: proto::SubscribeRequest,
    by_filter: &mut HashMap<u64, Registration>,
    by_key: &mut HashMap<Bytes, Registration>,
    out_tx: mpsc::Sender<Result<proto::EventResponse, Status>>,
    cancel: CancellationToken,
) {
    let per_key = !sub.key.is_empty();
    // Exactly one registration per (stream, filterId) / (stream, key) —
    // spec §3's listener-registration invariant.
    if per_key {
        if by_key.contains_key(&sub.key) {
            return;
        }
    } else if by_filter.contains_key(&sub.filter_id) {
        return;
    }

    let holder = match state.holder_for(scope, &sub.cache, format.to_string()) {
        Ok(holder) => holder,
        Err(err) => {
            let _ = out_tx.send(Ok(error_response(err))).await;
            return;
        }
    };

    let filter_result = if per_key {
        Ok(Filter::All)
    } else {
        holder.convert_down(&sub.filter).and_then(|bytes| Filter::from_bytes(&bytes))
    };
    let filter = match filter_result {
        Ok(filter) => filter,
        Err(err) => {
            let _ = out_tx.send(Ok(error_response(err))).await;
            return;
        }
    };

    let registration_key = if per_key {
        match holder.convert_down(&sub.key) {
            Ok(key) => RegistrationKey::Key(key),
            Err(err) => {
                let _ = out_tx.send(Ok(error_response(err))).await;
                return;
            }
        }
    } else {
        RegistrationKey::Filter(sub.filter_id)
    };

    let cache = holder.cache().clone();
    let buffer = state.config.event_buffer_high_water;
    let (listener_id, rx) = cache.add_listener(
        ListenerSpec { registration: registration_key, filter: filter.clone(), lite: sub.lite },
        buffer,
    );

    if per_key {
        by_key.insert(sub.key.clone(), Registration { cache: cache.clone(), listener_id });
    } else {
        by_filter.insert(sub.filter_id, Registration { cache: cache.clone(), listener_id });
    }

    if sub.priming {
        for (key, value) in cache.matching_entries(&filter) {
            let event = to_event(&holder, &sub.cache, sub.filter_id, proto::EventKind::Synthetic, Some(key), None, Some(value), false);
            let Ok(event) = event else { continue };
            if out_tx.send(Ok(event)).await.is_err() {
                return;
            }
        }
    }

    let ack = proto::EventResponse {
        kind: Some(proto::event_response::Kind::Subscribed(proto::Subscribed { filter_id: sub.filter_id })),
    };
    if out_tx.send(Ok(ack)).await.is_err() {
        return;
    }

    spawn_forwarder(holder, sub.cache, sub.filter_id, sub.lite, rx, out_tx, cancel);
}

fn spawn_forwarder(
    holder: RequestHolder,
    cache_name: String,
    filter_id: u64,
    lite: bool,
    mut rx: mpsc::Receiver<CacheEvent>,
    out_tx: mpsc::Sender<Result<proto::EventResponse, Status>>,
    cancel: CancellationToken,
) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let response = match event {
                CacheEvent::Inserted { key, new_value } => to_event(
                    &holder, &cache_name, filter_id, proto::EventKind::Inserted, Some(key), None, Some(new_value), lite,
                ),
                CacheEvent::Updated { key, old_value, new_value } => to_event(
                    &holder, &cache_name, filter_id, proto::EventKind::Updated, Some(key), Some(old_value), Some(new_value), lite,
                ),
                CacheEvent::Deleted { key, old_value } => to_event(
                    &holder, &cache_name, filter_id, proto::EventKind::Deleted, Some(key), Some(old_value), None, lite,
                ),
                CacheEvent::Truncated => Ok(proto::EventResponse {
                    kind: Some(proto::event_response::Kind::Truncated(proto::Truncated { cache: cache_name.clone() })),
                }),
                CacheEvent::Destroyed => Ok(proto::EventResponse {
                    kind: Some(proto::event_response::Kind::Destroyed(proto::Destroyed { cache: cache_name.clone() })),
                }),
            };

            let response = match response {
                Ok(response) => response,
                Err(err) => {
                    let _ = out_tx.try_send(Ok(error_response(err)));
                    continue;
                }
            };
            let is_destroyed = matches!(response.kind, Some(proto::event_response::Kind::Destroyed(_)));

            match out_tx.try_send(Ok(response)) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    // Bounded window exceeded: close the whole stream with
                    // RESOURCE_EXHAUSTED rather than silently dropping.
                    let _ = out_tx
                        .send(Ok(error_response(ProxyError::ResourceExhausted(
                            "event buffer overflow".to_string(),
                        ))))
                        .await;
                    cancel.cancel();
                    return;
                }
                Err(mpsc::error::TrySendError::Closed(_)) => return,
            }

            if is_destroyed {
                cancel.cancel();
                return;
            }
        }
    });
}

async fn handle_unsubscribe(
    unsub: proto::UnsubscribeRequest,
    by_filter: &mut HashMap<u64, Registration>,
    by_key: &mut HashMap<Bytes, Registration>,
    out_tx: &mpsc::Sender<Result<proto::EventResponse, Status>>,
) {
    let removed = if !unsub.key.is_empty() {
        by_key.remove(&unsub.key).map(|reg| reg.cache.remove_listener(reg.listener_id)).is_some()
    } else {
        by_filter.remove(&unsub.filter_id).map(|reg| reg.cache.remove_listener(reg.listener_id)).is_some()
    };
    // Idempotent: a second UNSUBSCRIBE for the same id is a no-op, no ack.
    if removed {
        let ack = proto::EventResponse {
            kind: Some(proto::event_response::Kind::Unsubscribed(proto::Unsubscribed {
                filter_id: unsub.filter_id,
                key: unsub.key,
            })),
        };
        let _ = out_tx.send(Ok(ack)).await;
    }
}

#[allow(clippy::too_many_arguments)]
fn to_event(
    holder: &RequestHolder,
    cache_name: &str,
    filter_id: u64,
    kind: proto::EventKind,
    key: Option<Bytes>,
    old_value: Option<Bytes>,
    new_value: Option<Bytes>,
    lite: bool,
) -> Result<proto::EventResponse, ProxyError> {
    let key = key.map(|k| holder.convert_up(&k)).transpose()?.unwrap_or_default();
    let (old_value, new_value) = if lite {
        (Bytes::new(), Bytes::new())
    } else {
        (
            old_value.map(|v| holder.convert_up(&v)).transpose()?.unwrap_or_default(),
            new_value.map(|v| holder.convert_up(&v)).transpose()?.unwrap_or_default(),
        )
    };
    let event = proto::Event {
        cache: cache_name.to_string(),
        filter_id,
        kind: kind as i32,
        key,
        old_value,
        new_value,
    };
    Ok(proto::EventResponse { kind: Some(proto::event_response::Kind::Event(event)) })
}

fn error_response(err: ProxyError) -> proto::EventResponse {
    proto::EventResponse {
        kind: Some(proto::event_response::Kind::Error(proto::ErrorEvent { message: err.to_string() })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cacheproxy_core::ProxyConfig;

    fn subscribe(filter_id: u64, cache: &str) -> proto::SubscribeRequest {
        proto::SubscribeRequest {
            filter_id,
            cache: cache.to_string(),
            filter: Bytes::new(),
            key: Bytes::new(),
            lite: false,
            priming: false,
        }
    }

    #[tokio::test]
    async fn duplicate_subscribe_for_the_same_filter_id_is_a_no_op() {
        let state = AppState::new(ProxyConfig::default()).unwrap();
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let mut by_filter = HashMap::new();
        let mut by_key = HashMap::new();
        let cancel = CancellationToken::new();

        handle_subscribe(&state, "", "raw", subscribe(1, "people"), &mut by_filter, &mut by_key, out_tx.clone(), cancel.clone())
            .await;
        handle_subscribe(&state, "", "raw", subscribe(1, "people"), &mut by_filter, &mut by_key, out_tx.clone(), cancel)
            .await;

        assert_eq!(by_filter.len(), 1);
        let first = out_rx.recv().await.unwrap().unwrap();
        assert!(matches!(first.kind, Some(proto::event_response::Kind::Subscribed(_))));
        // second SUBSCRIBE produced no further message
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn repeated_unsubscribe_only_acks_once() {
        let state = AppState::new(ProxyConfig::default()).unwrap();
        let (out_tx, mut out_rx) = mpsc::channel(16);
        let mut by_filter = HashMap::new();
        let mut by_key = HashMap::new();
        let cancel = CancellationToken::new();

        handle_subscribe(&state, "", "raw", subscribe(1, "people"), &mut by_filter, &mut by_key, out_tx.clone(), cancel)
            .await;
        out_rx.recv().await.unwrap().unwrap(); // Subscribed ack

        let unsub = proto::UnsubscribeRequest { filter_id: 1, key: Bytes::new() };
        handle_unsubscribe(unsub.clone(), &mut by_filter, &mut by_key, &out_tx).await;
        handle_unsubscribe(unsub, &mut by_filter, &mut by_key, &out_tx).await;

        assert!(by_filter.is_empty());
        let first = out_rx.recv().await.unwrap().unwrap();
        assert!(matches!(first.kind, Some(proto::event_response::Kind::Unsubscribed(_))));
        assert!(out_rx.try_recv().is_err());
    }

    #[test]
    fn lite_events_carry_the_key_but_not_the_values() {
        let state = AppState::new(ProxyConfig::default()).unwrap();
        let holder = state.holder_for("", "people", "raw".to_string()).unwrap();
        let response = to_event(
            &holder,
            "people",
            1,
            proto::EventKind::Updated,
            Some(Bytes::from_static(b"k")),
            Some(Bytes::from_static(b"old")),
            Some(Bytes::from_static(b"new")),
            true,
        )
        .unwrap();
        let Some(proto::event_response::Kind::Event(event)) = response.kind else { panic!("expected Event") };
        assert_eq!(event.key, Bytes::from_static(b"k"));
        assert!(event.old_value.is_empty());
        assert!(event.new_value.is_empty());
    }
}
