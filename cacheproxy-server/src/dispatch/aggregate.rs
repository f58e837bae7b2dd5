//! Entry processors and aggregators (spec §4.6): `invoke`, `invokeAll`,
//! `aggregate`, and `containsValue` (which the source models as a
//! count-aggregator over an equality filter rather than its own backend
//! primitive).

use bytes::Bytes;
use cacheproxy_core::{Aggregator, EntryProcessor, Filter, ProxyError, UserProcessor};
use cacheproxy_wire::proto;

use crate::state::AppState;

fn apply_user_processor(current: Option<Bytes>, op: &UserProcessor) -> Option<Bytes> {
    match op {
        UserProcessor::Get => current,
        UserProcessor::Remove => None,
        UserProcessor::Touch => current,
        UserProcessor::Increment { amount } => {
            let base: i64 = current
                .as_deref()
                .and_then(|b| std::str::from_utf8(b).ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(0);
            Some(Bytes::from((base + amount).to_string().into_bytes()))
        }
    }
}

pub async fn invoke(state: &AppState, req: proto::InvokeRequest) -> Result<proto::BytesValue, ProxyError> {
    if req.processor.is_empty() {
        return Err(ProxyError::invalid_argument("processor bytes must not be empty"));
    }
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let processor = UserProcessor::from_bytes(&req.processor)?;
    let key = holder.convert_down(&req.key)?;
    let cache = holder.cache().clone();
    let current = {
        let key = key.clone();
        let cache = cache.clone();
        state
            .executor
            .spawn(async move { cache.invoke_entry(key, EntryProcessor::Get).await })
            .await??
            .into_optional()
    };
    let next = apply_user_processor(current.clone(), &processor);
    if next != current {
        let written = next.clone().unwrap_or_default();
        if next.is_some() {
            state
                .executor
                .spawn(async move {
                    cache
                        .invoke_entry(key, EntryProcessor::Put { value: written, ttl: None })
                        .await
                })
                .await??;
        } else {
            state
                .executor
                .spawn(async move { cache.invoke_entry(key, EntryProcessor::Remove).await })
                .await??;
        }
    }
    let result = next.unwrap_or_default();
    let result = holder.convert_up(&result)?;
    Ok(proto::BytesValue { value: result })
}

pub async fn invoke_all(
    state: &AppState,
    req: proto::InvokeAllRequest,
) -> Result<Vec<proto::Entry>, ProxyError> {
    if req.processor.is_empty() {
        return Err(ProxyError::invalid_argument("processor bytes must not be empty"));
    }
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let processor = UserProcessor::from_bytes(&req.processor)?;

    let keys: Vec<Bytes> = if !req.keys.is_empty() {
        req.keys.clone()
    } else {
        let filter = Filter::from_bytes(&req.filter)?;
        holder.cache().matching_entries(&filter).into_iter().map(|(k, _)| k).collect()
    };

    let mut entries = Vec::with_capacity(keys.len());
    for key in keys {
        let backend_key = holder.convert_down(&key)?;
        let cache = holder.cache().clone();
        let current = state
            .executor
            .spawn({
                let backend_key = backend_key.clone();
                let cache = cache.clone();
                async move { cache.invoke_entry(backend_key, EntryProcessor::Get).await }
            })
            .await??
            .into_optional();
        let next = apply_user_processor(current.clone(), &processor);
        if next != current {
            if let Some(ref value) = next {
                let value = value.clone();
                state
                    .executor
                    .spawn(async move {
                        cache
                            .invoke_entry(backend_key, EntryProcessor::Put { value, ttl: None })
                            .await
                    })
                    .await??;
            } else {
                state
                    .executor
                    .spawn(async move { cache.invoke_entry(backend_key, EntryProcessor::Remove).await })
                    .await??;
            }
        }
        let result = holder.convert_up(&next.unwrap_or_default())?;
        entries.push(proto::Entry { key, value: result });
    }
    Ok(entries)
}

pub async fn aggregate(
    state: &AppState,
    req: proto::AggregateRequest,
) -> Result<proto::BytesValue, ProxyError> {
    if req.aggregator.is_empty() {
        return Err(ProxyError::invalid_argument("aggregator bytes must not be empty"));
    }
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let aggregator = Aggregator::from_bytes(&req.aggregator)?;

    let values: Vec<Bytes> = if !req.keys.is_empty() {
        let mut values = Vec::with_capacity(req.keys.len());
        for key in &req.keys {
            let backend_key = holder.convert_down(key)?;
            let cache = holder.cache().clone();
            let current = state
                .executor
                .spawn(async move { cache.invoke_entry(backend_key, EntryProcessor::Get).await })
                .await??
                .into_optional();
            if let Some(v) = current {
                values.push(v);
            }
        }
        values
    } else {
        let filter = Filter::from_bytes(&req.filter)?;
        holder.cache().matching_entries(&filter).into_iter().map(|(_, v)| v).collect()
    };

    let result = match aggregator {
        Aggregator::Count => values.len() as i64,
        Aggregator::Sum => values
            .iter()
            .filter_map(|v| std::str::from_utf8(v).ok())
            .filter_map(|s| s.parse::<i64>().ok())
            .sum(),
    };
    let bytes = Bytes::from(result.to_string().into_bytes());
    let bytes = holder.convert_up(&bytes)?;
    Ok(proto::BytesValue { value: bytes })
}

/// `containsValue` (spec §4.6): a count-aggregator over an equality filter,
/// true iff the count is greater than zero.
pub async fn contains_value(
    state: &AppState,
    req: proto::ContainsValueRequest,
) -> Result<proto::BoolResponse, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let expect = holder.convert_down(&req.value)?;
    let filter = Filter::ValueEquals(expect);
    let count = holder.cache().matching_entries(&filter).len();
    Ok(proto::BoolResponse { value: count > 0 })
}
