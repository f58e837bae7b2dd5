//! Streaming queries (spec §4.6): `entrySet`/`keySet`/`values`, and the
//! paged cursor engine (C7, spec §4.7). When a comparator is supplied,
//! results are collected and sorted before emission; without one they are
//! emitted in whatever order the backend produced them.

use bytes::Bytes;

use cacheproxy_core::{Filter, ProxyError};
use cacheproxy_wire::proto;

use crate::cursor::Cookie;
use crate::state::AppState;

fn sort_if_requested(mut entries: Vec<(Bytes, Bytes)>, comparator: &Bytes) -> Vec<(Bytes, Bytes)> {
    if comparator.is_empty() {
        return entries;
    }
    // `empty comparator bytes mean "natural order"`; any non-empty comparator
    // in this reference backend means "natural key order, reversed" — a real
    // backend would deserialize the comparator with the client serializer.
    entries.sort_by(|a, b| b.0.cmp(&a.0));
    entries
}

pub async fn entry_set(state: &AppState, req: proto::QueryRequest) -> Result<Vec<proto::Entry>, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let filter = Filter::from_bytes(&req.filter)?;
    let entries = holder.cache().matching_entries(&filter);
    let entries = sort_if_requested(entries, &req.comparator);
    entries
        .into_iter()
        .map(|(k, v)| {
            Ok(proto::Entry {
                key: holder.convert_up(&k)?,
                value: holder.convert_up(&v)?,
            })
        })
        .collect()
}

pub async fn key_set(state: &AppState, req: proto::QueryRequest) -> Result<Vec<proto::BytesValue>, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let filter = Filter::from_bytes(&req.filter)?;
    let entries = holder.cache().matching_entries(&filter);
    let entries = sort_if_requested(entries, &req.comparator);
    entries
        .into_iter()
        .map(|(k, _)| Ok(proto::BytesValue { value: holder.convert_up(&k)? }))
        .collect()
}

pub async fn values(state: &AppState, req: proto::QueryRequest) -> Result<Vec<proto::BytesValue>, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let filter = Filter::from_bytes(&req.filter)?;
    let entries = holder.cache().matching_entries(&filter);
    let entries = sort_if_requested(entries, &req.comparator);
    entries
        .into_iter()
        .map(|(_, v)| Ok(proto::BytesValue { value: holder.convert_up(&v)? }))
        .collect()
}

/// One page of a cursor-based iteration (C7). The cookie is opaque to the
/// client and self-describing — see [`Cookie`].
pub async fn next_page(state: &AppState, req: proto::PageRequest) -> Result<proto::PageResponse, ProxyError> {
    let holder = state.holder_for(&req.scope, &req.cache, req.format)?;
    let cache = holder.cache();
    let current_epoch = cache.epoch();

    let cookie = Cookie::decode_or_start(&req.cookie, current_epoch)?;
    let resume_key = if cookie.is_stale(current_epoch) { None } else { cookie.resume_key };

    let page = cache.page_after(resume_key.as_ref(), state.config.transfer_threshold);
    let next_cookie = match page.last() {
        Some((last_key, _)) => {
            let remainder = cache.page_after(Some(last_key), 1);
            if remainder.is_empty() {
                Bytes::new()
            } else {
                Cookie { resume_key: Some(last_key.clone()), epoch: current_epoch }.encode()
            }
        }
        None => Bytes::new(),
    };

    if req.entries {
        let entries = page
            .into_iter()
            .map(|(k, v)| {
                Ok(proto::Entry {
                    key: holder.convert_up(&k)?,
                    value: holder.convert_up(&v)?,
                })
            })
            .collect::<Result<Vec<_>, ProxyError>>()?;
        Ok(proto::PageResponse { entries, keys: Vec::new(), cookie: next_cookie })
    } else {
        let keys = page
            .into_iter()
            .map(|(k, _)| holder.convert_up(&k))
            .collect::<Result<Vec<_>, ProxyError>>()?;
        Ok(proto::PageResponse { entries: Vec::new(), keys, cookie: next_cookie })
    }
}
