//! Reference in-memory implementation of the partitioned cache backend
//! (spec §6's "backend contract"). The real production backend is an
//! external collaborator per spec.md §1; this stands in for it so the rest
//! of the crate — and its tests — have something concrete to drive.
//!
//! Storage is a `DashMap`, grounded on `r2e_cache::InMemoryStore`'s
//! `DashMap`-backed singleton pattern, generalized with partition-owner
//! simulation and a listener table for the event multiplexer (C8) to
//! register against.

use bytes::Bytes;
use dashmap::DashMap;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

use super::filter::Filter;
use super::processor::{EntryProcessor, EntryResult};
use crate::error::ProxyError;

pub type MemberId = u32;
pub type ListenerId = u64;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RegistrationKey {
    Filter(u64),
    Key(Bytes),
}

#[derive(Debug, Clone)]
pub enum CacheEvent {
    Inserted { key: Bytes, new_value: Bytes },
    Updated { key: Bytes, old_value: Bytes, new_value: Bytes },
    Deleted { key: Bytes, old_value: Bytes },
    /// Cache-wide, sent to every listener regardless of its filter/key.
    Truncated,
    /// Cache-wide, sent to every listener regardless of its filter/key; the
    /// listener table is cleared immediately afterward.
    Destroyed,
}

pub struct ListenerSpec {
    pub registration: RegistrationKey,
    pub filter: Filter,
    pub lite: bool,
}

struct ListenerEntry {
    filter: Filter,
    registration: RegistrationKey,
    #[allow(dead_code)]
    lite: bool,
    sender: mpsc::Sender<CacheEvent>,
}

/// Snapshot-and-page state for the paged cursor engine (C7): the cookie is
/// `(resume_key, epoch)`. No server-side table is kept — the engine takes a
/// fresh sorted snapshot on every page and filters for keys past the resume
/// point, which is why iteration is documented as best-effort-consistent
/// (spec §4.7/§9) rather than a strict point-in-time snapshot.
pub struct PartitionedCache {
    storage: DashMap<Bytes, Bytes>,
    num_partitions: u32,
    num_members: u32,
    destroyed: AtomicBool,
    epoch: AtomicU64,
    listeners: DashMap<ListenerId, ListenerEntry>,
    next_listener_id: AtomicU64,
}

impl PartitionedCache {
    pub fn new(num_members: u32) -> Self {
        Self {
            storage: DashMap::new(),
            num_partitions: 257,
            num_members,
            destroyed: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            listeners: DashMap::new(),
            next_listener_id: AtomicU64::new(1),
        }
    }

    fn check_alive(&self) -> Result<(), ProxyError> {
        if self.destroyed.load(Ordering::Acquire) {
            Err(ProxyError::failed_precondition("cache has been destroyed"))
        } else {
            Ok(())
        }
    }

    pub fn partition_of(&self, key: &Bytes) -> u32 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.num_partitions as u64) as u32
    }

    /// `None` models an orphan partition (no owner assigned yet).
    pub fn owner_of(&self, key: &Bytes) -> Option<MemberId> {
        if self.num_members == 0 {
            return None;
        }
        Some(self.partition_of(key) % self.num_members)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    // --- point operations (entry processors, spec §4.6/§9) -----------------

    pub async fn invoke_entry(
        &self,
        key: Bytes,
        op: EntryProcessor,
    ) -> Result<EntryResult, ProxyError> {
        self.check_alive()?;
        let result = match op {
            EntryProcessor::Get => EntryResult::Value(self.storage.get(&key).map(|e| e.clone())),
            EntryProcessor::Put { value, ttl: _ } => {
                let prior = self.storage.insert(key.clone(), value.clone());
                self.notify_put(&key, prior.clone(), value);
                EntryResult::Value(prior)
            }
            EntryProcessor::PutIfAbsent { value, ttl: _ } => {
                if let Some(existing) = self.storage.get(&key) {
                    EntryResult::Value(Some(existing.clone()))
                } else {
                    self.storage.insert(key.clone(), value.clone());
                    self.notify_insert(&key, value);
                    EntryResult::Value(None)
                }
            }
            EntryProcessor::Replace { value } => {
                if self.storage.contains_key(&key) {
                    let prior = self.storage.insert(key.clone(), value.clone());
                    self.notify_put(&key, prior.clone(), value);
                    EntryResult::Value(prior)
                } else {
                    EntryResult::Value(None)
                }
            }
            EntryProcessor::ReplaceMapping { expect, new } => {
                let replaced = match self.storage.get(&key) {
                    Some(existing) if *existing == expect => true,
                    _ => false,
                };
                if replaced {
                    let prior = self.storage.insert(key.clone(), new.clone());
                    self.notify_put(&key, prior, new);
                }
                EntryResult::Flag(replaced)
            }
            EntryProcessor::Remove => {
                let prior = self.storage.remove(&key).map(|(_, v)| v);
                if let Some(ref v) = prior {
                    self.notify_delete(&key, v.clone());
                }
                EntryResult::Value(prior)
            }
            EntryProcessor::RemoveMapping { expect } => {
                let matched = match self.storage.get(&key) {
                    Some(existing) if *existing == expect => true,
                    _ => false,
                };
                if matched {
                    if let Some((_, v)) = self.storage.remove(&key) {
                        self.notify_delete(&key, v);
                    }
                }
                EntryResult::Flag(matched)
            }
            EntryProcessor::ContainsValue { expect } => {
                let matched = self.storage.get(&key).map(|v| *v == expect).unwrap_or(false);
                EntryResult::Flag(matched)
            }
        };
        Ok(result)
    }

    // --- bulk partition-aware write (spec §4.6 putAll) ----------------------

    /// Splits `entries` by owning member and applies each shard. Returns the
    /// number of distinct shards written (testable property 2).
    pub async fn put_all_partitioned(
        &self,
        entries: Vec<(Bytes, Bytes)>,
    ) -> Result<u32, ProxyError> {
        self.check_alive()?;
        use std::collections::HashMap;
        let mut shards: HashMap<Option<MemberId>, Vec<(Bytes, Bytes)>> = HashMap::new();
        for (k, v) in entries {
            let owner = self.owner_of(&k);
            shards.entry(owner).or_default().push((k, v));
        }
        let shard_count = shards.len() as u32;
        for (_, shard) in shards {
            for (k, v) in shard {
                let prior = self.storage.insert(k.clone(), v.clone());
                self.notify_put(&k, prior, v);
            }
        }
        Ok(shard_count)
    }

    // --- queries (spec §4.6 entrySet/keySet/values) -------------------------

    pub fn matching_entries(&self, filter: &Filter) -> Vec<(Bytes, Bytes)> {
        self.storage
            .iter()
            .filter(|e| filter.matches(e.value()))
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn sorted_matching_entries(&self, filter: &Filter) -> Vec<(Bytes, Bytes)> {
        let mut entries = self.matching_entries(filter);
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    // --- paged cursor engine (C7) --------------------------------------------

    /// One page of the ordered key snapshot, resuming strictly after
    /// `resume_key`. See the struct-level doc comment for the snapshot
    /// semantics this implements.
    pub fn page_after(&self, resume_key: Option<&Bytes>, limit_bytes: usize) -> Vec<(Bytes, Bytes)> {
        let mut snapshot: Vec<(Bytes, Bytes)> = self
            .storage
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        snapshot.sort_by(|a, b| a.0.cmp(&b.0));

        let start = match resume_key {
            Some(k) => snapshot.partition_point(|(key, _)| key <= k),
            None => 0,
        };

        let mut page = Vec::new();
        let mut total = 0usize;
        for (k, v) in snapshot.into_iter().skip(start) {
            if total >= limit_bytes && !page.is_empty() {
                break;
            }
            total += k.len() + v.len();
            page.push((k, v));
            if total >= limit_bytes {
                break;
            }
        }
        page
    }

    // --- indexes (bookkeeping only; spec §4.6 addIndex/removeIndex) --------

    pub fn add_index(&self) -> Result<(), ProxyError> {
        self.check_alive()
    }

    pub fn remove_index(&self) -> Result<(), ProxyError> {
        self.check_alive()
    }

    // --- status predicates ---------------------------------------------------

    pub fn size(&self) -> Result<i64, ProxyError> {
        self.check_alive()?;
        Ok(self.storage.len() as i64)
    }

    pub fn is_empty(&self) -> Result<bool, ProxyError> {
        self.check_alive()?;
        Ok(self.storage.is_empty())
    }

    pub fn is_ready(&self) -> Result<bool, ProxyError> {
        self.check_alive()?;
        Ok(true)
    }

    pub fn clear(&self) -> Result<(), ProxyError> {
        self.check_alive()?;
        self.storage.clear();
        Ok(())
    }

    /// Bumps the epoch so any in-flight cursor cookies from before the
    /// truncation are treated as stale, and fires `Truncated` to listeners.
    pub fn truncate(&self) -> Result<(), ProxyError> {
        self.check_alive()?;
        self.storage.clear();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        self.broadcast(CacheEvent::Truncated);
        Ok(())
    }

    pub fn destroy(&self) -> Result<(), ProxyError> {
        self.check_alive()?;
        self.destroyed.store(true, Ordering::Release);
        self.broadcast(CacheEvent::Destroyed);
        self.listeners.clear();
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    // --- listener registration (spec §4.8 backend half) ----------------------

    pub fn add_listener(&self, spec: ListenerSpec, buffer: usize) -> (ListenerId, mpsc::Receiver<CacheEvent>) {
        let id = self.next_listener_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(buffer.max(1));
        self.listeners.insert(
            id,
            ListenerEntry {
                filter: spec.filter,
                registration: spec.registration,
                lite: spec.lite,
                sender: tx,
            },
        );
        (id, rx)
    }

    pub fn remove_listener(&self, id: ListenerId) {
        self.listeners.remove(&id);
    }

    fn notify_insert(&self, key: &Bytes, new_value: Bytes) {
        self.dispatch(key, &new_value, CacheEvent::Inserted {
            key: key.clone(),
            new_value,
        });
    }

    fn notify_delete(&self, key: &Bytes, old_value: Bytes) {
        self.dispatch(key, &old_value, CacheEvent::Deleted {
            key: key.clone(),
            old_value,
        });
    }

    fn notify_put(&self, key: &Bytes, prior: Option<Bytes>, new_value: Bytes) {
        let event = match prior {
            Some(old_value) => CacheEvent::Updated {
                key: key.clone(),
                old_value,
                new_value: new_value.clone(),
            },
            None => CacheEvent::Inserted {
                key: key.clone(),
                new_value: new_value.clone(),
            },
        };
        self.dispatch(key, &new_value, event);
    }

    fn broadcast(&self, event: CacheEvent) {
        for entry in self.listeners.iter() {
            let _ = entry.sender.try_send(event.clone());
        }
    }

    fn dispatch(&self, key: &Bytes, compare_value: &Bytes, event: CacheEvent) {
        for entry in self.listeners.iter() {
            let matches = match &entry.registration {
                RegistrationKey::Key(k) => k == key,
                RegistrationKey::Filter(_) => entry.filter.matches(compare_value),
            };
            if matches {
                // Bounded, per-listener channel: a full channel means the
                // subscriber's stream is backpressured. The event multiplexer
                // (C8, in cacheproxy-server) is what turns that into
                // RESOURCE_EXHAUSTED — the backend only ever tries, never
                // blocks a mutating call on a slow subscriber.
                let _ = entry.sender.try_send(event.clone());
            }
        }
    }
}

impl Default for PartitionedCache {
    fn default() -> Self {
        Self::new(1)
    }
}

pub type SharedPartitionedCache = Arc<PartitionedCache>;

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let cache = PartitionedCache::new(1);
        cache
            .invoke_entry(b("k"), EntryProcessor::Put { value: b("v"), ttl: None })
            .await
            .unwrap();
        let result = cache.invoke_entry(b("k"), EntryProcessor::Get).await.unwrap();
        assert_eq!(result, EntryResult::Value(Some(b("v"))));
    }

    #[tokio::test]
    async fn put_if_absent_does_not_overwrite() {
        let cache = PartitionedCache::new(1);
        cache
            .invoke_entry(b("k"), EntryProcessor::Put { value: b("v1"), ttl: None })
            .await
            .unwrap();
        let result = cache
            .invoke_entry(b("k"), EntryProcessor::PutIfAbsent { value: b("v2"), ttl: None })
            .await
            .unwrap();
        assert_eq!(result, EntryResult::Value(Some(b("v1"))));
        let current = cache.invoke_entry(b("k"), EntryProcessor::Get).await.unwrap();
        assert_eq!(current, EntryResult::Value(Some(b("v1"))));
    }

    #[tokio::test]
    async fn replace_mapping_requires_exact_prior_value() {
        let cache = PartitionedCache::new(1);
        cache
            .invoke_entry(b("k"), EntryProcessor::Put { value: b("v1"), ttl: None })
            .await
            .unwrap();
        let wrong = cache
            .invoke_entry(b("k"), EntryProcessor::ReplaceMapping { expect: b("nope"), new: b("v2") })
            .await
            .unwrap();
        assert_eq!(wrong, EntryResult::Flag(false));
        let right = cache
            .invoke_entry(b("k"), EntryProcessor::ReplaceMapping { expect: b("v1"), new: b("v2") })
            .await
            .unwrap();
        assert_eq!(right, EntryResult::Flag(true));
    }

    #[tokio::test]
    async fn operations_on_destroyed_cache_fail_precondition() {
        let cache = PartitionedCache::new(1);
        cache.destroy().unwrap();
        let err = cache
            .invoke_entry(b("k"), EntryProcessor::Get)
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn put_all_partitions_by_owner() {
        let cache = PartitionedCache::new(3);
        let entries: Vec<_> = (0..6).map(|i| (b(&format!("key{i}")), b("v"))).collect();
        let distinct_owners: std::collections::HashSet<_> =
            entries.iter().map(|(k, _)| cache.owner_of(k)).collect();
        let shards = cache.put_all_partitioned(entries).await.unwrap();
        assert_eq!(shards as usize, distinct_owners.len());
    }

    #[test]
    fn paged_iteration_covers_snapshot_without_duplicates() {
        let cache = PartitionedCache::new(1);
        for i in 0..50 {
            cache.storage.insert(b(&format!("k{i:03}")), b("x"));
        }
        let mut seen = std::collections::HashSet::new();
        let mut resume: Option<Bytes> = None;
        loop {
            let page = cache.page_after(resume.as_ref(), 64);
            if page.is_empty() {
                break;
            }
            for (k, _) in &page {
                assert!(seen.insert(k.clone()), "duplicate key across pages: {k:?}");
            }
            resume = Some(page.last().unwrap().0.clone());
        }
        assert_eq!(seen.len(), 50);
    }

    #[tokio::test]
    async fn truncate_clears_storage_and_bumps_epoch() {
        let cache = PartitionedCache::new(1);
        cache
            .invoke_entry(b("k"), EntryProcessor::Put { value: b("v"), ttl: None })
            .await
            .unwrap();
        let epoch_before = cache.epoch();
        cache.truncate().unwrap();
        assert_eq!(cache.size().unwrap(), 0);
        assert_eq!(cache.epoch(), epoch_before + 1);
    }

    #[tokio::test]
    async fn listener_receives_insert_and_delete_in_order() {
        let cache = PartitionedCache::new(1);
        let (_id, mut rx) = cache.add_listener(
            ListenerSpec {
                registration: RegistrationKey::Key(b("k")),
                filter: Filter::All,
                lite: false,
            },
            16,
        );
        cache
            .invoke_entry(b("k"), EntryProcessor::Put { value: b("v"), ttl: None })
            .await
            .unwrap();
        cache.invoke_entry(b("k"), EntryProcessor::Remove).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, CacheEvent::Inserted { .. }));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second, CacheEvent::Deleted { .. }));
    }

    #[tokio::test]
    async fn destroy_broadcasts_to_every_listener_regardless_of_filter() {
        let cache = PartitionedCache::new(1);
        let (_id, mut rx) = cache.add_listener(
            ListenerSpec {
                registration: RegistrationKey::Key(b("other-key")),
                filter: Filter::All,
                lite: false,
            },
            16,
        );
        cache.destroy().unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, CacheEvent::Destroyed));
    }

    #[tokio::test]
    async fn truncate_broadcasts_exactly_once_per_listener() {
        let cache = PartitionedCache::new(1);
        let (_id, mut rx) = cache.add_listener(
            ListenerSpec { registration: RegistrationKey::Filter(0), filter: Filter::All, lite: false },
            16,
        );
        cache.truncate().unwrap();
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, CacheEvent::Truncated));
        assert!(rx.try_recv().is_err());
    }
}
