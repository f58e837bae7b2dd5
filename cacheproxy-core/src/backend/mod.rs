//! Backend contract (spec §6) plus the reference in-memory implementation
//! the proxy dispatches against. Per spec.md §1 the real partitioned cache
//! implementation is an external collaborator ("assumed to provide the
//! interfaces listed in §6"); `memory` supplies a concrete stand-in so the
//! rest of the crate has something to drive and test against.

mod filter;
mod memory;
mod processor;

pub use filter::Filter;
pub use memory::{CacheEvent, ListenerId, ListenerSpec, MemberId, PartitionedCache, RegistrationKey};
pub use processor::{Aggregator, EntryProcessor, EntryResult, UserProcessor};
