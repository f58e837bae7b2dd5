//! Operation dispatcher (C6): one handler per RPC, each shaped per spec
//! §4.6's five-step recipe (validate → build holder → translate through the
//! codec registry → invoke the backend → convert the result). Split into
//! one module per operation family, the way the teacher splits `r2e-grpc`
//! into `guard.rs`/`identity.rs`/`multiplex.rs`, each owning one concern.

pub mod aggregate;
pub mod get_put;
pub mod index;
pub mod lifecycle;
pub mod query;
