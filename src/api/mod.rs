//! API Module
//!
//! The uniform surface external collaborators call into: build a key, then
//! read, write, invalidate or inspect it on a chosen backend.
//!
//! # Operations
//! - `build_key` - Namespaced key from a resource id or override
//! - `read` / `write` - Backend-dispatched get and set
//! - `invalidate` / `invalidate_all` - Remove one key or the whole namespace
//! - `inspect` / `stats` - Read-only introspection
//! - `configure_capacity` - Volatile store policy update
//! - `purge_expired` - Eager expiry sweep on any backend

mod backend;
mod cache;

pub use backend::{Backend, UnknownBackend};
pub use cache::{ResponseCache, ResponseCacheBuilder};
