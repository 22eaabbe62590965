//! Background Tasks Module
//!
//! Contains background tasks that run periodically while a cache is alive.
//!
//! # Tasks
//! - TTL Cleanup: Removes expired volatile entries at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
