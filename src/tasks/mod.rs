//! Background Tasks Module
//!
//! Optional background work for long-lived caches.
//!
//! # Tasks
//! - Prune: removes expired entries at a configured interval

mod prune;

pub use prune::{spawn_prune_task, Prune};
