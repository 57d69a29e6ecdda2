//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the cache is live.
//!
//! # Tasks
//! - Connectivity poll: re-probes the network at a fixed interval

mod poll;

pub use poll::spawn_poll_task;
