//! # meh-trics sync core
//!
//! Client-side plumbing of the meh-trics tracker:
//! - an in-process event bus that fans typed domain events out to handlers
//! - durable offline queues that buffer task, mood and journal mutations
//!   while the backend is unreachable and replay them in order afterwards
//! - the `meh` CLI built on top of both

pub mod adapter;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod port;
pub mod service;
pub mod ui;

#[cfg(test)]
mod testing;

pub use app::{App, QueueKind};
pub use config::Settings;
pub use domain::{
    error::MehError,
    event::{Event, EventPayload, EventType}
};
pub use service::{
    event_bus::{EventBus, Publication, PublishReport},
    offline_queue::{OfflineQueue, QueueStatus, SyncOutcome, SyncPolicy}
};
