//! Built-in event handlers and the broadcast distribution sink

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex}
};

use async_trait::async_trait;
use tokio::sync::broadcast;
use tracing::{Level, event};

use crate::{
    domain::{
        error::MehError,
        event::{Event, EventType}
    },
    port::event::{EventHandler, EventSink}
};

/// Event handler that logs every event it receives
pub struct LoggingEventHandler;

impl LoggingEventHandler {
    pub fn new() -> Self {
        Self
    }
}

impl Default for LoggingEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventHandler for LoggingEventHandler {
    async fn handle(&self, event: &Event) -> Result<(), MehError> {
        event!(Level::INFO, event = %event.event_type(), id = %event.id, source = %event.source,
               at = %event.timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
        Ok(())
    }

    fn name(&self) -> &str {
        "logging"
    }
}

/// Event handler that counts events per type
#[derive(Default)]
pub struct StatisticsEventHandler {
    counts: Mutex<HashMap<EventType, u64>>
}

impl StatisticsEventHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, event_type: EventType) -> u64 {
        self.counts.lock().map(|counts| counts.get(&event_type).copied().unwrap_or(0)).unwrap_or(0)
    }

    /// Counts sorted by event type name
    pub fn snapshot(&self) -> Vec<(EventType, u64)> {
        let mut counts: Vec<(EventType, u64)> = match self.counts.lock() {
            Ok(counts) => counts.iter().map(|(t, n)| (*t, *n)).collect(),
            Err(_) => Vec::new()
        };
        counts.sort_by_key(|(t, _)| t.as_str());
        counts
    }
}

#[async_trait]
impl EventHandler for StatisticsEventHandler {
    async fn handle(&self, event: &Event) -> Result<(), MehError> {
        let mut counts = self.counts.lock().map_err(|_| MehError::Event("statistics lock poisoned".to_string()))?;
        *counts.entry(event.event_type()).or_insert(0) += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "statistics"
    }
}

/// Adapts an async closure into an [`EventHandler`]
pub struct FnHandler<F> {
    name: String,
    f:    F
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), MehError>> + Send
{
    async fn handle(&self, event: &Event) -> Result<(), MehError> {
        (self.f)(event.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a shareable handler from an async closure
///
/// The returned `Arc` is also the identity used by
/// [`EventBus::unsubscribe`](crate::service::event_bus::EventBus::unsubscribe).
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn EventHandler>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), MehError>> + Send + 'static
{
    Arc::new(FnHandler { name: name.into(), f })
}

const TOPIC_CAPACITY: usize = 1024;

/// In-process stand-in for a pub/sub topic
///
/// Every delivered event is broadcast together with its ordering key, so
/// downstream consumers can partition by user.
pub struct BroadcastTopic {
    tx: broadcast::Sender<(String, Event)>
}

impl BroadcastTopic {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(TOPIC_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<(String, Event)> {
        self.tx.subscribe()
    }
}

impl Default for BroadcastTopic {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSink for BroadcastTopic {
    async fn deliver(&self, ordering_key: &str, event: &Event) -> Result<(), MehError> {
        // Nobody listening is not a delivery failure
        let _ = self.tx.send((ordering_key.to_string(), event.clone()));
        Ok(())
    }
}
