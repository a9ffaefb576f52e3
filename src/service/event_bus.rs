//! In-process event bus
//!
//! The bus maps each [`EventType`] to an ordered list of handlers. Publishing
//! hands the event to a background task that spawns one task per handler in
//! registration order, so handlers run concurrently, a failing (or panicking)
//! handler cannot affect its siblings, and the publisher is never held up.
//! After the handlers, the event is handed to the optional secondary
//! [`EventSink`].
//!
//! Subscribing the same handler twice makes it run twice per publish; there
//! is no deduplication.

use std::{
    collections::HashMap,
    sync::{Arc, RwLock}
};

use tokio::{sync::Semaphore, task::JoinHandle};
use tracing::{Level, event};

use crate::{
    domain::{
        constant::event_bus,
        event::{Event, EventPayload, EventType}
    },
    port::event::{EventHandler, EventSink}
};

/// Outcome of one publish call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Handlers dispatched for the event's type
    pub invoked: usize,
    /// Handlers that returned an error or panicked
    pub failed:  usize
}

type HandlerList = Vec<Arc<dyn EventHandler>>;

/// Event bus that fans events out to subscribed handlers
#[derive(Default)]
pub struct EventBus {
    handlers: RwLock<HashMap<EventType, HandlerList>>,
    sink:     Option<Arc<dyn EventSink>>,
    limiter:  Option<Arc<Semaphore>>
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forward every published event to a secondary distribution channel
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Bound how many handlers of one publish may run at the same time
    pub fn with_max_concurrent_handlers(mut self, max: usize) -> Self {
        self.limiter = Some(Arc::new(Semaphore::new(max.max(1))));
        self
    }

    /// Build a stamped event; does not publish it
    pub fn create_event(&self, source: impl Into<String>, payload: EventPayload) -> Event {
        Event::new(source, payload)
    }

    /// Register a handler for one event type
    pub fn subscribe(&self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        event!(Level::DEBUG, event = event_bus::HANDLER_SUBSCRIBED,
               event_type = %event_type, handler = handler.name());

        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.entry(event_type).or_default().push(handler);
    }

    /// Remove the first registration of `handler` for `event_type`
    ///
    /// Returns whether a registration was removed. Identity is the `Arc`
    /// allocation, not structural equality.
    pub fn unsubscribe(&self, event_type: EventType, handler: &Arc<dyn EventHandler>) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());

        let Some(list) = handlers.get_mut(&event_type) else {
            return false;
        };
        let Some(position) = list.iter().position(|h| std::ptr::addr_eq(Arc::as_ptr(h), Arc::as_ptr(handler)))
        else {
            return false;
        };

        list.remove(position);
        if list.is_empty() {
            handlers.remove(&event_type);
        }

        event!(Level::DEBUG, event = event_bus::HANDLER_UNSUBSCRIBED,
               event_type = %event_type, handler = handler.name());
        true
    }

    pub fn handler_count(&self, event_type: EventType) -> usize {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(&event_type).map(Vec::len).unwrap_or(0)
    }

    fn handlers_for(&self, event_type: EventType) -> HandlerList {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        handlers.get(&event_type).cloned().unwrap_or_default()
    }

    /// Deliver an event to every handler registered for its type
    ///
    /// Returns as soon as the handlers are dispatched; the caller never waits
    /// on them. Await [`Publication::finished`] to observe the outcome.
    pub fn publish(&self, event: Event) -> Publication {
        let handlers = self.handlers_for(event.event_type());
        let task = tokio::spawn(dispatch(event, handlers, self.sink.clone(), self.limiter.clone()));
        Publication { task }
    }
}

/// Handle to one publish; dropping it leaves the handlers running
pub struct Publication {
    task: JoinHandle<PublishReport>
}

impl Publication {
    /// Wait for every handler and the sink. Never fails.
    pub async fn finished(self) -> PublishReport {
        self.task.await.unwrap_or_default()
    }
}

async fn dispatch(
    event: Event,
    handlers: HandlerList,
    sink: Option<Arc<dyn EventSink>>,
    limiter: Option<Arc<Semaphore>>
) -> PublishReport {
    let event_type = event.event_type();
    let event = Arc::new(event);

    let mut tasks = Vec::with_capacity(handlers.len());
    for handler in handlers {
        let name = handler.name().to_string();
        let event = event.clone();
        let limiter = limiter.clone();

        let task = tokio::spawn(async move {
            let _permit = match limiter {
                Some(limiter) => limiter.acquire_owned().await.ok(),
                None => None
            };
            handler.handle(&event).await
        });
        tasks.push((name, task));
    }

    let mut report = PublishReport { invoked: tasks.len(), failed: 0 };

    for (name, task) in tasks {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                report.failed += 1;
                event!(Level::WARN, event = event_bus::HANDLER_FAILED,
                       event_type = %event_type, event_id = %event.id, handler = %name, error = %e);
            }
            Err(e) => {
                report.failed += 1;
                event!(Level::ERROR, event = event_bus::HANDLER_PANICKED,
                       event_type = %event_type, event_id = %event.id, handler = %name, error = %e);
            }
        }
    }

    if let Some(sink) = &sink
        && let Err(e) = sink.deliver(event.ordering_key(), &event).await
    {
        event!(Level::WARN, event = event_bus::SINK_DELIVERY_FAILED, event_id = %event.id, error = %e);
    }

    event!(Level::DEBUG, event = event_bus::EVENT_PUBLISHED, event_type = %event_type, event_id = %event.id,
           invoked = report.invoked, failed = report.failed);

    report
}

/// Publishes events on behalf of one named source
#[derive(Clone)]
pub struct EventEmitter {
    bus:    Arc<EventBus>,
    source: String
}

impl EventEmitter {
    pub fn new(bus: Arc<EventBus>, source: impl Into<String>) -> Self {
        Self { bus, source: source.into() }
    }

    pub fn emit(&self, payload: EventPayload) -> Publication {
        let event = self.bus.create_event(self.source.clone(), payload);
        self.bus.publish(event)
    }
}
