//! Event handling ports

use async_trait::async_trait;

use crate::domain::{error::MehError, event::Event};

/// A reaction to events of the type it was subscribed for
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle one event. Errors are logged by the bus and go nowhere else.
    async fn handle(&self, event: &Event) -> Result<(), MehError>;

    /// Name used in logs
    fn name(&self) -> &str {
        "anonymous"
    }
}

/// Secondary distribution channel for published events (e.g. a topic)
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Deliver an event; `ordering_key` groups events that must stay ordered
    async fn deliver(&self, ordering_key: &str, event: &Event) -> Result<(), MehError>;
}
