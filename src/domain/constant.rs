//! Domain constants and structured log event names

/// Schema version stamped on every event
pub const EVENT_SCHEMA_VERSION: &str = "1.0";

/// Storage schema version written into the durable store on first open
pub const STORAGE_SCHEMA_VERSION: u32 = 1;

/// Suffix appended to a queue namespace to form its dead-letter namespace
pub const DEAD_LETTER_SUFFIX: &str = ".dead";

/// Queue namespaces, one per domain concern
pub mod namespace {
    pub const TASKS: &str = "meh-trics.tasks";
    pub const MOODS: &str = "meh-trics.moods";
    pub const JOURNAL: &str = "meh-trics.journal";
}

/// Event bus log events
pub mod event_bus {
    pub const HANDLER_SUBSCRIBED: &str = "handler.subscribed";
    pub const HANDLER_UNSUBSCRIBED: &str = "handler.unsubscribed";
    pub const EVENT_PUBLISHED: &str = "event.published";
    pub const HANDLER_FAILED: &str = "handler.failed";
    pub const HANDLER_PANICKED: &str = "handler.panicked";
    pub const SINK_DELIVERY_FAILED: &str = "sink.delivery_failed";
}

/// Offline queue log events
pub mod offline_queue {
    pub const STORAGE_UNAVAILABLE: &str = "storage.unavailable";
    pub const MUTATION_ENQUEUED: &str = "mutation.enqueued";
    pub const ENQUEUE_FAILED: &str = "mutation.enqueue_failed";
    pub const SYNC_STARTED: &str = "sync.started";
    pub const SYNC_SKIPPED: &str = "sync.skipped";
    pub const SYNC_COMPLETED: &str = "sync.completed";
    pub const SYNC_STALLED: &str = "sync.stalled";
    pub const SYNC_READ_FAILED: &str = "sync.read_failed";
    pub const MUTATION_REPLAYED: &str = "mutation.replayed";
    pub const REPLAY_UNCONFIRMED: &str = "mutation.replay_unconfirmed";
    pub const MUTATION_DEAD_LETTERED: &str = "mutation.dead_lettered";
    pub const ATTEMPT_RECORD_FAILED: &str = "mutation.attempt_record_failed";
    pub const PENDING_REFRESH_FAILED: &str = "pending.refresh_failed";
    pub const AUTO_SYNC_STARTED: &str = "auto_sync.started";
    pub const AUTO_SYNC_STOPPED: &str = "auto_sync.stopped";
}

/// Mutation wrapper log events
pub mod mutation {
    pub const DIRECT_CALL_SUCCEEDED: &str = "direct_call.succeeded";
    pub const DIRECT_CALL_FAILED: &str = "direct_call.failed";
    pub const QUEUED_OFFLINE: &str = "mutation.queued_offline";
    pub const QUEUED_BEHIND_BACKLOG: &str = "mutation.queued_behind_backlog";
    pub const DIRECT_CALL_UNCONFIRMED: &str = "direct_call.unconfirmed";
}

/// Network monitor log events
pub mod network {
    pub const STATUS_CHANGED: &str = "network.status_changed";
    pub const PROBE_FAILED: &str = "network.probe_failed";
}

/// CLI log events
pub mod cli {
    pub const BACKGROUND_TASK_FAILED: &str = "background_task.failed";
}
