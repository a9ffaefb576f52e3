pub mod event_bus;
pub mod journal;
pub mod mood;
pub mod offline_queue;
pub mod task;
