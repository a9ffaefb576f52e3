//! Domain events published on the in-process bus
//!
//! An [`Event`] is an immutable fact. Its payload is a closed sum type so the
//! shape of the data is fixed by the type tag; handlers match on
//! [`EventPayload`] instead of probing loosely typed maps.

use std::fmt::{self, Display};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::constant::EVENT_SCHEMA_VERSION;

/// Type tag of an event, used as the subscription key on the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "task.created")]
    TaskCreated,
    #[serde(rename = "task.updated")]
    TaskUpdated,
    #[serde(rename = "task.completed")]
    TaskCompleted,
    #[serde(rename = "task.deleted")]
    TaskDeleted,
    #[serde(rename = "habit.created")]
    HabitCreated,
    #[serde(rename = "habit.completed")]
    HabitCompleted,
    #[serde(rename = "habit.streak_updated")]
    HabitStreakUpdated,
    #[serde(rename = "routine.completed")]
    RoutineCompleted,
    #[serde(rename = "mood.created")]
    MoodCreated,
    #[serde(rename = "journal.created")]
    JournalCreated,
    #[serde(rename = "journal.updated")]
    JournalUpdated,
    #[serde(rename = "calendar.event_created")]
    CalendarEventCreated
}

impl EventType {
    pub const ALL: [EventType; 12] = [
        EventType::TaskCreated,
        EventType::TaskUpdated,
        EventType::TaskCompleted,
        EventType::TaskDeleted,
        EventType::HabitCreated,
        EventType::HabitCompleted,
        EventType::HabitStreakUpdated,
        EventType::RoutineCompleted,
        EventType::MoodCreated,
        EventType::JournalCreated,
        EventType::JournalUpdated,
        EventType::CalendarEventCreated
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TaskCreated => "task.created",
            EventType::TaskUpdated => "task.updated",
            EventType::TaskCompleted => "task.completed",
            EventType::TaskDeleted => "task.deleted",
            EventType::HabitCreated => "habit.created",
            EventType::HabitCompleted => "habit.completed",
            EventType::HabitStreakUpdated => "habit.streak_updated",
            EventType::RoutineCompleted => "routine.completed",
            EventType::MoodCreated => "mood.created",
            EventType::JournalCreated => "journal.created",
            EventType::JournalUpdated => "journal.updated",
            EventType::CalendarEventCreated => "calendar.event_created"
        }
    }
}

impl Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreatedData {
    pub task_id: i64,
    pub user_id: Option<String>,
    pub title:   String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskUpdatedData {
    pub task_id: i64,
    pub user_id: Option<String>,
    pub changes: Vec<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCompletedData {
    pub task_id:      i64,
    pub user_id:      Option<String>,
    pub completed_at: DateTime<Utc>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDeletedData {
    pub task_id: i64,
    pub user_id: Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitCreatedData {
    pub habit_id: i64,
    pub user_id:  Option<String>,
    pub name:     String
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitCompletedData {
    pub habit_id: i64,
    pub user_id:  Option<String>,
    pub date:     NaiveDate,
    pub count:    u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HabitStreakUpdatedData {
    pub habit_id:       i64,
    pub user_id:        Option<String>,
    pub current_streak: u32,
    pub longest_streak: u32
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutineCompletedData {
    pub routine_id: i64,
    pub user_id:    Option<String>,
    pub date:       NaiveDate
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodCreatedData {
    pub entry_id: i64,
    pub user_id:  Option<String>,
    pub score:    u8,
    pub date:     NaiveDate
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalCreatedData {
    pub entry_id: i64,
    pub user_id:  Option<String>,
    pub date:     NaiveDate
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalUpdatedData {
    pub entry_id: i64,
    pub user_id:  Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalendarEventCreatedData {
    pub event_id:  i64,
    pub user_id:   Option<String>,
    pub title:     String,
    pub starts_at: DateTime<Utc>
}

/// Payload of an event; the variant is the type tag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum EventPayload {
    #[serde(rename = "task.created")]
    TaskCreated(TaskCreatedData),
    #[serde(rename = "task.updated")]
    TaskUpdated(TaskUpdatedData),
    #[serde(rename = "task.completed")]
    TaskCompleted(TaskCompletedData),
    #[serde(rename = "task.deleted")]
    TaskDeleted(TaskDeletedData),
    #[serde(rename = "habit.created")]
    HabitCreated(HabitCreatedData),
    #[serde(rename = "habit.completed")]
    HabitCompleted(HabitCompletedData),
    #[serde(rename = "habit.streak_updated")]
    HabitStreakUpdated(HabitStreakUpdatedData),
    #[serde(rename = "routine.completed")]
    RoutineCompleted(RoutineCompletedData),
    #[serde(rename = "mood.created")]
    MoodCreated(MoodCreatedData),
    #[serde(rename = "journal.created")]
    JournalCreated(JournalCreatedData),
    #[serde(rename = "journal.updated")]
    JournalUpdated(JournalUpdatedData),
    #[serde(rename = "calendar.event_created")]
    CalendarEventCreated(CalendarEventCreatedData)
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            EventPayload::TaskCreated(_) => EventType::TaskCreated,
            EventPayload::TaskUpdated(_) => EventType::TaskUpdated,
            EventPayload::TaskCompleted(_) => EventType::TaskCompleted,
            EventPayload::TaskDeleted(_) => EventType::TaskDeleted,
            EventPayload::HabitCreated(_) => EventType::HabitCreated,
            EventPayload::HabitCompleted(_) => EventType::HabitCompleted,
            EventPayload::HabitStreakUpdated(_) => EventType::HabitStreakUpdated,
            EventPayload::RoutineCompleted(_) => EventType::RoutineCompleted,
            EventPayload::MoodCreated(_) => EventType::MoodCreated,
            EventPayload::JournalCreated(_) => EventType::JournalCreated,
            EventPayload::JournalUpdated(_) => EventType::JournalUpdated,
            EventPayload::CalendarEventCreated(_) => EventType::CalendarEventCreated
        }
    }

    /// User the fact belongs to, when the payload carries one
    pub fn user_id(&self) -> Option<&str> {
        let user_id = match self {
            EventPayload::TaskCreated(d) => &d.user_id,
            EventPayload::TaskUpdated(d) => &d.user_id,
            EventPayload::TaskCompleted(d) => &d.user_id,
            EventPayload::TaskDeleted(d) => &d.user_id,
            EventPayload::HabitCreated(d) => &d.user_id,
            EventPayload::HabitCompleted(d) => &d.user_id,
            EventPayload::HabitStreakUpdated(d) => &d.user_id,
            EventPayload::RoutineCompleted(d) => &d.user_id,
            EventPayload::MoodCreated(d) => &d.user_id,
            EventPayload::JournalCreated(d) => &d.user_id,
            EventPayload::JournalUpdated(d) => &d.user_id,
            EventPayload::CalendarEventCreated(d) => &d.user_id
        };
        user_id.as_deref()
    }
}

/// A fact that occurred in the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Unique event identifier
    pub id:        String,
    /// Creation timestamp
    pub timestamp: DateTime<Utc>,
    /// Free-text origin label
    pub source:    String,
    /// Schema version, always [`EVENT_SCHEMA_VERSION`] for events created here
    pub version:   String,
    #[serde(flatten)]
    pub payload:   EventPayload
}

impl Event {
    /// Stamp a new event. Does not publish it.
    pub fn new(source: impl Into<String>, payload: EventPayload) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            source: source.into(),
            version: EVENT_SCHEMA_VERSION.to_string(),
            payload
        }
    }

    pub fn event_type(&self) -> EventType {
        self.payload.event_type()
    }

    /// Key used by distributed consumers to keep per-user ordering
    pub fn ordering_key(&self) -> &str {
        self.payload.user_id().unwrap_or(&self.source)
    }
}
