//! Remote entities, request shapes and the queued mutation sum types
//!
//! Each domain concern has its own mutation enum. The serialized form is
//! `{"type": "create", "data": {...}}` which is what ends up in durable storage.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High
}

/// Body of a "create task" call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskRequest {
    pub title:       String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority:    Option<TaskPriority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date:    Option<NaiveDate>,
    #[serde(default)]
    pub tags:        Vec<String>
}

impl CreateTaskRequest {
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: title.into(), description: None, priority: None, due_date: None, tags: Vec::new() }
    }
}

/// Task as returned by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id:          i64,
    pub title:       String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority:    Option<TaskPriority>,
    #[serde(default)]
    pub due_date:    Option<NaiveDate>,
    #[serde(default)]
    pub tags:        Vec<String>,
    #[serde(default)]
    pub completed:   bool,
    pub created_at:  DateTime<Utc>
}

/// Body of a "create mood entry" call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateMoodEntryRequest {
    /// 1 (awful) to 5 (great)
    pub score: u8,
    pub date:  NaiveDate,
    #[serde(default)]
    pub tags:  Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note:  Option<String>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub id:         i64,
    pub score:      u8,
    pub date:       NaiveDate,
    #[serde(default)]
    pub tags:       Vec<String>,
    #[serde(default)]
    pub note:       Option<String>,
    pub created_at: DateTime<Utc>
}

/// Body of a "create journal entry" call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateJournalEntryRequest {
    pub date:    NaiveDate,
    pub content: String,
    #[serde(default)]
    pub tags:    Vec<String>
}

/// Partial update of an existing journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateJournalEntryRequest {
    pub id:      i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags:    Option<Vec<String>>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id:         i64,
    pub date:       NaiveDate,
    pub content:    String,
    #[serde(default)]
    pub tags:       Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum TaskMutation {
    Create(CreateTaskRequest)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum MoodMutation {
    Create(CreateMoodEntryRequest)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "lowercase")]
pub enum JournalMutation {
    Create(CreateJournalEntryRequest),
    Update(UpdateJournalEntryRequest)
}

/// Short human readable summary used in listings
pub trait Describe {
    fn kind(&self) -> &'static str;
    fn summary(&self) -> String;
}

impl Describe for TaskMutation {
    fn kind(&self) -> &'static str {
        match self {
            TaskMutation::Create(_) => "create"
        }
    }

    fn summary(&self) -> String {
        match self {
            TaskMutation::Create(req) => req.title.clone()
        }
    }
}

impl Describe for MoodMutation {
    fn kind(&self) -> &'static str {
        match self {
            MoodMutation::Create(_) => "create"
        }
    }

    fn summary(&self) -> String {
        match self {
            MoodMutation::Create(req) => format!("{} on {}", req.score, req.date)
        }
    }
}

impl Describe for JournalMutation {
    fn kind(&self) -> &'static str {
        match self {
            JournalMutation::Create(_) => "create",
            JournalMutation::Update(_) => "update"
        }
    }

    fn summary(&self) -> String {
        match self {
            JournalMutation::Create(req) => format!("{}: {}", req.date, preview(&req.content)),
            JournalMutation::Update(req) => {
                format!("#{}: {}", req.id, req.content.as_deref().map(preview).unwrap_or_default())
            }
        }
    }
}

fn preview(content: &str) -> String {
    const MAX_CHARS: usize = 40;
    if content.chars().count() <= MAX_CHARS {
        return content.to_string();
    }
    let cut: String = content.chars().take(MAX_CHARS).collect();
    format!("{}…", cut)
}
