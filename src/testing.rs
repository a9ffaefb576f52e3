//! Test doubles shared by the service tests

use std::sync::{
    Mutex,
    atomic::{AtomicBool, AtomicI64, Ordering}
};

use async_trait::async_trait;
use chrono::Utc;

use crate::{
    domain::{
        error::MehError,
        mutation::{
            CreateJournalEntryRequest, CreateMoodEntryRequest, CreateTaskRequest, JournalEntry, MoodEntry, Task,
            UpdateJournalEntryRequest
        }
    },
    port::remote::RemoteApi
};

/// One request the fake backend received
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    CreateTask(CreateTaskRequest),
    CreateMood(CreateMoodEntryRequest),
    CreateJournal(CreateJournalEntryRequest),
    UpdateJournal(UpdateJournalEntryRequest)
}

/// In-memory backend that records calls and can be switched to fail
#[derive(Default)]
pub struct FakeRemoteApi {
    calls:   Mutex<Vec<RemoteCall>>,
    failing: AtomicBool,
    next_id: AtomicI64
}

impl FakeRemoteApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, call: RemoteCall) -> Result<i64, MehError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.load(Ordering::SeqCst) {
            return Err(MehError::Network("connection reset".to_string()));
        }
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl RemoteApi for FakeRemoteApi {
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, MehError> {
        let id = self.record(RemoteCall::CreateTask(request.clone()))?;
        Ok(Task {
            id,
            title: request.title.clone(),
            description: request.description.clone(),
            priority: request.priority,
            due_date: request.due_date,
            tags: request.tags.clone(),
            completed: false,
            created_at: Utc::now()
        })
    }

    async fn create_mood_entry(&self, request: &CreateMoodEntryRequest) -> Result<MoodEntry, MehError> {
        let id = self.record(RemoteCall::CreateMood(request.clone()))?;
        Ok(MoodEntry {
            id,
            score: request.score,
            date: request.date,
            tags: request.tags.clone(),
            note: request.note.clone(),
            created_at: Utc::now()
        })
    }

    async fn create_journal_entry(&self, request: &CreateJournalEntryRequest) -> Result<JournalEntry, MehError> {
        let id = self.record(RemoteCall::CreateJournal(request.clone()))?;
        Ok(JournalEntry {
            id,
            date: request.date,
            content: request.content.clone(),
            tags: request.tags.clone(),
            created_at: Utc::now(),
            updated_at: None
        })
    }

    async fn update_journal_entry(&self, request: &UpdateJournalEntryRequest) -> Result<JournalEntry, MehError> {
        self.record(RemoteCall::UpdateJournal(request.clone()))?;
        Ok(JournalEntry {
            id:         request.id,
            date:       Utc::now().date_naive(),
            content:    request.content.clone().unwrap_or_default(),
            tags:       request.tags.clone().unwrap_or_default(),
            created_at: Utc::now(),
            updated_at: Some(Utc::now())
        })
    }
}
