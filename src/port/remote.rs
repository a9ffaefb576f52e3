use async_trait::async_trait;

use crate::domain::{
    error::MehError,
    mutation::{
        CreateJournalEntryRequest, CreateMoodEntryRequest, CreateTaskRequest, JournalEntry, MoodEntry, Task,
        UpdateJournalEntryRequest
    }
};

/// Port for the remote API; one operation per mutation kind
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, MehError>;

    async fn create_mood_entry(&self, request: &CreateMoodEntryRequest) -> Result<MoodEntry, MehError>;

    async fn create_journal_entry(&self, request: &CreateJournalEntryRequest) -> Result<JournalEntry, MehError>;

    async fn update_journal_entry(&self, request: &UpdateJournalEntryRequest) -> Result<JournalEntry, MehError>;
}
