//! Reqwest implementation of the remote API port

use std::time::Duration;

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};

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

/// JSON-over-HTTP client for the meh-trics REST backend
pub struct ReqwestRemoteApi {
    client:   reqwest::Client,
    base_url: String
}

impl ReqwestRemoteApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, MehError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MehError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url: base_url.into().trim_end_matches('/').to_string() })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request and decode a JSON body, mapping non-2xx to [`MehError::Remote`]
    ///
    /// A 2xx whose body does not decode is [`MehError::UnreadableResponse`]:
    /// the write happened and must not be sent again.
    async fn send_json<T: DeserializeOwned + Send>(&self, builder: reqwest::RequestBuilder) -> Result<T, MehError> {
        let response = builder.send().await.map_err(MehError::from)?;
        let status = response.status();

        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(MehError::Remote { status: status.as_u16(), message });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MehError::UnreadableResponse(format!("Failed to decode response body: {}", e)))
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, MehError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send
    {
        self.send_json(self.client.post(self.url(path)).json(body)).await
    }

    async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, MehError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned + Send
    {
        self.send_json(self.client.put(self.url(path)).json(body)).await
    }
}

#[async_trait]
impl RemoteApi for ReqwestRemoteApi {
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<Task, MehError> {
        self.post("/tasks", request).await
    }

    async fn create_mood_entry(&self, request: &CreateMoodEntryRequest) -> Result<MoodEntry, MehError> {
        self.post("/mood-entries", request).await
    }

    async fn create_journal_entry(&self, request: &CreateJournalEntryRequest) -> Result<JournalEntry, MehError> {
        self.post("/journal", request).await
    }

    async fn update_journal_entry(&self, request: &UpdateJournalEntryRequest) -> Result<JournalEntry, MehError> {
        self.put(&format!("/journal/{}", request.id), request).await
    }
}
