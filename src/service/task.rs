//! Task creation with offline fallback

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::{
        constant::namespace,
        error::MehError,
        event::{EventPayload, TaskCreatedData},
        mutation::{CreateTaskRequest, Task, TaskMutation}
    },
    port::{network::NetworkStatus, remote::RemoteApi, storage::QueueStorage},
    service::{
        event_bus::EventEmitter,
        offline_queue::{MutationProcessor, OfflineQueue, SyncOutcome, SyncPolicy}
    }
};

/// Create the task remotely, then announce it
///
/// The announcement is dispatched in the background, so handlers never hold
/// up the call (or a replay's timeout).
async fn create_task(
    api: &dyn RemoteApi,
    events: Option<&EventEmitter>,
    request: &CreateTaskRequest
) -> Result<Task, MehError> {
    let task = api.create_task(request).await?;

    if let Some(events) = events {
        events
            .emit(EventPayload::TaskCreated(TaskCreatedData {
                task_id: task.id,
                user_id: None,
                title:   task.title.clone()
            }));
    }
    Ok(task)
}

/// Replays queued task mutations against the backend
pub struct TaskReplayer {
    api:    Arc<dyn RemoteApi>,
    events: Option<EventEmitter>
}

#[async_trait]
impl MutationProcessor<TaskMutation> for TaskReplayer {
    async fn process(&self, mutation: &TaskMutation) -> Result<(), MehError> {
        match mutation {
            TaskMutation::Create(request) => {
                create_task(self.api.as_ref(), self.events.as_ref(), request).await?;
            }
        }
        Ok(())
    }
}

/// Task operations that fall back to the offline queue
pub struct TaskSync {
    api:    Arc<dyn RemoteApi>,
    events: Option<EventEmitter>,
    queue:  Arc<OfflineQueue<TaskMutation>>
}

impl TaskSync {
    pub fn new(
        api: Arc<dyn RemoteApi>,
        storage: Option<Arc<dyn QueueStorage>>,
        network: Arc<dyn NetworkStatus>,
        policy: SyncPolicy,
        events: Option<EventEmitter>
    ) -> Self {
        let replayer = Arc::new(TaskReplayer { api: api.clone(), events: events.clone() });
        let queue = Arc::new(OfflineQueue::new(namespace::TASKS, storage, network, replayer).with_policy(policy));
        Self { api, events, queue }
    }

    /// Create a task, or queue it when the backend is out of reach
    ///
    /// `Some(task)` is the server's copy; `None` means the request was queued
    /// and will be replayed on the next sync.
    pub async fn create_task(&self, request: CreateTaskRequest) -> Option<Task> {
        let mutation = TaskMutation::Create(request.clone());
        self.queue.submit(mutation, || create_task(self.api.as_ref(), self.events.as_ref(), &request)).await
    }

    pub fn queue(&self) -> &Arc<OfflineQueue<TaskMutation>> {
        &self.queue
    }

    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    pub fn is_syncing(&self) -> bool {
        self.queue.is_syncing()
    }

    pub async fn sync_queue(&self) -> SyncOutcome {
        self.queue.sync_queue().await
    }
}
