use crate::domain::{
    ChatMessage, Frequency, FrequencyFilter, GanttItem, Milestone, NewStatusUpdate, Project,
    ProjectId, StatusUpdate, StatusUpdateId, Task,
};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RepositoryError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: retry after {0} seconds")]
    RateLimit(u64),

    /// Non-success response. `detail` is the backend-supplied message, if any.
    #[error("API error (HTTP {status}): {}", detail.as_deref().unwrap_or("no detail"))]
    Api { status: u16, detail: Option<String> },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepositoryError {
    /// Message supplied by the backend, when the response carried one.
    pub fn detail(&self) -> Option<&str> {
        match self {
            RepositoryError::Api { detail, .. } => detail.as_deref(),
            RepositoryError::Authentication(msg) | RepositoryError::NotFound(msg) => Some(msg),
            _ => None,
        }
    }
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn get_project(&self, id: &ProjectId) -> RepositoryResult<Project>;
    async fn list_milestones(&self, project_id: &ProjectId) -> RepositoryResult<Vec<Milestone>>;
    async fn list_tasks(&self, project_id: &ProjectId) -> RepositoryResult<Vec<Task>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusUpdateRepository: Send + Sync {
    async fn list_status_updates(
        &self,
        project_id: &ProjectId,
        filter: FrequencyFilter,
    ) -> RepositoryResult<Vec<StatusUpdate>>;
    async fn create_status_update(&self, update: &NewStatusUpdate) -> RepositoryResult<StatusUpdate>;
    async fn delete_status_update(&self, id: &StatusUpdateId) -> RepositoryResult<()>;
    async fn get_gantt(
        &self,
        project_id: &ProjectId,
        view: Frequency,
    ) -> RepositoryResult<Vec<GanttItem>>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatRepository: Send + Sync {
    async fn list_messages(&self, project_id: &ProjectId) -> RepositoryResult<Vec<ChatMessage>>;
}
