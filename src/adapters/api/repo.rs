use async_trait::async_trait;

use super::{
    client::query_string, ApiClient, ChatMessageDto, GanttItemDto, MilestoneDto, ProjectDto,
    StatusUpdateCreateDto, StatusUpdateDto, TaskDto,
};
use crate::{
    domain::{
        ChatMessage, Frequency, FrequencyFilter, GanttItem, Milestone, NewStatusUpdate, Project,
        ProjectId, StatusUpdate, StatusUpdateId, Task,
    },
    ports::{ChatRepository, ProjectRepository, RepositoryResult, StatusUpdateRepository},
};

/// REST-backed implementation of every repository port.
#[derive(Clone)]
pub struct HttpRepository {
    client: ApiClient,
}

impl HttpRepository {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }
}

fn project_query(project_id: &ProjectId) -> Vec<(&'static str, String)> {
    vec![("project_id", project_id.0.clone())]
}

pub(crate) fn status_update_query(
    project_id: &ProjectId,
    filter: FrequencyFilter,
) -> Vec<(&'static str, String)> {
    let mut params = project_query(project_id);
    if let Some(frequency) = filter.frequency() {
        params.push(("frequency", frequency.as_str().to_string()));
    }
    params
}

#[async_trait]
impl ProjectRepository for HttpRepository {
    async fn get_project(&self, id: &ProjectId) -> RepositoryResult<Project> {
        let path = format!("/projects/{}", urlencoding::encode(&id.0));
        let dto: ProjectDto = self.client.get(&path).await?;
        dto.try_into()
    }

    async fn list_milestones(&self, project_id: &ProjectId) -> RepositoryResult<Vec<Milestone>> {
        let path = format!("/milestones{}", query_string(&project_query(project_id)));
        let dtos: Vec<MilestoneDto> = self.client.get_list(&path).await?;
        Ok(dtos.into_iter().map(Milestone::from).collect())
    }

    async fn list_tasks(&self, project_id: &ProjectId) -> RepositoryResult<Vec<Task>> {
        let path = format!("/tasks{}", query_string(&project_query(project_id)));
        let dtos: Vec<TaskDto> = self.client.get_list(&path).await?;
        Ok(dtos.into_iter().map(Task::from).collect())
    }
}

#[async_trait]
impl StatusUpdateRepository for HttpRepository {
    async fn list_status_updates(
        &self,
        project_id: &ProjectId,
        filter: FrequencyFilter,
    ) -> RepositoryResult<Vec<StatusUpdate>> {
        let path = format!(
            "/status-updates{}",
            query_string(&status_update_query(project_id, filter))
        );
        let dtos: Vec<StatusUpdateDto> = self.client.get_list(&path).await?;
        dtos.into_iter().map(StatusUpdate::try_from).collect()
    }

    async fn create_status_update(&self, update: &NewStatusUpdate) -> RepositoryResult<StatusUpdate> {
        let body = StatusUpdateCreateDto::from(update);
        let dto: StatusUpdateDto = self.client.post("/status-updates", &body).await?;
        dto.try_into()
    }

    async fn delete_status_update(&self, id: &StatusUpdateId) -> RepositoryResult<()> {
        let path = format!("/status-updates/{}", urlencoding::encode(&id.0));
        self.client.delete(&path).await
    }

    async fn get_gantt(
        &self,
        project_id: &ProjectId,
        view: Frequency,
    ) -> RepositoryResult<Vec<GanttItem>> {
        let mut params = project_query(project_id);
        params.push(("view", view.as_str().to_string()));
        let path = format!("/status-updates/gantt{}", query_string(&params));

        let dtos: Vec<GanttItemDto> = self.client.get_list(&path).await?;
        Ok(dtos.into_iter().map(GanttItem::from).collect())
    }
}

#[async_trait]
impl ChatRepository for HttpRepository {
    async fn list_messages(&self, project_id: &ProjectId) -> RepositoryResult<Vec<ChatMessage>> {
        let path = format!("/chat/messages{}", query_string(&project_query(project_id)));
        let dtos: Vec<ChatMessageDto> = self.client.get_list(&path).await?;
        dtos.into_iter().map(ChatMessage::try_from).collect()
    }
}
