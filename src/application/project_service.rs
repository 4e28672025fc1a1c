use serde::Serialize;
use std::sync::Arc;

use super::aggregator::{stale_milestones, ProjectStats, TasksByMilestone};
use super::projector::{
    to_gantt_view, to_kanban_view, to_tree_view, ExpandState, GanttView, KanbanView, TreeView,
};
use super::{AppError, AppResult};
use crate::domain::*;
use crate::ports::{Cache, ProjectRepository};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OverviewSection {
    Project,
    Milestones,
    Tasks,
}

/// Everything the project screen shows. Sections that failed to load are
/// empty and their error is kept in `failures`.
#[derive(Debug, Clone, Default)]
pub struct ProjectOverview {
    pub project: Option<Project>,
    pub milestones: Vec<Milestone>,
    pub tasks: Vec<Task>,
    pub failures: Vec<(OverviewSection, AppError)>,
    tasks_by_milestone: TasksByMilestone,
}

impl ProjectOverview {
    fn new(
        project: Option<Project>,
        milestones: Vec<Milestone>,
        tasks: Vec<Task>,
        failures: Vec<(OverviewSection, AppError)>,
    ) -> Self {
        let tasks_by_milestone = TasksByMilestone::build(&tasks);
        Self {
            project,
            milestones,
            tasks,
            failures,
            tasks_by_milestone,
        }
    }

    pub fn tree(&self, expand: &ExpandState) -> TreeView {
        to_tree_view(&self.milestones, &self.tasks_by_milestone, expand)
    }

    pub fn gantt(&self) -> GanttView {
        to_gantt_view(&self.milestones, &self.tasks_by_milestone)
    }

    pub fn kanban(&self) -> KanbanView {
        to_kanban_view(&self.tasks)
    }

    pub fn stats(&self) -> ProjectStats {
        ProjectStats::compute(&self.milestones, &self.tasks)
    }

    pub fn is_partial(&self) -> bool {
        !self.failures.is_empty()
    }

    pub fn failure(&self, section: OverviewSection) -> Option<&AppError> {
        self.failures
            .iter()
            .find(|(s, _)| *s == section)
            .map(|(_, e)| e)
    }

    /// Milestones whose server rollup disagrees with the loaded tasks. Empty
    /// when milestones or tasks failed to load, since a missing task list
    /// would flag every milestone. A failed project header does not matter.
    pub fn drifted_milestones(&self) -> Vec<&Milestone> {
        if self.failure(OverviewSection::Milestones).is_some()
            || self.failure(OverviewSection::Tasks).is_some()
        {
            return Vec::new();
        }
        stale_milestones(&self.milestones, &self.tasks_by_milestone)
    }
}

pub struct ProjectService {
    repository: Arc<dyn ProjectRepository>,
    project_cache: Arc<dyn Cache<ProjectId, Project>>,
}

impl ProjectService {
    pub fn new(
        repository: Arc<dyn ProjectRepository>,
        project_cache: Arc<dyn Cache<ProjectId, Project>>,
    ) -> Self {
        Self {
            repository,
            project_cache,
        }
    }

    pub async fn get_project(&self, id: &ProjectId, use_cache: bool) -> AppResult<Project> {
        if use_cache {
            if let Some(project) = self.project_cache.get(id).await {
                return Ok(project);
            }
        }

        let project = self.repository.get_project(id).await?;
        self.project_cache.insert(id.clone(), project.clone()).await;
        Ok(project)
    }

    /// Fetches project, milestones and tasks concurrently. Never fails as a
    /// whole; see `ProjectOverview::failures`.
    pub async fn load_overview(&self, id: &ProjectId, use_cache: bool) -> ProjectOverview {
        let (project, milestones, tasks) = tokio::join!(
            self.get_project(id, use_cache),
            self.repository.list_milestones(id),
            self.repository.list_tasks(id),
        );

        let mut failures = Vec::new();

        let project = project
            .map_err(|e| {
                tracing::warn!("Failed to load project {}: {}", id, e);
                failures.push((OverviewSection::Project, e));
            })
            .ok();

        let milestones = milestones.unwrap_or_else(|e| {
            tracing::warn!("Failed to load milestones for {}: {}", id, e);
            failures.push((OverviewSection::Milestones, e.into()));
            Vec::new()
        });

        let tasks = tasks.unwrap_or_else(|e| {
            tracing::warn!("Failed to load tasks for {}: {}", id, e);
            failures.push((OverviewSection::Tasks, e.into()));
            Vec::new()
        });

        let overview = ProjectOverview::new(project, milestones, tasks, failures);

        for milestone in overview.drifted_milestones() {
            tracing::warn!(
                "Milestone {} rollup ({} tasks, {} done) disagrees with loaded tasks",
                milestone.id,
                milestone.task_count,
                milestone.completed_task_count
            );
        }

        tracing::debug!(
            "Loaded project {}: {} milestones, {} tasks, {} failed sections",
            id,
            overview.milestones.len(),
            overview.tasks.len(),
            overview.failures.len()
        );

        overview
    }

    pub async fn invalidate(&self, id: &ProjectId) {
        self.project_cache.remove(id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::MokaCacheAdapter;
    use crate::application::aggregator::fixtures::{milestone, task};
    use crate::ports::{MockProjectRepository, RepositoryError};

    fn project() -> Project {
        Project {
            id: "p1".into(),
            name: "Riverside Tower".to_string(),
            status: ProjectStatus::InProgress,
            location: Some("Lot 7".to_string()),
            budget: Some(1_000_000.0),
            team_member_ids: vec!["u1".into()],
        }
    }

    fn service(repo: MockProjectRepository) -> ProjectService {
        ProjectService::new(Arc::new(repo), Arc::new(MokaCacheAdapter::new(60, 100)))
    }

    #[tokio::test]
    async fn overview_combines_all_sections() {
        let mut repo = MockProjectRepository::new();
        repo.expect_get_project().returning(|_| Ok(project()));
        repo.expect_list_milestones()
            .returning(|_| Ok(vec![milestone("m1", 50.0, 2, 1)]));
        repo.expect_list_tasks().returning(|_| {
            Ok(vec![
                task("a", TaskStatus::Completed, Some("m1")),
                task("b", TaskStatus::InProgress, Some("m1")),
            ])
        });

        let overview = service(repo).load_overview(&"p1".into(), false).await;
        assert!(!overview.is_partial());
        assert_eq!(overview.project.as_ref().map(|p| p.name.as_str()), Some("Riverside Tower"));

        let tree = overview.tree(&ExpandState::default());
        assert_eq!(tree.nodes[0].rollup.task_count, 2);
        assert_eq!(tree.nodes[0].rollup.completed_task_count, 1);

        let kanban = overview.kanban();
        assert_eq!(kanban.columns[2].tasks[0].id, "a".into());
        assert_eq!(kanban.columns[1].tasks[0].id, "b".into());

        assert_eq!(overview.gantt().rows[0].progress_width, 50.0);
    }

    #[tokio::test]
    async fn failed_sections_are_empty() {
        let mut repo = MockProjectRepository::new();
        repo.expect_get_project().returning(|_| Ok(project()));
        repo.expect_list_milestones()
            .returning(|_| Ok(vec![milestone("m1", 50.0, 2, 1)]));
        repo.expect_list_tasks()
            .returning(|_| Err(RepositoryError::Network("connection reset".to_string())));

        let overview = service(repo).load_overview(&"p1".into(), false).await;
        assert!(overview.is_partial());
        assert_eq!(overview.milestones.len(), 1);
        assert!(overview.tasks.is_empty());
        assert!(overview.failure(OverviewSection::Tasks).is_some());
        assert!(overview.failure(OverviewSection::Milestones).is_none());
        assert_eq!(overview.kanban().total(), 0);
        assert!(overview.drifted_milestones().is_empty());
    }

    #[tokio::test]
    async fn drift_is_checked_when_only_the_header_fails() {
        let mut repo = MockProjectRepository::new();
        repo.expect_get_project()
            .returning(|_| Err(RepositoryError::Network("timeout".to_string())));
        repo.expect_list_milestones()
            .returning(|_| Ok(vec![milestone("m1", 0.0, 3, 0)]));
        repo.expect_list_tasks()
            .returning(|_| Ok(vec![task("a", TaskStatus::Pending, Some("m1"))]));

        let overview = service(repo).load_overview(&"p1".into(), false).await;
        assert!(overview.project.is_none());
        assert!(overview.failure(OverviewSection::Project).is_some());

        let drifted = overview.drifted_milestones();
        assert_eq!(drifted.len(), 1);
        assert_eq!(drifted[0].id, "m1".into());
    }

    #[tokio::test]
    async fn project_header_is_cached() {
        let mut repo = MockProjectRepository::new();
        repo.expect_get_project().times(1).returning(|_| Ok(project()));

        let service = service(repo);
        let id = ProjectId::from("p1");
        service.get_project(&id, true).await.unwrap();
        let cached = service.get_project(&id, true).await.unwrap();
        assert_eq!(cached, project());
    }

    #[tokio::test]
    async fn refresh_bypasses_cache() {
        let mut repo = MockProjectRepository::new();
        repo.expect_get_project().times(2).returning(|_| Ok(project()));

        let service = service(repo);
        let id = ProjectId::from("p1");
        service.get_project(&id, true).await.unwrap();
        service.get_project(&id, false).await.unwrap();
    }
}
