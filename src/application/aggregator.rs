//! Grouping and rollups over a project's already-fetched tasks and milestones.
//!
//! Milestone rollups are owned by the backend. Nothing here recomputes them;
//! the locally observed counts are only used to flag milestones whose
//! server numbers disagree with the task list on screen.

use serde::Serialize;
use std::collections::{HashMap, HashSet};

use crate::domain::{Milestone, MilestoneId, Task, TaskStatus};

/// Tasks belonging to `milestone_id`, or the unassigned tasks for `None`,
/// in input order.
pub fn group_tasks_by_milestone<'a>(
    tasks: &'a [Task],
    milestone_id: Option<&MilestoneId>,
) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|task| task.milestone_id.as_ref() == milestone_id)
        .collect()
}

/// Index of tasks per milestone plus the unassigned bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TasksByMilestone {
    buckets: HashMap<MilestoneId, Vec<Task>>,
    // first-seen order of milestone ids, keeps iteration deterministic
    order: Vec<MilestoneId>,
    unassigned: Vec<Task>,
}

impl TasksByMilestone {
    pub fn build(tasks: &[Task]) -> Self {
        let owned = |group: Vec<&Task>| group.into_iter().cloned().collect::<Vec<_>>();

        let mut seen = HashSet::new();
        let order: Vec<MilestoneId> = tasks
            .iter()
            .filter_map(|task| task.milestone_id.as_ref())
            .filter(|id| seen.insert(*id))
            .cloned()
            .collect();
        let buckets = order
            .iter()
            .map(|id| (id.clone(), owned(group_tasks_by_milestone(tasks, Some(id)))))
            .collect();

        Self {
            buckets,
            order,
            unassigned: owned(group_tasks_by_milestone(tasks, None)),
        }
    }

    pub fn get(&self, milestone_id: Option<&MilestoneId>) -> &[Task] {
        match milestone_id {
            Some(id) => self.buckets.get(id).map(Vec::as_slice).unwrap_or(&[]),
            None => &self.unassigned,
        }
    }

    pub fn unassigned(&self) -> &[Task] {
        &self.unassigned
    }

    /// Tasks pointing at milestones that are not in `milestones`.
    pub fn orphaned(&self, milestones: &[Milestone]) -> Vec<Task> {
        let known: HashSet<&MilestoneId> = milestones.iter().map(|m| &m.id).collect();
        self.order
            .iter()
            .filter(|id| !known.contains(id))
            .flat_map(|id| self.get(Some(id)).iter().cloned())
            .collect()
    }
}

/// Server-supplied rollup for one milestone, with the locally observed
/// counts alongside for drift detection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MilestoneRollup {
    pub completion_percentage: f64,
    pub task_count: usize,
    pub completed_task_count: usize,
    pub estimated_cost: f64,
    pub actual_cost: f64,
    pub budget_variance: f64,
    pub observed_task_count: usize,
    pub observed_completed_count: usize,
    pub stale: bool,
}

impl MilestoneRollup {
    pub fn from_milestone(milestone: &Milestone, tasks: &[Task]) -> Self {
        let observed_task_count = tasks.len();
        let observed_completed_count = tasks.iter().filter(|t| t.is_completed()).count();

        Self {
            completion_percentage: milestone.completion_percentage,
            task_count: milestone.task_count,
            completed_task_count: milestone.completed_task_count,
            estimated_cost: milestone.estimated_cost,
            actual_cost: milestone.actual_cost,
            budget_variance: milestone.budget_variance,
            observed_task_count,
            observed_completed_count,
            stale: observed_task_count != milestone.task_count
                || observed_completed_count != milestone.completed_task_count,
        }
    }
}

/// Milestones whose server rollup disagrees with the loaded tasks.
pub fn stale_milestones<'a>(
    milestones: &'a [Milestone],
    tasks: &TasksByMilestone,
) -> Vec<&'a Milestone> {
    milestones
        .iter()
        .filter(|m| MilestoneRollup::from_milestone(m, tasks.get(Some(&m.id))).stale)
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CostSummary {
    pub estimated: f64,
    pub actual: f64,
    pub variance: f64,
}

pub fn cost_summary(milestones: &[Milestone]) -> CostSummary {
    milestones.iter().fold(CostSummary::default(), |acc, m| CostSummary {
        estimated: acc.estimated + m.estimated_cost,
        actual: acc.actual + m.actual_cost,
        variance: acc.variance + m.budget_variance,
    })
}

/// Project-wide numbers for the header: task counts from the task list,
/// progress as the mean of the server's milestone percentages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectStats {
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub in_progress_tasks: usize,
    pub pending_tasks: usize,
    pub progress_percentage: f64,
    pub costs: CostSummary,
}

impl ProjectStats {
    pub fn compute(milestones: &[Milestone], tasks: &[Task]) -> Self {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();

        let progress_percentage = if milestones.is_empty() {
            0.0
        } else {
            milestones.iter().map(|m| m.completion_percentage).sum::<f64>() / milestones.len() as f64
        };

        Self {
            total_tasks: tasks.len(),
            completed_tasks: count(TaskStatus::Completed),
            in_progress_tasks: count(TaskStatus::InProgress),
            pending_tasks: count(TaskStatus::Pending),
            progress_percentage,
            costs: cost_summary(milestones),
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::domain::*;

    pub fn task(id: &str, status: TaskStatus, milestone: Option<&str>) -> Task {
        Task {
            id: id.into(),
            title: format!("Task {id}"),
            status,
            priority: TaskPriority::Medium,
            milestone_id: milestone.map(MilestoneId::from),
            assigned_users: vec![],
            progress_percentage: 0.0,
            estimated_cost: 0.0,
            actual_cost: 0.0,
        }
    }

    pub fn milestone(id: &str, completion: f64, task_count: usize, completed: usize) -> Milestone {
        Milestone {
            id: id.into(),
            project_id: "p1".into(),
            name: format!("Milestone {id}"),
            status: TaskStatus::InProgress,
            due_date: None,
            completion_percentage: completion,
            estimated_cost: 1000.0,
            actual_cost: 400.0,
            budget_variance: 600.0,
            task_count,
            completed_task_count: completed,
            color: None,
        }
    }
}
