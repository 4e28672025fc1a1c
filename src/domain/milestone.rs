use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{ProjectId, TaskStatus};

super::string_id!(MilestoneId);

/// A named grouping of tasks inside a project.
///
/// `completion_percentage`, the task counts and the cost figures are rollups
/// computed by the backend from the milestone's tasks. The client treats them
/// as read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub id: MilestoneId,
    pub project_id: ProjectId,
    pub name: String,
    pub status: TaskStatus,
    pub due_date: Option<NaiveDate>,
    pub completion_percentage: f64,
    pub estimated_cost: f64,
    pub actual_cost: f64,
    pub budget_variance: f64,
    pub task_count: usize,
    pub completed_task_count: usize,
    pub color: Option<String>,
}

impl Milestone {
    pub fn is_over_budget(&self) -> bool {
        self.budget_variance < 0.0
    }

    pub fn due_date_display(&self) -> String {
        self.due_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "No due date".to_string())
    }
}
