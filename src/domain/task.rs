use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{DomainError, MilestoneId, User};

super::string_id!(TaskId);

/// Work status shared by tasks and milestones.
///
/// Wire values outside the known set are kept verbatim as `Unknown` so that
/// views can decide how to treat them instead of failing the whole payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Delayed,
    Cancelled,
    Unknown(String),
}

impl TaskStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Delayed => "delayed",
            TaskStatus::Cancelled => "cancelled",
            TaskStatus::Unknown(raw) => raw,
        }
    }

    /// Display label and color for status badges and progress bars
    pub fn status_display(&self) -> (&'static str, &'static str) {
        match self {
            TaskStatus::Pending => ("Pending", "#9CA3AF"),
            TaskStatus::InProgress => ("In Progress", "#3B82F6"),
            TaskStatus::Completed => ("Completed", "#10B981"),
            TaskStatus::Delayed => ("Delayed", "#EF4444"),
            TaskStatus::Cancelled => ("Cancelled", "#6B7280"),
            TaskStatus::Unknown(_) => ("Unknown", "#6B7280"),
        }
    }

    pub fn color(&self) -> &'static str {
        self.status_display().1
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "pending" => TaskStatus::Pending,
            "in_progress" => TaskStatus::InProgress,
            "completed" => TaskStatus::Completed,
            "delayed" => TaskStatus::Delayed,
            "cancelled" => TaskStatus::Cancelled,
            _ => TaskStatus::Unknown(raw),
        }
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        match status {
            TaskStatus::Unknown(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl TaskPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
            TaskPriority::Urgent => "urgent",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(TaskPriority::Low),
            "medium" => Ok(TaskPriority::Medium),
            "high" => Ok(TaskPriority::High),
            "urgent" => Ok(TaskPriority::Urgent),
            other => Err(DomainError::InvalidValue {
                field: "task priority",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    /// Weak reference; `None` means the task is unassigned.
    pub milestone_id: Option<MilestoneId>,
    pub assigned_users: Vec<User>,
    pub progress_percentage: f64,
    pub estimated_cost: f64,
    pub actual_cost: f64,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Comma separated assignee names, or "Unassigned"
    pub fn assignee_display(&self) -> String {
        if self.assigned_users.is_empty() {
            "Unassigned".to_string()
        } else {
            self.assigned_users
                .iter()
                .map(|u| u.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        }
    }
}
