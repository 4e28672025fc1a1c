use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{DomainError, UserId};

super::string_id!(ProjectId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Planning,
    InProgress,
    Completed,
    OnHold,
    Cancelled,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "planning",
            ProjectStatus::InProgress => "in_progress",
            ProjectStatus::Completed => "completed",
            ProjectStatus::OnHold => "on_hold",
            ProjectStatus::Cancelled => "cancelled",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ProjectStatus::Planning => "Planning",
            ProjectStatus::InProgress => "In Progress",
            ProjectStatus::Completed => "Completed",
            ProjectStatus::OnHold => "On Hold",
            ProjectStatus::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "planning" => Ok(ProjectStatus::Planning),
            "in_progress" => Ok(ProjectStatus::InProgress),
            "completed" => Ok(ProjectStatus::Completed),
            "on_hold" => Ok(ProjectStatus::OnHold),
            "cancelled" => Ok(ProjectStatus::Cancelled),
            other => Err(DomainError::InvalidValue {
                field: "project status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
    pub location: Option<String>,
    pub budget: Option<f64>,
    pub team_member_ids: Vec<UserId>,
}
