use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ProjectId, User};

super::string_id!(MessageId);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub project_id: ProjectId,
    pub sender: Option<User>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn sender_name(&self) -> &str {
        self.sender.as_ref().map(|u| u.name.as_str()).unwrap_or("Unknown")
    }

    /// Format the time since creation for display
    pub fn time_since_created(&self) -> String {
        let duration = Utc::now().signed_duration_since(self.created_at);

        if duration.num_days() > 0 {
            format!("{} days ago", duration.num_days())
        } else if duration.num_hours() > 0 {
            format!("{} hours ago", duration.num_hours())
        } else if duration.num_minutes() > 0 {
            format!("{} minutes ago", duration.num_minutes())
        } else {
            "Just now".to_string()
        }
    }
}
