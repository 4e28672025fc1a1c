use serde::{Deserialize, Serialize};

super::string_id!(UserId);

/// A user reference as embedded in tasks, status updates and chat messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
}
