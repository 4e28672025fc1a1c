use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use crate::domain::*;
use crate::ports::RepositoryError;

// List endpoints answer either with a bare array or with a `data` envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ListResponse<T> {
    Bare(Vec<T>),
    Wrapped { data: Vec<T> },
}

impl<T> ListResponse<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            ListResponse::Bare(items) => items,
            ListResponse::Wrapped { data } => data,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorDetail {
    Message(String),
    Items(Vec<ErrorItem>),
}

#[derive(Debug, Deserialize)]
struct ErrorItem {
    msg: String,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: Option<ErrorDetail>,
    message: Option<String>,
}

/// Extracts the human-readable message from an error response body.
pub fn error_detail(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    match parsed.detail {
        Some(ErrorDetail::Message(msg)) if !msg.is_empty() => Some(msg),
        Some(ErrorDetail::Items(items)) if !items.is_empty() => Some(
            items
                .into_iter()
                .map(|i| i.msg)
                .collect::<Vec<_>>()
                .join("; "),
        ),
        _ => parsed.message.filter(|m| !m.is_empty()),
    }
}

// Ids come back as numbers from some endpoints and strings from others
fn flexible_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
    })
}

fn flexible_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
    }

    Ok(Option::<Raw>::deserialize(deserializer)?.map(|raw| match raw {
        Raw::Str(s) => s,
        Raw::Int(n) => n.to_string(),
    }))
}

// Decimal columns may be serialized as strings
fn flexible_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Str(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Num(n)) => Ok(Some(n)),
        Some(Raw::Str(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Str(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Naive timestamps are stored as UTC by the backend
            chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").map(|dt| dt.and_utc())
        })
        .map_err(|e| RepositoryError::Serialization(format!("Invalid timestamp '{raw}': {e}")))
}

fn percentage(value: Option<f64>) -> f64 {
    value.unwrap_or(0.0).clamp(0.0, 100.0)
}

// DTOs for API communication
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectDto {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub name: String,
    pub status: String,
    pub location: Option<String>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub budget: Option<f64>,
    #[serde(default)]
    pub team_members: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserDto {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MilestoneDto {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "flexible_id")]
    pub project_id: String,
    pub name: String,
    pub status: Option<String>,
    pub due_date: Option<String>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub completion_percentage: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub estimated_cost: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub actual_cost: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub budget_variance: Option<f64>,
    pub task_count: Option<usize>,
    pub completed_task_count: Option<usize>,
    pub color: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskDto {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub title: String,
    pub status: String,
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "flexible_opt_id")]
    pub milestone_id: Option<String>,
    #[serde(default)]
    pub assigned_users: Vec<UserDto>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub progress_percentage: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub estimated_cost: Option<f64>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub actual_cost: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusUpdateDto {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "flexible_id")]
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    pub frequency: String,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub overall_progress: Option<f64>,
    #[serde(default)]
    pub tasks_completed: u32,
    #[serde(default)]
    pub tasks_in_progress: u32,
    #[serde(default)]
    pub tasks_pending: u32,
    pub issues: Option<String>,
    pub next_steps: Option<String>,
    pub weather: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    #[serde(default)]
    pub selected_tasks: Vec<serde_json::Value>,
    pub created_by: Option<UserDto>,
    pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GanttItemDto {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "flexible_f64")]
    pub progress: Option<f64>,
    pub status: Option<String>,
    pub color: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatMessageDto {
    #[serde(deserialize_with = "flexible_id")]
    pub id: String,
    #[serde(deserialize_with = "flexible_id")]
    pub project_id: String,
    pub sender: Option<UserDto>,
    pub content: String,
    pub created_at: String,
}

// Request DTOs
#[derive(Debug, Serialize)]
pub struct StatusUpdateCreateDto {
    pub project_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub frequency: Frequency,
    pub photos: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_steps: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weather: Option<String>,
    pub is_public: bool,
    pub selected_tasks: Vec<String>,
}

// Conversion implementations
impl From<UserDto> for User {
    fn from(dto: UserDto) -> Self {
        let name = dto
            .full_name
            .or(dto.name)
            .unwrap_or_else(|| format!("User {}", dto.id));
        Self {
            id: UserId(dto.id),
            name,
        }
    }
}

fn member_id(value: serde_json::Value) -> Option<UserId> {
    match value {
        serde_json::Value::String(s) => Some(UserId(s)),
        serde_json::Value::Number(n) => Some(UserId(n.to_string())),
        serde_json::Value::Object(map) => map.get("id").cloned().and_then(member_id),
        _ => None,
    }
}

impl TryFrom<ProjectDto> for Project {
    type Error = RepositoryError;

    fn try_from(dto: ProjectDto) -> Result<Self, Self::Error> {
        let status = dto
            .status
            .parse()
            .map_err(|e: DomainError| RepositoryError::Serialization(e.to_string()))?;

        Ok(Self {
            id: ProjectId(dto.id),
            name: dto.name,
            status,
            location: dto.location,
            budget: dto.budget,
            team_member_ids: dto.team_members.into_iter().filter_map(member_id).collect(),
        })
    }
}

impl From<MilestoneDto> for Milestone {
    fn from(dto: MilestoneDto) -> Self {
        let estimated_cost = dto.estimated_cost.unwrap_or(0.0);
        let actual_cost = dto.actual_cost.unwrap_or(0.0);

        Self {
            id: MilestoneId(dto.id),
            project_id: ProjectId(dto.project_id),
            name: dto.name,
            status: dto
                .status
                .map(TaskStatus::from)
                .unwrap_or(TaskStatus::Pending),
            due_date: dto.due_date.as_deref().and_then(parse_date),
            completion_percentage: percentage(dto.completion_percentage),
            estimated_cost,
            actual_cost,
            budget_variance: dto.budget_variance.unwrap_or(estimated_cost - actual_cost),
            task_count: dto.task_count.unwrap_or(0),
            completed_task_count: dto.completed_task_count.unwrap_or(0),
            color: dto.color,
        }
    }
}

impl From<TaskDto> for Task {
    fn from(dto: TaskDto) -> Self {
        let priority = dto
            .priority
            .as_deref()
            .and_then(|p| p.parse().ok())
            .unwrap_or(TaskPriority::Medium);

        Self {
            id: TaskId(dto.id),
            title: dto.title,
            status: TaskStatus::from(dto.status),
            priority,
            milestone_id: dto.milestone_id.map(MilestoneId),
            assigned_users: dto.assigned_users.into_iter().map(User::from).collect(),
            progress_percentage: percentage(dto.progress_percentage),
            estimated_cost: dto.estimated_cost.unwrap_or(0.0),
            actual_cost: dto.actual_cost.unwrap_or(0.0),
        }
    }
}

impl TryFrom<StatusUpdateDto> for StatusUpdate {
    type Error = RepositoryError;

    fn try_from(dto: StatusUpdateDto) -> Result<Self, Self::Error> {
        let frequency = dto
            .frequency
            .parse()
            .map_err(|e: DomainError| RepositoryError::Serialization(e.to_string()))?;

        Ok(Self {
            id: StatusUpdateId(dto.id),
            project_id: ProjectId(dto.project_id),
            title: dto.title,
            description: dto.description,
            frequency,
            photos: dto.photos,
            overall_progress: percentage(dto.overall_progress),
            tasks_completed: dto.tasks_completed,
            tasks_in_progress: dto.tasks_in_progress,
            tasks_pending: dto.tasks_pending,
            issues: dto.issues,
            next_steps: dto.next_steps,
            weather: dto.weather,
            is_public: dto.is_public,
            selected_tasks: dto
                .selected_tasks
                .into_iter()
                .filter_map(|v| member_id(v).map(|id| TaskId(id.0)))
                .collect(),
            created_by: dto.created_by.map(User::from),
            created_at: parse_timestamp(&dto.created_at)?,
        })
    }
}

impl From<GanttItemDto> for GanttItem {
    fn from(dto: GanttItemDto) -> Self {
        let kind = match dto.kind.as_deref() {
            Some("milestone") => GanttItemKind::Milestone,
            _ => GanttItemKind::Task,
        };

        Self {
            id: dto.id,
            name: dto.name,
            kind,
            start_date: dto.start_date.as_deref().and_then(parse_date),
            end_date: dto.end_date.as_deref().and_then(parse_date),
            progress: percentage(dto.progress),
            status: dto
                .status
                .map(TaskStatus::from)
                .unwrap_or(TaskStatus::Pending),
            color: dto.color,
        }
    }
}

impl TryFrom<ChatMessageDto> for ChatMessage {
    type Error = RepositoryError;

    fn try_from(dto: ChatMessageDto) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MessageId(dto.id),
            project_id: ProjectId(dto.project_id),
            sender: dto.sender.map(User::from),
            content: dto.content,
            created_at: parse_timestamp(&dto.created_at)?,
        })
    }
}

impl From<&NewStatusUpdate> for StatusUpdateCreateDto {
    fn from(update: &NewStatusUpdate) -> Self {
        Self {
            project_id: update.project_id.0.clone(),
            title: update.title.clone(),
            description: update.description.clone(),
            frequency: update.frequency,
            photos: update.photos.clone(),
            issues: update.issues.clone(),
            next_steps: update.next_steps.clone(),
            weather: update.weather.clone(),
            is_public: update.is_public,
            selected_tasks: update.selected_tasks.iter().map(|t| t.0.clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn milestone_accepts_numeric_ids_and_string_costs() {
        let dto: MilestoneDto = serde_json::from_value(json!({
            "id": 7,
            "project_id": "42",
            "name": "Foundation",
            "status": "in_progress",
            "due_date": "2026-03-01",
            "completion_percentage": 50,
            "estimated_cost": "1500.50",
            "actual_cost": 500,
            "task_count": 2,
            "completed_task_count": 1
        }))
        .unwrap();

        let milestone = Milestone::from(dto);
        assert_eq!(milestone.id, MilestoneId::from("7"));
        assert_eq!(milestone.status, TaskStatus::InProgress);
        assert_eq!(milestone.completion_percentage, 50.0);
        assert_eq!(milestone.budget_variance, 1000.5);
        assert_eq!(milestone.due_date, NaiveDate::from_ymd_opt(2026, 3, 1));
    }

    #[test]
    fn task_without_milestone_is_unassigned() {
        let dto: TaskDto = serde_json::from_value(json!({
            "id": "t1",
            "title": "Pour slab",
            "status": "awaiting_inspection",
            "milestone_id": null,
            "assigned_users": [{"id": 3, "full_name": "Dana"}]
        }))
        .unwrap();

        let task = Task::from(dto);
        assert_eq!(task.milestone_id, None);
        assert_eq!(task.priority, TaskPriority::Medium);
        assert_eq!(task.status, TaskStatus::Unknown("awaiting_inspection".to_string()));
        assert_eq!(task.assignee_display(), "Dana");
    }

    #[test]
    fn project_with_bad_status_is_rejected() {
        let dto: ProjectDto = serde_json::from_value(json!({
            "id": 1,
            "name": "Tower",
            "status": "exploded",
            "team_members": [1, {"id": "2"}]
        }))
        .unwrap();

        assert!(matches!(
            Project::try_from(dto),
            Err(RepositoryError::Serialization(_))
        ));
    }

    #[test]
    fn status_update_parses_naive_timestamp() {
        let dto: StatusUpdateDto = serde_json::from_value(json!({
            "id": 1,
            "project_id": 2,
            "title": "Foundation poured",
            "frequency": "daily",
            "photos": ["data:image/jpeg;base64,AAAA"],
            "selected_tasks": [5, "6"],
            "created_at": "2026-10-01T08:30:00"
        }))
        .unwrap();

        let update = StatusUpdate::try_from(dto).unwrap();
        assert_eq!(update.frequency, Frequency::Daily);
        assert_eq!(update.selected_tasks, vec![TaskId::from("5"), TaskId::from("6")]);
        assert_eq!(update.created_at.to_rfc3339(), "2026-10-01T08:30:00+00:00");
    }

    #[test]
    fn list_response_accepts_both_shapes() {
        let bare: ListResponse<u32> = serde_json::from_str("[1,2]").unwrap();
        let wrapped: ListResponse<u32> = serde_json::from_str(r#"{"data":[3]}"#).unwrap();
        assert_eq!(bare.into_items(), vec![1, 2]);
        assert_eq!(wrapped.into_items(), vec![3]);
    }

    #[test]
    fn error_detail_prefers_backend_message() {
        assert_eq!(
            error_detail(r#"{"detail":"Project not accessible"}"#).as_deref(),
            Some("Project not accessible")
        );
        assert_eq!(
            error_detail(r#"{"detail":[{"msg":"title required"},{"msg":"bad frequency"}]}"#)
                .as_deref(),
            Some("title required; bad frequency")
        );
        assert_eq!(error_detail("<html>502</html>"), None);
    }

    #[test]
    fn create_body_skips_empty_optionals() {
        let update = NewStatusUpdate {
            project_id: "p1".into(),
            title: "Foundation poured".to_string(),
            description: None,
            frequency: Frequency::Daily,
            photos: vec!["data:image/jpeg;base64,AAAA".to_string()],
            issues: None,
            next_steps: Some("Framing".to_string()),
            weather: None,
            is_public: true,
            selected_tasks: vec!["t1".into()],
        };

        let body = serde_json::to_value(StatusUpdateCreateDto::from(&update)).unwrap();
        assert_eq!(
            body,
            json!({
                "project_id": "p1",
                "title": "Foundation poured",
                "frequency": "daily",
                "photos": ["data:image/jpeg;base64,AAAA"],
                "next_steps": "Framing",
                "is_public": true,
                "selected_tasks": ["t1"]
            })
        );
    }
}
