use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{DomainError, DomainResult, ProjectId, TaskId, TaskStatus, User};

super::string_id!(StatusUpdateId);

pub const MAX_PHOTOS: usize = 10;
pub const MAX_PHOTO_WIDTH: u32 = 1200;
pub const PHOTO_JPEG_QUALITY: u8 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Daily => "daily",
            Frequency::Weekly => "weekly",
            Frequency::Monthly => "monthly",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Frequency::Daily => Frequency::Weekly,
            Frequency::Weekly => Frequency::Monthly,
            Frequency::Monthly => Frequency::Daily,
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Frequency::Daily),
            "weekly" => Ok(Frequency::Weekly),
            "monthly" => Ok(Frequency::Monthly),
            other => Err(DomainError::InvalidValue {
                field: "frequency",
                value: other.to_string(),
            }),
        }
    }
}

/// List filter for status updates. `All` sends no frequency parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrequencyFilter {
    #[default]
    All,
    Only(Frequency),
}

impl FrequencyFilter {
    pub fn frequency(&self) -> Option<Frequency> {
        match self {
            FrequencyFilter::All => None,
            FrequencyFilter::Only(f) => Some(*f),
        }
    }

    /// Cycles all -> daily -> weekly -> monthly -> all
    pub fn next(&self) -> Self {
        match self {
            FrequencyFilter::All => FrequencyFilter::Only(Frequency::Daily),
            FrequencyFilter::Only(Frequency::Daily) => FrequencyFilter::Only(Frequency::Weekly),
            FrequencyFilter::Only(Frequency::Weekly) => FrequencyFilter::Only(Frequency::Monthly),
            FrequencyFilter::Only(Frequency::Monthly) => FrequencyFilter::All,
        }
    }
}

impl fmt::Display for FrequencyFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrequencyFilter::All => f.write_str("all"),
            FrequencyFilter::Only(freq) => write!(f, "{freq}"),
        }
    }
}

impl FromStr for FrequencyFilter {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            Ok(FrequencyFilter::All)
        } else {
            s.parse().map(FrequencyFilter::Only)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusUpdate {
    pub id: StatusUpdateId,
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub photos: Vec<String>,
    pub overall_progress: f64,
    pub tasks_completed: u32,
    pub tasks_in_progress: u32,
    pub tasks_pending: u32,
    pub issues: Option<String>,
    pub next_steps: Option<String>,
    pub weather: Option<String>,
    pub is_public: bool,
    pub selected_tasks: Vec<TaskId>,
    pub created_by: Option<User>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GanttItemKind {
    Milestone,
    Task,
}

/// Server-aggregated Gantt bar from the status-update rollup endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GanttItem {
    pub id: String,
    pub name: String,
    pub kind: GanttItemKind,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub progress: f64,
    pub status: TaskStatus,
    pub color: Option<String>,
}

/// A compressed photo ready to be sent as a data URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Photo {
    pub data_uri: String,
    pub width: u32,
    pub height: u32,
}

/// Local, mutable form state for a status update being composed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusUpdateDraft {
    pub title: String,
    pub description: String,
    pub frequency: Frequency,
    photos: Vec<Photo>,
    pub selected_tasks: Vec<TaskId>,
    pub issues: String,
    pub next_steps: String,
    pub weather: String,
    pub is_public: bool,
}

impl StatusUpdateDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn remaining_photo_slots(&self) -> usize {
        MAX_PHOTOS - self.photos.len()
    }

    pub fn add_photo(&mut self, photo: Photo) -> DomainResult<()> {
        if self.photos.len() >= MAX_PHOTOS {
            return Err(DomainError::PhotoLimit(MAX_PHOTOS));
        }
        self.photos.push(photo);
        Ok(())
    }

    /// Appends as many photos as fit and returns how many were dropped.
    pub fn add_photos(&mut self, photos: impl IntoIterator<Item = Photo>) -> usize {
        let mut dropped = 0;
        for photo in photos {
            if self.add_photo(photo).is_err() {
                dropped += 1;
            }
        }
        dropped
    }

    pub fn remove_photo(&mut self, index: usize) -> DomainResult<Photo> {
        if index >= self.photos.len() {
            return Err(DomainError::PhotoIndex(index));
        }
        Ok(self.photos.remove(index))
    }

    pub fn toggle_task(&mut self, task_id: &TaskId) {
        if let Some(pos) = self.selected_tasks.iter().position(|t| t == task_id) {
            self.selected_tasks.remove(pos);
        } else {
            self.selected_tasks.push(task_id.clone());
        }
    }

    /// Presence check only; produces the payload sent to the backend.
    pub fn to_new_status_update(&self, project_id: &ProjectId) -> DomainResult<NewStatusUpdate> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(DomainError::MissingField("title"));
        }

        Ok(NewStatusUpdate {
            project_id: project_id.clone(),
            title: title.to_string(),
            description: non_empty(&self.description),
            frequency: self.frequency,
            photos: self.photos.iter().map(|p| p.data_uri.clone()).collect(),
            issues: non_empty(&self.issues),
            next_steps: non_empty(&self.next_steps),
            weather: non_empty(&self.weather),
            is_public: self.is_public,
            selected_tasks: self.selected_tasks.clone(),
        })
    }
}

fn non_empty(s: &str) -> Option<String> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStatusUpdate {
    pub project_id: ProjectId,
    pub title: String,
    pub description: Option<String>,
    pub frequency: Frequency,
    pub photos: Vec<String>,
    pub issues: Option<String>,
    pub next_steps: Option<String>,
    pub weather: Option<String>,
    pub is_public: bool,
    pub selected_tasks: Vec<TaskId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo(n: u32) -> Photo {
        Photo {
            data_uri: format!("data:image/jpeg;base64,{n}"),
            width: 800,
            height: 600,
        }
    }

    #[test]
    fn photo_count_never_exceeds_cap() {
        let mut draft = StatusUpdateDraft::new();
        let dropped = draft.add_photos((0..8).map(photo));
        assert_eq!(dropped, 0);

        let dropped = draft.add_photos((8..13).map(photo));
        assert_eq!(dropped, 3);
        assert_eq!(draft.photos().len(), MAX_PHOTOS);
        assert_eq!(draft.add_photo(photo(99)), Err(DomainError::PhotoLimit(MAX_PHOTOS)));

        draft.remove_photo(0).unwrap();
        assert_eq!(draft.remaining_photo_slots(), 1);
        assert!(draft.add_photo(photo(100)).is_ok());
        assert_eq!(draft.photos().len(), MAX_PHOTOS);
    }

    #[test]
    fn remove_out_of_range_is_rejected() {
        let mut draft = StatusUpdateDraft::new();
        assert_eq!(draft.remove_photo(0), Err(DomainError::PhotoIndex(0)));
    }

    #[test]
    fn blank_title_is_rejected() {
        let mut draft = StatusUpdateDraft::new();
        draft.title = "   ".to_string();
        let err = draft.to_new_status_update(&"p1".into()).unwrap_err();
        assert_eq!(err, DomainError::MissingField("title"));
    }

    #[test]
    fn payload_trims_optional_text() {
        let mut draft = StatusUpdateDraft::new();
        draft.title = " Foundation poured ".to_string();
        draft.weather = "  ".to_string();
        draft.issues = "Rebar delivery late".to_string();
        draft.add_photo(photo(1)).unwrap();
        draft.toggle_task(&"t1".into());
        draft.toggle_task(&"t2".into());
        draft.toggle_task(&"t1".into());

        let payload = draft.to_new_status_update(&"p1".into()).unwrap();
        assert_eq!(payload.title, "Foundation poured");
        assert_eq!(payload.weather, None);
        assert_eq!(payload.issues.as_deref(), Some("Rebar delivery late"));
        assert_eq!(payload.photos.len(), 1);
        assert_eq!(payload.selected_tasks, vec![TaskId::from("t2")]);
    }

    #[test]
    fn frequency_filter_cycles_and_parses() {
        let filter: FrequencyFilter = "all".parse().unwrap();
        assert_eq!(filter.frequency(), None);
        assert_eq!(filter.next(), FrequencyFilter::Only(Frequency::Daily));
        assert_eq!(
            FrequencyFilter::Only(Frequency::Monthly).next(),
            FrequencyFilter::All
        );
        assert_eq!("weekly".parse::<FrequencyFilter>().unwrap().to_string(), "weekly");
        assert!("hourly".parse::<FrequencyFilter>().is_err());
    }

    #[test]
    fn frequency_cycles_back_to_daily() {
        assert_eq!(Frequency::Daily.next(), Frequency::Weekly);
        assert_eq!(Frequency::Weekly.next(), Frequency::Monthly);
        assert_eq!(Frequency::Monthly.next(), Frequency::Daily);
    }
}
