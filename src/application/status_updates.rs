use std::path::PathBuf;
use std::sync::Arc;

use super::{AppError, AppResult};
use crate::domain::*;
use crate::ports::{PhotoEncoder, PhotoError, StatusUpdateRepository};

pub struct StatusUpdateService {
    repository: Arc<dyn StatusUpdateRepository>,
    encoder: Arc<dyn PhotoEncoder>,
}

/// Result of attaching a batch of photos to a draft.
#[derive(Debug, Default)]
pub struct PhotoAttachReport {
    pub added: usize,
    /// Encoded fine but the draft was already full.
    pub dropped: usize,
    pub failed: Vec<(String, PhotoError)>,
}

impl StatusUpdateService {
    pub fn new(
        repository: Arc<dyn StatusUpdateRepository>,
        encoder: Arc<dyn PhotoEncoder>,
    ) -> Self {
        Self {
            repository,
            encoder,
        }
    }

    pub async fn list(
        &self,
        project_id: &ProjectId,
        filter: FrequencyFilter,
    ) -> AppResult<Vec<StatusUpdate>> {
        Ok(self.repository.list_status_updates(project_id, filter).await?)
    }

    pub async fn create(&self, update: &NewStatusUpdate) -> AppResult<StatusUpdate> {
        let created = self.repository.create_status_update(update).await?;
        tracing::info!(
            "Created status update {} with {} photos",
            created.id,
            update.photos.len()
        );
        Ok(created)
    }

    pub async fn delete(&self, id: &StatusUpdateId) -> AppResult<()> {
        self.repository.delete_status_update(id).await?;
        tracing::info!("Deleted status update {}", id);
        Ok(())
    }

    pub async fn gantt(&self, project_id: &ProjectId, view: Frequency) -> AppResult<Vec<GanttItem>> {
        Ok(self.repository.get_gantt(project_id, view).await?)
    }

    /// Encodes every image concurrently on the blocking pool and appends the
    /// results in input order. The photo cap is applied after encoding.
    pub async fn attach_photo_bytes(
        &self,
        draft: &mut StatusUpdateDraft,
        images: Vec<(String, Vec<u8>)>,
    ) -> PhotoAttachReport {
        let handles: Vec<_> = images
            .into_iter()
            .map(|(name, bytes)| {
                let encoder = Arc::clone(&self.encoder);
                let handle = tokio::task::spawn_blocking(move || encoder.encode(&bytes));
                (name, handle)
            })
            .collect();

        let mut report = PhotoAttachReport::default();
        let mut encoded = Vec::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(photo)) => encoded.push(photo),
                Ok(Err(e)) => report.failed.push((name, e)),
                Err(e) => report.failed.push((name, PhotoError::Encode(e.to_string()))),
            }
        }

        let attempted = encoded.len();
        report.dropped = draft.add_photos(encoded);
        report.added = attempted - report.dropped;
        if report.dropped > 0 {
            tracing::warn!("Dropped {} photos over the limit of {}", report.dropped, MAX_PHOTOS);
        }
        report
    }

    pub async fn attach_photo_files(
        &self,
        draft: &mut StatusUpdateDraft,
        paths: &[PathBuf],
    ) -> PhotoAttachReport {
        let mut images = Vec::new();
        let mut unreadable = Vec::new();
        for path in paths {
            let name = path.display().to_string();
            match tokio::fs::read(path).await {
                Ok(bytes) => images.push((name, bytes)),
                Err(e) => unreadable.push((name, PhotoError::Read(e.to_string()))),
            }
        }

        let mut report = self.attach_photo_bytes(draft, images).await;
        report.failed.extend(unreadable);
        report
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    Editing,
    Submitting,
    Success,
    Failed,
}

/// Create-modal state machine: `Idle -> Editing -> Submitting -> {Success, Failed}`.
/// A failure keeps the draft so the same input can be resubmitted.
#[derive(Debug, Clone)]
pub struct StatusUpdateFlow {
    state: FlowState,
    draft: Option<StatusUpdateDraft>,
    alert: Option<String>,
}

impl Default for StatusUpdateFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusUpdateFlow {
    pub fn new() -> Self {
        Self {
            state: FlowState::Idle,
            draft: None,
            alert: None,
        }
    }

    pub fn state(&self) -> FlowState {
        self.state
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            FlowState::Editing | FlowState::Submitting | FlowState::Failed
        )
    }

    pub fn draft(&self) -> Option<&StatusUpdateDraft> {
        self.draft.as_ref()
    }

    pub fn draft_mut(&mut self) -> Option<&mut StatusUpdateDraft> {
        match self.state {
            FlowState::Editing | FlowState::Failed => self.draft.as_mut(),
            _ => None,
        }
    }

    /// Opens the modal. An already open draft is kept.
    pub fn open(&mut self) {
        if !self.is_open() {
            self.draft = Some(StatusUpdateDraft::new());
            self.alert = None;
        }
        if self.state != FlowState::Submitting {
            self.state = FlowState::Editing;
        }
    }

    /// Closes the modal and discards the draft.
    pub fn close(&mut self) {
        if self.state != FlowState::Submitting {
            self.state = FlowState::Idle;
            self.draft = None;
            self.alert = None;
        }
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
        if self.state == FlowState::Failed {
            self.state = FlowState::Editing;
        }
    }

    /// Validates the draft and moves to `Submitting`. Validation problems
    /// raise the alert and leave the flow in `Editing`.
    pub fn begin_submit(&mut self, project_id: &ProjectId) -> AppResult<NewStatusUpdate> {
        if !matches!(self.state, FlowState::Editing | FlowState::Failed) {
            return Err(AppError::Application(
                "No status update is being edited".to_string(),
            ));
        }
        let draft = self
            .draft
            .as_ref()
            .ok_or_else(|| AppError::Application("No draft to submit".to_string()))?;

        match draft.to_new_status_update(project_id) {
            Ok(payload) => {
                self.state = FlowState::Submitting;
                self.alert = None;
                Ok(payload)
            }
            Err(e) => {
                let err = AppError::from(e);
                self.state = FlowState::Editing;
                self.alert = Some(err.user_message());
                Err(err)
            }
        }
    }

    pub fn finish_submit(&mut self, outcome: &AppResult<StatusUpdate>) {
        match outcome {
            Ok(_) => {
                self.state = FlowState::Success;
                self.draft = None;
                self.alert = None;
            }
            Err(e) => {
                self.state = FlowState::Failed;
                self.alert = Some(e.user_message());
            }
        }
    }
}

/// Status update list for one project with its filter and create flow.
pub struct StatusBoard {
    service: Arc<StatusUpdateService>,
    project_id: ProjectId,
    filter: FrequencyFilter,
    updates: Vec<StatusUpdate>,
    pub flow: StatusUpdateFlow,
    alert: Option<String>,
}

impl StatusBoard {
    pub fn new(service: Arc<StatusUpdateService>, project_id: ProjectId) -> Self {
        Self {
            service,
            project_id,
            filter: FrequencyFilter::All,
            updates: Vec::new(),
            flow: StatusUpdateFlow::new(),
            alert: None,
        }
    }

    pub fn updates(&self) -> &[StatusUpdate] {
        &self.updates
    }

    pub fn filter(&self) -> FrequencyFilter {
        self.filter
    }

    pub fn alert(&self) -> Option<&str> {
        self.alert.as_deref()
    }

    pub fn dismiss_alert(&mut self) {
        self.alert = None;
    }

    /// Full reload from the backend; a failure leaves the list empty.
    pub async fn refresh(&mut self) -> AppResult<()> {
        match self.service.list(&self.project_id, self.filter).await {
            Ok(updates) => {
                self.updates = updates;
                Ok(())
            }
            Err(e) => {
                self.updates.clear();
                self.alert = Some(e.user_message());
                Err(e)
            }
        }
    }

    /// Each filter change is a new round trip, never a local filter.
    pub async fn set_filter(&mut self, filter: FrequencyFilter) -> AppResult<()> {
        if filter == self.filter {
            return Ok(());
        }
        self.filter = filter;
        self.refresh().await
    }

    pub async fn attach_photos(&mut self, paths: &[PathBuf]) -> Option<PhotoAttachReport> {
        let draft = self.flow.draft_mut()?;
        Some(self.service.attach_photo_files(draft, paths).await)
    }

    /// Submits the open draft. On success the modal closes and the list is
    /// reloaded in full.
    pub async fn submit(&mut self) -> AppResult<StatusUpdate> {
        let payload = self.flow.begin_submit(&self.project_id)?;
        let outcome = self.service.create(&payload).await;
        self.flow.finish_submit(&outcome);
        let created = outcome?;

        self.flow.close();
        if let Err(e) = self.refresh().await {
            tracing::warn!("Reload after create failed: {}", e);
        }
        Ok(created)
    }

    pub async fn delete(&mut self, id: &StatusUpdateId) -> AppResult<()> {
        if let Err(e) = self.service.delete(id).await {
            self.alert = Some(e.user_message());
            return Err(e);
        }
        self.refresh().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::media::JpegPhotoEncoder;
    use crate::ports::{MockStatusUpdateRepository, RepositoryError};
    use chrono::Utc;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn update(id: &str, title: &str, frequency: Frequency) -> StatusUpdate {
        StatusUpdate {
            id: id.into(),
            project_id: "p1".into(),
            title: title.to_string(),
            description: None,
            frequency,
            photos: vec![],
            overall_progress: 40.0,
            tasks_completed: 1,
            tasks_in_progress: 1,
            tasks_pending: 0,
            issues: None,
            next_steps: None,
            weather: None,
            is_public: false,
            selected_tasks: vec![],
            created_by: None,
            created_at: Utc::now(),
        }
    }

    fn created_from(payload: &NewStatusUpdate) -> StatusUpdate {
        let mut created = update("new", &payload.title, payload.frequency);
        created.photos = payload.photos.clone();
        created
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(width, height, Rgb([90, 90, 90])));
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn board(repo: MockStatusUpdateRepository) -> StatusBoard {
        let service = StatusUpdateService::new(Arc::new(repo), Arc::new(JpegPhotoEncoder::default()));
        StatusBoard::new(Arc::new(service), "p1".into())
    }

    #[tokio::test]
    async fn create_with_photos_closes_modal_and_reloads() {
        let mut repo = MockStatusUpdateRepository::new();
        repo.expect_create_status_update()
            .times(1)
            .withf(|payload| {
                payload.title == "Foundation poured"
                    && payload.frequency == Frequency::Daily
                    && payload.photos.len() == 2
                    && payload
                        .photos
                        .iter()
                        .all(|p| p.starts_with("data:image/jpeg;base64,"))
            })
            .returning(|payload| Ok(created_from(payload)));
        repo.expect_list_status_updates()
            .times(1)
            .returning(|_, _| Ok(vec![update("new", "Foundation poured", Frequency::Daily)]));

        let mut board = board(repo);
        board.flow.open();
        let report = board
            .service
            .attach_photo_bytes(
                board.flow.draft_mut().unwrap(),
                vec![
                    ("wide.png".to_string(), png(3000, 1500)),
                    ("small.png".to_string(), png(400, 300)),
                ],
            )
            .await;
        assert_eq!(report.added, 2);

        let draft = board.flow.draft().unwrap();
        assert!(draft.photos().iter().all(|p| p.width <= MAX_PHOTO_WIDTH));
        assert_eq!(draft.photos()[0].width, 1200);

        let draft = board.flow.draft_mut().unwrap();
        draft.title = "Foundation poured".to_string();
        draft.frequency = Frequency::Daily;

        let created = board.submit().await.unwrap();
        assert_eq!(created.photos.len(), 2);
        assert!(!board.flow.is_open());
        assert_eq!(board.updates()[0].title, "Foundation poured");
    }

    #[tokio::test]
    async fn failed_submit_keeps_draft_and_retry_succeeds() {
        let mut repo = MockStatusUpdateRepository::new();
        let attempts = AtomicUsize::new(0);
        repo.expect_create_status_update()
            .times(2)
            .withf(|payload| payload.title == "Slab cured")
            .returning(move |payload| {
                if attempts.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(RepositoryError::Network("offline".to_string()))
                } else {
                    Ok(created_from(payload))
                }
            });
        repo.expect_list_status_updates()
            .times(1)
            .returning(|_, _| Ok(vec![update("new", "Slab cured", Frequency::Weekly)]));

        let mut board = board(repo);
        board.flow.open();
        {
            let draft = board.flow.draft_mut().unwrap();
            draft.title = "Slab cured".to_string();
            draft.frequency = Frequency::Weekly;
        }

        tokio_test::assert_err!(board.submit().await);
        assert_eq!(board.flow.state(), FlowState::Failed);
        assert!(board.flow.is_open());
        assert_eq!(
            board.flow.alert(),
            Some("Could not reach the server. Check your connection and try again.")
        );
        assert_eq!(board.flow.draft().unwrap().title, "Slab cured");

        board.flow.dismiss_alert();
        assert_eq!(board.flow.state(), FlowState::Editing);

        let created = board.submit().await.unwrap();
        assert_eq!(created.title, "Slab cured");
        assert_eq!(board.flow.state(), FlowState::Idle);
        assert_eq!(board.updates().len(), 1);
    }

    #[tokio::test]
    async fn blank_title_never_reaches_backend() {
        let mut repo = MockStatusUpdateRepository::new();
        repo.expect_create_status_update().never();

        let mut board = board(repo);
        board.flow.open();
        let err = board.submit().await.unwrap_err();
        assert_eq!(err, AppError::Domain(DomainError::MissingField("title")));
        assert_eq!(board.flow.state(), FlowState::Editing);
        assert_eq!(board.flow.alert(), Some("Please enter a title."));
    }

    #[tokio::test]
    async fn filter_change_refetches() {
        let mut repo = MockStatusUpdateRepository::new();
        repo.expect_list_status_updates()
            .withf(|_, filter| *filter == FrequencyFilter::Only(Frequency::Weekly))
            .times(1)
            .returning(|_, _| Ok(vec![update("w1", "Week 12", Frequency::Weekly)]));
        repo.expect_list_status_updates()
            .withf(|_, filter| *filter == FrequencyFilter::All)
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    update("w1", "Week 12", Frequency::Weekly),
                    update("d1", "Tuesday", Frequency::Daily),
                ])
            });

        let mut board = board(repo);
        board
            .set_filter(FrequencyFilter::Only(Frequency::Weekly))
            .await
            .unwrap();
        assert_eq!(board.updates().len(), 1);

        // same filter again is not a change
        board
            .set_filter(FrequencyFilter::Only(Frequency::Weekly))
            .await
            .unwrap();

        board.set_filter(FrequencyFilter::All).await.unwrap();
        assert_eq!(board.updates().len(), 2);
    }

    #[tokio::test]
    async fn failed_load_leaves_list_empty() {
        let mut repo = MockStatusUpdateRepository::new();
        repo.expect_list_status_updates().returning(|_, _| {
            Err(RepositoryError::Api {
                status: 403,
                detail: Some("Not a project member".to_string()),
            })
        });

        let mut board = board(repo);
        tokio_test::assert_err!(board.refresh().await);
        assert!(board.updates().is_empty());
        assert_eq!(board.alert(), Some("Not a project member"));
    }

    #[tokio::test]
    async fn delete_reloads_list() {
        let mut repo = MockStatusUpdateRepository::new();
        repo.expect_delete_status_update()
            .withf(|id| id.0 == "d1")
            .times(1)
            .returning(|_| Ok(()));
        repo.expect_list_status_updates()
            .times(1)
            .returning(|_, _| Ok(vec![]));

        let mut board = board(repo);
        board.delete(&"d1".into()).await.unwrap();
        assert!(board.updates().is_empty());
    }

    #[tokio::test]
    async fn photo_cap_applies_after_encoding() {
        let repo = MockStatusUpdateRepository::new();
        let board = board(repo);
        let mut draft = StatusUpdateDraft::new();

        let images = (0..12).map(|i| (format!("{i}.png"), png(64, 48))).collect();
        let report = board.service.attach_photo_bytes(&mut draft, images).await;

        assert_eq!(report.added, MAX_PHOTOS);
        assert_eq!(report.dropped, 2);
        assert_eq!(draft.photos().len(), MAX_PHOTOS);
    }

    #[tokio::test]
    async fn unreadable_files_are_reported() {
        let repo = MockStatusUpdateRepository::new();
        let board = board(repo);
        let mut draft = StatusUpdateDraft::new();

        let report = board
            .service
            .attach_photo_files(&mut draft, &[PathBuf::from("/definitely/not/here.jpg")])
            .await;
        assert_eq!(report.added, 0);
        assert!(matches!(report.failed[0].1, PhotoError::Read(_)));
    }
}
