use color_eyre::Result;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use super::event::{AppEvent, EventHandler};
use crate::application::{
    AppError, ChatPoller, ChatWatch, ExpandState, FlowState, GanttView, KanbanView,
    OverviewSection, PollerState, ProjectOverview, ProjectService, StatusBoard,
    StatusUpdateService, TreeView,
};
use crate::domain::{ChatMessage, ProjectId, StatusUpdate, StatusUpdateDraft, TaskStatus};
use ratatui::{
    prelude::*,
    widgets::{Block, BorderType, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};

const BAR_WIDTH: usize = 30;
const MAX_CHAT_MESSAGES: usize = 500;
const TASK_ROWS: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Tree,
    Gantt,
    Kanban,
    Updates,
    Chat,
}

impl View {
    const ALL: [View; 5] = [View::Tree, View::Gantt, View::Kanban, View::Updates, View::Chat];

    fn title(&self) -> &'static str {
        match self {
            View::Tree => "Tree",
            View::Gantt => "Gantt",
            View::Kanban => "Kanban",
            View::Updates => "Status Updates",
            View::Chat => "Chat",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|v| v == self).unwrap_or(0)
    }

    fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn previous(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AppMode {
    Main,
    Help,
    Compose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComposeField {
    Title,
    Description,
    Frequency,
    Issues,
    NextSteps,
    Weather,
    Public,
    Tasks,
    Photo,
}

impl ComposeField {
    const ALL: [ComposeField; 9] = [
        ComposeField::Title,
        ComposeField::Description,
        ComposeField::Frequency,
        ComposeField::Issues,
        ComposeField::NextSteps,
        ComposeField::Weather,
        ComposeField::Public,
        ComposeField::Tasks,
        ComposeField::Photo,
    ];

    fn label(&self) -> &'static str {
        match self {
            ComposeField::Title => "Title",
            ComposeField::Description => "Description",
            ComposeField::Frequency => "Frequency",
            ComposeField::Issues => "Issues",
            ComposeField::NextSteps => "Next steps",
            ComposeField::Weather => "Weather",
            ComposeField::Public => "Public",
            ComposeField::Tasks => "Tasks",
            ComposeField::Photo => "Photo path",
        }
    }

    fn index(&self) -> usize {
        Self::ALL.iter().position(|f| f == self).unwrap_or(0)
    }

    fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    fn previous(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

/// The free-text draft field edited by `field`, if it is one.
fn draft_text(draft: &mut StatusUpdateDraft, field: ComposeField) -> Option<&mut String> {
    match field {
        ComposeField::Title => Some(&mut draft.title),
        ComposeField::Description => Some(&mut draft.description),
        ComposeField::Issues => Some(&mut draft.issues),
        ComposeField::NextSteps => Some(&mut draft.next_steps),
        ComposeField::Weather => Some(&mut draft.weather),
        _ => None,
    }
}

pub struct App {
    projects: Arc<ProjectService>,
    project_id: ProjectId,
    board: StatusBoard,
    chat_poller: Option<ChatPoller>,
    chat_watch: Option<ChatWatch>,
    chat_rx: Option<mpsc::Receiver<Vec<ChatMessage>>>,

    // UI state
    mode: AppMode,
    view: View,
    overview: ProjectOverview,
    expand: ExpandState,
    selected_milestone: usize,
    selected_update: usize,
    messages: Vec<ChatMessage>,

    // Compose modal
    compose_field: ComposeField,
    task_cursor: usize,
    photo_input: String,
    notice: Option<String>,

    error_message: Option<String>,
}

impl App {
    pub fn new(
        projects: Arc<ProjectService>,
        status_updates: Arc<StatusUpdateService>,
        chat_poller: ChatPoller,
        project_id: ProjectId,
    ) -> Self {
        Self {
            board: StatusBoard::new(status_updates, project_id.clone()),
            projects,
            project_id,
            chat_poller: Some(chat_poller),
            chat_watch: None,
            chat_rx: None,
            mode: AppMode::Main,
            view: View::Tree,
            overview: ProjectOverview::default(),
            expand: ExpandState::default(),
            selected_milestone: 0,
            selected_update: 0,
            messages: Vec::new(),
            compose_field: ComposeField::Title,
            task_cursor: 0,
            photo_input: String::new(),
            notice: None,
            error_message: None,
        }
    }

    pub async fn initialize(&mut self) -> Result<()> {
        self.load_overview(true).await;
        if let Err(e) = self.board.refresh().await {
            tracing::warn!("Failed to load status updates: {}", e);
        }

        if let Some(poller) = self.chat_poller.take() {
            let (tx, rx) = mpsc::channel(32);
            self.chat_watch = Some(poller.start(tx));
            self.chat_rx = Some(rx);
        }
        Ok(())
    }

    pub async fn shutdown(&mut self) {
        if let Some(watch) = self.chat_watch.take() {
            watch.stop().await;
        }
    }

    async fn load_overview(&mut self, use_cache: bool) {
        self.error_message = None;

        self.overview = self.projects.load_overview(&self.project_id, use_cache).await;
        if let Some((section, error)) = self.overview.failures.first() {
            let section = match section {
                OverviewSection::Project => "project",
                OverviewSection::Milestones => "milestones",
                OverviewSection::Tasks => "tasks",
            };
            self.error_message = Some(format!(
                "Could not load {}: {}",
                section,
                error.user_message()
            ));
        }

        let milestone_count = self.overview.milestones.len();
        if self.selected_milestone >= milestone_count {
            self.selected_milestone = milestone_count.saturating_sub(1);
        }
    }

    async fn refresh(&mut self) {
        self.projects.invalidate(&self.project_id).await;
        self.load_overview(false).await;
        if let Err(e) = self.board.refresh().await {
            tracing::warn!("Failed to reload status updates: {}", e);
        }
        self.clamp_update_selection();
    }

    /// Moves chat batches from the poller into the view.
    pub fn drain_chat(&mut self) {
        let Some(rx) = self.chat_rx.as_mut() else {
            return;
        };
        while let Ok(batch) = rx.try_recv() {
            self.messages.extend(batch);
        }
        let excess = self.messages.len().saturating_sub(MAX_CHAT_MESSAGES);
        self.messages.drain(..excess);
    }

    fn clamp_update_selection(&mut self) {
        let len = self.board.updates().len();
        if self.selected_update >= len {
            self.selected_update = len.saturating_sub(1);
        }
    }

    fn has_alert(&self) -> bool {
        self.board.alert().is_some() || self.board.flow.alert().is_some()
    }

    fn dismiss_alerts(&mut self) {
        self.board.dismiss_alert();
        self.board.flow.dismiss_alert();
    }

    pub async fn handle_event(&mut self, event: AppEvent) -> Result<bool> {
        if event == AppEvent::Quit {
            return Ok(true);
        }
        if event == AppEvent::Tick {
            return Ok(false);
        }

        // a blocking alert swallows the next key
        if self.has_alert() {
            self.dismiss_alerts();
            return Ok(false);
        }

        match self.mode {
            AppMode::Help => {
                self.mode = AppMode::Main;
                Ok(false)
            }
            AppMode::Compose => {
                self.handle_compose_event(event).await;
                Ok(false)
            }
            AppMode::Main => self.handle_main_event(event).await,
        }
    }

    async fn handle_main_event(&mut self, event: AppEvent) -> Result<bool> {
        match event {
            AppEvent::NextView => self.view = self.view.next(),
            AppEvent::PreviousView => self.view = self.view.previous(),
            AppEvent::Up => self.move_selection(-1),
            AppEvent::Down => self.move_selection(1),
            AppEvent::Escape => self.error_message = None,
            AppEvent::Enter if self.view == View::Tree => self.toggle_selected_milestone(),
            AppEvent::Character(c) => match c {
                'q' => return Ok(true),
                '?' => self.mode = AppMode::Help,
                'r' => self.refresh().await,
                'j' => self.move_selection(1),
                'k' => self.move_selection(-1),
                '1'..='5' => {
                    let index = c as usize - '1' as usize;
                    self.view = View::ALL[index];
                }
                'e' if self.view == View::Tree => {
                    self.expand.set_all(&self.overview.milestones, true);
                }
                'c' if self.view == View::Tree => {
                    self.expand.set_all(&self.overview.milestones, false);
                }
                'f' if self.view == View::Updates => {
                    let filter = self.board.filter().next();
                    if let Err(e) = self.board.set_filter(filter).await {
                        tracing::warn!("Failed to load {} status updates: {}", filter, e);
                    }
                    self.selected_update = 0;
                }
                'n' if self.view == View::Updates => self.open_compose(),
                'd' if self.view == View::Updates => self.delete_selected_update().await,
                _ => {}
            },
            _ => {}
        }
        Ok(false)
    }

    async fn handle_compose_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Escape => {
                self.board.flow.close();
                self.mode = AppMode::Main;
            }
            AppEvent::NextView => self.compose_field = self.compose_field.next(),
            AppEvent::PreviousView => self.compose_field = self.compose_field.previous(),
            AppEvent::Up | AppEvent::Down if self.compose_field == ComposeField::Tasks => {
                let len = self.overview.tasks.len();
                if len > 0 {
                    let delta = if event == AppEvent::Up { -1 } else { 1 };
                    self.task_cursor = self.task_cursor.saturating_add_signed(delta).min(len - 1);
                }
            }
            AppEvent::Down => self.compose_field = self.compose_field.next(),
            AppEvent::Up => self.compose_field = self.compose_field.previous(),
            AppEvent::Enter => {
                if self.compose_field == ComposeField::Photo && !self.photo_input.trim().is_empty() {
                    self.attach_photo().await;
                } else {
                    self.submit_compose().await;
                }
            }
            AppEvent::Character(' ')
                if matches!(
                    self.compose_field,
                    ComposeField::Frequency | ComposeField::Public | ComposeField::Tasks
                ) =>
            {
                self.toggle_compose_field();
            }
            AppEvent::Character(c) => self.push_compose_char(c),
            AppEvent::Backspace => match self.compose_field {
                ComposeField::Photo if self.photo_input.is_empty() => self.remove_last_photo(),
                ComposeField::Photo => {
                    self.photo_input.pop();
                }
                field => {
                    if let Some(text) = self.board.flow.draft_mut().and_then(|d| draft_text(d, field)) {
                        text.pop();
                    }
                }
            },
            _ => {}
        }
    }

    fn push_compose_char(&mut self, c: char) {
        let field = self.compose_field;
        if field == ComposeField::Photo {
            self.photo_input.push(c);
        } else if let Some(text) = self.board.flow.draft_mut().and_then(|d| draft_text(d, field)) {
            text.push(c);
        }
    }

    fn toggle_compose_field(&mut self) {
        let task_id = self.overview.tasks.get(self.task_cursor).map(|t| t.id.clone());
        let Some(draft) = self.board.flow.draft_mut() else {
            return;
        };
        match self.compose_field {
            ComposeField::Frequency => draft.frequency = draft.frequency.next(),
            ComposeField::Public => draft.is_public = !draft.is_public,
            ComposeField::Tasks => {
                if let Some(id) = task_id {
                    draft.toggle_task(&id);
                }
            }
            _ => {}
        }
    }

    fn remove_last_photo(&mut self) {
        let Some(draft) = self.board.flow.draft_mut() else {
            return;
        };
        let last = draft.photos().len().saturating_sub(1);
        self.notice = Some(match draft.remove_photo(last) {
            Ok(_) => format!("Removed photo, {} left", draft.photos().len()),
            Err(e) => AppError::from(e).user_message(),
        });
    }

    fn open_compose(&mut self) {
        let filter = self.board.filter();
        self.board.flow.open();
        if let (Some(draft), Some(frequency)) = (self.board.flow.draft_mut(), filter.frequency()) {
            draft.frequency = frequency;
        }
        self.compose_field = ComposeField::Title;
        self.task_cursor = 0;
        self.photo_input.clear();
        self.notice = None;
        self.mode = AppMode::Compose;
    }

    async fn attach_photo(&mut self) {
        let path = PathBuf::from(self.photo_input.trim());
        let Some(report) = self.board.attach_photos(&[path]).await else {
            return;
        };

        self.notice = Some(if let Some((name, error)) = report.failed.first() {
            format!("Could not attach {}: {}", name, error)
        } else if report.dropped > 0 {
            "Photo limit reached".to_string()
        } else {
            format!("Attached {} photo(s)", report.added)
        });
        self.photo_input.clear();
    }

    async fn submit_compose(&mut self) {
        match self.board.submit().await {
            Ok(update) => {
                tracing::info!("Created status update {}", update.id);
                self.mode = AppMode::Main;
                self.selected_update = 0;
            }
            Err(e) => tracing::warn!("Status update not created: {}", e),
        }
    }

    async fn delete_selected_update(&mut self) {
        let Some(id) = self
            .board
            .updates()
            .get(self.selected_update)
            .map(|u| u.id.clone())
        else {
            return;
        };

        if let Err(e) = self.board.delete(&id).await {
            tracing::warn!("Failed to delete status update {}: {}", id, e);
        }
        self.clamp_update_selection();
    }

    fn move_selection(&mut self, delta: isize) {
        let (selected, len) = match self.view {
            View::Tree => (&mut self.selected_milestone, self.overview.milestones.len()),
            View::Updates => (&mut self.selected_update, self.board.updates().len()),
            _ => return,
        };
        if len == 0 {
            return;
        }
        *selected = selected.saturating_add_signed(delta).min(len - 1);
    }

    fn toggle_selected_milestone(&mut self) {
        if let Some(milestone) = self.overview.milestones.get(self.selected_milestone) {
            let id = milestone.id.clone();
            self.expand.toggle(&id, self.selected_milestone);
        }
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Project header
                Constraint::Length(3), // View tabs
                Constraint::Min(0),    // Active view
                Constraint::Length(1), // Status bar
            ])
            .split(frame.area());

        self.render_header(frame, chunks[0]);
        self.render_tabs(frame, chunks[1]);

        match self.view {
            View::Tree => self.render_tree(frame, chunks[2]),
            View::Gantt => self.render_gantt(frame, chunks[2]),
            View::Kanban => self.render_kanban(frame, chunks[2]),
            View::Updates => self.render_updates(frame, chunks[2]),
            View::Chat => self.render_chat(frame, chunks[2]),
        }

        self.render_status_bar(frame, chunks[3]);

        match self.mode {
            AppMode::Help => self.render_help(frame),
            AppMode::Compose if self.board.flow.is_open() => self.render_compose(frame),
            _ => {}
        }

        if let Some(alert) = self.board.flow.alert().or(self.board.alert()) {
            Self::render_alert(frame, alert);
        }
    }

    fn render_header(&self, frame: &mut Frame, area: Rect) {
        let stats = self.overview.stats();
        let name = self
            .overview
            .project
            .as_ref()
            .map(|p| format!("{} ({})", p.name, p.status.label()))
            .unwrap_or_else(|| self.project_id.to_string());

        let spans = vec![
            Span::styled(name, Style::default().fg(Color::White).bold()),
            Span::raw("  "),
            Span::styled(
                format!(
                    "{:.0}% complete | {}/{} tasks done | cost {:.0} of {:.0}",
                    stats.progress_percentage,
                    stats.completed_tasks,
                    stats.total_tasks,
                    stats.costs.actual,
                    stats.costs.estimated
                ),
                Style::default().fg(Color::Gray),
            ),
        ];
        let paragraph = Paragraph::new(Line::from(spans)).block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(Color::Gray)),
        );
        frame.render_widget(paragraph, area);
    }

    fn render_tabs(&self, frame: &mut Frame, area: Rect) {
        let titles: Vec<Line> = View::ALL
            .iter()
            .enumerate()
            .map(|(i, v)| Line::from(format!("{} {}", i + 1, v.title())))
            .collect();

        let tabs = Tabs::new(titles)
            .block(Block::default().borders(Borders::ALL).border_type(BorderType::Rounded))
            .select(self.view.index())
            .highlight_style(Style::default().fg(Color::Green).bold());
        frame.render_widget(tabs, area);
    }

    fn view_block(title: String) -> Block<'static> {
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(Color::Green))
    }

    fn render_placeholder(frame: &mut Frame, area: Rect, block: Block, message: &str, color: Color) {
        let paragraph = Paragraph::new(message.to_string())
            .block(block)
            .style(Style::default().fg(color))
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, area);
    }

    fn render_tree(&self, frame: &mut Frame, area: Rect) {
        let tree: TreeView = self.overview.tree(&self.expand);
        let block = Self::view_block(format!("Milestones ({})", tree.nodes.len()));

        if let Some(error) = self.error_message.as_deref().filter(|_| tree.nodes.is_empty()) {
            Self::render_placeholder(frame, area, block, error, Color::Red);
            return;
        }
        if tree.nodes.is_empty() && tree.unassigned.is_empty() {
            Self::render_placeholder(frame, area, block, "No milestones yet", Color::Gray);
            return;
        }

        let mut items = Vec::new();
        let mut selected_row = 0;
        for (position, node) in tree.nodes.iter().enumerate() {
            if position == self.selected_milestone {
                selected_row = items.len();
            }
            let marker = if node.expanded { "▾" } else { "▸" };
            let mut spans = vec![
                Span::raw(format!("{marker} ")),
                Span::styled(
                    node.milestone.name.clone(),
                    Style::default().fg(hex_color(node.milestone.status.color())),
                ),
                Span::styled(
                    format!(
                        "  {}/{} done  {:.0}%",
                        node.rollup.completed_task_count,
                        node.rollup.task_count,
                        node.rollup.completion_percentage
                    ),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(
                    format!("  due {}", node.milestone.due_date_display()),
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            if node.milestone.is_over_budget() {
                spans.push(Span::styled("  over budget", Style::default().fg(Color::Red)));
            }
            if node.rollup.stale {
                spans.push(Span::styled("  (out of date)", Style::default().fg(Color::Yellow)));
            }
            items.push(ListItem::new(Line::from(spans)));

            if node.expanded {
                for task in &node.tasks {
                    items.push(task_item(task.title.as_str(), &task.status, &task.assignee_display()));
                }
            }
        }

        for (title, tasks) in [("Unassigned", &tree.unassigned), ("Unknown milestone", &tree.orphaned)] {
            if tasks.is_empty() {
                continue;
            }
            items.push(ListItem::new(Line::styled(
                format!("  {title} ({})", tasks.len()),
                Style::default().fg(Color::DarkGray),
            )));
            for task in tasks {
                items.push(task_item(task.title.as_str(), &task.status, &task.assignee_display()));
            }
        }

        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::DarkGray));
        let mut state = ListState::default().with_selected(Some(selected_row));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_gantt(&self, frame: &mut Frame, area: Rect) {
        let gantt: GanttView = self.overview.gantt();
        let block = Self::view_block(format!(
            "Schedule | estimated {:.0} | actual {:.0} | variance {:.0}",
            gantt.cost_summary.estimated, gantt.cost_summary.actual, gantt.cost_summary.variance
        ));

        if gantt.rows.is_empty() {
            Self::render_placeholder(frame, area, block, "No milestones to chart", Color::Gray);
            return;
        }

        let mut lines = Vec::new();
        for row in &gantt.rows {
            lines.push(gantt_line(&row.label, row.progress_width, row.color, true));
            for child in &row.children {
                lines.push(gantt_line(&child.label, child.progress_width, child.color, false));
            }
        }

        let paragraph = Paragraph::new(lines).block(block);
        frame.render_widget(paragraph, area);
    }

    fn render_kanban(&self, frame: &mut Frame, area: Rect) {
        let kanban: KanbanView = self.overview.kanban();
        if kanban.total() == 0 {
            let block = Self::view_block("Board".to_string());
            Self::render_placeholder(frame, area, block, "No tasks on the board", Color::Gray);
            return;
        }

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(area);

        for (column, area) in kanban.columns.iter().zip(columns.iter()) {
            let (_, color) = column.status.status_display();
            let block = Block::default()
                .title(format!("{} ({})", column.title, column.tasks.len()))
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .border_style(Style::default().fg(hex_color(color)));

            let items: Vec<ListItem> = column
                .tasks
                .iter()
                .map(|task| {
                    ListItem::new(vec![
                        Line::from(task.title.clone()),
                        Line::styled(
                            format!("  {} | {}", task.priority.as_str(), task.assignee_display()),
                            Style::default().fg(Color::DarkGray),
                        ),
                    ])
                })
                .collect();
            frame.render_widget(List::new(items).block(block), *area);
        }
    }

    fn render_updates(&self, frame: &mut Frame, area: Rect) {
        let updates = self.board.updates();
        let block = Self::view_block(format!(
            "Status Updates [{}] ({})",
            self.board.filter(),
            updates.len()
        ));

        if updates.is_empty() {
            Self::render_placeholder(frame, area, block, "No status updates", Color::Gray);
            return;
        }

        let items: Vec<ListItem> = updates.iter().map(update_item).collect();
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().bg(Color::DarkGray));
        let mut state = ListState::default().with_selected(Some(self.selected_update));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn render_chat(&self, frame: &mut Frame, area: Rect) {
        let state = match self.chat_watch.as_ref().map(|w| w.state()) {
            Some(PollerState::Polling {
                consecutive_failures: 0,
            }) => "live".to_string(),
            Some(PollerState::Polling {
                consecutive_failures,
            }) => format!("retrying ({consecutive_failures} failed)"),
            _ => "disconnected".to_string(),
        };
        let block = Self::view_block(format!("Chat ({state})"));

        if self.messages.is_empty() {
            Self::render_placeholder(frame, area, block, "No messages yet", Color::Gray);
            return;
        }

        // newest at the bottom, keep the tail visible
        let visible = area.height.saturating_sub(2) as usize;
        let skip = self.messages.len().saturating_sub(visible);
        let lines: Vec<Line> = self
            .messages
            .iter()
            .skip(skip)
            .map(|m| {
                Line::from(vec![
                    Span::styled(
                        format!("[{}] ", m.time_since_created()),
                        Style::default().fg(Color::DarkGray),
                    ),
                    Span::styled(
                        format!("{}: ", m.sender_name()),
                        Style::default().fg(Color::Cyan),
                    ),
                    Span::raw(m.content.clone()),
                ])
            })
            .collect();

        frame.render_widget(Paragraph::new(lines).block(block), area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        let help_text = match (&self.mode, self.view) {
            (AppMode::Compose, _) => "Tab: next field | Space: toggle | Backspace: remove photo | Enter: submit / attach photo | Esc: discard",
            (_, View::Tree) => "j/k: select | Enter: expand | e/c: expand/collapse all | Tab: next view | r: refresh | q: quit | ?: help",
            (_, View::Updates) => "j/k: select | f: filter | n: new | d: delete | Tab: next view | r: refresh | q: quit",
            _ => "Tab: next view | 1-5: jump to view | r: refresh | q: quit | ?: help",
        };

        let paragraph = Paragraph::new(help_text).style(Style::default().fg(Color::DarkGray));
        frame.render_widget(paragraph, area);
    }

    fn render_compose(&self, frame: &mut Frame) {
        let Some(draft) = self.board.flow.draft() else {
            return;
        };
        let popup_area = Self::centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, popup_area);

        let label = |field: ComposeField| {
            let style = if field == self.compose_field {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::Gray)
            };
            Span::styled(format!("{}: ", field.label()), style)
        };
        let text_line = |field: ComposeField, value: &str| {
            Line::from(vec![label(field), Span::raw(value.to_string())])
        };

        let mut lines = vec![
            text_line(ComposeField::Title, &draft.title),
            text_line(ComposeField::Description, &draft.description),
            text_line(ComposeField::Frequency, draft.frequency.as_str()),
            text_line(ComposeField::Issues, &draft.issues),
            text_line(ComposeField::NextSteps, &draft.next_steps),
            text_line(ComposeField::Weather, &draft.weather),
            text_line(ComposeField::Public, if draft.is_public { "yes" } else { "no" }),
            Line::from(vec![
                label(ComposeField::Tasks),
                Span::styled(
                    format!("{} selected", draft.selected_tasks.len()),
                    Style::default().fg(Color::DarkGray),
                ),
            ]),
        ];

        // scroll the task window so the cursor stays visible
        let first = self.task_cursor.saturating_sub(TASK_ROWS - 1);
        for (index, task) in self.overview.tasks.iter().enumerate().skip(first).take(TASK_ROWS) {
            let marker = if draft.selected_tasks.contains(&task.id) { "[x]" } else { "[ ]" };
            let style = if self.compose_field == ComposeField::Tasks && index == self.task_cursor {
                Style::default().bg(Color::DarkGray)
            } else {
                Style::default()
            };
            lines.push(Line::styled(format!("  {marker} {}", task.title), style));
        }

        lines.push(Line::from(vec![
            label(ComposeField::Photo),
            Span::raw(self.photo_input.clone()),
        ]));
        lines.push(Line::from(""));
        lines.push(Line::styled(
            format!(
                "{} photo(s), {} slot(s) left",
                draft.photos().len(),
                draft.remaining_photo_slots()
            ),
            Style::default().fg(Color::DarkGray),
        ));
        if let Some(notice) = &self.notice {
            lines.push(Line::styled(notice.clone(), Style::default().fg(Color::Cyan)));
        }
        if self.board.flow.state() == FlowState::Submitting {
            lines.push(Line::styled("Submitting...", Style::default().fg(Color::Yellow)));
        }

        let paragraph = Paragraph::new(lines)
            .block(
                Block::default()
                    .title("New Status Update")
                    .borders(Borders::ALL)
                    .border_type(BorderType::Rounded)
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup_area);
    }

    fn render_alert(frame: &mut Frame, message: &str) {
        let popup_area = Self::centered_rect(50, 20, frame.area());
        frame.render_widget(Clear, popup_area);

        let paragraph = Paragraph::new(format!("{message}\n\nPress any key to continue"))
            .block(
                Block::default()
                    .title("Error")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(Color::Red)),
            )
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup_area);
    }

    fn render_help(&self, frame: &mut Frame) {
        let popup_area = Self::centered_rect(60, 70, frame.area());

        frame.render_widget(Clear, popup_area);

        let help_text = [
            "SiteTrack Help",
            "",
            "Views:",
            "  Tab/Shift+Tab  - Next/previous view",
            "  1-5            - Jump to Tree, Gantt, Kanban, Status Updates, Chat",
            "",
            "Tree:",
            "  j/k or ↑/↓     - Select milestone",
            "  Enter          - Expand/collapse milestone",
            "  e / c          - Expand/collapse all",
            "",
            "Status Updates:",
            "  f              - Cycle frequency filter (all, daily, weekly, monthly)",
            "  n              - New status update",
            "  d              - Delete selected update",
            "",
            "New status update:",
            "  Tab/Shift+Tab  - Next/previous field",
            "  Space          - Cycle frequency, toggle public or the task under the cursor",
            "  ↑/↓            - Move the task cursor (Tasks field)",
            "  Backspace      - Remove the last photo when the path is empty",
            "  Enter          - Attach the photo path, or submit",
            "  Esc            - Discard draft",
            "",
            "General:",
            "  r              - Refresh from server",
            "  ?              - Show this help",
            "  q / Ctrl+C     - Quit",
            "",
            "Press any key to close this help",
        ]
        .join("\n");

        let paragraph = Paragraph::new(help_text)
            .block(Block::default().title("Help").borders(Borders::ALL))
            .wrap(Wrap { trim: false });

        frame.render_widget(paragraph, popup_area);
    }

    fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
        let popup_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Percentage((100 - percent_y) / 2),
                Constraint::Percentage(percent_y),
                Constraint::Percentage((100 - percent_y) / 2),
            ])
            .split(r);

        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage((100 - percent_x) / 2),
                Constraint::Percentage(percent_x),
                Constraint::Percentage((100 - percent_x) / 2),
            ])
            .split(popup_layout[1])[1]
    }
}

fn task_item(title: &str, status: &TaskStatus, assignees: &str) -> ListItem<'static> {
    let (label, color) = status.status_display();
    ListItem::new(Line::from(vec![
        Span::raw("    "),
        Span::styled("● ", Style::default().fg(hex_color(color))),
        Span::raw(title.to_string()),
        Span::styled(
            format!("  {label} | {assignees}"),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
}

fn update_item(update: &StatusUpdate) -> ListItem<'static> {
    let mut lines = vec![Line::from(vec![
        Span::styled(
            format!("{} ", update.created_at.format("%Y-%m-%d")),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("[{}] ", update.frequency),
            Style::default().fg(Color::Cyan),
        ),
        Span::raw(update.title.clone()),
        Span::styled(
            format!(
                "  {:.0}% | {} done, {} in progress, {} pending | {} photo(s)",
                update.overall_progress,
                update.tasks_completed,
                update.tasks_in_progress,
                update.tasks_pending,
                update.photos.len()
            ),
            Style::default().fg(Color::Gray),
        ),
    ])];
    if let Some(issues) = &update.issues {
        lines.push(Line::styled(
            format!("    Issues: {issues}"),
            Style::default().fg(Color::LightRed),
        ));
    }
    ListItem::new(lines)
}

fn gantt_line(label: &str, progress: f64, color: &str, milestone: bool) -> Line<'static> {
    let filled = ((progress / 100.0) * BAR_WIDTH as f64).round() as usize;
    let filled = filled.min(BAR_WIDTH);
    let (indent, style) = if milestone {
        ("", Style::default().fg(Color::White).bold())
    } else {
        ("  ", Style::default().fg(Color::Gray))
    };

    Line::from(vec![
        Span::styled(format!("{indent}{label:<28.28} "), style),
        Span::styled("█".repeat(filled), Style::default().fg(hex_color(color))),
        Span::styled(
            "░".repeat(BAR_WIDTH - filled),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(format!(" {progress:>5.1}%")),
    ])
}

/// Parse hex color string to RGB values
fn hex_to_rgb(hex: &str) -> Option<(u8, u8, u8)> {
    let hex = hex.trim_start_matches('#');
    if hex.len() != 6 {
        return None;
    }

    let r = u8::from_str_radix(&hex[0..2], 16).ok()?;
    let g = u8::from_str_radix(&hex[2..4], 16).ok()?;
    let b = u8::from_str_radix(&hex[4..6], 16).ok()?;

    Some((r, g, b))
}

fn hex_color(hex: &str) -> Color {
    hex_to_rgb(hex)
        .map(|(r, g, b)| Color::Rgb(r, g, b))
        .unwrap_or(Color::Gray)
}

pub async fn run_tui(mut app: App) -> Result<()> {
    // color-eyre is already initialized in main.rs

    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    app.initialize().await?;

    let mut event_handler = EventHandler::new();

    loop {
        app.drain_chat();
        terminal.draw(|frame| app.render(frame))?;

        let event = event_handler.next_event().await?;
        if app.handle_event(event).await? || event_handler.should_quit() {
            break;
        }
    }

    app.shutdown().await;

    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::cache::MokaCacheAdapter;
    use crate::adapters::media::JpegPhotoEncoder;
    use crate::application::aggregator::fixtures::task;
    use crate::domain::{Frequency, FrequencyFilter, Photo, Project, TaskId};
    use crate::ports::{
        MockChatRepository, MockProjectRepository, MockStatusUpdateRepository, RepositoryError,
    };
    use chrono::Utc;

    #[test]
    fn views_cycle_both_ways() {
        assert_eq!(View::Tree.next(), View::Gantt);
        assert_eq!(View::Chat.next(), View::Tree);
        assert_eq!(View::Tree.previous(), View::Chat);
    }

    #[test]
    fn hex_colors_map_to_rgb() {
        assert_eq!(hex_color("#10B981"), Color::Rgb(0x10, 0xB9, 0x81));
        assert_eq!(hex_color("teal"), Color::Gray);
    }

    #[test]
    fn gantt_bar_fills_proportionally() {
        let line = gantt_line("Foundation", 50.0, "#3B82F6", true);
        let filled: String = line.spans[1].content.to_string();
        assert_eq!(filled.chars().count(), BAR_WIDTH / 2);
    }

    fn app(status_repo: MockStatusUpdateRepository) -> App {
        app_with(MockProjectRepository::new(), status_repo)
    }

    fn app_with(project_repo: MockProjectRepository, status_repo: MockStatusUpdateRepository) -> App {
        let cache = Arc::new(MokaCacheAdapter::<ProjectId, Project>::new(60, 10));
        let projects = Arc::new(ProjectService::new(Arc::new(project_repo), cache));
        let updates = Arc::new(StatusUpdateService::new(
            Arc::new(status_repo),
            Arc::new(JpegPhotoEncoder::default()),
        ));
        let poller = ChatPoller::new(Arc::new(MockChatRepository::new()), "p1".into());
        App::new(projects, updates, poller, "p1".into())
    }

    fn listing_repo() -> MockStatusUpdateRepository {
        let mut repo = MockStatusUpdateRepository::new();
        repo.expect_list_status_updates()
            .returning(|_, _| Ok(vec![]));
        repo
    }

    async fn press(app: &mut App, events: &[AppEvent]) {
        for event in events {
            assert!(!app.handle_event(event.clone()).await.unwrap());
        }
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_event(AppEvent::Character(c)).await.unwrap();
        }
    }

    fn photo() -> Photo {
        Photo {
            data_uri: "data:image/jpeg;base64,AAAA".to_string(),
            width: 1,
            height: 1,
        }
    }

    #[tokio::test]
    async fn new_update_starts_with_the_filtered_frequency() {
        let mut app = app(listing_repo());
        app.board
            .set_filter(FrequencyFilter::Only(Frequency::Weekly))
            .await
            .unwrap();
        app.view = View::Updates;

        press(&mut app, &[AppEvent::Character('n')]).await;

        assert_eq!(app.mode, AppMode::Compose);
        assert_eq!(app.compose_field, ComposeField::Title);
        let draft = app.board.flow.draft().unwrap();
        assert_eq!(draft.frequency, Frequency::Weekly);
    }

    #[tokio::test]
    async fn compose_edits_every_draft_field() {
        let mut app = app(listing_repo());
        app.overview.tasks = vec![
            task("t1", TaskStatus::Pending, None),
            task("t2", TaskStatus::InProgress, None),
        ];
        app.view = View::Updates;
        press(&mut app, &[AppEvent::Character('n')]).await;

        type_text(&mut app, "Pour day").await;
        press(&mut app, &[AppEvent::NextView, AppEvent::NextView]).await;
        assert_eq!(app.compose_field, ComposeField::Frequency);
        press(&mut app, &[AppEvent::Character(' ')]).await;

        press(&mut app, &[AppEvent::NextView]).await;
        type_text(&mut app, "Rain delay").await;
        press(&mut app, &[AppEvent::NextView]).await;
        type_text(&mut app, "Cure").await;
        press(&mut app, &[AppEvent::NextView]).await;
        type_text(&mut app, "Wet").await;
        press(&mut app, &[AppEvent::Backspace]).await;

        press(&mut app, &[AppEvent::NextView, AppEvent::Character(' ')]).await;
        assert_eq!(app.compose_field, ComposeField::Public);

        press(
            &mut app,
            &[AppEvent::NextView, AppEvent::Down, AppEvent::Character(' ')],
        )
        .await;
        assert_eq!(app.compose_field, ComposeField::Tasks);
        assert_eq!(app.task_cursor, 1);

        let payload = app.board.flow.begin_submit(&"p1".into()).unwrap();
        assert_eq!(payload.title, "Pour day");
        assert_eq!(payload.frequency, Frequency::Weekly);
        assert_eq!(payload.issues.as_deref(), Some("Rain delay"));
        assert_eq!(payload.next_steps.as_deref(), Some("Cure"));
        assert_eq!(payload.weather.as_deref(), Some("We"));
        assert!(payload.is_public);
        assert_eq!(payload.selected_tasks, vec![TaskId::from("t2")]);
    }

    #[tokio::test]
    async fn backspace_on_empty_photo_path_removes_last_photo() {
        let mut app = app(listing_repo());
        app.view = View::Updates;
        press(&mut app, &[AppEvent::Character('n'), AppEvent::PreviousView]).await;
        assert_eq!(app.compose_field, ComposeField::Photo);

        app.board.flow.draft_mut().unwrap().add_photo(photo()).unwrap();
        press(&mut app, &[AppEvent::Backspace]).await;
        assert!(app.board.flow.draft().unwrap().photos().is_empty());
        assert_eq!(app.notice.as_deref(), Some("Removed photo, 0 left"));

        press(&mut app, &[AppEvent::Backspace]).await;
        assert!(app.notice.is_some());
        assert_ne!(app.notice.as_deref(), Some("Removed photo, 0 left"));
    }

    #[tokio::test]
    async fn chat_history_keeps_the_newest_messages() {
        let mut app = app(listing_repo());
        let (tx, rx) = mpsc::channel(4);
        app.chat_rx = Some(rx);

        let batch: Vec<ChatMessage> = (0..MAX_CHAT_MESSAGES + 20)
            .map(|i| ChatMessage {
                id: i.to_string().into(),
                project_id: "p1".into(),
                sender: None,
                content: format!("message {i}"),
                created_at: Utc::now(),
            })
            .collect();
        tx.send(batch).await.unwrap();

        app.drain_chat();
        assert_eq!(app.messages.len(), MAX_CHAT_MESSAGES);
        assert_eq!(app.messages[0].id, "20".into());
    }

    #[tokio::test]
    async fn failed_overview_section_is_reported_once_loaded() {
        let mut projects = MockProjectRepository::new();
        projects
            .expect_get_project()
            .returning(|_| Err(RepositoryError::Network("timeout".to_string())));
        projects.expect_list_milestones().returning(|_| Ok(vec![]));
        projects.expect_list_tasks().returning(|_| Ok(vec![]));

        let mut app = app_with(projects, listing_repo());
        app.load_overview(false).await;

        assert!(app.overview.project.is_none());
        let error = app.error_message.as_deref().unwrap();
        assert!(error.starts_with("Could not load project"));
    }

    #[test]
    fn compose_fields_cycle_both_ways() {
        assert_eq!(ComposeField::Title.next(), ComposeField::Description);
        assert_eq!(ComposeField::Photo.next(), ComposeField::Title);
        assert_eq!(ComposeField::Title.previous(), ComposeField::Photo);
    }
}
