use std::collections::HashSet;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::warn;

use crate::activity::ActivityLog;
use crate::config::{self, AppConfig};
use crate::event::KeyAction;
use crate::model::chat::ChatMessage;
use crate::model::work_item::{WorkItem, WorkItemType};
use crate::pipeline::reconcile::{RenderSink, ViewReconciler};
use crate::pipeline::{self, InstructionOutcome};
use crate::session::Session;
use crate::store::{fetch_snapshot, ItemQuery};

const HISTORY_ON_START: usize = 5;

#[derive(Debug, Clone)]
pub enum Action {
    Key(KeyAction),
    Tick,
    ProjectsLoaded(Vec<String>),
    SnapshotLoaded {
        project: String,
        query: ItemQuery,
        items: Vec<WorkItem>,
    },
    ItemsRendered(Vec<WorkItem>),
    FetchError(String),
    InstructionFinished {
        project: String,
        instruction: String,
        outcome: Result<InstructionOutcome, String>,
    },
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    ProjectSelection,
    Items,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Instruction,
    Search,
}

/// Delivers reconciled item lists back into the app's action queue.
#[derive(Clone)]
pub struct ActionSink(mpsc::UnboundedSender<Action>);

impl RenderSink for ActionSink {
    fn send(&self, items: Vec<WorkItem>) {
        let _ = self.0.send(Action::ItemsRendered(items));
    }
}

pub struct App {
    pub items: Vec<WorkItem>,
    pub selected_item: usize,
    pub view_mode: ViewMode,
    pub loading: bool,
    pub flash_message: Option<(String, Instant)>,
    pub should_quit: bool,
    pub action_tx: mpsc::UnboundedSender<Action>,
    pub projects: Vec<String>,
    pub selected_project: usize,
    pub project: Option<String>,
    pub recent_projects: Vec<String>,
    pub type_filter: Option<WorkItemType>,
    pub assignee_filter: Option<String>,
    pub search: String,
    pub input_active: bool,
    pub input_mode: InputMode,
    pub input_buffer: String,
    pub input_cursor: usize,
    pub chat_messages: Vec<ChatMessage>,
    pub waiting_for_response: bool,
    users: Vec<String>,
    refresh_secs: u64,
    last_refresh: Instant,
    rebase_next_render: bool,
    session: Session,
    reconciler: ViewReconciler<ActionSink>,
    activity: ActivityLog,
}

impl App {
    pub fn new(
        config: &AppConfig,
        session: Session,
        activity: ActivityLog,
        action_tx: mpsc::UnboundedSender<Action>,
    ) -> Self {
        let project = config.last_project.clone();
        let view_mode = if project.is_some() {
            ViewMode::Items
        } else {
            ViewMode::ProjectSelection
        };

        let mut chat_messages = Vec::new();
        let history = activity.read(Some(HISTORY_ON_START));
        if !history.is_empty() {
            let lines: Vec<String> = history
                .iter()
                .map(|entry| format!("[{}] {}", entry.project, entry.result.summary()))
                .collect();
            chat_messages.push(ChatMessage::system(format!(
                "Recent activity:\n{}",
                lines.join("\n")
            )));
        }

        Self {
            items: Vec::new(),
            selected_item: 0,
            view_mode,
            loading: true,
            flash_message: None,
            should_quit: false,
            action_tx: action_tx.clone(),
            projects: Vec::new(),
            selected_project: 0,
            project,
            recent_projects: config.recent_projects.clone(),
            type_filter: None,
            assignee_filter: None,
            search: String::new(),
            input_active: false,
            input_mode: InputMode::Instruction,
            input_buffer: String::new(),
            input_cursor: 0,
            chat_messages,
            waiting_for_response: false,
            users: config.azure.users.clone(),
            refresh_secs: config.pipeline.refresh_secs,
            last_refresh: Instant::now(),
            rebase_next_render: false,
            session,
            reconciler: ViewReconciler::new(ActionSink(action_tx)),
            activity,
        }
    }

    /// Kick off the first load for whichever view the app opened in.
    pub fn start(&mut self) {
        match self.view_mode {
            ViewMode::ProjectSelection => self.fetch_projects(),
            ViewMode::Items => self.refresh_items(),
        }
    }

    pub async fn update(&mut self, action: Action) {
        // Clear flash message after 3 seconds
        if let Some((_, t)) = &self.flash_message {
            if t.elapsed().as_secs() >= 3 {
                self.flash_message = None;
            }
        }

        match action {
            Action::Key(key) => self.handle_key(key),
            Action::Tick => self.handle_tick(),
            Action::ProjectsLoaded(projects) => {
                self.loading = false;
                self.projects = order_projects(projects, &self.recent_projects);
                self.selected_project = 0;
            }
            Action::SnapshotLoaded {
                project,
                query,
                items,
            } => {
                // Fetches for another project or an older filter are stale.
                if self.project.as_deref() != Some(project.as_str()) || query != self.query() {
                    return;
                }
                if std::mem::take(&mut self.rebase_next_render) {
                    self.reconciler
                        .mark_rendered(items.iter().map(|item| item.id).collect());
                }
                self.reconciler.render(items);
            }
            Action::ItemsRendered(items) => {
                self.items = items;
                self.loading = false;
                self.clamp_selection();
            }
            Action::FetchError(msg) => {
                self.loading = false;
                self.flash(format!("Fetch error: {msg}"));
            }
            Action::InstructionFinished {
                project,
                instruction,
                outcome,
            } => self.finish_instruction(project, instruction, outcome),
            Action::Quit => {
                self.should_quit = true;
            }
        }
    }

    fn handle_key(&mut self, key: KeyAction) {
        if self.input_active {
            self.handle_input_key(key);
            return;
        }
        match self.view_mode {
            ViewMode::ProjectSelection => self.handle_picker_key(key),
            ViewMode::Items => self.handle_items_key(key),
        }
    }

    fn handle_picker_key(&mut self, key: KeyAction) {
        match key {
            KeyAction::Up => {
                self.selected_project = self.selected_project.saturating_sub(1);
            }
            KeyAction::Down => {
                if self.selected_project + 1 < self.projects.len() {
                    self.selected_project += 1;
                }
            }
            KeyAction::Select => self.select_project(),
            KeyAction::Escape if self.project.is_some() => {
                self.view_mode = ViewMode::Items;
            }
            KeyAction::Char('r') => self.fetch_projects(),
            KeyAction::Char('q') => self.should_quit = true,
            _ => {}
        }
    }

    fn handle_items_key(&mut self, key: KeyAction) {
        match key {
            KeyAction::Up => {
                self.selected_item = self.selected_item.saturating_sub(1);
            }
            KeyAction::Down => {
                if self.selected_item + 1 < self.visible_items().len() {
                    self.selected_item += 1;
                }
            }
            KeyAction::Char(':') => self.open_input(InputMode::Instruction),
            KeyAction::Char('/') => {
                self.open_input(InputMode::Search);
                self.input_buffer = self.search.clone();
                self.input_cursor = self.input_buffer.chars().count();
            }
            KeyAction::Char('t') => self.cycle_type_filter(),
            KeyAction::Char('u') => self.cycle_assignee_filter(),
            KeyAction::Char('r') => self.refresh_items(),
            KeyAction::Char('p') => {
                self.view_mode = ViewMode::ProjectSelection;
                self.fetch_projects();
            }
            KeyAction::Escape => {
                self.search.clear();
                self.clamp_selection();
            }
            KeyAction::Char('q') => self.should_quit = true,
            _ => {}
        }
    }

    fn handle_input_key(&mut self, key: KeyAction) {
        match key {
            KeyAction::Char(c) => {
                let at = byte_index(&self.input_buffer, self.input_cursor);
                self.input_buffer.insert(at, c);
                self.input_cursor += 1;
            }
            KeyAction::Backspace => {
                if self.input_cursor > 0 {
                    self.input_cursor -= 1;
                    let at = byte_index(&self.input_buffer, self.input_cursor);
                    self.input_buffer.remove(at);
                }
            }
            KeyAction::Left => self.input_cursor = self.input_cursor.saturating_sub(1),
            KeyAction::Right => {
                self.input_cursor = (self.input_cursor + 1).min(self.input_buffer.chars().count());
            }
            KeyAction::Escape => {
                if self.input_mode == InputMode::Search {
                    self.search.clear();
                }
                self.close_input();
            }
            KeyAction::Select => {
                let text = std::mem::take(&mut self.input_buffer);
                let mode = self.input_mode;
                self.close_input();
                match mode {
                    InputMode::Instruction => self.submit_instruction(text),
                    InputMode::Search => self.search = text,
                }
            }
            KeyAction::Up | KeyAction::Down => {}
        }
        if self.input_active && self.input_mode == InputMode::Search {
            self.search = self.input_buffer.clone();
        }
        self.clamp_selection();
    }

    fn open_input(&mut self, mode: InputMode) {
        self.input_active = true;
        self.input_mode = mode;
        self.input_buffer.clear();
        self.input_cursor = 0;
    }

    fn close_input(&mut self) {
        self.input_active = false;
        self.input_buffer.clear();
        self.input_cursor = 0;
    }

    fn handle_tick(&mut self) {
        let due = self.refresh_secs > 0
            && self.last_refresh.elapsed().as_secs() >= self.refresh_secs;
        if due
            && self.view_mode == ViewMode::Items
            && !self.loading
            && !self.waiting_for_response
        {
            self.refresh_items();
        }
    }

    fn cycle_type_filter(&mut self) {
        let types = &WorkItemType::FILTERABLE;
        self.type_filter = match &self.type_filter {
            None => Some(types[0].clone()),
            Some(current) => types
                .iter()
                .position(|t| t == current)
                .and_then(|i| types.get(i + 1))
                .cloned(),
        };
        let label = self
            .type_filter
            .as_ref()
            .map_or("All".to_string(), WorkItemType::to_string);
        self.flash(format!("Type: {label}"));
        self.clamp_selection();
    }

    fn cycle_assignee_filter(&mut self) {
        if self.users.is_empty() {
            self.flash("No users configured under [azure] users".to_string());
            return;
        }
        self.assignee_filter = match &self.assignee_filter {
            None => self.users.first().cloned(),
            Some(current) => self
                .users
                .iter()
                .position(|user| user == current)
                .and_then(|i| self.users.get(i + 1))
                .cloned(),
        };
        let label = self
            .assignee_filter
            .clone()
            .unwrap_or_else(|| "everyone".to_string());
        self.flash(format!("Assigned to: {label}"));
        self.rebase_next_render = true;
        self.refresh_items();
    }

    fn select_project(&mut self) {
        let Some(project) = self.projects.get(self.selected_project).cloned() else {
            return;
        };
        if let Err(err) = config::remember_project(&project) {
            warn!(error = %err, "could not save project choice");
        }
        self.recent_projects.retain(|known| *known != project);
        self.recent_projects.insert(0, project.clone());
        self.recent_projects.truncate(config::MAX_RECENT_PROJECTS);

        self.flash(format!("Project: {project}"));
        self.project = Some(project);
        self.view_mode = ViewMode::Items;
        self.items.clear();
        self.selected_item = 0;
        self.reconciler.reset();
        self.refresh_items();
    }

    pub fn fetch_projects(&mut self) {
        self.loading = true;
        let store = self.session.store.clone();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let action = match store.list_projects().await {
                Ok(projects) => Action::ProjectsLoaded(projects),
                Err(err) => Action::FetchError(err.to_string()),
            };
            let _ = tx.send(action);
        });
    }

    pub fn refresh_items(&mut self) {
        let Some(project) = self.project.clone() else {
            return;
        };
        self.loading = true;
        self.last_refresh = Instant::now();
        let store = self.session.store.clone();
        let query = self.query();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let action = match fetch_snapshot(store.as_ref(), &project, &query).await {
                Ok(items) => Action::SnapshotLoaded {
                    project,
                    query,
                    items,
                },
                Err(err) => Action::FetchError(err.to_string()),
            };
            let _ = tx.send(action);
        });
    }

    fn submit_instruction(&mut self, instruction: String) {
        let instruction = instruction.trim().to_string();
        if instruction.is_empty() {
            return;
        }
        let Some(project) = self.project.clone() else {
            self.flash("Pick a project first (p)".to_string());
            return;
        };
        if self.waiting_for_response {
            self.flash("Still working on the previous instruction".to_string());
            return;
        }

        self.chat_messages.push(ChatMessage::user(instruction.clone()));
        self.waiting_for_response = true;

        let session = self.session.clone();
        let query = self.query();
        let tx = self.action_tx.clone();
        tokio::spawn(async move {
            let outcome = pipeline::run_instruction(&session, &project, &instruction, &query)
                .await
                .map_err(|err| err.to_string());
            let _ = tx.send(Action::InstructionFinished {
                project,
                instruction,
                outcome,
            });
        });
    }

    fn finish_instruction(
        &mut self,
        project: String,
        instruction: String,
        outcome: Result<InstructionOutcome, String>,
    ) {
        self.waiting_for_response = false;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => {
                self.chat_messages
                    .push(ChatMessage::system(format!("Error: {err}")));
                return;
            }
        };

        if outcome.batch.is_none() {
            self.chat_messages.push(ChatMessage::assistant(
                "Nothing to change for that request.",
            ));
            return;
        }

        self.chat_messages
            .push(ChatMessage::assistant(describe_outcome(&outcome)));
        if let Err(err) = self.activity.append(&project, &instruction, &outcome.results) {
            warn!(error = %err, "could not write activity log");
        }

        if self.project.as_deref() != Some(project.as_str()) {
            return;
        }
        match outcome.snapshot {
            Some(items) => {
                self.last_refresh = Instant::now();
                self.reconciler.render(items);
            }
            None => self.refresh_items(),
        }
    }

    fn query(&self) -> ItemQuery {
        ItemQuery {
            item_type: None,
            assigned_to: self.assignee_filter.clone(),
        }
    }

    fn flash(&mut self, message: String) {
        self.flash_message = Some((message, Instant::now()));
    }

    /// Items after the local type filter and title search.
    pub fn visible_items(&self) -> Vec<&WorkItem> {
        let needle = self.search.trim().to_lowercase();
        self.items
            .iter()
            .filter(|item| {
                self.type_filter
                    .as_ref()
                    .map_or(true, |t| item.item_type.as_ref() == Some(t))
            })
            .filter(|item| needle.is_empty() || item.title.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn selected(&self) -> Option<&WorkItem> {
        self.visible_items().get(self.selected_item).copied()
    }

    pub fn new_item_count(&self) -> usize {
        self.items.iter().filter(|item| item.is_new).count()
    }

    fn clamp_selection(&mut self) {
        let len = self.visible_items().len();
        if self.selected_item >= len {
            self.selected_item = len.saturating_sub(1);
        }
    }
}

fn byte_index(text: &str, char_index: usize) -> usize {
    text.char_indices()
        .nth(char_index)
        .map_or(text.len(), |(i, _)| i)
}

/// Recent projects first, most recent on top, then the rest alphabetically.
fn order_projects(mut projects: Vec<String>, recent: &[String]) -> Vec<String> {
    projects.sort_by_key(|p| p.to_lowercase());
    let available: HashSet<&String> = projects.iter().collect();
    let mut ordered: Vec<String> = recent
        .iter()
        .filter(|p| available.contains(p))
        .cloned()
        .collect();
    ordered.extend(projects.iter().filter(|p| !recent.contains(p)).cloned());
    ordered
}

fn describe_outcome(outcome: &InstructionOutcome) -> String {
    let failures = outcome.failures();
    let applied = outcome.results.len() - failures;
    let mut lines = vec![format!(
        "{}: {applied} applied, {failures} failed",
        outcome.batch.action()
    )];
    if outcome.results.is_empty() {
        lines[0] = format!("{}: no matching items", outcome.batch.action());
    }
    for result in &outcome.results {
        let mark = if result.is_success() { "✓" } else { "✗" };
        lines.push(format!("{mark} {}", result.summary()));
        for warning in &result.warnings {
            lines.push(format!("  ! {warning}"));
        }
    }
    lines.join("\n")
}
