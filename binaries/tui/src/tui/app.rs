use std::{
    io::{self, Stdout},
    sync::mpsc::{self, Receiver, TryRecvError},
    time::{Duration, Instant},
};

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout},
};
use tower_interface::InterfaceError;
use tower_protocol::{
    AccessToken, ServiceInfo, Task, TasksQuery, Team, User, WorkflowComment, WorkflowEntry,
    WorkflowMetrics, WorkflowTag,
};
use tracing::{debug, info, warn};

use super::{
    bridge::{RequestRunner, ServiceBundle, ServiceCommand},
    command_executor::{AppCommand, CommandOutcome, StateUpdate, parse_command},
    live::{LiveConnection, LiveDispatcher, LiveReaction, LiveSignal},
    notification::{MessageLevel, NotificationCenter},
    theme::ThemeConfig,
    views::{self, ViewAction},
    workflow_list::{DEFAULT_PAGE_SIZE, FetchOutcome, WorkflowListState},
};

const TICK_RATE: Duration = Duration::from_millis(100);
pub const SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);
pub const TASKS_PAGE_LEN: u32 = 25;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewType {
    Welcome,
    Dashboard,
    Tasks,
    Account,
    Help,
}

impl ViewType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "welcome" => Some(ViewType::Welcome),
            "dashboard" | "home" | "workflows" => Some(ViewType::Dashboard),
            "tasks" => Some(ViewType::Tasks),
            "account" | "profile" => Some(ViewType::Account),
            "help" => Some(ViewType::Help),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ViewType::Welcome => "welcome",
            ViewType::Dashboard => "dashboard",
            ViewType::Tasks => "tasks",
            ViewType::Account => "account",
            ViewType::Help => "help",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Search,
    Command,
    ConfirmDelete {
        workflow_id: String,
        run_name: String,
    },
}

/// Fires once, `delay` after the last time it was armed.
#[derive(Debug, Clone)]
pub struct Debounce {
    delay: Duration,
    armed_at: Option<Instant>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            armed_at: None,
        }
    }

    pub fn arm(&mut self, now: Instant) {
        self.armed_at = Some(now);
    }

    pub fn cancel(&mut self) {
        self.armed_at = None;
    }

    pub fn is_armed(&self) -> bool {
        self.armed_at.is_some()
    }

    pub fn fire(&mut self, now: Instant) -> bool {
        match self.armed_at {
            Some(armed) if now.saturating_duration_since(armed) >= self.delay => {
                self.armed_at = None;
                true
            }
            _ => false,
        }
    }
}

/// Tags, comments and metrics of the workflow opened in the detail pane.
#[derive(Debug, Clone, Default)]
pub struct DetailState {
    pub workflow_id: String,
    pub tags: Vec<WorkflowTag>,
    pub comments: Vec<WorkflowComment>,
    pub metrics: Vec<WorkflowMetrics>,
    pub loading: bool,
}

#[derive(Debug, Clone, Default)]
pub struct TasksState {
    pub workflow_id: Option<String>,
    pub rows: Vec<Task>,
    pub total: u64,
    pub start: u32,
    pub selected: usize,
    pub loading: bool,
    pub last_refresh: Option<Instant>,
}

impl TasksState {
    pub fn page_count(&self) -> u64 {
        self.total.div_ceil(u64::from(TASKS_PAGE_LEN)).max(1)
    }

    pub fn page_index(&self) -> u64 {
        u64::from(self.start / TASKS_PAGE_LEN)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AccountState {
    pub teams: Vec<Team>,
    pub tokens: Vec<AccessToken>,
    pub service_info: Option<ServiceInfo>,
    /// Secret of a token created in this session; the server never returns it again.
    pub created_token: Option<AccessToken>,
    pub loading: bool,
}

#[derive(Debug)]
pub struct AppState {
    pub api_url: String,
    pub user: Option<User>,
    pub session_expired: bool,
    pub workflows: WorkflowListState,
    pub selected: usize,
    pub detail: Option<DetailState>,
    pub tasks: TasksState,
    pub account: AccountState,
    pub notifications: NotificationCenter,
    pub live: LiveConnection,
    pub dispatcher: LiveDispatcher,
    pub input_mode: InputMode,
    pub search_input: String,
    pub search_debounce: Debounce,
    pub command_line: String,
    pub last_error: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(String::new(), DEFAULT_PAGE_SIZE)
    }
}

impl AppState {
    pub fn new(api_url: String, page_size: u32) -> Self {
        Self {
            api_url,
            user: None,
            session_expired: false,
            workflows: WorkflowListState::new(page_size),
            selected: 0,
            detail: None,
            tasks: TasksState::default(),
            account: AccountState::default(),
            notifications: NotificationCenter::default(),
            live: LiveConnection::new(),
            dispatcher: LiveDispatcher::default(),
            input_mode: InputMode::Normal,
            search_input: String::new(),
            search_debounce: Debounce::new(SEARCH_DEBOUNCE),
            command_line: String::new(),
            last_error: None,
        }
    }

    pub fn selected_workflow(&self) -> Option<&WorkflowEntry> {
        self.workflows.get(self.selected)
    }

    /// Detail of the selected workflow, when it was opened.
    pub fn selected_detail(&self) -> Option<&DetailState> {
        let selected = self.selected_workflow()?;
        self.detail
            .as_ref()
            .filter(|detail| detail.workflow_id == selected.id())
    }

    /// Move the selection; returns true when it tried to go past the last row.
    pub fn move_selection(&mut self, delta: isize) -> bool {
        let len = self.workflows.len();
        if len == 0 {
            self.selected = 0;
            return delta > 0;
        }
        let target = self.selected as isize + delta;
        if target >= len as isize {
            self.selected = len - 1;
            return true;
        }
        self.selected = target.max(0) as usize;
        false
    }

    fn clamp_selection(&mut self) {
        self.selected = self.selected.min(self.workflows.len().saturating_sub(1));
    }

    /// Run `change` on the list and keep the selection on the same workflow.
    fn keep_selection<R>(&mut self, change: impl FnOnce(&mut Self) -> R) -> R {
        let selected_id = self.selected_workflow().map(|entry| entry.id().to_string());
        let result = change(self);
        match selected_id.and_then(|id| self.workflows.position(&id)) {
            Some(index) => self.selected = index,
            None => self.clamp_selection(),
        }
        result
    }

    pub fn show_welcome_panel(&self) -> bool {
        self.user.is_none()
            || (self.workflows.is_loaded()
                && self.workflows.is_empty()
                && !self.workflows.is_search_active())
    }
}

#[derive(Debug, Clone)]
pub struct AppSettings {
    pub api_url: String,
    pub page_size: u32,
    pub refresh_interval: Duration,
    pub theme: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_url: String::new(),
            page_size: DEFAULT_PAGE_SIZE,
            refresh_interval: Duration::from_secs(10),
            theme: "dark".to_string(),
        }
    }
}

pub struct TowerApp {
    state: AppState,
    current_view: ViewType,
    view_stack: Vec<ViewType>,
    initial_view: ViewType,
    should_quit: bool,
    theme: ThemeConfig,
    settings: AppSettings,
    runner: RequestRunner,
    updates: Receiver<StateUpdate>,
}

impl TowerApp {
    pub fn new(initial_view: ViewType, services: ServiceBundle, settings: AppSettings) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            state: AppState::new(settings.api_url.clone(), settings.page_size),
            current_view: ViewType::Welcome,
            view_stack: Vec::new(),
            initial_view,
            should_quit: false,
            theme: ThemeConfig::by_name(&settings.theme),
            settings,
            runner: RequestRunner::new(services, tx),
            updates: rx,
        }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn theme(&self) -> &ThemeConfig {
        &self.theme
    }

    pub fn current_view(&self) -> &ViewType {
        &self.current_view
    }

    pub fn view_stack_len(&self) -> usize {
        self.view_stack.len()
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn push_view(&mut self, view: ViewType) {
        if view == self.current_view {
            return;
        }
        let previous = std::mem::replace(&mut self.current_view, view);
        self.view_stack.push(previous);
        self.on_view_entered();
    }

    pub fn pop_view(&mut self) {
        if let Some(previous) = self.view_stack.pop() {
            self.current_view = previous;
        }
    }

    pub fn switch_view(&mut self, view: ViewType) {
        self.current_view = view;
        self.on_view_entered();
    }

    pub fn show_status_message(&mut self, message: String, level: MessageLevel) {
        self.state.notifications.push(level, message);
    }

    pub fn show_error_message(&mut self, message: String) {
        self.state.last_error = Some(message.clone());
        self.state.notifications.error(message);
    }

    pub fn has_status_messages(&self) -> bool {
        !self.state.notifications.is_empty()
    }

    /// Kick off the session: resolve the signed-in user, which in turn
    /// loads the workflow list.
    pub fn start(&mut self) {
        info!(target: "tui", api_url = %self.settings.api_url, "starting session");
        self.runner.resolve_user();
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = setup_terminal()?;
        let result = self.event_loop(&mut terminal).await;
        restore_terminal(&mut terminal)?;
        result
    }

    async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        self.start();
        let mut ticker = tokio::time::interval(TICK_RATE);

        while !self.should_quit {
            terminal.draw(|frame| self.render(frame))?;
            ticker.tick().await;

            while event::poll(Duration::ZERO)? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key);
                    }
                }
            }

            self.drain_updates();
            self.on_tick(Instant::now());
        }

        self.state.live.teardown();
        info!(target: "tui", "session closed");
        Ok(())
    }

    pub fn render(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(3),
                Constraint::Length(1),
            ])
            .split(frame.size());

        views::render_header(frame, chunks[0], &self.state, &self.current_view, &self.theme);
        let view = views::view_for(&self.current_view, &self.theme);
        view.render(frame, chunks[1], &self.state);
        views::render_footer(frame, chunks[2], &self.state, view.as_ref(), &self.theme);
        views::render_notifications(frame, chunks[1], &self.state, &self.theme);
    }

    /// Apply every update that arrived since the last call.
    pub fn drain_updates(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.updates.try_recv() {
                Ok(update) => {
                    self.apply_update(update);
                    applied += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return applied,
            }
        }
    }

    /// Block until `count` updates were applied or `timeout` elapsed.
    pub fn wait_for_updates(&mut self, count: usize, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut applied = 0;
        while applied < count {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.updates.recv_timeout(remaining) {
                Ok(update) => {
                    self.apply_update(update);
                    applied += 1;
                }
                Err(_) => break,
            }
        }
        applied
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.state.notifications.expire(now);

        if self.state.search_debounce.fire(now) {
            let text = self.state.search_input.clone();
            self.submit_search(&text);
        }

        if self.current_view == ViewType::Tasks {
            self.refresh_running_tasks(now);
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.state.input_mode.clone() {
            InputMode::Search => self.handle_search_key(key),
            InputMode::Command => self.handle_command_key(key),
            InputMode::ConfirmDelete { workflow_id, .. } => {
                self.state.input_mode = InputMode::Normal;
                if matches!(key.code, KeyCode::Char('y') | KeyCode::Char('Y')) {
                    self.runner.delete_workflow(workflow_id);
                }
            }
            InputMode::Normal => self.handle_normal_key(key),
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.push_view(ViewType::Help),
            KeyCode::Char(':') => {
                self.state.command_line.clear();
                self.state.input_mode = InputMode::Command;
            }
            KeyCode::Char('x') => {
                self.state.notifications.dismiss_latest();
            }
            KeyCode::Esc => self.pop_view(),
            _ => {
                let view = views::view_for(&self.current_view, &self.theme);
                let action = view.handle_key(key, &self.state);
                self.apply_action(action);
            }
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        let now = Instant::now();
        match key.code {
            KeyCode::Enter => {
                self.state.input_mode = InputMode::Normal;
                self.state.search_debounce.cancel();
                let text = self.state.search_input.clone();
                self.submit_search(&text);
            }
            KeyCode::Esc => {
                self.state.input_mode = InputMode::Normal;
            }
            KeyCode::Backspace => {
                self.state.search_input.pop();
                self.state.search_debounce.arm(now);
            }
            KeyCode::Char(c) => {
                self.state.search_input.push(c);
                self.state.search_debounce.arm(now);
            }
            _ => {}
        }
    }

    fn handle_command_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                self.state.input_mode = InputMode::Normal;
                let line = std::mem::take(&mut self.state.command_line);
                match parse_command(&line) {
                    Ok(command) => self.run_command(command),
                    Err(message) => self.show_error_message(message),
                }
            }
            KeyCode::Esc => {
                self.state.input_mode = InputMode::Normal;
                self.state.command_line.clear();
            }
            KeyCode::Backspace => {
                self.state.command_line.pop();
            }
            KeyCode::Char(c) => self.state.command_line.push(c),
            _ => {}
        }
    }

    pub fn apply_action(&mut self, action: ViewAction) {
        match action {
            ViewAction::None => {}
            ViewAction::SwitchView(view) => self.switch_view(view),
            ViewAction::PushView(view) => self.push_view(view),
            ViewAction::PopView => self.pop_view(),
            ViewAction::Quit => self.should_quit = true,
            ViewAction::ShowStatus(message) => self.show_status_message(message, MessageLevel::Info),
            ViewAction::MoveSelection(delta) => {
                if self.state.move_selection(delta) {
                    self.load_next_page();
                }
            }
            ViewAction::OpenSelected => self.open_selected(),
            ViewAction::BeginSearch => self.state.input_mode = InputMode::Search,
            ViewAction::RequestDelete => self.request_delete(),
            ViewAction::Refresh => self.refresh(),
            ViewAction::MoveTaskSelection(delta) => {
                let len = self.state.tasks.rows.len();
                let target = self.state.tasks.selected as isize + delta;
                self.state.tasks.selected =
                    target.clamp(0, len.saturating_sub(1) as isize) as usize;
            }
            ViewAction::TasksPage(delta) => self.change_tasks_page(delta),
            ViewAction::RetrySession => {
                self.state.session_expired = false;
                self.runner.resolve_user();
            }
        }
    }

    pub fn run_command(&mut self, command: AppCommand) {
        debug!(target: "tui", ?command, "running command");
        match command {
            AppCommand::Search(text) => {
                self.state.search_input = text.clone();
                self.state.search_debounce.cancel();
                self.submit_search(&text);
            }
            AppCommand::Refresh => self.refresh(),
            AppCommand::Delete => self.request_delete(),
            AppCommand::TagAdd(text) => {
                if let Some(workflow_id) = self.selected_workflow_id() {
                    self.runner
                        .execute(ServiceCommand::TagAdd { workflow_id, text });
                }
            }
            AppCommand::TagRemove(tag_id) => {
                self.runner.execute(ServiceCommand::TagRemove { tag_id });
            }
            AppCommand::Comment(text) => {
                if let Some(workflow_id) = self.selected_workflow_id() {
                    self.runner
                        .execute(ServiceCommand::Comment { workflow_id, text });
                }
            }
            AppCommand::CommentEdit(comment_id, text) => {
                if let Some(workflow_id) = self.selected_workflow_id() {
                    self.runner.execute(ServiceCommand::CommentEdit {
                        workflow_id,
                        comment_id,
                        text,
                    });
                }
            }
            AppCommand::CommentRemove(comment_id) => {
                if let Some(workflow_id) = self.selected_workflow_id() {
                    self.runner.execute(ServiceCommand::CommentRemove {
                        workflow_id,
                        comment_id,
                    });
                }
            }
            AppCommand::TokenCreate(name) => {
                self.runner.execute(ServiceCommand::TokenCreate { name });
            }
            AppCommand::TokenRemove(token_id) => {
                self.runner
                    .execute(ServiceCommand::TokenRemove { token_id });
            }
            AppCommand::TeamCreate(name) => {
                self.runner.execute(ServiceCommand::TeamCreate { name });
            }
            AppCommand::TeamRemove(team_id) => {
                self.runner.execute(ServiceCommand::TeamRemove { team_id });
            }
            AppCommand::View(view) => self.switch_view(view),
            AppCommand::Quit => self.should_quit = true,
        }
    }

    fn selected_workflow_id(&mut self) -> Option<String> {
        let id = self
            .state
            .selected_workflow()
            .map(|entry| entry.id().to_string());
        if id.is_none() {
            self.show_error_message("No workflow selected".to_string());
        }
        id
    }

    fn on_view_entered(&mut self) {
        match self.current_view {
            ViewType::Tasks => self.open_tasks(),
            ViewType::Account => {
                self.state.account.loading = true;
                self.runner.fetch_account();
            }
            ViewType::Dashboard | ViewType::Welcome | ViewType::Help => {}
        }
    }

    fn submit_search(&mut self, text: &str) {
        if self.state.user.is_none() {
            return;
        }
        let request = self.state.workflows.begin_search(text);
        self.state.selected = 0;
        self.runner.fetch_workflows(request);
    }

    fn load_first_page(&mut self) {
        match self.state.workflows.begin_load() {
            Some(request) => self.runner.fetch_workflows(request),
            None => {
                self.state.clamp_selection();
                self.connect_live();
            }
        }
    }

    fn load_next_page(&mut self) {
        if let Some(request) = self.state.workflows.begin_next_page() {
            self.runner.fetch_workflows(request);
        }
    }

    fn refresh(&mut self) {
        match self.current_view {
            ViewType::Tasks => self.fetch_tasks_page(self.state.tasks.start),
            ViewType::Account => self.runner.fetch_account(),
            ViewType::Welcome => self.apply_action(ViewAction::RetrySession),
            ViewType::Dashboard | ViewType::Help => {
                if self.state.user.is_none() {
                    return;
                }
                let request = self.state.workflows.begin_refresh();
                self.runner.fetch_workflows(request);
                if let Some(detail) = &self.state.detail {
                    self.runner.fetch_detail(detail.workflow_id.clone());
                }
            }
        }
    }

    fn open_selected(&mut self) {
        let Some(entry) = self.state.selected_workflow() else {
            return;
        };
        let workflow_id = entry.id().to_string();
        self.state.detail = Some(DetailState {
            workflow_id: workflow_id.clone(),
            loading: true,
            ..Default::default()
        });
        self.state
            .dispatcher
            .watch_workflow(Some(workflow_id.clone()));
        // the list copy can be stale; fetch a fresh one
        self.runner.fetch_workflow(workflow_id.clone());
        self.runner.fetch_detail(workflow_id);
    }

    fn request_delete(&mut self) {
        let Some(entry) = self.state.selected_workflow() else {
            self.show_error_message("No workflow selected".to_string());
            return;
        };
        let confirm = InputMode::ConfirmDelete {
            workflow_id: entry.id().to_string(),
            run_name: entry
                .workflow
                .run_name
                .clone()
                .unwrap_or_else(|| entry.id().to_string()),
        };
        self.state.input_mode = confirm;
    }

    fn open_tasks(&mut self) {
        let Some(workflow_id) = self
            .state
            .selected_workflow()
            .map(|entry| entry.id().to_string())
        else {
            self.pop_view();
            self.show_error_message("No workflow selected".to_string());
            return;
        };
        if self.state.tasks.workflow_id.as_deref() != Some(workflow_id.as_str()) {
            self.state.tasks = TasksState {
                workflow_id: Some(workflow_id),
                ..Default::default()
            };
        }
        self.fetch_tasks_page(self.state.tasks.start);
    }

    fn fetch_tasks_page(&mut self, start: u32) {
        let Some(workflow_id) = self.state.tasks.workflow_id.clone() else {
            return;
        };
        self.state.tasks.start = start;
        self.state.tasks.loading = true;
        self.state.tasks.last_refresh = Some(Instant::now());
        self.runner.fetch_tasks(
            workflow_id,
            TasksQuery {
                start,
                length: TASKS_PAGE_LEN,
                search: None,
            },
        );
    }

    fn change_tasks_page(&mut self, delta: i32) {
        let pages = self.state.tasks.page_count();
        let current = self.state.tasks.page_index() as i64;
        let target = (current + i64::from(delta)).clamp(0, pages as i64 - 1);
        if target != current {
            self.fetch_tasks_page(target as u32 * TASKS_PAGE_LEN);
        }
    }

    fn refresh_running_tasks(&mut self, now: Instant) {
        let tasks = &self.state.tasks;
        let Some(workflow_id) = tasks.workflow_id.as_deref() else {
            return;
        };
        let running = self
            .state
            .workflows
            .cached(workflow_id)
            .is_some_and(|entry| entry.workflow.is_running());
        let due = tasks.last_refresh.is_none_or(|last| {
            now.saturating_duration_since(last) >= self.settings.refresh_interval
        });
        if running && due && !tasks.loading {
            self.fetch_tasks_page(self.state.tasks.start);
        }
    }

    fn connect_live(&mut self) {
        if let Some(ticket) = self.state.live.connect() {
            self.runner.spawn_live_stream(ticket);
        }
    }

    /// Single entry point for background results.
    pub fn apply_update(&mut self, update: StateUpdate) {
        match update {
            StateUpdate::UserResolved(Ok(user)) => {
                info!(target: "tui", user = %user.display_name(), "signed in");
                self.state.session_expired = false;
                self.state.dispatcher = LiveDispatcher::new(Some(user.id.clone()));
                self.state.user = Some(user);
                if self.current_view == ViewType::Welcome {
                    let view = match self.initial_view {
                        ViewType::Welcome => ViewType::Dashboard,
                        ref other => other.clone(),
                    };
                    self.switch_view(view);
                }
                self.load_first_page();
            }
            StateUpdate::UserResolved(Err(err)) => self.handle_error(err),
            StateUpdate::WorkflowsFetched { ticket, result } => match result {
                Ok(batch) => {
                    let outcome = self
                        .state
                        .keep_selection(|state| state.workflows.apply_fetch(ticket, batch));
                    if outcome == FetchOutcome::Applied {
                        self.connect_live();
                    }
                }
                Err(err) => {
                    if self.state.workflows.fail_fetch(ticket) == FetchOutcome::Applied {
                        self.handle_error(err);
                    }
                }
            },
            StateUpdate::WorkflowFetched {
                workflow_id,
                result,
            } => match result {
                Ok(entry) => {
                    self.state
                        .keep_selection(|state| state.workflows.upsert(entry));
                }
                Err(err) => {
                    warn!(target: "tui", %workflow_id, "workflow refetch failed: {err}");
                    self.handle_error(err);
                }
            },
            StateUpdate::ProgressFetched {
                workflow_id,
                result,
            } => match result {
                Ok(progress) => {
                    self.state.workflows.update_progress(&workflow_id, progress);
                }
                Err(err) => self.handle_error(err),
            },
            StateUpdate::DetailFetched {
                workflow_id,
                tags,
                comments,
                metrics,
            } => {
                let Some(detail) = self
                    .state
                    .detail
                    .as_mut()
                    .filter(|detail| detail.workflow_id == workflow_id)
                else {
                    return;
                };
                detail.loading = false;
                detail.metrics = metrics;
                let mut first_error = None;
                match tags {
                    Ok(tags) => detail.tags = tags,
                    Err(err) => first_error = Some(err),
                }
                match comments {
                    Ok(comments) => detail.comments = comments,
                    Err(err) => first_error = first_error.or(Some(err)),
                }
                if let Some(err) = first_error {
                    self.handle_error(err);
                }
            }
            StateUpdate::TasksFetched {
                workflow_id,
                start,
                result,
            } => {
                let tasks = &mut self.state.tasks;
                if tasks.workflow_id.as_deref() != Some(workflow_id.as_str()) || tasks.start != start
                {
                    return;
                }
                tasks.loading = false;
                match result {
                    Ok(response) => {
                        tasks.total = response.total;
                        tasks.rows = response.tasks.into_iter().map(|entry| entry.task).collect();
                        tasks.selected = tasks.selected.min(tasks.rows.len().saturating_sub(1));
                    }
                    Err(err) => self.handle_error(err),
                }
            }
            StateUpdate::AccountFetched(result) => {
                self.state.account.loading = false;
                match result {
                    Ok(snapshot) => {
                        self.state.account.teams = snapshot.teams;
                        self.state.account.tokens = snapshot.tokens;
                        self.state.account.service_info = snapshot.service_info;
                    }
                    Err(err) => self.handle_error(err),
                }
            }
            StateUpdate::WorkflowDeleted {
                workflow_id,
                result,
            } => match result {
                Ok(()) => {
                    info!(target: "tui", %workflow_id, "workflow deleted");
                    self.state
                        .keep_selection(|state| state.workflows.remove(&workflow_id));
                    if self
                        .state
                        .detail
                        .as_ref()
                        .is_some_and(|detail| detail.workflow_id == workflow_id)
                    {
                        self.state.detail = None;
                        self.state.dispatcher.watch_workflow(None);
                    }
                }
                Err(err) => self.handle_error(err),
            },
            StateUpdate::CommandFinished(result) => match result {
                Ok(outcome) => {
                    let summary = outcome.summary();
                    self.apply_outcome(outcome);
                    self.show_status_message(summary, MessageLevel::Success);
                }
                Err(err) => self.handle_error(err),
            },
            StateUpdate::Live { generation, signal } => self.apply_live_signal(generation, signal),
        }
    }

    fn apply_outcome(&mut self, outcome: CommandOutcome) {
        match outcome {
            CommandOutcome::TagAdded { workflow_id, tag } => {
                if let Some(detail) = self.detail_for(&workflow_id) {
                    detail.tags.push(tag);
                }
            }
            CommandOutcome::TagRemoved { tag_id } => {
                if let Some(detail) = self.state.detail.as_mut() {
                    detail.tags.retain(|tag| tag.id != tag_id);
                }
            }
            CommandOutcome::CommentAdded {
                workflow_id,
                comment,
            } => {
                if let Some(detail) = self.detail_for(&workflow_id) {
                    detail.comments.insert(0, comment);
                }
            }
            CommandOutcome::CommentUpdated {
                workflow_id,
                comment_id,
                text,
            } => {
                if let Some(comment) = self
                    .detail_for(&workflow_id)
                    .and_then(|detail| detail.comments.iter_mut().find(|c| c.id == comment_id))
                {
                    comment.text = text;
                }
            }
            CommandOutcome::CommentRemoved {
                workflow_id,
                comment_id,
            } => {
                if let Some(detail) = self.detail_for(&workflow_id) {
                    detail.comments.retain(|comment| comment.id != comment_id);
                }
            }
            CommandOutcome::TokenCreated(token) => {
                self.state.account.tokens.push(AccessToken {
                    token: None,
                    ..token.clone()
                });
                self.state.account.created_token = Some(token);
            }
            CommandOutcome::TokenRemoved(token_id) => {
                self.state
                    .account
                    .tokens
                    .retain(|token| token.id != token_id);
            }
            CommandOutcome::TeamCreated(team) => self.state.account.teams.push(team),
            CommandOutcome::TeamRemoved(team_id) => {
                self.state.account.teams.retain(|team| team.id != team_id);
            }
        }
    }

    fn detail_for(&mut self, workflow_id: &str) -> Option<&mut DetailState> {
        self.state
            .detail
            .as_mut()
            .filter(|detail| detail.workflow_id == workflow_id)
    }

    fn apply_live_signal(&mut self, generation: u64, signal: LiveSignal) {
        if !self.state.live.is_current(generation) {
            debug!(target: "live", generation, "ignoring signal from a closed stream");
            return;
        }
        match signal {
            LiveSignal::Opened => {
                info!(target: "live", "live updates connected");
                self.state.live.on_open();
            }
            LiveSignal::Message(events) => {
                self.state.live.on_activity();
                for event in events {
                    let reaction = self.state.keep_selection(|state| {
                        state.dispatcher.dispatch(event, &mut state.workflows)
                    });
                    self.apply_live_reaction(reaction);
                }
            }
            LiveSignal::Failed(reason) => {
                if self.state.live.on_error(&reason) {
                    self.show_error_message(format!("Live updates unavailable: {reason}"));
                }
            }
            LiveSignal::Closed => {
                if self.state.live.on_error("closed by server") {
                    self.show_error_message("Live updates disconnected".to_string());
                }
            }
        }
    }

    fn apply_live_reaction(&mut self, reaction: LiveReaction) {
        match reaction {
            LiveReaction::None | LiveReaction::ListUpdated | LiveReaction::ProgressUpdated(_) => {}
            LiveReaction::Refetch(workflow_id) => self.runner.fetch_workflow(workflow_id),
            LiveReaction::RefetchProgress(workflow_id) => self.runner.fetch_progress(workflow_id),
            LiveReaction::Terminate(message) => {
                // the subscription is gone; its connection must not report again
                self.state.live.on_error(&message);
                self.show_error_message(message);
            }
        }
    }

    fn handle_error(&mut self, err: InterfaceError) {
        if err.is_session_error() {
            self.end_session();
            return;
        }
        warn!(target: "tui", "request failed: {err}");
        self.show_error_message(err.user_message());
    }

    fn end_session(&mut self) {
        let had_session = self.state.user.take().is_some();
        let first_report = !self.state.session_expired;
        self.state.session_expired = true;

        self.state.live.teardown();
        self.state.dispatcher = LiveDispatcher::default();
        self.state.workflows.clear();
        self.state.selected = 0;
        self.state.detail = None;
        self.state.tasks = TasksState::default();
        self.state.account = AccountState::default();
        self.state.input_mode = InputMode::Normal;
        self.view_stack.clear();
        self.current_view = ViewType::Welcome;

        if first_report {
            let message = if had_session {
                "Session expired"
            } else {
                "Not signed in: set an access token"
            };
            warn!(target: "tui", "{message}");
            self.show_error_message(message.to_string());
        }
    }
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}
