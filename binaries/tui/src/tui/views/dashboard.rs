use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Cell, Gauge, List, ListItem, ListState, Paragraph, Row, Table, Wrap},
};
use tower_protocol::{
    ProgressRecord, ResourceData, WorkflowEntry, WorkflowMetrics, WorkflowStatus,
};

use super::{View, ViewAction, bordered, welcome};
use crate::tui::{
    app::{AppState, ViewType},
    format,
    theme::ThemeConfig,
};

pub struct DashboardView {
    theme: ThemeConfig,
}

impl DashboardView {
    pub fn new(theme: &ThemeConfig) -> Self {
        Self {
            theme: theme.clone(),
        }
    }

    fn render_sidebar(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let list = &state.workflows;
        let items: Vec<ListItem> = list
            .workflows()
            .iter()
            .map(|entry| self.sidebar_item(entry))
            .collect();

        let mut title = format!("Workflows ({})", list.len());
        if list.is_search_active() {
            title.push_str(&format!(" /{}", list.search_text()));
        }
        if list.is_loading() {
            title.push_str(" loading...");
        }

        let widget = List::new(items)
            .block(bordered(title, &self.theme))
            .highlight_style(self.theme.selected())
            .highlight_symbol("> ");
        let mut list_state = ListState::default();
        if !list.is_empty() {
            list_state.select(Some(state.selected));
        }
        frame.render_stateful_widget(widget, area, &mut list_state);
    }

    fn sidebar_item(&self, entry: &WorkflowEntry) -> ListItem<'static> {
        let workflow = &entry.workflow;
        let status = workflow.effective_status();
        let name = workflow
            .project_name
            .clone()
            .or_else(|| workflow.manifest.as_ref().and_then(|m| m.name.clone()))
            .unwrap_or_else(|| entry.id().to_string());
        let run_name = workflow.run_name.clone().unwrap_or_default();

        ListItem::new(vec![
            Line::from(vec![
                Span::styled(format!("{:<10}", status.as_str()), self.theme.status_style(status)),
                Span::styled(name, self.theme.base()),
            ]),
            Line::from(Span::styled(
                format!(
                    "  {run_name} {}",
                    format::datetime(workflow.start.or(workflow.submit))
                ),
                self.theme.muted(),
            )),
        ])
    }

    fn render_detail(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let Some(entry) = state.selected_workflow() else {
            let message = if state.workflows.is_loading() {
                "Loading workflows..."
            } else {
                "No workflow matches the search"
            };
            frame.render_widget(
                Paragraph::new(message).block(bordered("Workflow", &self.theme)),
                area,
            );
            return;
        };

        let record = entry
            .progress
            .as_ref()
            .and_then(|progress| progress.workflow_progress.clone())
            .unwrap_or_default();
        let processes = entry
            .progress
            .as_ref()
            .map(|progress| progress.processes_progress.len())
            .unwrap_or(0) as u16;
        let metrics = state
            .selected_detail()
            .map(|detail| detail.metrics.len())
            .unwrap_or(0) as u16;
        let metrics_height = if metrics == 0 { 0 } else { metrics.min(6) + 3 };

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(10),
                Constraint::Length(3),
                Constraint::Length(6),
                Constraint::Length(processes.min(8) + 3),
                Constraint::Length(metrics_height),
                Constraint::Min(4),
            ])
            .split(area);

        self.render_general(frame, chunks[0], entry);
        self.render_progress_bar(frame, chunks[1], &record);
        self.render_resources(frame, chunks[2], &record);
        self.render_processes(frame, chunks[3], entry);
        if let Some(detail) = state.selected_detail().filter(|_| metrics > 0) {
            self.render_metrics(frame, chunks[4], &detail.metrics);
        }
        self.render_notes(frame, chunks[5], state, entry);
    }

    fn render_general(&self, frame: &mut Frame, area: Rect, entry: &WorkflowEntry) {
        let workflow = &entry.workflow;
        let status = workflow.effective_status();
        let field = |label: &str, value: String| {
            Line::from(vec![
                Span::styled(format!("{label:<10}"), self.theme.muted()),
                Span::styled(value, self.theme.base()),
            ])
        };

        let mut status_text = status.as_str().to_string();
        if workflow.is_partially_failed() {
            status_text.push_str(" (some tasks failed)");
        }
        let repository = match (&workflow.repository, workflow.brief_commit_id()) {
            (Some(repo), Some(commit)) => format!("{repo} @ {commit}"),
            (Some(repo), None) => repo.clone(),
            (None, _) => workflow.project_dir.clone().unwrap_or_default(),
        };

        let mut lines = vec![
            Line::from(vec![
                Span::styled(format!("{:<10}", "status"), self.theme.muted()),
                Span::styled(status_text, self.theme.status_style(status)),
            ]),
            field("run", workflow.run_name.clone().unwrap_or_default()),
            field("user", workflow.user_name.clone().unwrap_or_default()),
            field("project", repository),
            field("submitted", format::datetime(workflow.submit)),
            field("started", format::datetime(workflow.start)),
            field("completed", format::datetime(workflow.complete)),
            field("duration", format::optional_duration_ms(workflow.duration)),
        ];
        if let Some(error) = &workflow.error_message {
            lines.push(Line::from(Span::styled(
                error.clone(),
                self.theme.status_style(status),
            )));
        } else if let Some(command) = &workflow.command_line {
            lines.push(field("command", command.clone()));
        }

        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .block(bordered(format!("Workflow {}", entry.id()), &self.theme)),
            area,
        );
    }

    fn render_progress_bar(&self, frame: &mut Frame, area: Rect, record: &ProgressRecord) {
        let total = record.total();
        let ratio = if total == 0 {
            0.0
        } else {
            (record.finished() as f64 / total as f64).clamp(0.0, 1.0)
        };
        let label = format!(
            "{}/{} tasks | pending {} submitted {} running {} cached {} succeeded {} failed {}",
            record.finished(),
            total,
            record.pending,
            record.submitted,
            record.running,
            record.cached,
            record.succeeded,
            record.failed,
        );
        let style = if record.failed > 0 {
            self.theme.status_style(WorkflowStatus::Failed)
        } else {
            self.theme.status_style(WorkflowStatus::Running)
        };
        frame.render_widget(
            Gauge::default()
                .block(bordered("Progress", &self.theme))
                .gauge_style(style)
                .ratio(ratio)
                .label(label),
            area,
        );
    }

    fn render_resources(&self, frame: &mut Frame, area: Rect, record: &ProgressRecord) {
        let lines = vec![
            Line::from(format!(
                "cpus {}   cpu hours {}   cpu efficiency {}",
                record.cpus,
                format::cpu_hours(record.cpu_time),
                format::percent(record.cpu_efficiency),
            )),
            Line::from(format!(
                "memory {} of {} requested   efficiency {}",
                format::bytes(record.memory_rss, 2),
                format::bytes(record.memory_req, 2),
                format::percent(record.memory_efficiency),
            )),
            Line::from(format!(
                "read {}   written {}",
                format::bytes(record.read_bytes, 2),
                format::bytes(record.write_bytes, 2),
            )),
            Line::from(Span::styled(
                format!(
                    "load {} cpus / {} tasks / {}   peak {} cpus / {} tasks / {}",
                    record.load_cpus,
                    record.load_tasks,
                    format::bytes(record.load_memory, 1),
                    record.peak_cpus,
                    record.peak_tasks,
                    format::bytes(record.peak_memory, 1),
                ),
                self.theme.muted(),
            )),
        ];
        frame.render_widget(
            Paragraph::new(lines).block(bordered("Resources", &self.theme)),
            area,
        );
    }

    fn render_processes(&self, frame: &mut Frame, area: Rect, entry: &WorkflowEntry) {
        let processes = entry
            .progress
            .as_ref()
            .map(|progress| progress.processes_progress.as_slice())
            .unwrap_or_default();
        let rows = processes.iter().map(|process| {
            let record = &process.record;
            let done = record.finished();
            let total = record.total();
            let pct = if total == 0 {
                0.0
            } else {
                done as f64 * 100.0 / total as f64
            };
            Row::new(vec![
                Cell::from(process.process.clone()),
                Cell::from(format!("{done}/{total}")),
                Cell::from(record.running.to_string()),
                Cell::from(record.failed.to_string()),
                Cell::from(format::percent(pct)),
            ])
        });
        let header = Row::new(vec!["process", "done", "running", "failed", "%"])
            .style(self.theme.muted());
        let table = Table::new(
            rows,
            [
                Constraint::Percentage(40),
                Constraint::Percentage(15),
                Constraint::Percentage(15),
                Constraint::Percentage(15),
                Constraint::Percentage(15),
            ],
        )
        .header(header)
        .block(bordered("Processes", &self.theme));
        frame.render_widget(table, area);
    }

    fn render_metrics(&self, frame: &mut Frame, area: Rect, metrics: &[WorkflowMetrics]) {
        let mean = |data: &Option<ResourceData>| data.as_ref().map(|data| data.mean);
        let rows = metrics.iter().map(|metric| {
            Row::new(vec![
                Cell::from(metric.process.clone()),
                Cell::from(mean(&metric.cpu).map(format::percent).unwrap_or_default()),
                Cell::from(
                    mean(&metric.mem)
                        .map(|bytes| format::bytes(bytes as u64, 1))
                        .unwrap_or_default(),
                ),
                Cell::from(
                    mean(&metric.time)
                        .map(|ms| format::duration_ms(ms as u64))
                        .unwrap_or_default(),
                ),
                Cell::from(
                    mean(&metric.reads)
                        .map(|bytes| format::bytes(bytes as u64, 1))
                        .unwrap_or_default(),
                ),
            ])
        });
        let header = Row::new(vec!["process", "mean cpu", "mean mem", "mean time", "mean read"])
            .style(self.theme.muted());
        let table = Table::new(
            rows,
            [
                Constraint::Percentage(36),
                Constraint::Percentage(16),
                Constraint::Percentage(16),
                Constraint::Percentage(16),
                Constraint::Percentage(16),
            ],
        )
        .header(header)
        .block(bordered("Metrics", &self.theme));
        frame.render_widget(table, area);
    }

    fn render_notes(&self, frame: &mut Frame, area: Rect, state: &AppState, entry: &WorkflowEntry) {
        let Some(detail) = state.selected_detail() else {
            frame.render_widget(
                Paragraph::new(Span::styled(
                    "Press Enter to load tags and comments",
                    self.theme.muted(),
                ))
                .block(bordered("Notes", &self.theme)),
                area,
            );
            return;
        };

        let mut lines = Vec::new();
        if detail.loading {
            lines.push(Line::from(Span::styled("loading...", self.theme.muted())));
        }
        let tags = detail
            .tags
            .iter()
            .map(|tag| format!("#{} {}", tag.id, tag.text))
            .collect::<Vec<_>>()
            .join("  ");
        lines.push(Line::from(vec![
            Span::styled("tags  ", self.theme.muted()),
            Span::raw(tags),
        ]));
        for comment in &detail.comments {
            let author = comment
                .author
                .as_ref()
                .and_then(|author| author.display_name.clone())
                .unwrap_or_else(|| "unknown".to_string());
            lines.push(Line::from(vec![
                Span::styled(
                    format!("{} {author}: ", format::datetime(comment.date_created)),
                    self.theme.muted(),
                ),
                Span::raw(comment.text.clone()),
            ]));
        }

        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .block(bordered(format!("Notes of {}", entry.id()), &self.theme)),
            area,
        );
    }
}

impl View for DashboardView {
    fn title(&self) -> &str {
        "Dashboard"
    }

    fn help_text(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("j/k", "move"),
            ("Enter", "open"),
            ("/", "search"),
            ("t", "tasks"),
            ("a", "account"),
            ("d", "delete"),
            ("r", "refresh"),
            (":", "command"),
            ("?", "help"),
            ("q", "quit"),
        ]
    }

    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        if state.show_welcome_panel() {
            welcome::render_intro(frame, area, state, &self.theme);
            return;
        }
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(35), Constraint::Percentage(65)])
            .split(area);
        self.render_sidebar(frame, chunks[0], state);
        self.render_detail(frame, chunks[1], state);
    }

    fn handle_key(&self, key: KeyEvent, _state: &AppState) -> ViewAction {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => ViewAction::MoveSelection(1),
            KeyCode::Char('k') | KeyCode::Up => ViewAction::MoveSelection(-1),
            KeyCode::PageDown => ViewAction::MoveSelection(10),
            KeyCode::PageUp => ViewAction::MoveSelection(-10),
            KeyCode::Enter => ViewAction::OpenSelected,
            KeyCode::Char('/') => ViewAction::BeginSearch,
            KeyCode::Char('d') => ViewAction::RequestDelete,
            KeyCode::Char('r') => ViewAction::Refresh,
            KeyCode::Char('t') => ViewAction::PushView(ViewType::Tasks),
            KeyCode::Char('a') => ViewAction::PushView(ViewType::Account),
            _ => ViewAction::None,
        }
    }
}
