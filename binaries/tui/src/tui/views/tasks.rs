use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    widgets::{Cell, Paragraph, Row, Table, TableState},
};
use tower_protocol::Task;

use super::{View, ViewAction, bordered};
use crate::tui::{
    app::AppState,
    format,
    theme::ThemeConfig,
};

pub struct TasksView {
    theme: ThemeConfig,
}

impl TasksView {
    pub fn new(theme: &ThemeConfig) -> Self {
        Self {
            theme: theme.clone(),
        }
    }

    fn row(&self, task: &Task) -> Row<'static> {
        let pcpu = task.pcpu.unwrap_or_default();
        let pmem = task.pmem.unwrap_or_default();
        Row::new(vec![
            Cell::from(task.task_id.to_string()),
            Cell::from(task.status.label()).style(self.theme.task_status_style(task.status)),
            Cell::from(task.name.clone().or_else(|| task.process.clone()).unwrap_or_default()),
            Cell::from(task.exit.map(|code| code.to_string()).unwrap_or_default()),
            Cell::from(format::optional_duration_ms(task.realtime.or(task.duration))),
            Cell::from(task.cpus.map(|cpus| cpus.to_string()).unwrap_or_default()),
            Cell::from(format::percent(pcpu)).style(self.theme.percentage_style(pcpu)),
            Cell::from(format::percent(pmem)).style(self.theme.percentage_style(pmem)),
            Cell::from(format::optional_bytes(task.peak_rss)),
            Cell::from(task.hash.clone().unwrap_or_default()),
        ])
    }
}

impl View for TasksView {
    fn title(&self) -> &str {
        "Tasks"
    }

    fn help_text(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            ("j/k", "move"),
            ("n/p", "page"),
            ("r", "refresh"),
            ("Esc", "back"),
        ]
    }

    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let tasks = &state.tasks;
        let Some(workflow_id) = tasks.workflow_id.as_deref() else {
            frame.render_widget(
                Paragraph::new("No workflow selected").block(bordered("Tasks", &self.theme)),
                area,
            );
            return;
        };

        let first = if tasks.total == 0 { 0 } else { tasks.start + 1 };
        let last = (u64::from(tasks.start) + tasks.rows.len() as u64).min(tasks.total);
        let mut title = format!(
            "Tasks of {workflow_id} ({first}-{last} of {}, page {}/{})",
            tasks.total,
            tasks.page_index() + 1,
            tasks.page_count(),
        );
        if tasks.loading {
            title.push_str(" loading...");
        }

        let header = Row::new(vec![
            "id", "status", "name", "exit", "time", "cpus", "%cpu", "%mem", "peak rss", "hash",
        ])
        .style(self.theme.muted());
        let table = Table::new(
            tasks.rows.iter().map(|task| self.row(task)),
            [
                Constraint::Length(6),
                Constraint::Length(10),
                Constraint::Min(20),
                Constraint::Length(5),
                Constraint::Length(10),
                Constraint::Length(5),
                Constraint::Length(7),
                Constraint::Length(7),
                Constraint::Length(10),
                Constraint::Length(10),
            ],
        )
        .header(header)
        .highlight_style(self.theme.selected())
        .block(bordered(title, &self.theme));

        let mut table_state = TableState::default();
        if !tasks.rows.is_empty() {
            table_state.select(Some(tasks.selected));
        }
        frame.render_stateful_widget(table, area, &mut table_state);
    }

    fn handle_key(&self, key: KeyEvent, _state: &AppState) -> ViewAction {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => ViewAction::MoveTaskSelection(1),
            KeyCode::Char('k') | KeyCode::Up => ViewAction::MoveTaskSelection(-1),
            KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => ViewAction::TasksPage(1),
            KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => ViewAction::TasksPage(-1),
            KeyCode::Char('r') => ViewAction::Refresh,
            _ => ViewAction::None,
        }
    }
}
