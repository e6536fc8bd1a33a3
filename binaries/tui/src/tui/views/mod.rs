mod account;
mod dashboard;
mod help;
mod tasks;
mod welcome;

use std::time::Instant;

use crossterm::event::KeyEvent;
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

pub use account::AccountView;
pub use dashboard::DashboardView;
pub use help::HelpView;
pub use tasks::TasksView;
pub use welcome::WelcomeView;

use super::{
    app::{AppState, InputMode, ViewType},
    theme::ThemeConfig,
};

pub trait View {
    fn title(&self) -> &str;

    fn help_text(&self) -> Vec<(&'static str, &'static str)>;

    fn can_focus(&self) -> bool {
        true
    }

    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState);

    fn handle_key(&self, key: KeyEvent, state: &AppState) -> ViewAction;
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewAction {
    None,
    SwitchView(ViewType),
    PushView(ViewType),
    PopView,
    Quit,
    ShowStatus(String),
    MoveSelection(isize),
    OpenSelected,
    BeginSearch,
    RequestDelete,
    Refresh,
    MoveTaskSelection(isize),
    TasksPage(i32),
    RetrySession,
}

pub fn view_for(view: &ViewType, theme: &ThemeConfig) -> Box<dyn View> {
    match view {
        ViewType::Welcome => Box::new(WelcomeView::new(theme)),
        ViewType::Dashboard => Box::new(DashboardView::new(theme)),
        ViewType::Tasks => Box::new(TasksView::new(theme)),
        ViewType::Account => Box::new(AccountView::new(theme)),
        ViewType::Help => Box::new(HelpView::new(theme)),
    }
}

pub fn render_header(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    view: &ViewType,
    theme: &ThemeConfig,
) {
    let user = state
        .user
        .as_ref()
        .map(|user| user.display_name())
        .unwrap_or_else(|| "not signed in".to_string());
    let line = Line::from(vec![
        Span::styled(" Tower ", theme.title()),
        Span::styled(format!("| {} ", view.name()), theme.base()),
        Span::styled(format!("| {user} "), theme.muted()),
        Span::styled(
            format!("| {} ", state.live.status_label(Instant::now())),
            theme.muted(),
        ),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

pub fn render_footer(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    view: &dyn View,
    theme: &ThemeConfig,
) {
    let line = match &state.input_mode {
        InputMode::Search => Line::from(vec![
            Span::styled("/", theme.title()),
            Span::raw(state.search_input.clone()),
            Span::styled("_", theme.muted()),
        ]),
        InputMode::Command => Line::from(vec![
            Span::styled(":", theme.title()),
            Span::raw(state.command_line.clone()),
            Span::styled("_", theme.muted()),
        ]),
        InputMode::ConfirmDelete { run_name, .. } => Line::from(Span::styled(
            format!("Delete workflow '{run_name}'? (y/n)"),
            theme.message_style(super::notification::MessageLevel::Warning),
        )),
        InputMode::Normal => {
            let mut spans = Vec::new();
            for (key, description) in view.help_text() {
                spans.push(Span::styled(format!(" {key}"), theme.title()));
                spans.push(Span::styled(format!(" {description} "), theme.muted()));
            }
            Line::from(spans)
        }
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Toast stack drawn over the top-right corner of `area`.
pub fn render_notifications(frame: &mut Frame, area: Rect, state: &AppState, theme: &ThemeConfig) {
    let width = area.width.min(48);
    let mut y = area.y;
    for message in state.notifications.iter() {
        let height = 3;
        if y + height > area.y + area.height {
            break;
        }
        let rect = Rect {
            x: area.x + area.width - width,
            y,
            width,
            height,
        };
        let style = theme.message_style(message.level);
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(message.text.clone())
                .style(style)
                .wrap(Wrap { trim: true })
                .block(Block::default().borders(Borders::ALL).border_style(style)),
            rect,
        );
        y += height;
    }
}

pub(crate) fn bordered<'a>(title: impl Into<Line<'a>>, theme: &ThemeConfig) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(theme.title())
}
