use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};

use super::{View, ViewAction, bordered};
use crate::tui::{app::AppState, theme::ThemeConfig};

pub struct WelcomeView {
    theme: ThemeConfig,
}

impl WelcomeView {
    pub fn new(theme: &ThemeConfig) -> Self {
        Self {
            theme: theme.clone(),
        }
    }
}

/// Getting-started text, also used by the dashboard while it has nothing
/// to show.
pub(super) fn render_intro(frame: &mut Frame, area: Rect, state: &AppState, theme: &ThemeConfig) {
    let mut lines = vec![
        Line::from(Span::styled("Welcome to Tower", theme.title())),
        Line::from(""),
    ];

    if state.user.is_none() {
        lines.extend([
            Line::from(format!("Connecting to {}", state.api_url)),
            Line::from(""),
            Line::from("Create an access token in the Tower web interface and start with"),
            Line::from(Span::styled(
                "  TOWER_ACCESS_TOKEN=<token> tower-tui",
                theme.base(),
            )),
            Line::from("or put `access_token = \"...\"` in the config file."),
            Line::from(""),
            Line::from(Span::styled("Press r to retry, q to quit.", theme.muted())),
        ]);
    } else {
        lines.extend([
            Line::from("No workflows yet. Add these lines to your nextflow.config:"),
            Line::from(""),
            Line::from(Span::styled("  tower {", theme.base())),
            Line::from(Span::styled("    enabled = true", theme.base())),
            Line::from(Span::styled(
                format!("    endpoint = '{}'", state.api_url),
                theme.base(),
            )),
            Line::from(Span::styled("    accessToken = '<token>'", theme.base())),
            Line::from(Span::styled("  }", theme.base())),
            Line::from(""),
            Line::from("Runs appear here as soon as they start."),
        ]);
    }

    frame.render_widget(
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(bordered("Tower", theme)),
        area,
    );
}

impl View for WelcomeView {
    fn title(&self) -> &str {
        "Welcome"
    }

    fn help_text(&self) -> Vec<(&'static str, &'static str)> {
        vec![("r", "retry"), ("?", "help"), ("q", "quit")]
    }

    fn can_focus(&self) -> bool {
        false
    }

    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        render_intro(frame, area, state, &self.theme);
    }

    fn handle_key(&self, key: KeyEvent, _state: &AppState) -> ViewAction {
        match key.code {
            KeyCode::Char('r') => ViewAction::RetrySession,
            _ => ViewAction::None,
        }
    }
}
