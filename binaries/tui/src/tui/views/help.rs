use crossterm::event::KeyEvent;
use ratatui::{
    Frame,
    layout::{Constraint, Rect},
    widgets::{Row, Table},
};

use super::{View, ViewAction, bordered};
use crate::tui::{app::AppState, theme::ThemeConfig};

const KEYS: &[(&str, &str)] = &[
    ("j / Down", "Select next workflow, loads more past the end"),
    ("k / Up", "Select previous workflow"),
    ("Enter", "Load tags, comments, metrics and live progress of the selection"),
    ("/", "Search workflows (applied 500 ms after the last keystroke)"),
    ("t", "Tasks of the selected workflow"),
    ("a", "Account: profile, teams and access tokens"),
    ("d", "Delete the selected workflow"),
    ("r", "Refresh the current view"),
    ("x", "Dismiss the latest notification"),
    (":", "Command mode"),
    ("?", "This help"),
    ("Esc", "Back"),
    ("q", "Quit"),
];

const COMMANDS: &[(&str, &str)] = &[
    (":search <text>", "Filter workflows; empty text clears the filter"),
    (":refresh", "Reload the first page"),
    (":delete", "Delete the selected workflow"),
    (":tag add <text>", "Tag the selected workflow"),
    (":tag rm <id>", "Remove a tag"),
    (":comment <text>", "Comment on the selected workflow"),
    (":comment edit <id> <text>", "Rewrite a comment"),
    (":comment rm <id>", "Delete a comment"),
    (":token create <name>", "Create an access token"),
    (":token rm <id>", "Delete an access token"),
    (":team create <name>", "Create a team"),
    (":team rm <id>", "Delete a team"),
    (":view <name>", "dashboard, tasks, account, help, welcome"),
    (":quit", "Quit"),
];

pub struct HelpView {
    theme: ThemeConfig,
}

impl HelpView {
    pub fn new(theme: &ThemeConfig) -> Self {
        Self {
            theme: theme.clone(),
        }
    }
}

impl View for HelpView {
    fn title(&self) -> &str {
        "Help"
    }

    fn help_text(&self) -> Vec<(&'static str, &'static str)> {
        vec![("Esc", "back"), ("q", "quit")]
    }

    fn can_focus(&self) -> bool {
        false
    }

    fn render(&self, frame: &mut Frame, area: Rect, _state: &AppState) {
        let rows = KEYS
            .iter()
            .chain(COMMANDS.iter())
            .map(|(key, description)| Row::new(vec![*key, *description]));
        let table = Table::new(rows, [Constraint::Length(24), Constraint::Min(20)])
            .style(self.theme.base())
            .block(bordered("Help", &self.theme));
        frame.render_widget(table, area);
    }

    fn handle_key(&self, _key: KeyEvent, _state: &AppState) -> ViewAction {
        ViewAction::None
    }
}
