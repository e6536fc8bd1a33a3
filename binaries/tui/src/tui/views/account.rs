use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{List, ListItem, Paragraph, Wrap},
};

use super::{View, ViewAction, bordered};
use crate::tui::{app::AppState, format, theme::ThemeConfig};

pub struct AccountView {
    theme: ThemeConfig,
}

impl AccountView {
    pub fn new(theme: &ThemeConfig) -> Self {
        Self {
            theme: theme.clone(),
        }
    }

    fn render_profile(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let mut lines = Vec::new();
        match &state.user {
            Some(user) => {
                lines.push(Line::from(Span::styled(user.display_name(), self.theme.title())));
                for (label, value) in [
                    ("user", &user.user_name),
                    ("email", &user.email),
                    ("org", &user.organization),
                    ("about", &user.description),
                ] {
                    if let Some(value) = value {
                        lines.push(Line::from(vec![
                            Span::styled(format!("{label:<7}"), self.theme.muted()),
                            Span::raw(value.clone()),
                        ]));
                    }
                }
            }
            None => lines.push(Line::from("Not signed in")),
        }

        lines.push(Line::from(vec![
            Span::styled(format!("{:<7}", "api"), self.theme.muted()),
            Span::raw(state.api_url.clone()),
        ]));
        if let Some(info) = &state.account.service_info {
            let version = info.version.clone().unwrap_or_else(|| "?".to_string());
            let commit = info.commit_id.clone().unwrap_or_default();
            lines.push(Line::from(vec![
                Span::styled(format!("{:<7}", "server"), self.theme.muted()),
                Span::raw(format!("{version} {commit}")),
            ]));
        }

        frame.render_widget(
            Paragraph::new(lines)
                .wrap(Wrap { trim: true })
                .block(bordered("Profile", &self.theme)),
            area,
        );
    }

    fn render_teams(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let items: Vec<ListItem> = state
            .account
            .teams
            .iter()
            .map(|team| {
                let mut text = format!("#{} {}", team.id, team.name);
                if let Some(description) = &team.description {
                    text.push_str(&format!(" - {description}"));
                }
                ListItem::new(text)
            })
            .collect();
        frame.render_widget(
            List::new(items).block(bordered(
                format!("Teams ({})", state.account.teams.len()),
                &self.theme,
            )),
            area,
        );
    }

    fn render_tokens(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let mut items: Vec<ListItem> = Vec::new();
        if let Some(created) = &state.account.created_token {
            if let Some(secret) = &created.token {
                items.push(ListItem::new(vec![
                    Line::from(Span::styled(
                        format!("New token '{}', copy it now:", created.name),
                        self.theme.title(),
                    )),
                    Line::from(secret.clone()),
                ]));
            }
        }
        items.extend(state.account.tokens.iter().map(|token| {
            ListItem::new(Line::from(vec![
                Span::raw(format!("#{} {:<24}", token.id, token.name)),
                Span::styled(
                    format!(
                        " created {}  last used {}",
                        format::datetime(token.date_created),
                        format::datetime(token.last_used)
                    ),
                    self.theme.muted(),
                ),
            ]))
        }));

        frame.render_widget(
            List::new(items).block(bordered(
                format!("Access tokens ({})", state.account.tokens.len()),
                &self.theme,
            )),
            area,
        );
    }
}

impl View for AccountView {
    fn title(&self) -> &str {
        "Account"
    }

    fn help_text(&self) -> Vec<(&'static str, &'static str)> {
        vec![
            (":token create", "new token"),
            (":team create", "new team"),
            ("r", "refresh"),
            ("Esc", "back"),
        ]
    }

    fn render(&self, frame: &mut Frame, area: Rect, state: &AppState) {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(area);
        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
            .split(columns[1]);

        self.render_profile(frame, columns[0], state);
        self.render_teams(frame, right[0], state);
        self.render_tokens(frame, right[1], state);
    }

    fn handle_key(&self, key: KeyEvent, _state: &AppState) -> ViewAction {
        match key.code {
            KeyCode::Char('r') => ViewAction::Refresh,
            _ => ViewAction::None,
        }
    }
}
