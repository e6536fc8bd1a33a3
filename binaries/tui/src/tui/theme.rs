use ratatui::style::{Color, Modifier, Style};
use tower_protocol::{TaskStatus, WorkflowStatus};

use super::notification::MessageLevel;

#[derive(Debug, Clone, PartialEq)]
pub struct ThemeConfig {
    pub name: String,
    pub primary: Color,
    pub text: Color,
    pub muted: Color,
    pub highlight: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub running: Color,
}

impl Default for ThemeConfig {
    fn default() -> Self {
        Self::default_dark()
    }
}

impl ThemeConfig {
    pub fn default_dark() -> Self {
        Self {
            name: "dark".to_string(),
            primary: Color::Cyan,
            text: Color::White,
            muted: Color::DarkGray,
            highlight: Color::Blue,
            success: Color::Green,
            warning: Color::Yellow,
            error: Color::Red,
            running: Color::LightBlue,
        }
    }

    pub fn default_light() -> Self {
        Self {
            name: "light".to_string(),
            primary: Color::Blue,
            text: Color::Black,
            muted: Color::Gray,
            highlight: Color::LightCyan,
            success: Color::Green,
            warning: Color::Magenta,
            error: Color::Red,
            running: Color::Blue,
        }
    }

    /// Falls back to the dark theme for unknown names.
    pub fn by_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "light" => Self::default_light(),
            _ => Self::default_dark(),
        }
    }

    pub fn base(&self) -> Style {
        Style::default().fg(self.text)
    }

    pub fn title(&self) -> Style {
        Style::default()
            .fg(self.primary)
            .add_modifier(Modifier::BOLD)
    }

    pub fn muted(&self) -> Style {
        Style::default().fg(self.muted)
    }

    pub fn selected(&self) -> Style {
        Style::default()
            .bg(self.highlight)
            .add_modifier(Modifier::BOLD)
    }

    pub fn status_style(&self, status: WorkflowStatus) -> Style {
        let color = match status {
            WorkflowStatus::Submitted => self.muted,
            WorkflowStatus::Running => self.running,
            WorkflowStatus::Succeeded => self.success,
            WorkflowStatus::Failed => self.error,
            WorkflowStatus::Unknown => self.warning,
        };
        Style::default().fg(color)
    }

    pub fn task_status_style(&self, status: TaskStatus) -> Style {
        let color = match status {
            TaskStatus::New | TaskStatus::Submitted => self.muted,
            TaskStatus::Running => self.running,
            TaskStatus::Cached | TaskStatus::Completed => self.success,
            TaskStatus::Failed => self.error,
            TaskStatus::Aborted => self.warning,
        };
        Style::default().fg(color)
    }

    pub fn message_style(&self, level: MessageLevel) -> Style {
        let color = match level {
            MessageLevel::Info => self.primary,
            MessageLevel::Success => self.success,
            MessageLevel::Warning => self.warning,
            MessageLevel::Error => self.error,
        };
        Style::default().fg(color).add_modifier(Modifier::BOLD)
    }

    /// Shades towards warning and error as the value approaches 100.
    pub fn percentage_style(&self, percentage: f64) -> Style {
        let color = if percentage >= 90.0 {
            self.error
        } else if percentage >= 70.0 {
            self.warning
        } else {
            self.success
        };
        Style::default().fg(color)
    }
}
