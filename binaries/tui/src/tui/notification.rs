use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

pub const SUCCESS_AUTOHIDE: Duration = Duration::from_millis(3000);
pub const MAX_NOTIFICATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub id: u64,
    pub level: MessageLevel,
    pub text: String,
    pub created_at: Instant,
    pub autohide: Option<Duration>,
}

impl StatusMessage {
    fn is_expired(&self, now: Instant) -> bool {
        self.autohide
            .is_some_and(|delay| now.saturating_duration_since(self.created_at) >= delay)
    }
}

/// Bounded queue of toasts. The oldest entry is evicted on overflow.
#[derive(Debug)]
pub struct NotificationCenter {
    messages: VecDeque<StatusMessage>,
    next_id: u64,
    capacity: usize,
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::with_capacity(MAX_NOTIFICATIONS)
    }
}

impl NotificationCenter {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: VecDeque::with_capacity(capacity),
            next_id: 0,
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, level: MessageLevel, text: impl Into<String>) -> u64 {
        let autohide = match level {
            MessageLevel::Success | MessageLevel::Info => Some(SUCCESS_AUTOHIDE),
            MessageLevel::Warning | MessageLevel::Error => None,
        };
        self.push_at(level, text.into(), autohide, Instant::now())
    }

    fn push_at(
        &mut self,
        level: MessageLevel,
        text: String,
        autohide: Option<Duration>,
        now: Instant,
    ) -> u64 {
        self.next_id += 1;
        if self.messages.len() == self.capacity {
            self.messages.pop_front();
        }
        self.messages.push_back(StatusMessage {
            id: self.next_id,
            level,
            text,
            created_at: now,
            autohide,
        });
        self.next_id
    }

    pub fn error(&mut self, text: impl Into<String>) -> u64 {
        self.push(MessageLevel::Error, text)
    }

    /// Drop auto-hiding messages whose delay elapsed.
    pub fn expire(&mut self, now: Instant) {
        self.messages.retain(|message| !message.is_expired(now));
    }

    pub fn dismiss_latest(&mut self) -> Option<StatusMessage> {
        self.messages.pop_back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusMessage> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
