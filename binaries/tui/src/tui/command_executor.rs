use tower_interface::InterfaceError;
use tower_protocol::{
    AccessToken, ListTasksResponse, Progress, ServiceInfo, Team, User, WorkflowComment,
    WorkflowEntry, WorkflowMetrics, WorkflowTag,
};

use super::{app::ViewType, live::LiveSignal, workflow_list::FetchTicket};

/// Results delivered from background work to the UI loop.
#[derive(Debug, Clone)]
pub enum StateUpdate {
    UserResolved(Result<User, InterfaceError>),
    WorkflowsFetched {
        ticket: FetchTicket,
        result: Result<Vec<WorkflowEntry>, InterfaceError>,
    },
    WorkflowFetched {
        workflow_id: String,
        result: Result<WorkflowEntry, InterfaceError>,
    },
    ProgressFetched {
        workflow_id: String,
        result: Result<Progress, InterfaceError>,
    },
    DetailFetched {
        workflow_id: String,
        tags: Result<Vec<WorkflowTag>, InterfaceError>,
        comments: Result<Vec<WorkflowComment>, InterfaceError>,
        /// Empty when the server has no metrics for the run yet.
        metrics: Vec<WorkflowMetrics>,
    },
    TasksFetched {
        workflow_id: String,
        start: u32,
        result: Result<ListTasksResponse, InterfaceError>,
    },
    AccountFetched(Result<AccountSnapshot, InterfaceError>),
    WorkflowDeleted {
        workflow_id: String,
        result: Result<(), InterfaceError>,
    },
    CommandFinished(Result<CommandOutcome, InterfaceError>),
    Live {
        generation: u64,
        signal: LiveSignal,
    },
}

#[derive(Debug, Clone, Default)]
pub struct AccountSnapshot {
    pub teams: Vec<Team>,
    pub tokens: Vec<AccessToken>,
    pub service_info: Option<ServiceInfo>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    TagAdded {
        workflow_id: String,
        tag: WorkflowTag,
    },
    TagRemoved {
        tag_id: u64,
    },
    CommentAdded {
        workflow_id: String,
        comment: WorkflowComment,
    },
    CommentUpdated {
        workflow_id: String,
        comment_id: u64,
        text: String,
    },
    CommentRemoved {
        workflow_id: String,
        comment_id: u64,
    },
    TokenCreated(AccessToken),
    TokenRemoved(u64),
    TeamCreated(Team),
    TeamRemoved(u64),
}

impl CommandOutcome {
    pub fn summary(&self) -> String {
        match self {
            CommandOutcome::TagAdded { tag, .. } => format!("Tag '{}' added", tag.text),
            CommandOutcome::TagRemoved { .. } => "Tag removed".to_string(),
            CommandOutcome::CommentAdded { .. } => "Comment added".to_string(),
            CommandOutcome::CommentUpdated { comment_id, .. } => {
                format!("Comment #{comment_id} updated")
            }
            CommandOutcome::CommentRemoved { .. } => "Comment deleted".to_string(),
            CommandOutcome::TokenCreated(token) => format!("Token '{}' created", token.name),
            CommandOutcome::TokenRemoved(_) => "Token deleted".to_string(),
            CommandOutcome::TeamCreated(team) => format!("Team '{}' created", team.name),
            CommandOutcome::TeamRemoved(_) => "Team deleted".to_string(),
        }
    }
}

/// A line typed in command mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    Search(String),
    Refresh,
    Delete,
    TagAdd(String),
    TagRemove(u64),
    Comment(String),
    CommentEdit(u64, String),
    CommentRemove(u64),
    TokenCreate(String),
    TokenRemove(u64),
    TeamCreate(String),
    TeamRemove(u64),
    View(ViewType),
    Quit,
}

pub fn parse_command(input: &str) -> Result<AppCommand, String> {
    let words = shell_words::split(input).map_err(|err| format!("Invalid command: {err}"))?;
    let words: Vec<&str> = words.iter().map(String::as_str).collect();

    let command = match words.as_slice() {
        [] => return Err("Empty command".to_string()),
        ["search", text @ ..] => AppCommand::Search(text.join(" ")),
        ["refresh"] => AppCommand::Refresh,
        ["delete"] => AppCommand::Delete,
        ["tag", "add", text @ ..] if !text.is_empty() => AppCommand::TagAdd(text.join(" ")),
        ["tag", "rm", id] => AppCommand::TagRemove(parse_id(id)?),
        ["comment", "edit", id, text @ ..] if !text.is_empty() => {
            AppCommand::CommentEdit(parse_id(id)?, text.join(" "))
        }
        ["comment", "rm", id] => AppCommand::CommentRemove(parse_id(id)?),
        ["comment", text @ ..] if !text.is_empty() => AppCommand::Comment(text.join(" ")),
        ["token", "create", name @ ..] if !name.is_empty() => {
            AppCommand::TokenCreate(name.join(" "))
        }
        ["token", "rm", id] => AppCommand::TokenRemove(parse_id(id)?),
        ["team", "create", name @ ..] if !name.is_empty() => {
            AppCommand::TeamCreate(name.join(" "))
        }
        ["team", "rm", id] => AppCommand::TeamRemove(parse_id(id)?),
        ["view", name] => AppCommand::View(
            ViewType::from_name(name).ok_or_else(|| format!("Unknown view: {name}"))?,
        ),
        ["quit"] | ["q"] => AppCommand::Quit,
        _ => return Err(format!("Unknown command: {}", input.trim())),
    };
    Ok(command)
}

fn parse_id(raw: &str) -> Result<u64, String> {
    raw.parse()
        .map_err(|_| format!("Expected a numeric id, got '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quoted_arguments_stay_together() {
        assert_eq!(
            parse_command(r#"tag add "needs review""#),
            Ok(AppCommand::TagAdd("needs review".into()))
        );
        assert_eq!(
            parse_command("comment rerun with more memory"),
            Ok(AppCommand::Comment("rerun with more memory".into()))
        );
        assert_eq!(
            parse_command("search 'rna seq'"),
            Ok(AppCommand::Search("rna seq".into()))
        );
    }

    #[test]
    fn comment_subcommands_take_an_id() {
        assert_eq!(
            parse_command("comment edit 12 \"use the large queue\""),
            Ok(AppCommand::CommentEdit(12, "use the large queue".into()))
        );
        assert_eq!(parse_command("comment rm 12"), Ok(AppCommand::CommentRemove(12)));
        assert!(parse_command("comment edit x text").is_err());
    }

    #[test]
    fn empty_search_clears_the_filter() {
        assert_eq!(parse_command("search"), Ok(AppCommand::Search(String::new())));
    }

    #[test]
    fn ids_must_be_numeric() {
        assert_eq!(parse_command("token rm 42"), Ok(AppCommand::TokenRemove(42)));
        assert!(parse_command("team rm abc").unwrap_err().contains("numeric"));
    }

    #[test]
    fn views_and_quit() {
        assert_eq!(
            parse_command("view account"),
            Ok(AppCommand::View(ViewType::Account))
        );
        assert!(parse_command("view nowhere").is_err());
        assert_eq!(parse_command("q"), Ok(AppCommand::Quit));
    }

    #[test]
    fn malformed_input_is_rejected() {
        assert!(parse_command("").is_err());
        assert!(parse_command("tag add").is_err());
        assert!(parse_command("comment \"unterminated").is_err());
        assert!(parse_command("launch pipeline").is_err());
    }
}
