use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{Terminal, backend::TestBackend, style::Color};
use tower_interface::{
    InterfaceError, MockAccountService, MockLiveFeed, MockNotesService, MockWorkflowClient,
    NotesService,
};
use tower_protocol::{
    EventScope, ListTasksResponse, LiveEvent, TaskEntry, User, WorkflowEntry, WorkflowStatus,
};

use crate::tui::{
    app::{AppSettings, AppState, Debounce, InputMode, SEARCH_DEBOUNCE, TowerApp, ViewType},
    bridge::ServiceBundle,
    live::ConnectionState,
    notification::{MessageLevel, SUCCESS_AUTOHIDE},
    theme::ThemeConfig,
    views::{DashboardView, HelpView, TasksView, View, ViewAction, WelcomeView},
};

const WAIT: Duration = Duration::from_secs(5);

struct Harness {
    app: TowerApp,
    workflows: Arc<MockWorkflowClient>,
    notes: Arc<MockNotesService>,
    account: Arc<MockAccountService>,
    live: Arc<MockLiveFeed>,
}

fn harness(initial_view: ViewType) -> Harness {
    let workflows = Arc::new(MockWorkflowClient::new());
    let notes = Arc::new(MockNotesService::new());
    let account = Arc::new(MockAccountService::new());
    let live = Arc::new(MockLiveFeed::new());
    let services = ServiceBundle {
        workflow_client: workflows.clone(),
        notes_service: notes.clone(),
        account_service: account.clone(),
        live_feed: live.clone(),
    };
    let settings = AppSettings {
        api_url: "http://tower.test/api".to_string(),
        ..Default::default()
    };
    Harness {
        app: TowerApp::new(initial_view, services, settings),
        workflows,
        notes,
        account,
        live,
    }
}

fn user(id: &str) -> User {
    serde_json::from_value(serde_json::json!({
        "id": id,
        "userName": "ada",
        "email": "ada@example.org",
    }))
    .unwrap()
}

fn entry(id: &str, hour: u32) -> WorkflowEntry {
    serde_json::from_value(serde_json::json!({
        "workflow": {
            "workflowId": id,
            "runName": format!("run-{id}"),
            "projectName": "nf-core/rnaseq",
            "submit": format!("2024-05-01T{hour:02}:00:00Z"),
            "start": format!("2024-05-01T{hour:02}:01:00Z"),
        }
    }))
    .unwrap()
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn type_text(app: &mut TowerApp, text: &str) {
    for c in text.chars() {
        app.handle_key(key(KeyCode::Char(c)));
    }
}

fn run_command(app: &mut TowerApp, line: &str) {
    app.handle_key(key(KeyCode::Char(':')));
    type_text(app, line);
    app.handle_key(key(KeyCode::Enter));
}

fn messages(app: &TowerApp, level: MessageLevel) -> Vec<String> {
    app.state()
        .notifications
        .iter()
        .filter(|message| message.level == level)
        .map(|message| message.text.clone())
        .collect()
}

fn ids(app: &TowerApp) -> Vec<String> {
    app.state()
        .workflows
        .workflows()
        .iter()
        .map(|entry| entry.id().to_string())
        .collect()
}

/// Sign in, load `list` and let the (empty) live stream open and close.
fn signed_in(list: Vec<WorkflowEntry>) -> Harness {
    let mut h = harness(ViewType::Dashboard);
    h.account.set_user_result(Ok(user("7")));
    h.workflows.push_list_result(Ok(list));
    h.app.start();
    assert_eq!(h.app.wait_for_updates(4, WAIT), 4);
    h
}

#[cfg(test)]
mod app_tests {
    use super::*;

    #[test]
    fn test_tower_app_creation() {
        let h = harness(ViewType::Dashboard);
        assert_eq!(h.app.current_view(), &ViewType::Welcome);
        assert!(!h.app.should_quit());
        assert!(!h.app.has_status_messages());
        assert_eq!(h.app.theme().name, "dark");
    }

    #[test]
    fn test_view_navigation() {
        let mut h = harness(ViewType::Dashboard);
        let app = &mut h.app;

        app.push_view(ViewType::Dashboard);
        assert_eq!(app.current_view(), &ViewType::Dashboard);
        assert_eq!(app.view_stack_len(), 1);

        app.push_view(ViewType::Help);
        assert_eq!(app.current_view(), &ViewType::Help);
        assert_eq!(app.view_stack_len(), 2);

        // pushing the current view again is a no-op
        app.push_view(ViewType::Help);
        assert_eq!(app.view_stack_len(), 2);

        app.pop_view();
        assert_eq!(app.current_view(), &ViewType::Dashboard);
        app.pop_view();
        assert_eq!(app.current_view(), &ViewType::Welcome);
        assert_eq!(app.view_stack_len(), 0);

        app.pop_view();
        assert_eq!(app.current_view(), &ViewType::Welcome);
    }

    #[test]
    fn test_view_switching() {
        let mut h = harness(ViewType::Dashboard);
        h.app.switch_view(ViewType::Help);
        assert_eq!(h.app.current_view(), &ViewType::Help);
        assert_eq!(h.app.view_stack_len(), 0);

        h.app.handle_key(key(KeyCode::Char('q')));
        assert!(h.app.should_quit());
    }

    #[test]
    fn test_view_type_names() {
        for view in [
            ViewType::Welcome,
            ViewType::Dashboard,
            ViewType::Tasks,
            ViewType::Account,
            ViewType::Help,
        ] {
            assert_eq!(ViewType::from_name(view.name()), Some(view));
        }
        assert_eq!(ViewType::from_name(" Workflows "), Some(ViewType::Dashboard));
        assert_eq!(ViewType::from_name("logs"), None);
    }

    #[test]
    fn test_status_messages() {
        let mut h = harness(ViewType::Dashboard);
        h.app
            .show_status_message("Saved".to_string(), MessageLevel::Success);
        h.app.show_error_message("Boom".to_string());
        assert!(h.app.has_status_messages());
        assert_eq!(h.app.state().last_error.as_deref(), Some("Boom"));

        h.app
            .on_tick(Instant::now() + SUCCESS_AUTOHIDE + Duration::from_millis(10));
        assert!(messages(&h.app, MessageLevel::Success).is_empty());
        assert_eq!(messages(&h.app, MessageLevel::Error), vec!["Boom"]);

        h.app.handle_key(key(KeyCode::Char('x')));
        assert!(!h.app.has_status_messages());
    }

    #[test]
    fn test_ctrl_c_quits_from_any_mode() {
        let mut h = harness(ViewType::Dashboard);
        h.app.handle_key(key(KeyCode::Char(':')));
        assert_eq!(h.app.state().input_mode, InputMode::Command);
        h.app
            .handle_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(h.app.should_quit());
    }

    #[test]
    fn test_debounce_fires_once_after_quiet_period() {
        let start = Instant::now();
        let mut debounce = Debounce::new(SEARCH_DEBOUNCE);
        assert!(!debounce.fire(start + SEARCH_DEBOUNCE));

        debounce.arm(start);
        debounce.arm(start + Duration::from_millis(300));
        assert!(!debounce.fire(start + SEARCH_DEBOUNCE));
        assert!(debounce.fire(start + Duration::from_millis(800)));
        assert!(!debounce.is_armed());
        assert!(!debounce.fire(start + Duration::from_secs(5)));

        debounce.arm(start);
        debounce.cancel();
        assert!(!debounce.fire(start + Duration::from_secs(5)));
    }

    #[test]
    fn test_app_state_default() {
        let state = AppState::default();
        assert!(state.user.is_none());
        assert_eq!(state.selected, 0);
        assert!(state.selected_workflow().is_none());
        assert!(state.show_welcome_panel());
        assert_eq!(state.input_mode, InputMode::Normal);
        assert_eq!(state.live.state(), ConnectionState::Disconnected);
    }
}

#[cfg(test)]
mod theme_tests {
    use super::*;

    #[test]
    fn test_theme_variants() {
        let dark = ThemeConfig::default_dark();
        let light = ThemeConfig::default_light();
        assert_ne!(dark, light);
        assert_eq!(ThemeConfig::by_name("LIGHT"), light);
        assert_eq!(ThemeConfig::by_name("solarized"), dark);
        assert_eq!(ThemeConfig::default(), dark);
    }

    #[test]
    fn test_status_colors() {
        let theme = ThemeConfig::default_dark();
        assert_eq!(theme.status_style(WorkflowStatus::Failed).fg, Some(Color::Red));
        assert_eq!(
            theme.status_style(WorkflowStatus::Succeeded).fg,
            Some(theme.success)
        );
        assert_eq!(
            theme.message_style(MessageLevel::Warning).fg,
            Some(theme.warning)
        );
    }

    #[test]
    fn test_percentage_thresholds() {
        let theme = ThemeConfig::default_dark();
        assert_eq!(theme.percentage_style(12.0).fg, Some(theme.success));
        assert_eq!(theme.percentage_style(75.0).fg, Some(theme.warning));
        assert_eq!(theme.percentage_style(99.5).fg, Some(theme.error));
    }
}

#[cfg(test)]
mod view_tests {
    use super::*;

    #[test]
    fn test_view_metadata() {
        let theme = ThemeConfig::default();
        let dashboard = DashboardView::new(&theme);
        assert_eq!(dashboard.title(), "Dashboard");
        assert!(dashboard.can_focus());

        let help = HelpView::new(&theme);
        assert!(!help.can_focus());
        assert!(help.help_text().iter().any(|(key, _)| *key == "Esc"));

        assert_eq!(TasksView::new(&theme).title(), "Tasks");
    }

    #[test]
    fn test_dashboard_key_bindings() {
        let theme = ThemeConfig::default();
        let state = AppState::default();
        let view = DashboardView::new(&theme);
        assert_eq!(
            view.handle_key(key(KeyCode::Char('j')), &state),
            ViewAction::MoveSelection(1)
        );
        assert_eq!(
            view.handle_key(key(KeyCode::Up), &state),
            ViewAction::MoveSelection(-1)
        );
        assert_eq!(
            view.handle_key(key(KeyCode::Char('/')), &state),
            ViewAction::BeginSearch
        );
        assert_eq!(
            view.handle_key(key(KeyCode::Char('t')), &state),
            ViewAction::PushView(ViewType::Tasks)
        );
        assert_eq!(
            WelcomeView::new(&theme).handle_key(key(KeyCode::Char('r')), &state),
            ViewAction::RetrySession
        );
    }

    #[test]
    fn test_every_view_renders() {
        let mut h = signed_in(vec![entry("a", 9), entry("b", 8)]);
        let mut terminal = Terminal::new(TestBackend::new(140, 45)).unwrap();
        for view in [
            ViewType::Dashboard,
            ViewType::Help,
            ViewType::Welcome,
            ViewType::Account,
            ViewType::Tasks,
        ] {
            h.app.switch_view(view);
            terminal.draw(|frame| h.app.render(frame)).unwrap();
        }
    }
}

#[cfg(test)]
mod flow_tests {
    use super::*;

    #[test]
    fn sign_in_loads_list_and_applies_live_updates() {
        let mut h = harness(ViewType::Dashboard);
        h.account.set_user_result(Ok(user("7")));
        h.workflows
            .push_list_result(Ok(vec![entry("a", 8), entry("b", 10)]));
        h.live.set_messages(vec![Ok(vec![LiveEvent::WorkflowUpdate {
            scope: EventScope {
                user_id: Some("7".into()),
                workflow_id: Some("c".into()),
            },
            workflow: Some(Box::new(entry("c", 12))),
        }])]);

        h.app.start();
        assert_eq!(h.app.wait_for_updates(2, WAIT), 2);
        assert_eq!(h.app.current_view(), &ViewType::Dashboard);
        assert_eq!(ids(&h.app), vec!["b", "a"]);
        assert_eq!(h.workflows.list_requests()[0].max, Some(30));

        assert_eq!(h.app.wait_for_updates(2, WAIT), 2);
        assert_eq!(h.app.state().live.state(), ConnectionState::Connected);
        assert_eq!(ids(&h.app), vec!["c", "b", "a"]);
        assert_eq!(h.live.open_count(), 1);
    }

    #[test]
    fn heartbeat_leaves_no_notification() {
        let mut h = harness(ViewType::Dashboard);
        h.account.set_user_result(Ok(user("7")));
        h.workflows.push_list_result(Ok(vec![entry("a", 8)]));
        h.live.set_messages(vec![Ok(vec![LiveEvent::Heartbeat {
            scope: EventScope::for_user("7"),
        }])]);

        h.app.start();
        assert_eq!(h.app.wait_for_updates(4, WAIT), 4);
        assert!(!h.app.has_status_messages());
        assert_eq!(ids(&h.app), vec!["a"]);
    }

    #[test]
    fn error_event_is_reported_once_and_stops_updates() {
        let mut h = harness(ViewType::Dashboard);
        h.account.set_user_result(Ok(user("7")));
        h.workflows.push_list_result(Ok(vec![entry("a", 8)]));
        h.live.set_messages(vec![Ok(vec![
            LiveEvent::Error {
                scope: EventScope::for_user("7"),
                kind: Some("WorkflowNotFound".into()),
                message: "Subscription rejected".into(),
            },
            LiveEvent::WorkflowUpdate {
                scope: EventScope::for_user("7"),
                workflow: Some(Box::new(entry("z", 12))),
            },
        ])]);

        h.app.start();
        assert_eq!(h.app.wait_for_updates(4, WAIT), 4);
        // a trailing close signal, if any, belongs to the dead stream
        h.app.wait_for_updates(1, Duration::from_millis(200));

        assert_eq!(
            messages(&h.app, MessageLevel::Error),
            vec!["Subscription rejected"]
        );
        assert_eq!(h.app.state().live.state(), ConnectionState::Errored);
        assert!(h.app.state().dispatcher.is_terminated());
        assert_eq!(ids(&h.app), vec!["a"]);
    }

    #[test]
    fn failed_open_is_reported_once_without_retry() {
        let mut h = harness(ViewType::Dashboard);
        h.account.set_user_result(Ok(user("7")));
        h.workflows.push_list_result(Ok(vec![entry("a", 8)]));
        h.live
            .fail_open_with(InterfaceError::Transport("connection refused".into()));

        h.app.start();
        assert_eq!(h.app.wait_for_updates(3, WAIT), 3);
        h.app.on_tick(Instant::now() + Duration::from_secs(60));
        assert_eq!(h.app.wait_for_updates(1, Duration::from_millis(200)), 0);

        assert_eq!(h.app.state().live.state(), ConnectionState::Errored);
        assert_eq!(
            messages(&h.app, MessageLevel::Error),
            vec!["Live updates unavailable: connection refused"]
        );
        assert_eq!(h.live.open_count(), 1);
        assert_eq!(ids(&h.app), vec!["a"]);
    }

    #[test]
    fn stream_ending_after_messages_is_reported_once() {
        let mut h = harness(ViewType::Dashboard);
        h.account.set_user_result(Ok(user("7")));
        h.workflows.push_list_result(Ok(vec![entry("a", 8)]));
        h.live.set_messages(vec![
            Ok(vec![LiveEvent::Heartbeat {
                scope: EventScope::for_user("7"),
            }]),
            Ok(vec![LiveEvent::WorkflowUpdate {
                scope: EventScope::for_user("7"),
                workflow: Some(Box::new(entry("b", 9))),
            }]),
        ]);

        h.app.start();
        // user, list, opened, two messages, closed
        assert_eq!(h.app.wait_for_updates(6, WAIT), 6);
        h.app.on_tick(Instant::now() + Duration::from_secs(60));
        assert_eq!(h.app.wait_for_updates(1, Duration::from_millis(200)), 0);

        assert_eq!(h.app.state().live.state(), ConnectionState::Errored);
        assert_eq!(
            messages(&h.app, MessageLevel::Error),
            vec!["Live updates disconnected"]
        );
        assert_eq!(ids(&h.app), vec!["b", "a"]);
        assert_eq!(h.live.open_count(), 1);
    }

    #[test]
    fn transport_error_mid_stream_is_reported_once() {
        let mut h = harness(ViewType::Dashboard);
        h.account.set_user_result(Ok(user("7")));
        h.workflows.push_list_result(Ok(Vec::new()));
        h.live.set_messages(vec![
            Ok(Vec::new()),
            Err(InterfaceError::Transport("stream reset".into())),
            Ok(vec![LiveEvent::WorkflowUpdate {
                scope: EventScope::for_user("7"),
                workflow: Some(Box::new(entry("late", 9))),
            }]),
        ]);

        h.app.start();
        // user, list, opened, keep-alive, failure; the reader stops there
        assert_eq!(h.app.wait_for_updates(5, WAIT), 5);
        assert_eq!(h.app.wait_for_updates(1, Duration::from_millis(200)), 0);

        assert_eq!(h.app.state().live.state(), ConnectionState::Errored);
        assert_eq!(
            messages(&h.app, MessageLevel::Error),
            vec!["Live updates unavailable: stream reset"]
        );
        assert!(ids(&h.app).is_empty());
    }

    #[test]
    fn missing_token_keeps_the_welcome_view() {
        let mut h = harness(ViewType::Dashboard);
        h.account
            .set_user_result(Err(InterfaceError::Unauthorized("401".into())));

        h.app.start();
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);
        assert_eq!(h.app.current_view(), &ViewType::Welcome);
        assert_eq!(
            messages(&h.app, MessageLevel::Error),
            vec!["Not signed in: set an access token"]
        );
        assert!(h.workflows.list_requests().is_empty());
    }

    #[test]
    fn unauthorized_list_ends_the_session() {
        let mut h = harness(ViewType::Dashboard);
        h.account.set_user_result(Ok(user("7")));
        h.workflows
            .push_list_result(Err(InterfaceError::Unauthorized("expired".into())));

        h.app.start();
        assert_eq!(h.app.wait_for_updates(2, WAIT), 2);
        assert_eq!(h.app.current_view(), &ViewType::Welcome);
        assert!(h.app.state().user.is_none());
        assert!(h.app.state().workflows.is_empty());
        assert_eq!(h.app.state().live.state(), ConnectionState::Disconnected);
        assert_eq!(messages(&h.app, MessageLevel::Error), vec!["Session expired"]);
        assert_eq!(h.live.open_count(), 0);
    }

    #[test]
    fn other_errors_surface_their_message() {
        let mut h = harness(ViewType::Dashboard);
        h.account.set_user_result(Ok(user("7")));
        h.workflows
            .push_list_result(Err(InterfaceError::Forbidden("team only".into())));

        h.app.start();
        assert_eq!(h.app.wait_for_updates(2, WAIT), 2);
        assert_eq!(h.app.current_view(), &ViewType::Dashboard);
        assert_eq!(messages(&h.app, MessageLevel::Error), vec!["Forbidden access"]);
    }

    #[test]
    fn delete_requires_confirmation() {
        let mut h = signed_in(vec![entry("a", 10), entry("b", 8)]);

        h.app.handle_key(key(KeyCode::Char('d')));
        assert!(matches!(
            h.app.state().input_mode,
            InputMode::ConfirmDelete { ref workflow_id, .. } if workflow_id == "a"
        ));
        h.app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(h.app.state().input_mode, InputMode::Normal);

        h.app.handle_key(key(KeyCode::Char('d')));
        h.app.handle_key(key(KeyCode::Char('y')));
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);

        assert_eq!(h.workflows.deleted(), vec!["a"]);
        assert_eq!(ids(&h.app), vec!["b"]);
        assert!(messages(&h.app, MessageLevel::Success).is_empty());
    }

    #[test]
    fn search_runs_after_debounce() {
        let mut h = signed_in(vec![entry("a", 10), entry("b", 8)]);
        h.workflows.push_list_result(Ok(vec![entry("b", 8)]));

        h.app.handle_key(key(KeyCode::Char('/')));
        type_text(&mut h.app, "rna");
        assert_eq!(h.app.state().input_mode, InputMode::Search);
        h.app.on_tick(Instant::now());
        assert_eq!(h.workflows.list_requests().len(), 1);

        h.app.on_tick(Instant::now() + SEARCH_DEBOUNCE);
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);

        let request = h.workflows.list_requests().pop().unwrap();
        assert_eq!(request.search.as_deref(), Some("rna"));
        assert_eq!(request.offset, Some(0));
        assert!(h.app.state().workflows.is_search_active());
        assert_eq!(ids(&h.app), vec!["b"]);
    }

    #[test]
    fn moving_past_the_last_row_loads_the_next_page() {
        let page: Vec<_> = (0..30).map(|i| entry(&format!("w{i:02}"), 23 - i % 24)).collect();
        let mut h = signed_in(page);
        h.workflows.push_list_result(Ok(vec![entry("older", 0)]));

        h.app.apply_action(ViewAction::MoveSelection(100));
        assert_eq!(h.app.state().selected, 29);
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);

        assert_eq!(h.workflows.list_requests()[1].offset, Some(30));
        assert_eq!(h.app.state().workflows.len(), 31);
        assert!(!h.app.state().workflows.has_more());
    }

    #[test]
    fn tag_command_updates_open_detail() {
        let mut h = signed_in(vec![entry("a", 10)]);
        h.workflows.insert_workflow(entry("a", 10));

        h.app.handle_key(key(KeyCode::Enter));
        assert_eq!(h.app.wait_for_updates(2, WAIT), 2);
        assert_eq!(h.app.state().dispatcher.watched_workflow(), Some("a"));
        assert!(!h.app.state().selected_detail().unwrap().loading);

        run_command(&mut h.app, "tag add \"needs review\"");
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);

        let detail = h.app.state().selected_detail().unwrap();
        assert_eq!(detail.tags.len(), 1);
        assert_eq!(detail.tags[0].text, "needs review");
        assert_eq!(
            messages(&h.app, MessageLevel::Success),
            vec!["Tag 'needs review' added"]
        );
        assert_eq!(h.notes.list_tags("a").unwrap().len(), 1);
    }

    #[test]
    fn comments_can_be_edited_and_removed() {
        let mut h = signed_in(vec![entry("a", 10)]);
        h.workflows.insert_workflow(entry("a", 10));
        h.workflows.set_metrics(vec![
            serde_json::from_value(serde_json::json!({
                "process": "FASTQC",
                "cpu": { "mean": 93.5, "max": 120.0 },
            }))
            .unwrap(),
        ]);

        h.app.handle_key(key(KeyCode::Enter));
        assert_eq!(h.app.wait_for_updates(2, WAIT), 2);
        assert_eq!(h.app.state().selected_detail().unwrap().metrics.len(), 1);

        run_command(&mut h.app, "comment rerun with more memory");
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);
        let comment_id = h.app.state().selected_detail().unwrap().comments[0].id;

        run_command(&mut h.app, &format!("comment edit {comment_id} rerun on the big queue"));
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);
        assert_eq!(
            h.app.state().selected_detail().unwrap().comments[0].text,
            "rerun on the big queue"
        );

        run_command(&mut h.app, &format!("comment rm {comment_id}"));
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);
        assert!(h.app.state().selected_detail().unwrap().comments.is_empty());
        assert!(h.notes.list_comments("a").unwrap().is_empty());
    }

    #[test]
    fn created_token_secret_is_kept_for_display() {
        let mut h = signed_in(vec![entry("a", 10)]);
        h.app.push_view(ViewType::Account);
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);
        assert_eq!(
            h.app.state().account.service_info.as_ref().unwrap().version.as_deref(),
            Some("mock")
        );

        run_command(&mut h.app, "token create ci");
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);

        let account = &h.app.state().account;
        assert_eq!(account.tokens.len(), 1);
        assert!(account.tokens[0].token.is_none());
        assert!(account.created_token.as_ref().unwrap().token.is_some());
    }

    #[test]
    fn malformed_command_is_an_error() {
        let mut h = harness(ViewType::Dashboard);
        run_command(&mut h.app, "launch now");
        assert_eq!(
            messages(&h.app, MessageLevel::Error),
            vec!["Unknown command: launch now"]
        );
        assert_eq!(h.app.state().input_mode, InputMode::Normal);
    }

    #[test]
    fn tasks_view_loads_the_selected_workflow() {
        let mut h = signed_in(vec![entry("a", 10)]);
        let task = serde_json::from_value(serde_json::json!({
            "taskId": 1,
            "status": "COMPLETED",
            "name": "FASTQC (1)",
            "pcpu": 88.0,
        }))
        .unwrap();
        h.workflows.set_tasks(ListTasksResponse {
            tasks: vec![TaskEntry { task }],
            total: 60,
        });

        h.app.handle_key(key(KeyCode::Char('t')));
        assert_eq!(h.app.current_view(), &ViewType::Tasks);
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);

        let tasks = &h.app.state().tasks;
        assert_eq!(tasks.workflow_id.as_deref(), Some("a"));
        assert_eq!(tasks.rows.len(), 1);
        assert_eq!(tasks.page_count(), 3);

        h.app.handle_key(key(KeyCode::Char('n')));
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);
        assert_eq!(h.app.state().tasks.page_index(), 1);
    }

    #[test]
    fn running_workflow_tasks_are_polled() {
        let mut h = signed_in(vec![entry("a", 10)]);
        assert!(h.app.state().workflows.cached("a").unwrap().workflow.is_running());

        h.app.handle_key(key(KeyCode::Char('t')));
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);
        assert_eq!(h.workflows.tasks_requests().len(), 1);

        // not due yet
        h.app.on_tick(Instant::now());
        assert_eq!(h.app.wait_for_updates(1, Duration::from_millis(200)), 0);
        assert_eq!(h.workflows.tasks_requests().len(), 1);

        h.app
            .on_tick(Instant::now() + AppSettings::default().refresh_interval);
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);

        let requests = h.workflows.tasks_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].0, "a");
        assert_eq!(requests[1].1.start, 0);
    }

    #[test]
    fn finished_workflow_tasks_are_not_polled() {
        let mut done = entry("a", 10);
        done.workflow.complete = done.workflow.start;
        let mut h = signed_in(vec![done]);

        h.app.handle_key(key(KeyCode::Char('t')));
        assert_eq!(h.app.wait_for_updates(1, WAIT), 1);

        h.app.on_tick(Instant::now() + Duration::from_secs(3600));
        assert_eq!(h.app.wait_for_updates(1, Duration::from_millis(200)), 0);
        assert_eq!(h.workflows.tasks_requests().len(), 1);
    }

    #[test]
    fn tasks_view_without_selection_goes_back() {
        let mut h = signed_in(Vec::new());
        h.app.push_view(ViewType::Tasks);
        assert_eq!(h.app.current_view(), &ViewType::Dashboard);
        assert_eq!(
            messages(&h.app, MessageLevel::Error).last().map(String::as_str),
            Some("No workflow selected")
        );
    }
}
