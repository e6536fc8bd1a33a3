//! Workflow sidebar state.
//!
//! [`reconcile`] merges a batch of workflows into the list currently shown.
//! It is pure; [`WorkflowListState`] owns the list, the by-id cache of every
//! workflow seen so far and the fetch bookkeeping, and funnels every change
//! through a single `apply` step.

use std::collections::{HashMap, HashSet};

use tower_protocol::{FilteringParams, Progress, WorkflowEntry};
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 30;

/// UI state that selects how an emitted batch is merged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReconcileTriggers {
    pub is_next_page_load_triggered: bool,
    pub is_search_triggered: bool,
    pub is_search_active: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReconcilePolicy {
    AppendNewlySeen,
    ReplaceWithSearchResults,
    IntersectWithActiveSearch,
    Replace,
}

impl ReconcileTriggers {
    pub fn policy(&self) -> ReconcilePolicy {
        if self.is_next_page_load_triggered {
            ReconcilePolicy::AppendNewlySeen
        } else if self.is_search_triggered {
            ReconcilePolicy::ReplaceWithSearchResults
        } else if self.is_search_active {
            ReconcilePolicy::IntersectWithActiveSearch
        } else {
            ReconcilePolicy::Replace
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Reconciled {
    pub workflows: Vec<WorkflowEntry>,
    pub offset: usize,
}

pub fn reconcile(
    current: &[WorkflowEntry],
    emitted: &[WorkflowEntry],
    triggers: ReconcileTriggers,
) -> Reconciled {
    let merged: Vec<WorkflowEntry> = match triggers.policy() {
        ReconcilePolicy::AppendNewlySeen => {
            let known: HashSet<&str> = current.iter().map(WorkflowEntry::id).collect();
            current
                .iter()
                .chain(emitted.iter().filter(|entry| !known.contains(entry.id())))
                .cloned()
                .collect()
        }
        ReconcilePolicy::IntersectWithActiveSearch => {
            let fresh: HashMap<&str, &WorkflowEntry> =
                emitted.iter().map(|entry| (entry.id(), entry)).collect();
            current
                .iter()
                .filter_map(|entry| fresh.get(entry.id()).map(|fresh| (*fresh).clone()))
                .collect()
        }
        ReconcilePolicy::ReplaceWithSearchResults | ReconcilePolicy::Replace => emitted.to_vec(),
    };

    let mut workflows = dedupe_by_id(merged);
    sort_by_start_desc(&mut workflows);
    Reconciled {
        offset: workflows.len(),
        workflows,
    }
}

/// Drop repeated ids, keeping the first occurrence.
pub fn dedupe_by_id(entries: Vec<WorkflowEntry>) -> Vec<WorkflowEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|entry| seen.insert(entry.id().to_string()))
        .collect()
}

/// Stable sort, newest start first; workflows that never started go last.
pub fn sort_by_start_desc(entries: &mut [WorkflowEntry]) {
    entries.sort_by(|a, b| b.start().cmp(&a.start()));
}

/// Identifies one list request. Only the latest issued ticket is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FetchTicket(u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchKind {
    Initial,
    NextPage,
    Search,
    Refresh,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FetchRequest {
    pub ticket: FetchTicket,
    pub kind: FetchKind,
    pub params: FilteringParams,
}

#[derive(Clone, Debug)]
struct PendingFetch {
    ticket: FetchTicket,
    kind: FetchKind,
    triggers: ReconcileTriggers,
    search_text: String,
    max: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied,
    Stale,
}

#[derive(Debug)]
pub struct WorkflowListState {
    workflows: Vec<WorkflowEntry>,
    offset: usize,
    cache: HashMap<String, WorkflowEntry>,
    page_size: u32,
    /// Search text that produced the current list.
    search_text: String,
    pending: Option<PendingFetch>,
    next_ticket: u64,
    end_reached: bool,
    loaded: bool,
}

impl Default for WorkflowListState {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl WorkflowListState {
    pub fn new(page_size: u32) -> Self {
        Self {
            workflows: Vec::new(),
            offset: 0,
            cache: HashMap::new(),
            page_size: page_size.max(1),
            search_text: String::new(),
            pending: None,
            next_ticket: 0,
            end_reached: false,
            loaded: false,
        }
    }

    pub fn workflows(&self) -> &[WorkflowEntry] {
        &self.workflows
    }

    pub fn get(&self, index: usize) -> Option<&WorkflowEntry> {
        self.workflows.get(index)
    }

    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }

    pub fn offset(&self) -> usize {
        self.offset
    }


    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn is_search_active(&self) -> bool {
        !self.search_text.trim().is_empty()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// True once the first list response was applied.
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub fn has_more(&self) -> bool {
        !self.end_reached
    }

    pub fn cached(&self, workflow_id: &str) -> Option<&WorkflowEntry> {
        self.cache.get(workflow_id)
    }

    pub fn position(&self, workflow_id: &str) -> Option<usize> {
        self.workflows
            .iter()
            .position(|entry| entry.id() == workflow_id)
    }

    /// First page with the committed search. Served from the cache when it
    /// already holds workflows, in which case no request is needed.
    pub fn begin_load(&mut self) -> Option<FetchRequest> {
        if self.cache.is_empty() {
            let search = self.search_text.clone();
            return Some(self.begin_fetch(FetchKind::Initial, search, 0));
        }
        self.emit_from_cache();
        None
    }

    pub fn begin_search(&mut self, text: &str) -> FetchRequest {
        self.begin_fetch(FetchKind::Search, text.to_string(), 0)
    }

    pub fn begin_refresh(&mut self) -> FetchRequest {
        let search = self.search_text.clone();
        self.begin_fetch(FetchKind::Refresh, search, 0)
    }

    /// Next page after the rows already shown. Refused while any fetch is
    /// in flight or once the server returned a short page.
    pub fn begin_next_page(&mut self) -> Option<FetchRequest> {
        if self.pending.is_some() || self.end_reached {
            return None;
        }
        let search = self.search_text.clone();
        let offset = u32::try_from(self.offset).unwrap_or(u32::MAX);
        Some(self.begin_fetch(FetchKind::NextPage, search, offset))
    }

    fn begin_fetch(&mut self, kind: FetchKind, search_text: String, offset: u32) -> FetchRequest {
        self.next_ticket += 1;
        let ticket = FetchTicket(self.next_ticket);
        let is_search_active = !search_text.trim().is_empty();
        let triggers = ReconcileTriggers {
            is_next_page_load_triggered: kind == FetchKind::NextPage,
            is_search_triggered: matches!(kind, FetchKind::Search | FetchKind::Refresh),
            is_search_active,
        };
        let params = FilteringParams::new(
            Some(self.page_size),
            Some(offset),
            Some(search_text.clone()),
        );

        self.pending = Some(PendingFetch {
            ticket,
            kind,
            triggers,
            search_text,
            max: self.page_size,
        });

        FetchRequest {
            ticket,
            kind,
            params,
        }
    }

    /// Merge a list response. Responses to superseded requests are dropped.
    pub fn apply_fetch(&mut self, ticket: FetchTicket, batch: Vec<WorkflowEntry>) -> FetchOutcome {
        let Some(pending) = self.pending.take_if(|pending| pending.ticket == ticket) else {
            debug!(target: "tui", ?ticket, "discarding stale workflow list response");
            return FetchOutcome::Stale;
        };

        self.end_reached = (batch.len() as u64) < u64::from(pending.max);
        for entry in &batch {
            self.cache.insert(entry.id().to_string(), entry.clone());
        }

        let reconciled = reconcile(&self.workflows, &batch, pending.triggers);
        if pending.kind != FetchKind::NextPage {
            self.search_text = pending.search_text;
        }
        self.loaded = true;
        self.apply(reconciled);
        FetchOutcome::Applied
    }

    /// Forget a failed request so that it can be retried.
    pub fn fail_fetch(&mut self, ticket: FetchTicket) -> FetchOutcome {
        if self.pending.take_if(|pending| pending.ticket == ticket).is_some() {
            FetchOutcome::Applied
        } else {
            FetchOutcome::Stale
        }
    }

    /// Insert or replace one workflow and re-emit the cache.
    pub fn upsert(&mut self, entry: WorkflowEntry) {
        self.cache.insert(entry.id().to_string(), entry);
        self.emit_from_cache();
    }

    /// Replace the progress of a cached workflow. Returns false when the
    /// workflow is unknown.
    pub fn update_progress(&mut self, workflow_id: &str, progress: Progress) -> bool {
        let Some(cached) = self.cache.get_mut(workflow_id) else {
            return false;
        };
        cached.progress = Some(progress.clone());
        if let Some(shown) = self
            .workflows
            .iter_mut()
            .find(|entry| entry.id() == workflow_id)
        {
            shown.progress = Some(progress);
        }
        true
    }

    pub fn remove(&mut self, workflow_id: &str) -> Option<WorkflowEntry> {
        let removed = self.cache.remove(workflow_id);
        if removed.is_some() {
            self.emit_from_cache();
        }
        removed
    }

    /// Emit the whole cache, newest first, under the committed search
    /// state. Pending request flags are left untouched.
    pub fn emit_from_cache(&mut self) {
        let mut batch: Vec<WorkflowEntry> = self.cache.values().cloned().collect();
        batch.sort_by(|a, b| a.id().cmp(b.id()));
        sort_by_start_desc(&mut batch);

        let triggers = ReconcileTriggers {
            is_search_active: self.is_search_active(),
            ..Default::default()
        };
        let reconciled = reconcile(&self.workflows, &batch, triggers);
        self.apply(reconciled);
    }

    /// Drop everything, e.g. when the session ends.
    pub fn clear(&mut self) {
        *self = Self::new(self.page_size);
    }

    fn apply(&mut self, reconciled: Reconciled) {
        self.workflows = reconciled.workflows;
        self.offset = reconciled.offset;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use tower_protocol::{ProgressRecord, Workflow};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap()
    }

    fn entry(id: &str, start: Option<DateTime<Utc>>) -> WorkflowEntry {
        let workflow: Workflow = serde_json::from_value(serde_json::json!({
            "workflowId": id,
            "runName": format!("run-{id}"),
        }))
        .unwrap();
        WorkflowEntry {
            workflow: Workflow { start, ..workflow },
            progress: None,
        }
    }

    fn ids(entries: &[WorkflowEntry]) -> Vec<&str> {
        entries.iter().map(WorkflowEntry::id).collect()
    }

    const NEITHER: ReconcileTriggers = ReconcileTriggers {
        is_next_page_load_triggered: false,
        is_search_triggered: false,
        is_search_active: false,
    };

    const PAGINATION: ReconcileTriggers = ReconcileTriggers {
        is_next_page_load_triggered: true,
        is_search_triggered: false,
        is_search_active: false,
    };

    #[test]
    fn neither_policy_equals_sorted_dedupe_of_batch() {
        let current = vec![entry("9", Some(at(50)))];
        let batch = vec![
            entry("1", Some(at(1))),
            entry("2", None),
            entry("1", Some(at(40))),
            entry("3", Some(at(30))),
        ];

        let result = reconcile(&current, &batch, NEITHER);

        let mut expected = dedupe_by_id(batch.clone());
        sort_by_start_desc(&mut expected);
        assert_eq!(result.workflows, expected);
        assert_eq!(ids(&result.workflows), ["3", "1", "2"]);
        assert_eq!(result.offset, 3);
    }

    #[test]
    fn pagination_appends_unseen_ids_without_duplicates() {
        let current = vec![entry("1", Some(at(1))), entry("2", Some(at(2)))];
        let batch = vec![
            entry("3", Some(at(3))),
            entry("2", Some(at(59))),
            entry("3", Some(at(4))),
        ];

        let result = reconcile(&current, &batch, PAGINATION);

        assert_eq!(ids(&result.workflows), ["3", "2", "1"]);
        // the row already shown keeps its version
        assert_eq!(result.workflows[1].start(), Some(at(2)));
        assert_eq!(result.workflows[0].start(), Some(at(3)));
        for shown in &current {
            assert!(result.workflows.contains(shown));
        }
    }

    #[test]
    fn pagination_scenario_sorts_merged_page() {
        let current = vec![entry("1", Some(at(10))), entry("2", Some(at(20)))];
        let batch = vec![entry("3", Some(at(30)))];

        let result = reconcile(&current, &batch, PAGINATION);

        assert_eq!(ids(&result.workflows), ["3", "2", "1"]);
        assert_eq!(result.offset, 3);
    }

    #[test]
    fn pagination_wins_over_search_flags() {
        let triggers = ReconcileTriggers {
            is_next_page_load_triggered: true,
            is_search_triggered: true,
            is_search_active: true,
        };
        assert_eq!(triggers.policy(), ReconcilePolicy::AppendNewlySeen);
    }

    #[test]
    fn triggered_search_replaces_verbatim() {
        let current = vec![entry("1", Some(at(1))), entry("2", Some(at(2)))];
        let batch = vec![entry("2", None)];
        let triggers = ReconcileTriggers {
            is_search_triggered: true,
            is_search_active: true,
            ..NEITHER
        };

        let result = reconcile(&current, &batch, triggers);

        assert_eq!(result.workflows, batch);
        assert_eq!(result.offset, 1);
    }

    #[test]
    fn active_search_keeps_only_the_intersection() {
        let current = vec![entry("1", Some(at(1))), entry("2", Some(at(2)))];
        let batch = vec![entry("2", Some(at(5))), entry("3", Some(at(3)))];
        let triggers = ReconcileTriggers {
            is_search_active: true,
            ..NEITHER
        };

        let result = reconcile(&current, &batch, triggers);

        assert_eq!(ids(&result.workflows), ["2"]);
        assert_eq!(result.workflows[0].start(), Some(at(5)));
        assert_eq!(result.offset, 1);
    }

    #[test]
    fn active_search_never_admits_ids_only_in_batch() {
        let current: Vec<_> = (0..6).map(|i| entry(&i.to_string(), Some(at(i)))).collect();
        let batch: Vec<_> = (3..10).map(|i| entry(&i.to_string(), Some(at(i)))).collect();
        let triggers = ReconcileTriggers {
            is_search_active: true,
            ..NEITHER
        };

        let result = reconcile(&current, &batch, triggers);

        let current_ids: HashSet<&str> = current.iter().map(WorkflowEntry::id).collect();
        let batch_ids: HashSet<&str> = batch.iter().map(WorkflowEntry::id).collect();
        for id in ids(&result.workflows) {
            assert!(current_ids.contains(id) && batch_ids.contains(id));
        }
        assert_eq!(ids(&result.workflows), ["5", "4", "3"]);
    }

    #[test]
    fn replace_is_idempotent() {
        let list = vec![
            entry("a", None),
            entry("b", Some(at(7))),
            entry("a", Some(at(9))),
            entry("c", Some(at(8))),
        ];

        let once = reconcile(&list, &list, NEITHER);
        let twice = reconcile(&once.workflows, &once.workflows, NEITHER);

        let mut expected = dedupe_by_id(list.clone());
        sort_by_start_desc(&mut expected);
        assert_eq!(once.workflows, expected);
        assert_eq!(twice, once);
    }

    #[test]
    fn unstarted_workflows_sort_last_and_keep_their_order() {
        let mut list = vec![
            entry("x", None),
            entry("y", Some(at(1))),
            entry("z", None),
        ];
        sort_by_start_desc(&mut list);
        assert_eq!(ids(&list), ["y", "x", "z"]);
    }

    #[test]
    fn initial_load_then_next_page_uses_offset() {
        let mut state = WorkflowListState::new(2);
        let first = state.begin_load().expect("empty cache must fetch");
        assert_eq!(first.params.offset, Some(0));
        assert_eq!(first.params.max, Some(2));
        assert!(state.begin_next_page().is_none(), "a fetch is in flight");

        let outcome = state.apply_fetch(
            first.ticket,
            vec![entry("1", Some(at(1))), entry("2", Some(at(2)))],
        );
        assert_eq!(outcome, FetchOutcome::Applied);
        assert_eq!(state.offset(), 2);
        assert!(state.has_more());

        let next = state.begin_next_page().expect("next page");
        assert_eq!(next.kind, FetchKind::NextPage);
        assert_eq!(next.params.offset, Some(2));
        state.apply_fetch(next.ticket, vec![entry("0", Some(at(0)))]);

        assert_eq!(ids(state.workflows()), ["2", "1", "0"]);
        assert!(!state.has_more());
        assert!(state.begin_next_page().is_none());
    }

    #[test]
    fn stale_response_never_changes_the_list() {
        let mut state = WorkflowListState::new(10);
        let initial = state.begin_load().unwrap();
        let search = state.begin_search("rna");

        assert_eq!(
            state.apply_fetch(initial.ticket, vec![entry("old", Some(at(1)))]),
            FetchOutcome::Stale
        );
        assert!(state.is_empty());
        assert!(state.cached("old").is_none());

        assert_eq!(
            state.apply_fetch(search.ticket, vec![entry("rna-1", Some(at(2)))]),
            FetchOutcome::Applied
        );
        assert_eq!(ids(state.workflows()), ["rna-1"]);
        assert!(state.is_search_active());
        assert_eq!(state.search_text(), "rna");
    }

    #[test]
    fn live_update_during_search_does_not_consume_the_trigger() {
        let mut state = WorkflowListState::new(10);
        let initial = state.begin_load().unwrap();
        state.apply_fetch(
            initial.ticket,
            vec![entry("1", Some(at(1))), entry("2", Some(at(2)))],
        );

        let search = state.begin_search("two");
        // a live update for a workflow the search will filter out
        state.upsert(entry("1", Some(at(30))));
        assert!(state.position("1").is_some());

        state.apply_fetch(search.ticket, vec![entry("2", Some(at(2)))]);
        assert_eq!(ids(state.workflows()), ["2"]);

        // later live updates intersect with the search results
        state.upsert(entry("1", Some(at(31))));
        state.upsert(entry("2", Some(at(40))));
        assert_eq!(ids(state.workflows()), ["2"]);
        assert_eq!(state.workflows()[0].start(), Some(at(40)));
    }

    #[test]
    fn clearing_the_search_replaces_with_unfiltered_page() {
        let mut state = WorkflowListState::new(10);
        let search = state.begin_search("a");
        state.apply_fetch(search.ticket, vec![entry("a1", Some(at(1)))]);

        let cleared = state.begin_search("   ");
        assert_eq!(cleared.params.search.as_deref(), Some("   "));
        state.apply_fetch(
            cleared.ticket,
            vec![entry("a1", Some(at(1))), entry("b1", Some(at(2)))],
        );

        assert!(!state.is_search_active());
        assert_eq!(ids(state.workflows()), ["b1", "a1"]);
    }

    #[test]
    fn failed_fetch_allows_retry() {
        let mut state = WorkflowListState::new(1);
        let first = state.begin_load().unwrap();
        state.apply_fetch(first.ticket, vec![entry("1", Some(at(1)))]);

        let next = state.begin_next_page().unwrap();
        assert!(state.begin_next_page().is_none());
        assert_eq!(state.fail_fetch(next.ticket), FetchOutcome::Applied);
        assert!(state.begin_next_page().is_some());
    }

    #[test]
    fn upsert_emits_sorted_cache() {
        let mut state = WorkflowListState::new(10);
        let first = state.begin_load().unwrap();
        state.apply_fetch(first.ticket, vec![entry("1", Some(at(1)))]);

        state.upsert(entry("2", Some(at(5))));
        assert_eq!(ids(state.workflows()), ["2", "1"]);
        assert_eq!(state.offset(), 2);

        state.remove("2");
        assert_eq!(ids(state.workflows()), ["1"]);
        assert!(state.cached("2").is_none());
    }

    #[test]
    fn reload_with_warm_cache_needs_no_request() {
        let mut state = WorkflowListState::new(10);
        let first = state.begin_load().unwrap();
        state.apply_fetch(first.ticket, vec![entry("1", Some(at(1)))]);

        assert!(state.begin_load().is_none());
        assert_eq!(ids(state.workflows()), ["1"]);
    }

    #[test]
    fn progress_update_touches_only_the_target() {
        let mut state = WorkflowListState::new(10);
        let first = state.begin_load().unwrap();
        state.apply_fetch(
            first.ticket,
            vec![entry("1", Some(at(1))), entry("2", Some(at(2)))],
        );
        let before_other = state.cached("2").cloned();
        let before_target = state.cached("1").cloned().unwrap();

        let progress = Progress {
            workflow_progress: Some(ProgressRecord {
                running: 3,
                succeeded: 1,
                ..Default::default()
            }),
            processes_progress: Vec::new(),
        };
        assert!(state.update_progress("1", progress.clone()));
        assert!(!state.update_progress("missing", progress.clone()));

        let after_target = state.cached("1").unwrap();
        assert_eq!(after_target.workflow, before_target.workflow);
        assert_eq!(after_target.progress.as_ref(), Some(&progress));
        assert_eq!(state.cached("2").cloned(), before_other);
        let shown = &state.workflows()[state.position("1").unwrap()];
        assert_eq!(shown.progress.as_ref(), Some(&progress));
    }
}
