//! Play state: the registry of a player's quests.
//!
//! Accepted quests live in one of two maps. A quest is *active* while in
//! progress and *archived* once completed or failed; every mutation entry
//! point re-syncs the maps before any event is delivered, so a quest is
//! never visible in both or neither.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use questline_common::{BranchId, ObjectiveId, QuestId, TaskId};
use tracing::{debug, info, trace};

use crate::config::{AcceptPolicy, PlayStateConfig};
use crate::definition::{QuestDefinition, QuestLibrary};
use crate::events::{Cascade, EventBus, EventHandler, QuestEvent};
use crate::objective::ObjectiveState;
use crate::quest::{QuestError, QuestResult, QuestState};
use crate::status::QuestStatus;
use crate::task::TaskState;

/// All quest progress for a single player.
pub struct PlayState {
    library: Arc<QuestLibrary>,
    config: PlayStateConfig,
    active: HashMap<QuestId, QuestState>,
    archived: HashMap<QuestId, QuestState>,
    handlers: Vec<Box<dyn EventHandler>>,
    bus: EventBus,
}

impl fmt::Debug for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayState")
            .field("quests", &self.library.len())
            .field("active", &self.accepted_quest_ids())
            .field("archived", &self.archived_quest_ids())
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}

impl PlayState {
    /// Creates an empty play state tracking against `library`.
    pub fn new(library: impl Into<Arc<QuestLibrary>>, mut config: PlayStateConfig) -> Self {
        config.validate();
        let library = library.into();
        info!("Play state created with {} quest definitions", library.len());
        let bus = EventBus::new(config.event_bus_capacity);
        Self {
            library,
            config,
            active: HashMap::new(),
            archived: HashMap::new(),
            handlers: Vec::new(),
            bus,
        }
    }

    /// Returns the definitions this play state tracks against.
    #[must_use]
    pub fn library(&self) -> &QuestLibrary {
        &self.library
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &PlayStateConfig {
        &self.config
    }

    /// Registers a handler. Handlers run in registration order.
    pub fn subscribe(&mut self, handler: impl EventHandler + 'static) {
        self.handlers.push(Box::new(handler));
    }

    /// Returns the pull-style event bus.
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Drains events published to the bus since the last drain.
    pub fn drain_events(&self) -> Vec<QuestEvent> {
        self.bus.drain()
    }

    // === Mutations ===

    /// Accepts a quest using the configured default policy.
    pub fn accept_quest(&mut self, id: &QuestId) -> QuestResult<bool> {
        let policy = self.config.default_accept_policy;
        self.accept_quest_with(id, policy)
    }

    /// Accepts a quest.
    ///
    /// A quest that was never accepted is created and made active. An
    /// already accepted quest is reset only if `policy` allows it for its
    /// current status; otherwise nothing happens and `Ok(false)` is
    /// returned.
    pub fn accept_quest_with(&mut self, id: &QuestId, policy: AcceptPolicy) -> QuestResult<bool> {
        let definition = self
            .library
            .get(id)
            .cloned()
            .ok_or_else(|| QuestError::UnknownQuest(id.clone()))?;

        let reset = match self.quest_status(id) {
            QuestStatus::Unavailable => {
                let mut events = Vec::new();
                self.accept_fresh(definition, &mut events);
                self.settle(std::slice::from_ref(id), events);
                return Ok(true);
            },
            QuestStatus::InProgress => policy.reset_if_in_progress,
            QuestStatus::Completed => policy.reset_if_complete,
            QuestStatus::Failed => policy.reset_if_failed,
        };

        if !reset {
            debug!("Quest {} already accepted, not resetting", id);
            return Ok(false);
        }
        info!("Re-accepting quest {}", id);
        self.mutate(id, |quest, cx| {
            quest.reset(cx);
            Ok(true)
        })
    }

    /// Completes a task. Returns whether the task transitioned.
    pub fn complete_task(&mut self, quest: &QuestId, task: &TaskId) -> QuestResult<bool> {
        self.mutate(quest, |q, cx| q.complete_task(task, cx))
    }

    /// Fails a task. Returns whether the task transitioned.
    pub fn fail_task(&mut self, quest: &QuestId, task: &TaskId) -> QuestResult<bool> {
        self.mutate(quest, |q, cx| q.fail_task(task, cx))
    }

    /// Adds `delta` to a numeric task. Returns the number still outstanding.
    pub fn progress_task(&mut self, quest: &QuestId, task: &TaskId, delta: i32) -> QuestResult<i32> {
        self.mutate(quest, |q, cx| q.progress_task(task, delta, cx))
    }

    /// Sets a numeric task's number. Returns the number still outstanding.
    pub fn set_task_number(
        &mut self,
        quest: &QuestId,
        task: &TaskId,
        value: i32,
    ) -> QuestResult<i32> {
        self.mutate(quest, |q, cx| q.set_task_number(task, value, cx))
    }

    /// Resets all progress on a quest. It stays accepted and in progress.
    pub fn reset_quest(&mut self, id: &QuestId) -> QuestResult<()> {
        self.mutate(id, |q, cx| {
            q.reset(cx);
            Ok(())
        })
    }

    /// Fails the outstanding tasks of the quest's current objectives.
    pub fn fail_quest(&mut self, id: &QuestId) -> QuestResult<()> {
        self.mutate(id, |q, cx| {
            q.fail(cx);
            Ok(())
        })
    }

    /// Completes every mandatory task of the quest's active objectives.
    pub fn complete_quest(&mut self, id: &QuestId) -> QuestResult<()> {
        self.mutate(id, |q, cx| {
            q.complete(cx);
            Ok(())
        })
    }

    /// Resets one objective of a quest.
    pub fn reset_objective(&mut self, quest: &QuestId, objective: &ObjectiveId) -> QuestResult<()> {
        self.mutate(quest, |q, cx| q.reset_objective(objective, cx))
    }

    /// Resets one task of a quest.
    pub fn reset_task(&mut self, quest: &QuestId, task: &TaskId) -> QuestResult<()> {
        self.mutate(quest, |q, cx| q.reset_task(task, cx))
    }

    /// Activates or deactivates a branch. Returns whether anything changed.
    pub fn set_branch_active(
        &mut self,
        quest: &QuestId,
        branch: &BranchId,
        active: bool,
    ) -> QuestResult<bool> {
        self.mutate(quest, |q, cx| Ok(q.set_branch_active(branch, active, cx)))
    }

    /// Deactivates every branch of a quest.
    pub fn reset_branches(&mut self, quest: &QuestId) -> QuestResult<bool> {
        self.mutate(quest, |q, cx| Ok(q.reset_branches(cx)))
    }

    /// Resets the objectives of one branch.
    pub fn reset_branch(&mut self, quest: &QuestId, branch: &BranchId) -> QuestResult<()> {
        self.mutate(quest, |q, cx| {
            q.reset_branch(branch, cx);
            Ok(())
        })
    }

    /// Removes a quest from whichever map holds it.
    pub fn remove_quest(&mut self, id: &QuestId) -> bool {
        self.remove_quest_with(id, true, true)
    }

    /// Removes a quest, restricted to the active and/or archived map.
    /// Returns whether anything was removed.
    pub fn remove_quest_with(&mut self, id: &QuestId, remove_active: bool, remove_archived: bool) -> bool {
        let mut events = Vec::new();
        let mut removed = false;

        if remove_active && self.active.remove(id).is_some() {
            info!("Removed active quest {}", id);
            events.push(QuestEvent::ActiveQuestChanged { quest: id.clone() });
            removed = true;
        }
        if remove_archived && self.archived.remove(id).is_some() {
            info!("Removed archived quest {}", id);
            removed = true;
        }

        self.dispatch(events);
        removed
    }

    /// Advances time limits on every active quest.
    pub fn tick(&mut self, delta_time: f32) {
        let mut ids: Vec<QuestId> = self.active.keys().cloned().collect();
        ids.sort();

        let mut events = Vec::new();
        for id in &ids {
            if let Some(quest) = self.active.get_mut(id) {
                let mut cx = Cascade::new(id.clone(), &mut events);
                quest.tick(delta_time, &mut cx);
            }
        }
        self.settle(&ids, events);
    }

    /// Accepts every `auto_accept` quest whose prerequisites are all
    /// completed. Returns the newly accepted quest ids.
    ///
    /// Runs automatically whenever a quest completes if enabled in config;
    /// call this after building a play state to pick up quests with no
    /// prerequisites.
    pub fn refresh_auto_accept(&mut self) -> Vec<QuestId> {
        let mut events = Vec::new();
        let accepted = self.accept_ready(&mut events);
        self.settle(&accepted, events);
        accepted
    }

    fn accept_fresh(&mut self, definition: Arc<QuestDefinition>, events: &mut Vec<QuestEvent>) {
        let id = definition.id.clone();
        events.push(QuestEvent::QuestAccepted { quest: id.clone() });
        let quest = {
            let mut cx = Cascade::new(id.clone(), events);
            QuestState::new(definition, &mut cx)
        };
        info!("Accepted quest {}", id);
        self.active.insert(id.clone(), quest);
        events.push(QuestEvent::ActiveQuestChanged { quest: id });
    }

    fn accept_ready(&mut self, events: &mut Vec<QuestEvent>) -> Vec<QuestId> {
        let library = Arc::clone(&self.library);
        let mut accepted = Vec::new();

        loop {
            let mut ready: Vec<&Arc<QuestDefinition>> = library
                .iter()
                .filter(|def| {
                    def.auto_accept
                        && !self.is_quest_accepted(&def.id)
                        && def.prerequisites.iter().all(|p| self.is_quest_completed(p))
                })
                .collect();
            if ready.is_empty() {
                break;
            }
            ready.sort_by(|a, b| a.id.cmp(&b.id));

            for def in ready {
                debug!("Auto-accepting quest {}", def.id);
                accepted.push(def.id.clone());
                self.accept_fresh(Arc::clone(def), events);
            }
        }
        accepted
    }

    /// Runs a mutation against an accepted quest, then settles.
    fn mutate<R>(
        &mut self,
        id: &QuestId,
        f: impl FnOnce(&mut QuestState, &mut Cascade<'_>) -> QuestResult<R>,
    ) -> QuestResult<R> {
        let mut events = Vec::new();
        let result = {
            let Some(quest) = self
                .active
                .get_mut(id)
                .or_else(|| self.archived.get_mut(id))
            else {
                return Err(if self.library.contains(id) {
                    QuestError::QuestNotFound(id.clone())
                } else {
                    QuestError::UnknownQuest(id.clone())
                });
            };
            let mut cx = Cascade::new(id.clone(), &mut events);
            f(quest, &mut cx)
        };
        self.settle(std::slice::from_ref(id), events);
        result
    }

    /// Syncs maps for the touched quests, auto-accepts, then delivers.
    fn settle(&mut self, touched: &[QuestId], mut events: Vec<QuestEvent>) {
        for id in touched {
            self.sync_maps(id, &mut events);
        }

        let any_completed = events
            .iter()
            .any(|e| matches!(e, QuestEvent::QuestCompleted { .. }));
        if self.config.auto_accept && any_completed {
            let accepted = self.accept_ready(&mut events);
            for id in &accepted {
                self.sync_maps(id, &mut events);
            }
        }

        self.dispatch(events);
    }

    /// Moves a quest to the map matching its status.
    fn sync_maps(&mut self, id: &QuestId, events: &mut Vec<QuestEvent>) {
        let archive = self
            .active
            .get(id)
            .is_some_and(|q| q.status().is_terminal());
        if archive {
            if let Some(quest) = self.active.remove(id) {
                info!("Archived quest {} ({})", id, quest.status().as_str());
                self.archived.insert(id.clone(), quest);
                events.push(QuestEvent::ActiveQuestChanged { quest: id.clone() });
            }
            return;
        }

        let restore = self
            .archived
            .get(id)
            .is_some_and(|q| !q.status().is_terminal());
        if restore {
            if let Some(quest) = self.archived.remove(id) {
                info!("Quest {} is active again", id);
                self.active.insert(id.clone(), quest);
                events.push(QuestEvent::ActiveQuestChanged { quest: id.clone() });
            }
        }
    }

    fn dispatch(&self, events: Vec<QuestEvent>) {
        for event in events {
            trace!("Dispatching {} for quest {}", event.kind(), event.quest());
            for handler in &self.handlers {
                handler.handle(&event, self);
            }
            self.bus.publish(event);
        }
    }

    // === Queries ===

    /// Status of a quest; `Unavailable` if not accepted.
    #[must_use]
    pub fn quest_status(&self, id: &QuestId) -> QuestStatus {
        self.quest(id).map_or(QuestStatus::Unavailable, QuestState::status)
    }

    /// Returns true if the quest is accepted, active or archived.
    #[must_use]
    pub fn is_quest_accepted(&self, id: &QuestId) -> bool {
        self.active.contains_key(id) || self.archived.contains_key(id)
    }

    /// Returns true if the quest is in progress.
    #[must_use]
    pub fn is_quest_active(&self, id: &QuestId) -> bool {
        self.active.contains_key(id)
    }

    /// Returns true if the quest is completed.
    #[must_use]
    pub fn is_quest_completed(&self, id: &QuestId) -> bool {
        self.quest_status(id) == QuestStatus::Completed
    }

    /// Returns true if the quest has failed.
    #[must_use]
    pub fn is_quest_failed(&self, id: &QuestId) -> bool {
        self.quest_status(id) == QuestStatus::Failed
    }

    /// Identifiers of active quests, sorted.
    #[must_use]
    pub fn accepted_quest_ids(&self) -> Vec<QuestId> {
        sorted_ids(&self.active)
    }

    /// Identifiers of archived quests, sorted.
    #[must_use]
    pub fn archived_quest_ids(&self) -> Vec<QuestId> {
        sorted_ids(&self.archived)
    }

    /// Gets an accepted quest from either map.
    #[must_use]
    pub fn quest(&self, id: &QuestId) -> Option<&QuestState> {
        self.active.get(id).or_else(|| self.archived.get(id))
    }

    /// Active quests, sorted by identifier.
    #[must_use]
    pub fn accepted_quests(&self) -> Vec<&QuestState> {
        sorted_quests(&self.active)
    }

    /// Archived quests, sorted by identifier.
    #[must_use]
    pub fn archived_quests(&self) -> Vec<&QuestState> {
        sorted_quests(&self.archived)
    }

    /// Gets an objective of an accepted quest.
    #[must_use]
    pub fn objective(&self, quest: &QuestId, objective: &ObjectiveId) -> Option<&ObjectiveState> {
        self.quest(quest)?.objective(objective)
    }

    /// Gets a task of an accepted quest.
    #[must_use]
    pub fn task(&self, quest: &QuestId, task: &TaskId) -> Option<&TaskState> {
        self.quest(quest)?.task(task)
    }

    /// Next mandatory task of a quest's current objective.
    #[must_use]
    pub fn next_mandatory_task(&self, quest: &QuestId) -> Option<&TaskState> {
        self.quest(quest)?.next_mandatory_task()
    }
}

fn sorted_ids(map: &HashMap<QuestId, QuestState>) -> Vec<QuestId> {
    let mut ids: Vec<_> = map.keys().cloned().collect();
    ids.sort();
    ids
}

fn sorted_quests(map: &HashMap<QuestId, QuestState>) -> Vec<&QuestState> {
    let mut quests: Vec<_> = map.values().collect();
    quests.sort_by(|a, b| a.id().cmp(b.id()));
    quests
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{ObjectiveDefinition, TaskDefinition};
    use crate::events::EventRecorder;
    use crate::status::ProgressStatus;
    use parking_lot::Mutex;

    fn q(s: &str) -> QuestId {
        QuestId::new(s)
    }

    fn t(s: &str) -> TaskId {
        TaskId::new(s)
    }

    /// Q: O1 (sequential; T1, T2), O2 (non-sequential; T3).
    fn scenario_quest() -> QuestDefinition {
        QuestDefinition::new("Q", "Scenario")
            .with_objective(
                ObjectiveDefinition::new("O1", "First")
                    .with_task(TaskDefinition::new("T1", "Task one"))
                    .with_task(TaskDefinition::new("T2", "Task two")),
            )
            .with_objective(
                ObjectiveDefinition::new("O2", "Second")
                    .sequential(false)
                    .with_task(TaskDefinition::new("T3", "Task three")),
            )
    }

    fn counting_quest() -> QuestDefinition {
        QuestDefinition::new("herbs", "Herbalism").with_objective(
            ObjectiveDefinition::new("gather", "Gather")
                .with_task(TaskDefinition::new("herb", "Collect herbs").with_target(0, 5))
                .with_task(TaskDefinition::new("timed", "Hurry").optional().with_time_limit(10.0)),
        )
    }

    fn library() -> QuestLibrary {
        QuestLibrary::new()
            .with_quest(scenario_quest())
            .and_then(|l| l.with_quest(counting_quest()))
            .and_then(|l| {
                l.with_quest(
                    QuestDefinition::new("followup", "Follow-up")
                        .auto_accept(true)
                        .with_prerequisite("Q")
                        .with_objective(
                            ObjectiveDefinition::new("o", "O")
                                .with_task(TaskDefinition::new("t", "T")),
                        ),
                )
            })
            .expect("valid library")
    }

    fn play_state() -> (PlayState, EventRecorder) {
        let mut state = PlayState::new(library(), PlayStateConfig::default());
        let recorder = EventRecorder::new();
        state.subscribe(recorder.clone());
        (state, recorder)
    }

    #[test]
    fn test_end_to_end_scenario() {
        let (mut state, recorder) = play_state();

        assert!(state.accept_quest(&q("Q")).expect("accept"));
        assert_eq!(state.quest_status(&q("Q")), QuestStatus::InProgress);
        assert!(state.is_quest_active(&q("Q")));
        let o1 = state
            .objective(&q("Q"), &ObjectiveId::new("O1"))
            .expect("O1");
        assert_eq!(o1.status(), ProgressStatus::NotStarted);
        let task = |state: &PlayState, id: &str| {
            state.task(&q("Q"), &t(id)).expect("task exists").clone()
        };
        assert!(!task(&state, "T1").is_hidden());
        assert!(task(&state, "T2").is_hidden());

        assert!(state.complete_task(&q("Q"), &t("T1")).expect("T1"));
        assert!(task(&state, "T1").is_completed());
        assert!(!task(&state, "T2").is_hidden());
        assert_eq!(
            state
                .objective(&q("Q"), &ObjectiveId::new("O1"))
                .map(ObjectiveState::status),
            Some(ProgressStatus::InProgress)
        );

        assert!(state.complete_task(&q("Q"), &t("T2")).expect("T2"));
        assert_eq!(
            state
                .objective(&q("Q"), &ObjectiveId::new("O1"))
                .map(ObjectiveState::status),
            Some(ProgressStatus::Completed)
        );

        recorder.take();
        assert!(state.complete_task(&q("Q"), &t("T3")).expect("T3"));
        assert!(state.is_quest_completed(&q("Q")));
        assert!(!state.accepted_quest_ids().contains(&q("Q")));
        assert!(state.archived_quest_ids().contains(&q("Q")));
        assert_eq!(
            recorder.count(|e| matches!(e, QuestEvent::QuestCompleted { .. })),
            1
        );
    }

    #[test]
    fn test_task_event_precedes_ancestors() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        state.complete_task(&q("Q"), &t("T1")).expect("T1");
        state.complete_task(&q("Q"), &t("T2")).expect("T2");
        recorder.take();

        state.complete_task(&q("Q"), &t("T3")).expect("T3");
        let kinds: Vec<_> = recorder
            .events()
            .into_iter()
            .filter(|e| e.quest() == &q("Q"))
            .map(|e| e.kind())
            .collect();
        assert_eq!(
            kinds,
            vec![
                "task_completed",
                "objective_completed",
                "quest_completed",
                "quest_updated",
                "active_quest_changed",
            ]
        );
    }

    #[test]
    fn test_handlers_observe_settled_state() {
        let (mut state, _) = play_state();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = Arc::clone(&seen);
        state.subscribe(move |event: &QuestEvent, state: &PlayState| {
            if let QuestEvent::TaskCompleted { quest, .. } = event {
                log.lock().push((
                    state.quest_status(quest),
                    state.archived_quest_ids().contains(quest),
                ));
            }
        });

        state.accept_quest(&q("Q")).expect("accept");
        state.complete_quest(&q("Q")).expect("complete");

        let seen = seen.lock();
        assert_eq!(seen.len(), 3);
        assert!(seen
            .iter()
            .all(|&(status, archived)| status == QuestStatus::Completed && archived));
    }

    #[test]
    fn test_accept_unknown_quest() {
        let (mut state, recorder) = play_state();
        let result = state.accept_quest(&q("nope"));
        assert!(matches!(result, Err(QuestError::UnknownQuest(_))));
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_accept_events() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        let kinds: Vec<_> = recorder.events().iter().map(QuestEvent::kind).collect();
        assert_eq!(kinds, vec!["quest_accepted", "active_quest_changed"]);
    }

    #[test]
    fn test_accept_twice_is_noop() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        state.complete_task(&q("Q"), &t("T1")).expect("T1");
        recorder.take();

        assert!(!state.accept_quest(&q("Q")).expect("accept again"));
        assert!(recorder.is_empty());
        assert!(state.task(&q("Q"), &t("T1")).is_some_and(TaskState::is_completed));
    }

    #[test]
    fn test_accept_resets_failed_quest() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        state.fail_task(&q("Q"), &t("T1")).expect("T1");
        assert!(state.is_quest_failed(&q("Q")));
        assert!(state.archived_quest_ids().contains(&q("Q")));
        recorder.take();

        assert!(state.accept_quest(&q("Q")).expect("re-accept"));
        assert_eq!(state.quest_status(&q("Q")), QuestStatus::InProgress);
        assert!(state.is_quest_active(&q("Q")));
        assert_eq!(
            recorder.count(|e| matches!(e, QuestEvent::QuestAccepted { .. })),
            0
        );
        assert_eq!(
            recorder.count(|e| matches!(e, QuestEvent::QuestReset { .. })),
            1
        );
    }

    #[test]
    fn test_accept_policy_flags() {
        let (mut state, _) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        state.complete_quest(&q("Q")).expect("complete");
        assert!(!state.accept_quest(&q("Q")).expect("completed, no reset"));
        assert!(state.is_quest_completed(&q("Q")));

        assert!(state
            .accept_quest_with(&q("Q"), AcceptPolicy::always_reset())
            .expect("forced reset"));
        assert_eq!(state.quest_status(&q("Q")), QuestStatus::InProgress);

        state.complete_task(&q("Q"), &t("T1")).expect("T1");
        assert!(!state
            .accept_quest_with(&q("Q"), AcceptPolicy::never_reset())
            .expect("in progress"));
        assert!(state
            .accept_quest_with(&q("Q"), AcceptPolicy::always_reset())
            .expect("in progress reset"));
        assert!(state.task(&q("Q"), &t("T1")).is_some_and(TaskState::is_incomplete));
    }

    #[test]
    fn test_mutating_unaccepted_quest() {
        let (mut state, _) = play_state();
        assert!(matches!(
            state.complete_task(&q("Q"), &t("T1")),
            Err(QuestError::QuestNotFound(_))
        ));
        assert!(matches!(
            state.complete_task(&q("ghost"), &t("T1")),
            Err(QuestError::UnknownQuest(_))
        ));
        state.accept_quest(&q("Q")).expect("accept");
        assert!(matches!(
            state.fail_task(&q("Q"), &t("missing")),
            Err(QuestError::TaskNotFound { .. })
        ));
    }

    #[test]
    fn test_progress_task() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("herbs")).expect("accept");
        recorder.take();

        assert_eq!(state.progress_task(&q("herbs"), &t("herb"), 2).expect("progress"), 3);
        assert_eq!(
            recorder.count(|e| matches!(e, QuestEvent::TaskUpdated { .. })),
            1
        );
        assert_eq!(state.set_task_number(&q("herbs"), &t("herb"), 4).expect("set"), 1);
        assert_eq!(state.progress_task(&q("herbs"), &t("herb"), 50).expect("progress"), 0);
        assert!(state.is_quest_completed(&q("herbs")));

        let invalid = state.progress_task(&q("Q"), &t("T1"), 1);
        assert!(matches!(invalid, Err(QuestError::QuestNotFound(_))));
    }

    #[test]
    fn test_progress_non_numeric_task() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        recorder.take();
        let result = state.progress_task(&q("Q"), &t("T1"), 1);
        assert!(matches!(result, Err(QuestError::InvalidOperation { .. })));
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_reset_archived_quest_moves_back() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        state.fail_quest(&q("Q")).expect("fail");
        assert!(state.archived_quest_ids().contains(&q("Q")));
        recorder.take();

        state.reset_quest(&q("Q")).expect("reset");
        assert!(state.accepted_quest_ids().contains(&q("Q")));
        assert!(!state.archived_quest_ids().contains(&q("Q")));
        assert_eq!(
            recorder.count(|e| matches!(e, QuestEvent::ActiveQuestChanged { .. })),
            1
        );
    }

    #[test]
    fn test_fail_quest_archives() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        state.fail_quest(&q("Q")).expect("fail");
        assert!(state.is_quest_failed(&q("Q")));
        assert!(!state.is_quest_completed(&q("Q")));
        assert_eq!(
            recorder.count(|e| matches!(e, QuestEvent::QuestFailed { .. })),
            1
        );
    }

    #[test]
    fn test_remove_quest_flags() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        state.accept_quest(&q("herbs")).expect("accept");
        state.complete_quest(&q("herbs")).expect("complete");
        recorder.take();

        assert!(!state.remove_quest_with(&q("herbs"), true, false));
        assert!(state.remove_quest_with(&q("herbs"), false, true));
        assert_eq!(state.quest_status(&q("herbs")), QuestStatus::Unavailable);
        assert!(recorder.is_empty());

        assert!(state.remove_quest(&q("Q")));
        assert!(!state.is_quest_accepted(&q("Q")));
        assert_eq!(
            recorder.count(|e| matches!(e, QuestEvent::ActiveQuestChanged { .. })),
            1
        );
        assert!(!state.remove_quest(&q("Q")));
    }

    #[test]
    fn test_auto_accept_after_prerequisite() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        assert!(!state.is_quest_accepted(&q("followup")));

        state.complete_quest(&q("Q")).expect("complete");
        assert!(state.is_quest_active(&q("followup")));
        assert_eq!(
            recorder.count(|e| e == &QuestEvent::QuestAccepted { quest: q("followup") }),
            1
        );
    }

    #[test]
    fn test_auto_accept_disabled() {
        let config = PlayStateConfig {
            auto_accept: false,
            ..PlayStateConfig::default()
        };
        let mut state = PlayState::new(library(), config);
        state.accept_quest(&q("Q")).expect("accept");
        state.complete_quest(&q("Q")).expect("complete");
        assert!(!state.is_quest_accepted(&q("followup")));

        assert_eq!(state.refresh_auto_accept(), vec![q("followup")]);
        assert!(state.is_quest_active(&q("followup")));
    }

    #[test]
    fn test_tick_fails_timed_task() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("herbs")).expect("accept");
        recorder.take();

        state.tick(6.0);
        assert!(recorder.is_empty());
        state.tick(6.0);
        assert!(state.task(&q("herbs"), &t("timed")).is_some_and(TaskState::is_failed));
        // Optional task, so the quest carries on.
        assert_eq!(state.quest_status(&q("herbs")), QuestStatus::InProgress);
        assert_eq!(
            recorder.count(|e| matches!(e, QuestEvent::TaskFailed { .. })),
            1
        );
    }

    #[test]
    fn test_events_reach_bus() {
        let (mut state, recorder) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        state.complete_task(&q("Q"), &t("T1")).expect("T1");
        assert_eq!(state.drain_events(), recorder.events());
        assert!(state.drain_events().is_empty());
    }

    #[test]
    fn test_new_validates_config() {
        let config = PlayStateConfig {
            event_bus_capacity: 0,
            ..PlayStateConfig::default()
        };
        let mut state = PlayState::new(library(), config);
        assert_eq!(state.config().event_bus_capacity, 16);
        assert_eq!(state.event_bus().capacity(), 16);

        state.accept_quest(&q("Q")).expect("accept");
        assert!(!state.drain_events().is_empty());
        assert_eq!(state.event_bus().dropped_count(), 0);
    }

    #[test]
    fn test_branches_through_play_state() {
        let def = QuestDefinition::new("b", "Branching")
            .with_objective(
                ObjectiveDefinition::new("main", "Main")
                    .with_task(TaskDefinition::new("t_main", "Main")),
            )
            .with_objective(
                ObjectiveDefinition::new("side", "Side")
                    .in_branch("left")
                    .with_task(TaskDefinition::new("t_side", "Side")),
            );
        let library = QuestLibrary::new().with_quest(def).expect("valid");
        let mut state = PlayState::new(library, PlayStateConfig::default());
        let branch = BranchId::new("left");

        state.accept_quest(&q("b")).expect("accept");
        assert!(state.set_branch_active(&q("b"), &branch, true).expect("branch"));
        state.complete_task(&q("b"), &t("t_main")).expect("main");
        assert_eq!(state.quest_status(&q("b")), QuestStatus::InProgress);

        state.complete_task(&q("b"), &t("t_side")).expect("side");
        assert!(state.is_quest_completed(&q("b")));

        state.reset_branch(&q("b"), &branch).expect("reset branch");
        assert!(state.is_quest_active(&q("b")));

        assert!(state.reset_branches(&q("b")).expect("reset branches"));
        assert!(state.is_quest_completed(&q("b")));
        assert!(state.archived_quest_ids().contains(&q("b")));
    }

    #[test]
    fn test_reset_objective_and_task() {
        let (mut state, _) = play_state();
        state.accept_quest(&q("Q")).expect("accept");
        state.complete_task(&q("Q"), &t("T1")).expect("T1");
        state.reset_task(&q("Q"), &t("T1")).expect("reset task");
        assert!(state.task(&q("Q"), &t("T1")).is_some_and(TaskState::is_incomplete));

        state.complete_task(&q("Q"), &t("T1")).expect("T1");
        state
            .reset_objective(&q("Q"), &ObjectiveId::new("O1"))
            .expect("reset objective");
        assert_eq!(
            state.next_mandatory_task(&q("Q")).map(|t| t.id().as_str()),
            Some("T1")
        );
    }
}
