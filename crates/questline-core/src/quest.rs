//! Quest runtime state.
//!
//! A quest owns its objectives and aggregates their statuses one level up,
//! the same way an objective aggregates its tasks. Objectives may be tagged
//! with a branch; a branched objective only counts while its branch is
//! active.

use std::collections::HashMap;
use std::sync::Arc;

use questline_common::{BranchId, ObjectiveId, QuestId, TaskId};
use thiserror::Error;
use tracing::debug;

use crate::definition::{QuestCompletion, QuestDefinition};
use crate::events::Cascade;
use crate::objective::ObjectiveState;
use crate::status::{ProgressStatus, QuestStatus};
use crate::task::{TaskProgress, TaskState};

/// Errors that can occur in quest operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QuestError {
    /// Quest not accepted (neither active nor archived)
    #[error("Quest not found: {0}")]
    QuestNotFound(QuestId),
    /// No definition exists for the quest
    #[error("Unknown quest: {0}")]
    UnknownQuest(QuestId),
    /// Task not found in quest
    #[error("Task {task} not found in quest {quest}")]
    TaskNotFound {
        /// Quest searched
        quest: QuestId,
        /// Task requested
        task: TaskId,
    },
    /// Objective not found in quest
    #[error("Objective {objective} not found in quest {quest}")]
    ObjectiveNotFound {
        /// Quest searched
        quest: QuestId,
        /// Objective requested
        objective: ObjectiveId,
    },
    /// Operation does not apply to the task
    #[error("Invalid operation on task {task} in quest {quest}: {reason}")]
    InvalidOperation {
        /// Quest
        quest: QuestId,
        /// Task
        task: TaskId,
        /// Why the operation was rejected
        reason: String,
    },
}

/// Result type for quest operations.
pub type QuestResult<T> = Result<T, QuestError>;

/// Progress state of one quest for one player.
#[derive(Debug, Clone)]
pub struct QuestState {
    definition: Arc<QuestDefinition>,
    status: QuestStatus,
    objectives: Vec<ObjectiveState>,
    active_branches: Vec<BranchId>,
    current_objectives: Vec<usize>,
    task_lookup: HashMap<TaskId, (usize, usize)>,
}

impl QuestState {
    /// Builds objective states in definition order and aggregates once.
    pub(crate) fn new(definition: Arc<QuestDefinition>, cx: &mut Cascade<'_>) -> Self {
        let mut task_lookup = HashMap::new();
        let mut objectives = Vec::with_capacity(definition.objectives.len());
        let mut changed = false;

        for (objective_index, def) in definition.objectives.iter().enumerate() {
            for (task_index, task) in def.tasks.iter().enumerate() {
                task_lookup.insert(task.id.clone(), (objective_index, task_index));
            }
            let objective = ObjectiveState::new(Arc::clone(def), cx);
            changed |= objective.status() != ProgressStatus::NotStarted;
            objectives.push(objective);
        }

        let mut quest = Self {
            definition,
            status: QuestStatus::InProgress,
            objectives,
            active_branches: Vec::new(),
            current_objectives: Vec::new(),
            task_lookup,
        };
        quest.notify_objective_status_changed(cx);
        if changed {
            cx.quest_updated();
        }
        quest
    }

    /// Returns the quest definition.
    #[must_use]
    pub fn definition(&self) -> &QuestDefinition {
        &self.definition
    }

    /// Returns the quest identifier.
    #[must_use]
    pub fn id(&self) -> &QuestId {
        &self.definition.id
    }

    /// Returns the display title.
    #[must_use]
    pub fn title(&self) -> &str {
        &self.definition.title
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> QuestStatus {
        self.status
    }

    /// Description for the current status; the completed text only once
    /// completed.
    #[must_use]
    pub fn description(&self) -> &str {
        match self.status {
            QuestStatus::Completed => &self.definition.description_when_completed,
            QuestStatus::Unavailable | QuestStatus::InProgress | QuestStatus::Failed => {
                &self.definition.description_when_active
            },
        }
    }

    /// Returns every objective, including those in inactive branches.
    #[must_use]
    pub fn objectives(&self) -> &[ObjectiveState] {
        &self.objectives
    }

    /// Finds an objective by identifier.
    #[must_use]
    pub fn objective(&self, id: &ObjectiveId) -> Option<&ObjectiveState> {
        self.objectives.iter().find(|o| o.id() == id)
    }

    /// Finds a task by identifier.
    #[must_use]
    pub fn task(&self, id: &TaskId) -> Option<&TaskState> {
        let &(objective, task) = self.task_lookup.get(id)?;
        self.objectives.get(objective)?.tasks().get(task)
    }

    /// Objectives that currently count toward completion, in order.
    #[must_use]
    pub fn active_objectives(&self) -> Vec<&ObjectiveState> {
        self.objectives
            .iter()
            .filter(|o| self.is_objective_active(o))
            .collect()
    }

    /// The first incomplete objective of the unbranched group and of each
    /// active branch, in definition order.
    #[must_use]
    pub fn current_objectives(&self) -> Vec<&ObjectiveState> {
        self.current_objectives
            .iter()
            .filter_map(|&i| self.objectives.get(i))
            .collect()
    }

    /// The first current objective, or `None` once nothing is outstanding.
    #[must_use]
    pub fn current_objective(&self) -> Option<&ObjectiveState> {
        self.current_objectives
            .first()
            .and_then(|&i| self.objectives.get(i))
    }

    /// Next mandatory task of the current objective.
    #[must_use]
    pub fn next_mandatory_task(&self) -> Option<&TaskState> {
        self.current_objective()
            .and_then(ObjectiveState::next_mandatory_task)
    }

    /// Returns the active branches, in activation order.
    #[must_use]
    pub fn active_branches(&self) -> &[BranchId] {
        &self.active_branches
    }

    /// Returns whether a branch is active.
    #[must_use]
    pub fn is_branch_active(&self, branch: &BranchId) -> bool {
        self.active_branches.contains(branch)
    }

    /// Returns true while in progress.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        self.status == QuestStatus::InProgress
    }

    /// Returns true if completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.status == QuestStatus::Completed
    }

    /// Returns true if failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status == QuestStatus::Failed
    }

    /// Returns true if the objective exists and is incomplete.
    #[must_use]
    pub fn is_objective_incomplete(&self, id: &ObjectiveId) -> bool {
        self.objective(id).is_some_and(ObjectiveState::is_incomplete)
    }

    /// Returns true if the objective exists and is completed.
    #[must_use]
    pub fn is_objective_completed(&self, id: &ObjectiveId) -> bool {
        self.objective(id).is_some_and(ObjectiveState::is_completed)
    }

    /// Returns true if the objective exists and has failed.
    #[must_use]
    pub fn is_objective_failed(&self, id: &ObjectiveId) -> bool {
        self.objective(id).is_some_and(ObjectiveState::is_failed)
    }

    /// Returns true if the task exists and is incomplete.
    #[must_use]
    pub fn is_task_incomplete(&self, id: &TaskId) -> bool {
        self.task(id).is_some_and(TaskState::is_incomplete)
    }

    /// Returns true if the task exists and is completed.
    #[must_use]
    pub fn is_task_completed(&self, id: &TaskId) -> bool {
        self.task(id).is_some_and(TaskState::is_completed)
    }

    /// Returns true if the task exists and has failed.
    #[must_use]
    pub fn is_task_failed(&self, id: &TaskId) -> bool {
        self.task(id).is_some_and(TaskState::is_failed)
    }

    fn is_objective_active(&self, objective: &ObjectiveState) -> bool {
        objective
            .branch()
            .map_or(true, |branch| self.active_branches.contains(branch))
    }

    fn group_completed(&self, branch: Option<&BranchId>) -> bool {
        self.objectives
            .iter()
            .filter(|o| o.branch() == branch)
            .all(ObjectiveState::is_completed)
    }

    /// Re-derives quest status and current objectives from the objectives.
    ///
    /// Returns true if the quest's status changed.
    pub(crate) fn notify_objective_status_changed(&mut self, cx: &mut Cascade<'_>) -> bool {
        let any_failed = self
            .objectives
            .iter()
            .any(|o| self.is_objective_active(o) && o.is_failed());

        let completed = match self.definition.completion {
            QuestCompletion::AllBranches => self
                .objectives
                .iter()
                .filter(|o| self.is_objective_active(o))
                .all(ObjectiveState::is_completed),
            QuestCompletion::AnyBranch => {
                self.group_completed(None)
                    && (self.active_branches.is_empty()
                        || self
                            .active_branches
                            .iter()
                            .any(|b| self.group_completed(Some(b))))
            },
        };

        let status = if any_failed {
            QuestStatus::Failed
        } else if completed {
            QuestStatus::Completed
        } else {
            QuestStatus::InProgress
        };

        self.update_current_objectives();
        self.change_status(status, cx)
    }

    fn update_current_objectives(&mut self) {
        let mut current = Vec::new();
        let groups = std::iter::once(None).chain(self.active_branches.iter().map(Some));
        for group in groups {
            if let Some(index) = self
                .objectives
                .iter()
                .position(|o| o.branch() == group && o.is_incomplete())
            {
                current.push(index);
            }
        }
        current.sort_unstable();
        self.current_objectives = current;
    }

    fn change_status(&mut self, status: QuestStatus, cx: &mut Cascade<'_>) -> bool {
        if self.status == status {
            return false;
        }

        debug!(
            "Quest {}: {} -> {}",
            self.id(),
            self.status.as_str(),
            status.as_str()
        );
        self.status = status;

        match status {
            QuestStatus::Completed => cx.quest_completed(),
            QuestStatus::Failed => cx.quest_failed(),
            QuestStatus::Unavailable | QuestStatus::InProgress => {},
        }
        true
    }

    /// Carries an objective status change up to the quest.
    fn settle_objective(&mut self, objective_changed: bool, cx: &mut Cascade<'_>) {
        if objective_changed {
            self.notify_objective_status_changed(cx);
            cx.quest_updated();
        }
    }

    /// Applies `f` to every task of one objective in order. Whenever a task
    /// moves the objective's status, the quest settles before the next task
    /// is touched.
    fn for_each_task(
        &mut self,
        objective_index: usize,
        cx: &mut Cascade<'_>,
        mut f: impl FnMut(&mut TaskState, &mut Cascade<'_>) -> bool,
    ) {
        let count = self
            .objectives
            .get(objective_index)
            .map_or(0, |o| o.tasks().len());
        for task_index in 0..count {
            let changed = self.objectives[objective_index].update_task(task_index, cx, &mut f);
            self.settle_objective(changed, cx);
        }
    }

    fn locate_task(&self, id: &TaskId) -> QuestResult<(usize, usize)> {
        self.task_lookup
            .get(id)
            .copied()
            .ok_or_else(|| QuestError::TaskNotFound {
                quest: self.id().clone(),
                task: id.clone(),
            })
    }

    fn locate_objective(&self, id: &ObjectiveId) -> QuestResult<usize> {
        self.objectives
            .iter()
            .position(|o| o.id() == id)
            .ok_or_else(|| QuestError::ObjectiveNotFound {
                quest: self.id().clone(),
                objective: id.clone(),
            })
    }

    /// Runs a mutation against one task, then cascades if its status changed.
    fn mutate_task<R>(
        &mut self,
        id: &TaskId,
        cx: &mut Cascade<'_>,
        f: impl FnOnce(&mut TaskState, &mut Cascade<'_>) -> QuestResult<(R, bool)>,
    ) -> QuestResult<R> {
        let (objective_index, task_index) = self.locate_task(id)?;
        let objective = &mut self.objectives[objective_index];
        let task = objective
            .task_mut(task_index)
            .ok_or_else(|| QuestError::TaskNotFound {
                quest: cx.quest().clone(),
                task: id.clone(),
            })?;

        let (result, task_changed) = f(task, cx)?;
        if task_changed {
            let objective_changed = objective.notify_task_status_changed(cx);
            self.settle_objective(objective_changed, cx);
        }
        Ok(result)
    }

    /// Completes a task. Returns whether it transitioned.
    pub(crate) fn complete_task(&mut self, id: &TaskId, cx: &mut Cascade<'_>) -> QuestResult<bool> {
        self.mutate_task(id, cx, |task, cx| {
            let changed = task.complete(cx);
            Ok((changed, changed))
        })
    }

    /// Fails a task. Returns whether it transitioned.
    pub(crate) fn fail_task(&mut self, id: &TaskId, cx: &mut Cascade<'_>) -> QuestResult<bool> {
        self.mutate_task(id, cx, |task, cx| {
            let changed = task.fail(cx);
            Ok((changed, changed))
        })
    }

    /// Adds to a numeric task. Returns the number outstanding.
    pub(crate) fn progress_task(
        &mut self,
        id: &TaskId,
        delta: i32,
        cx: &mut Cascade<'_>,
    ) -> QuestResult<i32> {
        self.mutate_task(id, cx, |task, cx| {
            let progress = task.progress(delta, cx);
            numeric_result(task, progress, cx)
        })
    }

    /// Sets a numeric task's number. Returns the number outstanding.
    pub(crate) fn set_task_number(
        &mut self,
        id: &TaskId,
        value: i32,
        cx: &mut Cascade<'_>,
    ) -> QuestResult<i32> {
        self.mutate_task(id, cx, |task, cx| {
            let progress = task.set_number(value, cx);
            numeric_result(task, progress, cx)
        })
    }

    /// Resets a single task.
    pub(crate) fn reset_task(&mut self, id: &TaskId, cx: &mut Cascade<'_>) -> QuestResult<()> {
        self.mutate_task(id, cx, |task, _| Ok(((), task.reset())))
    }

    /// Resets every task of one objective.
    pub(crate) fn reset_objective(
        &mut self,
        id: &ObjectiveId,
        cx: &mut Cascade<'_>,
    ) -> QuestResult<()> {
        let index = self.locate_objective(id)?;
        self.for_each_task(index, cx, |task, _| task.reset());
        Ok(())
    }

    /// Resets every objective tagged with `branch`.
    pub(crate) fn reset_branch(&mut self, branch: &BranchId, cx: &mut Cascade<'_>) {
        for index in 0..self.objectives.len() {
            if self.objectives[index].branch() == Some(branch) {
                self.for_each_task(index, cx, |task, _| task.reset());
            }
        }
    }

    /// Resets all progress and deactivates every branch.
    pub(crate) fn reset(&mut self, cx: &mut Cascade<'_>) {
        self.active_branches.clear();
        for index in 0..self.objectives.len() {
            self.for_each_task(index, cx, |task, _| task.reset());
        }
        self.notify_objective_status_changed(cx);
        cx.quest_reset();
    }

    /// Activates or deactivates a branch. Returns whether the set changed.
    pub(crate) fn set_branch_active(
        &mut self,
        branch: &BranchId,
        active: bool,
        cx: &mut Cascade<'_>,
    ) -> bool {
        let present = self.active_branches.contains(branch);
        if active == present {
            return false;
        }
        if active {
            self.active_branches.push(branch.clone());
        } else {
            self.active_branches.retain(|b| b != branch);
        }
        debug!(
            "Quest {}: branch {} {}",
            self.id(),
            branch,
            if active { "activated" } else { "deactivated" }
        );
        self.notify_objective_status_changed(cx);
        cx.quest_updated();
        true
    }

    /// Deactivates every branch. Returns whether any was active.
    pub(crate) fn reset_branches(&mut self, cx: &mut Cascade<'_>) -> bool {
        if self.active_branches.is_empty() {
            return false;
        }
        self.active_branches.clear();
        self.notify_objective_status_changed(cx);
        cx.quest_updated();
        true
    }

    /// Fails the outstanding tasks of every current objective.
    ///
    /// Does nothing when no objective is outstanding.
    pub(crate) fn fail(&mut self, cx: &mut Cascade<'_>) {
        let current = self.current_objectives.clone();
        for index in current {
            // Each failure re-derives hidden flags, so the next sequential
            // task is revealed and failed in turn.
            self.for_each_task(index, cx, |task, cx| {
                task.is_incomplete() && !task.is_hidden() && task.fail(cx)
            });
        }
    }

    /// Completes every incomplete mandatory task of every active objective.
    pub(crate) fn complete(&mut self, cx: &mut Cascade<'_>) {
        for index in 0..self.objectives.len() {
            if !self.is_objective_active(&self.objectives[index]) {
                continue;
            }
            self.for_each_task(index, cx, |task, cx| {
                task.is_mandatory() && task.is_incomplete() && task.complete(cx)
            });
        }
    }

    /// Advances time limits on the tasks of every active objective.
    pub(crate) fn tick(&mut self, delta_time: f32, cx: &mut Cascade<'_>) {
        for index in 0..self.objectives.len() {
            if !self.is_objective_active(&self.objectives[index]) {
                continue;
            }
            self.for_each_task(index, cx, |task, cx| task.tick(delta_time, cx));
        }
    }
}

fn numeric_result(
    task: &TaskState,
    progress: Option<TaskProgress>,
    cx: &Cascade<'_>,
) -> QuestResult<(i32, bool)> {
    progress
        .map(|p| (p.outstanding, p.status_changed))
        .ok_or_else(|| QuestError::InvalidOperation {
            quest: cx.quest().clone(),
            task: task.id().clone(),
            reason: "task has no numeric target".to_string(),
        })
}
