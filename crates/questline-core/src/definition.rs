//! Immutable quest definitions.
//!
//! Definitions describe the authored structure of a quest: its objectives,
//! their tasks, and the rules for completing them. They are built once
//! (in code or by a loader), shared behind `Arc`, and never mutated by the
//! runtime states that track a player's progress against them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use questline_common::{BranchId, DefinitionError, ObjectiveId, QuestId, TaskId};
use serde::{Deserialize, Serialize};

/// Inclusive numeric range for a countable task ("collect 5 herbs").
///
/// Progress starts at `min` and the task completes when it reaches `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericTarget {
    /// Starting value
    pub min: i32,
    /// Value at which the task completes
    pub max: i32,
}

impl NumericTarget {
    /// Creates a range from `min` to `max`.
    #[must_use]
    pub const fn new(min: i32, max: i32) -> Self {
        Self { min, max }
    }

    /// Range from zero to `count`.
    #[must_use]
    pub const fn count(count: i32) -> Self {
        Self::new(0, count)
    }

    /// Clamps a value into the range without panicking on `min > max`.
    #[must_use]
    pub fn clamp(self, value: i32) -> i32 {
        value.max(self.min).min(self.max)
    }
}

/// A single task within an objective.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    /// Identifier, unique within the quest
    pub id: TaskId,
    /// Display title
    pub title: String,
    /// Whether completion counts toward the objective
    pub mandatory: bool,
    /// Numeric progress range, if the task is countable
    pub target: Option<NumericTarget>,
    /// Time limit in seconds, if any
    pub time_limit: Option<f32>,
}

impl TaskDefinition {
    /// Creates a mandatory task with no target or time limit.
    #[must_use]
    pub fn new(id: impl Into<TaskId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            mandatory: true,
            target: None,
            time_limit: None,
        }
    }

    /// Marks the task optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.mandatory = false;
        self
    }

    /// Sets whether the task is mandatory.
    #[must_use]
    pub fn mandatory(mut self, mandatory: bool) -> Self {
        self.mandatory = mandatory;
        self
    }

    /// Gives the task a numeric range.
    #[must_use]
    pub fn with_target(mut self, min: i32, max: i32) -> Self {
        self.target = Some(NumericTarget::new(min, max));
        self
    }

    /// Gives the task a time limit in seconds.
    #[must_use]
    pub fn with_time_limit(mut self, seconds: f32) -> Self {
        self.time_limit = Some(seconds);
        self
    }
}

/// An objective: an ordered group of tasks with a completion policy.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveDefinition {
    /// Identifier, unique within the quest
    pub id: ObjectiveId,
    /// Display title
    pub title: String,
    /// Branch tag; `None` means always active
    pub branch: Option<BranchId>,
    /// All mandatory tasks must complete, rather than any one
    pub all_mandatory_tasks_required: bool,
    /// Mandatory tasks are tackled in order
    pub sequential_tasks: bool,
    /// Description shown while not completed
    pub description_when_active: String,
    /// Description shown once completed (may be blank)
    pub description_when_completed: String,
    /// Tasks in definition order
    pub tasks: Vec<Arc<TaskDefinition>>,
}

impl ObjectiveDefinition {
    /// Creates a sequential objective requiring all mandatory tasks.
    #[must_use]
    pub fn new(id: impl Into<ObjectiveId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            branch: None,
            all_mandatory_tasks_required: true,
            sequential_tasks: true,
            description_when_active: String::new(),
            description_when_completed: String::new(),
            tasks: Vec::new(),
        }
    }

    /// Adds a task.
    #[must_use]
    pub fn with_task(mut self, task: TaskDefinition) -> Self {
        self.tasks.push(Arc::new(task));
        self
    }

    /// Sets whether mandatory tasks are sequential.
    #[must_use]
    pub fn sequential(mut self, sequential: bool) -> Self {
        self.sequential_tasks = sequential;
        self
    }

    /// Sets whether all mandatory tasks are required.
    #[must_use]
    pub fn all_mandatory_required(mut self, required: bool) -> Self {
        self.all_mandatory_tasks_required = required;
        self
    }

    /// Tags the objective with a branch.
    #[must_use]
    pub fn in_branch(mut self, branch: impl Into<BranchId>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Sets the active and completed descriptions.
    #[must_use]
    pub fn with_descriptions(
        mut self,
        when_active: impl Into<String>,
        when_completed: impl Into<String>,
    ) -> Self {
        self.description_when_active = when_active.into();
        self.description_when_completed = when_completed.into();
        self
    }

    /// Number of mandatory tasks.
    #[must_use]
    pub fn mandatory_task_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.mandatory).count()
    }
}

/// How objectives in different branches combine into quest completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestCompletion {
    /// Every active objective must be completed
    #[default]
    AllBranches,
    /// Unbranched objectives must be completed, plus every objective of at
    /// least one active branch
    AnyBranch,
}

/// A quest: ordered objectives plus acceptance rules.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestDefinition {
    /// Unique quest identifier
    pub id: QuestId,
    /// Display title
    pub title: String,
    /// Description shown while not completed
    pub description_when_active: String,
    /// Description shown once completed
    pub description_when_completed: String,
    /// Branch completion policy
    pub completion: QuestCompletion,
    /// Accept automatically once all prerequisites are completed
    pub auto_accept: bool,
    /// Quests that must be completed first
    pub prerequisites: Vec<QuestId>,
    /// Objectives in definition order
    pub objectives: Vec<Arc<ObjectiveDefinition>>,
}

impl QuestDefinition {
    /// Creates an empty quest definition.
    #[must_use]
    pub fn new(id: impl Into<QuestId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description_when_active: String::new(),
            description_when_completed: String::new(),
            completion: QuestCompletion::default(),
            auto_accept: false,
            prerequisites: Vec::new(),
            objectives: Vec::new(),
        }
    }

    /// Adds an objective.
    #[must_use]
    pub fn with_objective(mut self, objective: ObjectiveDefinition) -> Self {
        self.objectives.push(Arc::new(objective));
        self
    }

    /// Sets the branch completion policy.
    #[must_use]
    pub fn with_completion(mut self, completion: QuestCompletion) -> Self {
        self.completion = completion;
        self
    }

    /// Adds a prerequisite quest.
    #[must_use]
    pub fn with_prerequisite(mut self, quest: impl Into<QuestId>) -> Self {
        self.prerequisites.push(quest.into());
        self
    }

    /// Sets whether the quest is accepted automatically.
    #[must_use]
    pub fn auto_accept(mut self, auto_accept: bool) -> Self {
        self.auto_accept = auto_accept;
        self
    }

    /// Sets the active and completed descriptions.
    #[must_use]
    pub fn with_descriptions(
        mut self,
        when_active: impl Into<String>,
        when_completed: impl Into<String>,
    ) -> Self {
        self.description_when_active = when_active.into();
        self.description_when_completed = when_completed.into();
        self
    }

    /// Iterates every task in objective order.
    pub fn tasks(&self) -> impl Iterator<Item = &Arc<TaskDefinition>> {
        self.objectives.iter().flat_map(|o| o.tasks.iter())
    }

    /// Checks identifiers and task parameters for consistency.
    pub fn validate(&self) -> Result<(), DefinitionError> {
        if self.id.is_empty() {
            return Err(DefinitionError::EmptyIdentifier(self.id.clone()));
        }

        let mut objective_ids = HashSet::new();
        for objective in &self.objectives {
            if objective.id.is_empty() {
                return Err(DefinitionError::EmptyIdentifier(self.id.clone()));
            }
            if !objective_ids.insert(&objective.id) {
                return Err(DefinitionError::DuplicateObjective {
                    quest: self.id.clone(),
                    objective: objective.id.clone(),
                });
            }
        }

        let mut task_ids = HashSet::new();
        for task in self.tasks() {
            if task.id.is_empty() {
                return Err(DefinitionError::EmptyIdentifier(self.id.clone()));
            }
            if !task_ids.insert(&task.id) {
                return Err(DefinitionError::DuplicateTask {
                    quest: self.id.clone(),
                    task: task.id.clone(),
                });
            }
            if let Some(target) = task.target {
                if target.min > target.max {
                    return Err(DefinitionError::InvalidRange {
                        quest: self.id.clone(),
                        task: task.id.clone(),
                        min: target.min,
                        max: target.max,
                    });
                }
            }
            if let Some(limit) = task.time_limit {
                if !limit.is_finite() || limit <= 0.0 {
                    return Err(DefinitionError::InvalidTimeLimit {
                        quest: self.id.clone(),
                        task: task.id.clone(),
                        limit,
                    });
                }
            }
        }

        Ok(())
    }
}

/// The full set of quest definitions a play state tracks against.
#[derive(Debug, Clone, Default)]
pub struct QuestLibrary {
    quests: HashMap<QuestId, Arc<QuestDefinition>>,
}

impl QuestLibrary {
    /// Creates an empty library.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and registers a definition.
    pub fn insert(&mut self, definition: QuestDefinition) -> Result<(), DefinitionError> {
        definition.validate()?;
        if self.quests.contains_key(&definition.id) {
            return Err(DefinitionError::DuplicateQuest(definition.id));
        }
        self.quests
            .insert(definition.id.clone(), Arc::new(definition));
        Ok(())
    }

    /// Registers a definition, builder style.
    pub fn with_quest(mut self, definition: QuestDefinition) -> Result<Self, DefinitionError> {
        self.insert(definition)?;
        Ok(self)
    }

    /// Gets a definition by identifier.
    #[must_use]
    pub fn get(&self, id: &QuestId) -> Option<&Arc<QuestDefinition>> {
        self.quests.get(id)
    }

    /// Returns true if a definition exists.
    #[must_use]
    pub fn contains(&self, id: &QuestId) -> bool {
        self.quests.contains_key(id)
    }

    /// Returns the number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.quests.len()
    }

    /// Returns true if the library is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.quests.is_empty()
    }

    /// Iterates all definitions.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<QuestDefinition>> {
        self.quests.values()
    }

    /// Returns all quest identifiers, sorted.
    #[must_use]
    pub fn ids(&self) -> Vec<QuestId> {
        let mut ids: Vec<_> = self.quests.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Removes every definition.
    pub fn clear(&mut self) {
        self.quests.clear();
    }
}
