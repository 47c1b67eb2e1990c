//! Scripted play sessions.
//!
//! A session script is a TOML list of mutations and ticks replayed against
//! a play state, standing in for the per-frame game driver. Each step is
//! applied in order; a step that fails is logged and the session carries
//! on.

use std::fs;
use std::path::Path;

use questline_common::{BranchId, ObjectiveId, QuestId, SchemaVersion, TaskId};
use questline_core::{AcceptPolicy, EventHandler, PlayState, QuestError, QuestEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Upper bound on frames simulated by one tick step. Longer steps are
/// spread evenly over this many frames.
pub const MAX_FRAMES_PER_TICK: usize = 100_000;

/// Errors that can occur loading or replaying a session script.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Failed to read file.
    #[error("Failed to read session file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML.
    #[error("Failed to parse session TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Script written for a schema this driver cannot read.
    #[error("Unsupported session version {0}")]
    UnsupportedVersion(String),

    /// A step was rejected by the play state.
    #[error("Quest operation failed: {0}")]
    Quest(#[from] QuestError),

    /// Tick step with a negative or non-finite duration.
    #[error("Invalid tick duration: {0}")]
    InvalidTick(f32),
}

/// One scripted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum SessionStep {
    /// Accept a quest, optionally with an explicit policy.
    Accept {
        /// Quest
        quest: QuestId,
        /// Overrides the configured accept policy
        #[serde(default)]
        policy: Option<AcceptPolicy>,
    },
    /// Complete a task.
    Complete {
        /// Quest
        quest: QuestId,
        /// Task
        task: TaskId,
    },
    /// Fail a task.
    Fail {
        /// Quest
        quest: QuestId,
        /// Task
        task: TaskId,
    },
    /// Add to a numeric task.
    Progress {
        /// Quest
        quest: QuestId,
        /// Task
        task: TaskId,
        /// Amount to add
        delta: i32,
    },
    /// Set a numeric task's number.
    SetNumber {
        /// Quest
        quest: QuestId,
        /// Task
        task: TaskId,
        /// New number
        value: i32,
    },
    /// Let time pass, in frames of the configured tick interval.
    Tick {
        /// Seconds to simulate
        seconds: f32,
    },
    /// Reset a quest.
    Reset {
        /// Quest
        quest: QuestId,
    },
    /// Reset one objective.
    ResetObjective {
        /// Quest
        quest: QuestId,
        /// Objective
        objective: ObjectiveId,
    },
    /// Reset one task.
    ResetTask {
        /// Quest
        quest: QuestId,
        /// Task
        task: TaskId,
    },
    /// Fail a quest's current objectives.
    FailQuest {
        /// Quest
        quest: QuestId,
    },
    /// Complete a quest's mandatory tasks.
    CompleteQuest {
        /// Quest
        quest: QuestId,
    },
    /// Activate or deactivate a branch.
    SetBranch {
        /// Quest
        quest: QuestId,
        /// Branch
        branch: BranchId,
        /// Whether the branch is active
        #[serde(default = "default_true")]
        active: bool,
    },
    /// Deactivate every branch of a quest.
    ResetBranches {
        /// Quest
        quest: QuestId,
    },
    /// Remove a quest.
    Remove {
        /// Quest
        quest: QuestId,
    },
}

fn default_true() -> bool {
    true
}

impl SessionStep {
    /// Short step name, for logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Accept { .. } => "accept",
            Self::Complete { .. } => "complete",
            Self::Fail { .. } => "fail",
            Self::Progress { .. } => "progress",
            Self::SetNumber { .. } => "set_number",
            Self::Tick { .. } => "tick",
            Self::Reset { .. } => "reset",
            Self::ResetObjective { .. } => "reset_objective",
            Self::ResetTask { .. } => "reset_task",
            Self::FailQuest { .. } => "fail_quest",
            Self::CompleteQuest { .. } => "complete_quest",
            Self::SetBranch { .. } => "set_branch",
            Self::ResetBranches { .. } => "reset_branches",
            Self::Remove { .. } => "remove",
        }
    }
}

/// A session script file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionScript {
    /// File format version.
    #[serde(default = "default_version")]
    pub version: String,
    /// Steps in order.
    #[serde(default)]
    pub steps: Vec<SessionStep>,
}

fn default_version() -> String {
    SchemaVersion::SESSION_SCRIPT.to_string()
}

impl SessionScript {
    /// Parses a script and checks its schema version.
    pub fn parse(content: &str) -> Result<Self, SessionError> {
        let script: Self = toml::from_str(content)?;
        let readable = script
            .version
            .parse::<SchemaVersion>()
            .is_ok_and(|v| SchemaVersion::SESSION_SCRIPT.can_read(&v));
        if !readable {
            return Err(SessionError::UnsupportedVersion(script.version));
        }
        Ok(script)
    }

    /// Loads a script from a file.
    pub fn load(path: &Path) -> Result<Self, SessionError> {
        debug!("Loading session script: {:?}", path);
        Self::parse(&fs::read_to_string(path)?)
    }
}

/// Summary of a replayed session.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SessionReport {
    /// Steps applied
    pub steps_run: usize,
    /// Steps that returned an error
    pub steps_failed: usize,
    /// Frames simulated by tick steps
    pub frames: usize,
    /// Events delivered during the session
    pub events: usize,
    /// Quests completed at the end
    pub completed: Vec<QuestId>,
    /// Quests failed at the end
    pub failed: Vec<QuestId>,
    /// Quests still in progress at the end
    pub in_progress: Vec<QuestId>,
}

impl SessionReport {
    /// Logs the summary.
    pub fn log(&self) {
        info!(
            "Session finished: {} steps ({} failed), {} frames, {} events",
            self.steps_run, self.steps_failed, self.frames, self.events
        );
        info!(
            "Quests: {} completed, {} failed, {} in progress",
            self.completed.len(),
            self.failed.len(),
            self.in_progress.len()
        );
    }
}

/// Replays session scripts against a play state.
#[derive(Debug, Clone, Copy)]
pub struct SessionRunner {
    tick_interval: f32,
}

impl SessionRunner {
    /// Creates a runner simulating frames of `tick_interval` seconds.
    #[must_use]
    pub fn new(tick_interval: f32) -> Self {
        Self {
            tick_interval: if tick_interval.is_finite() && tick_interval > 0.0 {
                tick_interval
            } else {
                1.0 / 60.0
            },
        }
    }

    /// Applies every step in order and summarizes the result.
    pub fn run(&self, state: &mut PlayState, script: &SessionScript) -> SessionReport {
        let mut report = SessionReport::default();
        state.drain_events();

        for (index, step) in script.steps.iter().enumerate() {
            debug!("Step {}: {}", index, step.name());
            report.steps_run += 1;
            if let Err(e) = self.apply(state, step, &mut report) {
                warn!("Step {} ({}) failed: {}", index, step.name(), e);
                report.steps_failed += 1;
            }
            report.events += state.drain_events().len();
        }

        for quest in state.archived_quests() {
            if quest.is_completed() {
                report.completed.push(quest.id().clone());
            } else {
                report.failed.push(quest.id().clone());
            }
        }
        report.in_progress = state.accepted_quest_ids();
        report
    }

    fn apply(
        &self,
        state: &mut PlayState,
        step: &SessionStep,
        report: &mut SessionReport,
    ) -> Result<(), SessionError> {
        match step {
            SessionStep::Accept { quest, policy } => {
                let accepted = match policy {
                    Some(policy) => state.accept_quest_with(quest, *policy)?,
                    None => state.accept_quest(quest)?,
                };
                if !accepted {
                    debug!("Quest {} was already accepted", quest);
                }
            },
            SessionStep::Complete { quest, task } => {
                state.complete_task(quest, task)?;
            },
            SessionStep::Fail { quest, task } => {
                state.fail_task(quest, task)?;
            },
            SessionStep::Progress { quest, task, delta } => {
                let outstanding = state.progress_task(quest, task, *delta)?;
                debug!("Task {} in quest {}: {} outstanding", task, quest, outstanding);
            },
            SessionStep::SetNumber { quest, task, value } => {
                state.set_task_number(quest, task, *value)?;
            },
            SessionStep::Tick { seconds } => {
                report.frames += self.tick(state, *seconds)?;
            },
            SessionStep::Reset { quest } => state.reset_quest(quest)?,
            SessionStep::ResetObjective { quest, objective } => {
                state.reset_objective(quest, objective)?;
            },
            SessionStep::ResetTask { quest, task } => state.reset_task(quest, task)?,
            SessionStep::FailQuest { quest } => state.fail_quest(quest)?,
            SessionStep::CompleteQuest { quest } => state.complete_quest(quest)?,
            SessionStep::SetBranch {
                quest,
                branch,
                active,
            } => {
                state.set_branch_active(quest, branch, *active)?;
            },
            SessionStep::ResetBranches { quest } => {
                state.reset_branches(quest)?;
            },
            SessionStep::Remove { quest } => {
                if !state.remove_quest(quest) {
                    debug!("Quest {} was not accepted", quest);
                }
            },
        }
        Ok(())
    }

    /// Splits `seconds` into frames of the tick interval, the last one
    /// shorter if needed. Returns the number of frames ticked.
    fn tick(&self, state: &mut PlayState, seconds: f32) -> Result<usize, SessionError> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(SessionError::InvalidTick(seconds));
        }

        let total = f64::from(seconds);
        let interval = f64::from(self.tick_interval);
        let needed = (total / interval).ceil() as usize;
        let frames = needed.min(MAX_FRAMES_PER_TICK);
        let step = if frames < needed {
            total / frames as f64
        } else {
            interval
        };

        let mut elapsed = 0.0f64;
        for _ in 0..frames {
            let delta = step.min(total - elapsed).max(0.0);
            state.tick(delta as f32);
            elapsed += step;
        }
        Ok(frames)
    }
}

/// Handler that logs every delivered event.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventLogger;

impl EventHandler for EventLogger {
    fn handle(&self, event: &QuestEvent, state: &PlayState) {
        match event.task() {
            Some(task) => info!(
                "[{}] {} / {} (quest {})",
                event.kind(),
                event.quest(),
                task,
                state.quest_status(event.quest()).as_str()
            ),
            None => info!(
                "[{}] {} (quest {})",
                event.kind(),
                event.quest(),
                state.quest_status(event.quest()).as_str()
            ),
        }
    }
}
