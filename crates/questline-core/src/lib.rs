//! # Questline Core
//!
//! Quest progress tracking for a single player.
//!
//! This crate provides the progress tree and its cascading status rules:
//! - Immutable quest, objective, and task definitions
//! - Task runtime (completion, failure, numeric progress, time limits)
//! - Objective runtime (mandatory/optional tasks, sequential visibility)
//! - Quest runtime (branches, completion policy, current objectives)
//! - Play state registry (accepting, archiving, removing quests)
//! - Events delivered after every mutation has settled

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod definition;
pub mod events;
pub mod objective;
pub mod play_state;
pub mod quest;
pub mod status;
pub mod task;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::definition::*;
    pub use crate::events::*;
    pub use crate::objective::*;
    pub use crate::play_state::*;
    pub use crate::quest::*;
    pub use crate::status::*;
    pub use crate::task::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;
    use questline_common::{QuestId, TaskId};

    fn library() -> QuestLibrary {
        QuestLibrary::new()
            .with_quest(
                QuestDefinition::new("delivery", "Special Delivery").with_objective(
                    ObjectiveDefinition::new("deliver", "Deliver the parcel")
                        .with_task(TaskDefinition::new("pickup", "Pick up the parcel"))
                        .with_task(TaskDefinition::new("dropoff", "Drop off the parcel")),
                ),
            )
            .expect("valid library")
    }

    #[test]
    fn test_prelude_exposes_play_state() {
        let mut state = PlayState::new(library(), PlayStateConfig::default());
        let quest = QuestId::new("delivery");
        state.accept_quest(&quest).expect("accept");
        state
            .complete_task(&quest, &TaskId::new("pickup"))
            .expect("pickup");
        state
            .complete_task(&quest, &TaskId::new("dropoff"))
            .expect("dropoff");
        assert_eq!(state.quest_status(&quest), QuestStatus::Completed);
    }

    #[test]
    fn test_unaccepted_quest_is_unavailable() {
        let state = PlayState::new(library(), PlayStateConfig::default());
        let quest = QuestId::new("delivery");
        assert_eq!(state.quest_status(&quest), QuestStatus::Unavailable);
        assert!(!state.is_quest_failed(&quest));
        assert!(state.accepted_quest_ids().is_empty());
    }

    #[test]
    fn test_failed_quest_is_not_completed() {
        let mut state = PlayState::new(library(), PlayStateConfig::default());
        let quest = QuestId::new("delivery");
        state.accept_quest(&quest).expect("accept");
        state
            .fail_task(&quest, &TaskId::new("pickup"))
            .expect("fail");
        assert!(state.is_quest_failed(&quest));
        assert!(!state.is_quest_completed(&quest));
    }
}
