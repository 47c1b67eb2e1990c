//! Quest events and their delivery.
//!
//! Events raised while a mutation cascades through tasks, objectives, and
//! quests are buffered in cascade order (child before parent). The play
//! state delivers them only after the cascade has settled, first to
//! registered [`EventHandler`]s and then onto the [`EventBus`].

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use questline_common::{ObjectiveId, QuestId, TaskId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::play_state::PlayState;

/// Something that happened to a quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestEvent {
    /// Detail of a task changed (its number)
    TaskUpdated {
        /// Owning quest
        quest: QuestId,
        /// Task
        task: TaskId,
    },
    /// Task completed
    TaskCompleted {
        /// Owning quest
        quest: QuestId,
        /// Task
        task: TaskId,
    },
    /// Task failed
    TaskFailed {
        /// Owning quest
        quest: QuestId,
        /// Task
        task: TaskId,
    },
    /// Objective completed
    ObjectiveCompleted {
        /// Owning quest
        quest: QuestId,
        /// Objective
        objective: ObjectiveId,
    },
    /// Objective failed
    ObjectiveFailed {
        /// Owning quest
        quest: QuestId,
        /// Objective
        objective: ObjectiveId,
    },
    /// Quest completed
    QuestCompleted {
        /// Quest
        quest: QuestId,
    },
    /// Quest failed
    QuestFailed {
        /// Quest
        quest: QuestId,
    },
    /// Quest accepted for the first time
    QuestAccepted {
        /// Quest
        quest: QuestId,
    },
    /// Quest entered or left the active set
    ActiveQuestChanged {
        /// Quest
        quest: QuestId,
    },
    /// An objective changed status or the set of active branches changed
    QuestUpdated {
        /// Quest
        quest: QuestId,
    },
    /// Quest progress was reset
    QuestReset {
        /// Quest
        quest: QuestId,
    },
}

impl QuestEvent {
    /// Returns the quest this event concerns.
    #[must_use]
    pub fn quest(&self) -> &QuestId {
        match self {
            Self::TaskUpdated { quest, .. }
            | Self::TaskCompleted { quest, .. }
            | Self::TaskFailed { quest, .. }
            | Self::ObjectiveCompleted { quest, .. }
            | Self::ObjectiveFailed { quest, .. }
            | Self::QuestCompleted { quest }
            | Self::QuestFailed { quest }
            | Self::QuestAccepted { quest }
            | Self::ActiveQuestChanged { quest }
            | Self::QuestUpdated { quest }
            | Self::QuestReset { quest } => quest,
        }
    }

    /// Returns the task this event concerns, if it is a task event.
    #[must_use]
    pub fn task(&self) -> Option<&TaskId> {
        match self {
            Self::TaskUpdated { task, .. }
            | Self::TaskCompleted { task, .. }
            | Self::TaskFailed { task, .. } => Some(task),
            _ => None,
        }
    }

    /// Short event name, for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::TaskUpdated { .. } => "task_updated",
            Self::TaskCompleted { .. } => "task_completed",
            Self::TaskFailed { .. } => "task_failed",
            Self::ObjectiveCompleted { .. } => "objective_completed",
            Self::ObjectiveFailed { .. } => "objective_failed",
            Self::QuestCompleted { .. } => "quest_completed",
            Self::QuestFailed { .. } => "quest_failed",
            Self::QuestAccepted { .. } => "quest_accepted",
            Self::ActiveQuestChanged { .. } => "active_quest_changed",
            Self::QuestUpdated { .. } => "quest_updated",
            Self::QuestReset { .. } => "quest_reset",
        }
    }
}

/// Collects the events of one cascade for a single quest.
///
/// Handed down through quest, objective, and task mutations so that each
/// level can raise its events without holding a reference back up to its
/// owner.
pub(crate) struct Cascade<'a> {
    quest: QuestId,
    events: &'a mut Vec<QuestEvent>,
}

impl<'a> Cascade<'a> {
    pub(crate) fn new(quest: QuestId, events: &'a mut Vec<QuestEvent>) -> Self {
        Self { quest, events }
    }

    pub(crate) fn quest(&self) -> &QuestId {
        &self.quest
    }

    pub(crate) fn task_updated(&mut self, task: &TaskId) {
        self.events.push(QuestEvent::TaskUpdated {
            quest: self.quest.clone(),
            task: task.clone(),
        });
    }

    pub(crate) fn task_completed(&mut self, task: &TaskId) {
        self.events.push(QuestEvent::TaskCompleted {
            quest: self.quest.clone(),
            task: task.clone(),
        });
    }

    pub(crate) fn task_failed(&mut self, task: &TaskId) {
        self.events.push(QuestEvent::TaskFailed {
            quest: self.quest.clone(),
            task: task.clone(),
        });
    }

    pub(crate) fn objective_completed(&mut self, objective: &ObjectiveId) {
        self.events.push(QuestEvent::ObjectiveCompleted {
            quest: self.quest.clone(),
            objective: objective.clone(),
        });
    }

    pub(crate) fn objective_failed(&mut self, objective: &ObjectiveId) {
        self.events.push(QuestEvent::ObjectiveFailed {
            quest: self.quest.clone(),
            objective: objective.clone(),
        });
    }

    pub(crate) fn quest_completed(&mut self) {
        self.events.push(QuestEvent::QuestCompleted {
            quest: self.quest.clone(),
        });
    }

    pub(crate) fn quest_failed(&mut self) {
        self.events.push(QuestEvent::QuestFailed {
            quest: self.quest.clone(),
        });
    }

    pub(crate) fn quest_updated(&mut self) {
        self.events.push(QuestEvent::QuestUpdated {
            quest: self.quest.clone(),
        });
    }

    pub(crate) fn quest_reset(&mut self) {
        self.events.push(QuestEvent::QuestReset {
            quest: self.quest.clone(),
        });
    }
}

/// Synchronous listener for quest events.
///
/// Handlers run after a mutation has fully settled and receive read-only
/// access to the play state, so ancestors have always been re-aggregated by
/// the time a handler sees a task event.
pub trait EventHandler: Send + Sync {
    /// Handles an event.
    fn handle(&self, event: &QuestEvent, state: &PlayState);
}

impl<F> EventHandler for F
where
    F: Fn(&QuestEvent, &PlayState) + Send + Sync,
{
    fn handle(&self, event: &QuestEvent, state: &PlayState) {
        self(event, state);
    }
}

/// Handler that records every event it sees. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<QuestEvent>>>,
}

impl EventRecorder {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the recorded events.
    #[must_use]
    pub fn events(&self) -> Vec<QuestEvent> {
        self.events.lock().clone()
    }

    /// Removes and returns the recorded events.
    pub fn take(&self) -> Vec<QuestEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    /// Counts recorded events matching a predicate.
    pub fn count(&self, predicate: impl Fn(&QuestEvent) -> bool) -> usize {
        self.events.lock().iter().filter(|e| predicate(e)).count()
    }

    /// Returns the number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventHandler for EventRecorder {
    fn handle(&self, event: &QuestEvent, _state: &PlayState) {
        self.events.lock().push(event.clone());
    }
}

/// Event bus for pull-style consumers.
#[derive(Debug)]
pub struct EventBus {
    /// Sender for broadcasting events
    sender: Sender<QuestEvent>,
    /// Receiver for collecting events
    receiver: Receiver<QuestEvent>,
    /// Channel capacity
    capacity: usize,
    /// Events dropped since the last drain
    dropped: AtomicUsize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus {
    /// Creates a new event bus with the given capacity (at least 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, receiver) = bounded(capacity);
        Self {
            sender,
            receiver,
            capacity,
            dropped: AtomicUsize::new(0),
        }
    }

    /// Publishes an event to the bus. A full bus drops the event; only the
    /// first drop after each drain is logged as a warning.
    pub fn publish(&self, event: QuestEvent) {
        if let Err(TrySendError::Full(event)) = self.sender.try_send(event) {
            if self.dropped.fetch_add(1, Ordering::Relaxed) == 0 {
                warn!(
                    "Event bus full ({} pending), dropping events until drained",
                    self.capacity
                );
            }
            debug!("Dropped {} for quest {}", event.kind(), event.quest());
        }
    }

    /// Drains all pending events and clears the dropped count.
    pub fn drain(&self) -> Vec<QuestEvent> {
        self.dropped.store(0, Ordering::Relaxed);
        self.receiver.try_iter().collect()
    }

    /// Returns the number of events dropped since the last drain.
    #[must_use]
    pub fn dropped_count(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }

    /// Returns the channel capacity.
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns a receiver handle. Receivers compete for events; a drained
    /// event is seen by only one of them.
    #[must_use]
    pub fn receiver(&self) -> Receiver<QuestEvent> {
        self.receiver.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quest_updated(name: &str) -> QuestEvent {
        QuestEvent::QuestUpdated {
            quest: QuestId::new(name),
        }
    }

    #[test]
    fn test_bus_publish_and_drain() {
        let bus = EventBus::new(8);
        bus.publish(quest_updated("a"));
        bus.publish(quest_updated("b"));
        assert_eq!(bus.pending_count(), 2);

        let drained = bus.drain();
        assert_eq!(drained, vec![quest_updated("a"), quest_updated("b")]);
        assert_eq!(bus.pending_count(), 0);
    }

    #[test]
    fn test_bus_drops_when_full() {
        let bus = EventBus::new(1);
        bus.publish(quest_updated("a"));
        bus.publish(quest_updated("b"));
        bus.publish(quest_updated("c"));
        assert_eq!(bus.dropped_count(), 2);
        assert_eq!(bus.drain(), vec![quest_updated("a")]);
        assert_eq!(bus.dropped_count(), 0);
    }

    #[test]
    fn test_zero_capacity_bus_still_buffers() {
        let bus = EventBus::new(0);
        assert_eq!(bus.capacity(), 1);
        bus.publish(quest_updated("a"));
        assert_eq!(bus.dropped_count(), 0);
        assert_eq!(bus.drain(), vec![quest_updated("a")]);
    }

    #[test]
    fn test_cascade_tags_quest() {
        let mut events = Vec::new();
        let mut cx = Cascade::new(QuestId::new("q"), &mut events);
        cx.task_completed(&TaskId::new("t"));
        cx.quest_completed();
        assert_eq!(cx.quest().as_str(), "q");

        assert_eq!(
            events,
            vec![
                QuestEvent::TaskCompleted {
                    quest: QuestId::new("q"),
                    task: TaskId::new("t"),
                },
                QuestEvent::QuestCompleted {
                    quest: QuestId::new("q"),
                },
            ]
        );
    }

    #[test]
    fn test_event_accessors() {
        let event = QuestEvent::TaskFailed {
            quest: QuestId::new("q"),
            task: TaskId::new("t"),
        };
        assert_eq!(event.quest().as_str(), "q");
        assert_eq!(event.task().map(TaskId::as_str), Some("t"));
        assert_eq!(event.kind(), "task_failed");
        assert!(quest_updated("q").task().is_none());
    }
}
