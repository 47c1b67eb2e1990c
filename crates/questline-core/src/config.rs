//! Play state configuration.
//!
//! Embedded as the `[play_state]` table of the engine's config file; every
//! field has a default so partial tables load.

use serde::{Deserialize, Serialize};

/// What accepting an already-accepted quest does, per current status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptPolicy {
    /// Reset a failed quest and accept it again
    pub reset_if_failed: bool,
    /// Reset a completed quest and accept it again
    pub reset_if_complete: bool,
    /// Reset a quest that is still in progress
    pub reset_if_in_progress: bool,
}

impl Default for AcceptPolicy {
    fn default() -> Self {
        Self {
            reset_if_failed: true,
            reset_if_complete: false,
            reset_if_in_progress: false,
        }
    }
}

impl AcceptPolicy {
    /// Policy that resets the quest whatever its status.
    #[must_use]
    pub const fn always_reset() -> Self {
        Self {
            reset_if_failed: true,
            reset_if_complete: true,
            reset_if_in_progress: true,
        }
    }

    /// Policy that never resets an accepted quest.
    #[must_use]
    pub const fn never_reset() -> Self {
        Self {
            reset_if_failed: false,
            reset_if_complete: false,
            reset_if_in_progress: false,
        }
    }
}

/// Play state parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayStateConfig {
    /// Policy used by `accept_quest`
    pub default_accept_policy: AcceptPolicy,
    /// Accept `auto_accept` quests once their prerequisites complete
    pub auto_accept: bool,
    /// Capacity of the pull-style event bus
    pub event_bus_capacity: usize,
}

impl Default for PlayStateConfig {
    fn default() -> Self {
        Self {
            default_accept_policy: AcceptPolicy::default(),
            auto_accept: true,
            event_bus_capacity: 1024,
        }
    }
}

impl PlayStateConfig {
    /// Clamps values to usable ranges.
    pub fn validate(&mut self) {
        self.event_bus_capacity = self.event_bus_capacity.clamp(16, 1 << 20);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PlayStateConfig::default();
        assert!(config.auto_accept);
        assert_eq!(config.event_bus_capacity, 1024);
        assert!(config.default_accept_policy.reset_if_failed);
        assert!(!config.default_accept_policy.reset_if_complete);
        assert!(!config.default_accept_policy.reset_if_in_progress);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: PlayStateConfig =
            serde_json::from_str(r#"{"default_accept_policy": {"reset_if_complete": true}}"#)
                .expect("Failed to parse");
        assert!(config.default_accept_policy.reset_if_complete);
        assert!(config.default_accept_policy.reset_if_failed);
        assert!(config.auto_accept);
    }

    #[test]
    fn test_config_validation() {
        let mut config = PlayStateConfig {
            event_bus_capacity: 0,
            ..PlayStateConfig::default()
        };
        config.validate();
        assert_eq!(config.event_bus_capacity, 16);
    }
}
