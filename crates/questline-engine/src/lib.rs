//! # Questline Engine
//!
//! Driver around the quest core.
//!
//! This crate ties the core to the outside world:
//! - Configuration loaded from `questline.toml`
//! - Quest definitions loaded from TOML files
//! - Scripted sessions replayed against a play state
//! - Event logging

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod config;
pub mod quest_loader;
pub mod session;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::quest_loader::*;
    pub use crate::session::*;
}

pub use prelude::*;
