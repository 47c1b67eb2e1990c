//! # Questline Common
//!
//! Common types shared by every Questline crate.
//!
//! This crate provides the foundational vocabulary of the quest system:
//! - Identifier types (QuestId, ObjectiveId, TaskId, BranchId)
//! - Schema versions for quest definition files
//! - Definition validation and version parse errors
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod error;
pub mod ids;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::*;
    pub use crate::ids::*;
    pub use crate::version::*;
}

pub use prelude::*;
