//! High-level operations.
//!
//! This module contains the implementation of berth commands.

pub mod berth_update;
pub mod emit;

pub use berth_update::{update, update_with, UpdateOptions, UpdateSummary, VisitRecord};
pub use emit::EmitMode;
