//! Command implementations

pub mod completions;
pub mod fix;
pub mod update;
