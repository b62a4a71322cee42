//! Subcommand implementations

pub mod collect;
pub mod sources;
pub mod summary;
