//! CLI command handlers
//!
//! Each subcommand is implemented in its own module.

pub mod ask;
pub mod feedback;
pub mod helpers;
pub mod refit;
pub mod status;
