//! braid library crate.
//!
//! The primary interface is the `braid` binary; `main.rs` is a thin clap
//! dispatcher over the command modules here. Keeping the commands and their
//! pure cores (the graph builder, the conflict analyzer, the merge driver)
//! in a lib target keeps them unit-testable and gives the crate a callable
//! API should one ever be wanted. Integration tests exercise the built
//! binary itself, end to end.

pub mod analyze;
pub mod error;
pub mod format;
pub mod graph;
pub mod merge;
pub mod model;
pub mod plan;
pub mod resolve;
pub mod state;
pub mod tasks;
pub mod telemetry;
pub mod workspace;

/// Exit code for full success.
pub const EXIT_OK: i32 = 0;
/// Exit code when some tasks succeeded and some did not (a stopped merge
/// run, a partially failed setup or cleanup).
pub const EXIT_PARTIAL: i32 = 3;
/// Exit code when a command needs run state and none exists.
pub const EXIT_NO_RUN_STATE: i32 = 2;
