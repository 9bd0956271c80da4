//! Event sink system for observability.
//!
//! The sequencer reports stage transitions through an [`EventSink`]; the
//! binary wires in [`LoggingEventSink`], tests use [`CollectingEventSink`].

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

/// Event emitted when a stage begins.
pub const STAGE_STARTED: &str = "stage.started";
/// Event emitted when a stage completes.
pub const STAGE_COMPLETED: &str = "stage.completed";
/// Event emitted when a stage fails.
pub const STAGE_FAILED: &str = "stage.failed";
/// Event emitted after the log epilogue ran.
pub const EPILOGUE_FINISHED: &str = "launch.epilogue";
