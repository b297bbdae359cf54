//! Metric names recorded by the roster pipeline.

/// Label for the command action (`insert`, `update`, `delete`).
pub const ACTION_LABEL: &str = "action";

/// Label for the outcome of a processed command.
pub const OUTCOME_LABEL: &str = "outcome";

// Command queue

/// Counter of commands accepted by the queue.
pub const ROSTER_COMMANDS_ENQUEUED_TOTAL: &str = "roster_commands_enqueued_total";

/// Counter of commands taken off the queue by a mutation worker, by outcome.
pub const ROSTER_COMMANDS_PROCESSED_TOTAL: &str = "roster_commands_processed_total";

// Ingestion

/// Counter of CSV rows turned into insert commands.
pub const ROSTER_INGESTION_ROWS_TOTAL: &str = "roster_ingestion_rows_total";

// Fan-out

/// Counter of frames dropped because a subscriber's buffer was full.
pub const ROSTER_FANOUT_FRAMES_DROPPED_TOTAL: &str = "roster_fanout_frames_dropped_total";

/// Gauge of currently registered push subscribers.
pub const ROSTER_FANOUT_SUBSCRIBERS: &str = "roster_fanout_subscribers";
