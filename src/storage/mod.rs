//! JSONL event log: append-only writes and tail queries.

pub mod history;
pub mod logging;

pub use history::{clamp_limit, parse_history, read_history, MAX_HISTORY_LIMIT};
pub use logging::{Event, EventKind, EventLog};
