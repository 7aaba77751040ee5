//! Task view synchronization: snapshot plus live events, filtered and sorted.

pub mod derive;
pub mod state;
pub mod sync;

pub use derive::{SortKey, ViewParams, derive, parse_filter};
pub use state::{ApplyOutcome, PENDING_LIMIT, UpdateScope, ViewState, apply_event};
pub use sync::{DRAIN_BATCH, TaskViewSync};
