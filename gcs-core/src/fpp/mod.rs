//! The host show scheduler's side: entry shape and numeric encodings.

mod entry;
pub mod legacy;
mod semantics;

pub use entry::{ScheduleEntry, host_round_trip};
pub use semantics::{default_repeat, enabled_from_host, strip_target_suffix};
