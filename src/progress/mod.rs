//! Progress reporting
//!
//! A single owned progress record, written by the optimizer coordinator
//! and pushed to observers by a polling task over channels.

mod reporter;
mod types;

pub use reporter::{Observer, ProgressReporter, ProgressTracker};
pub use types::{ProgressMessage, ProgressSnapshot, ProgressStatus};
