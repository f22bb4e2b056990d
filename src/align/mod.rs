//! Snapshot alignment
//!
//! Turns raw probability and candle series into ordered aligned snapshots
//! in home-probability space.

mod aligner;
mod types;

pub use aligner::{invert, to_home_space, SnapshotAligner};
pub use types::{
    AlignedEvent, AlignedSnapshot, AlignmentAnomaly, AlignmentError, AlignmentReport, AnomalyKind,
};
