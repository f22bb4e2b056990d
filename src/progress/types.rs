//! Progress protocol types

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    #[default]
    Running,
    Complete,
    Error,
}

impl ProgressStatus {
    /// No further updates follow a terminal status
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ProgressStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStatus::Running => "running",
            ProgressStatus::Complete => "complete",
            ProgressStatus::Error => "error",
        }
    }
}

/// Immutable copy of the progress record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    pub status: ProgressStatus,
    pub current: usize,
    pub total: usize,
    pub current_combination_label: String,
}

impl ProgressSnapshot {
    /// Completed fraction in [0, 1]; 0 before the total is known
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.current as f64 / self.total as f64
        }
    }
}

/// Message pushed to an observer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressMessage {
    Update(ProgressSnapshot),
    /// Heartbeat answer
    Pong,
}
