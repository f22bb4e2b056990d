//! Event sources
//!
//! The relational store and its ETL live outside this crate. A source hands
//! over fully loaded, in-memory events; nothing downstream performs I/O.

use super::{DataError, Dataset, EventData};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;

/// Trait for event source implementations
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Load the full event universe
    async fn load(&self) -> Result<Dataset, DataError>;
}

/// Reads a dataset exported as a single JSON document
pub struct JsonEventSource {
    path: PathBuf,
}

impl JsonEventSource {
    /// Create a source for a JSON dataset file
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the file path
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    /// Parse and validate a dataset from a JSON string
    pub fn parse(content: &str) -> Result<Dataset, DataError> {
        let mut dataset: Dataset = serde_json::from_str(content)?;
        validate_dataset(&mut dataset)?;
        Ok(dataset)
    }
}

#[async_trait]
impl EventSource for JsonEventSource {
    async fn load(&self) -> Result<Dataset, DataError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        let dataset = Self::parse(&content)?;

        tracing::info!(
            path = ?self.path,
            events = dataset.events.len(),
            model = dataset.model.as_ref().map(|m| m.name.as_str()).unwrap_or("unknown"),
            "Loaded dataset"
        );

        Ok(dataset)
    }
}

/// Check event ids and bounds, stamping points that omit their event id
pub fn validate_dataset(dataset: &mut Dataset) -> Result<(), DataError> {
    let mut seen = HashSet::new();
    for event in &mut dataset.events {
        if !seen.insert(event.event_id.clone()) {
            return Err(DataError::DuplicateEvent(event.event_id.clone()));
        }
        validate_event(event)?;
    }
    Ok(())
}

fn validate_event(event: &mut EventData) -> Result<(), DataError> {
    if event.end <= event.start {
        return Err(DataError::InvalidBounds(event.event_id.clone()));
    }

    let ids = event
        .probabilities
        .iter_mut()
        .map(|p| &mut p.event_id)
        .chain(event.candles.iter_mut().map(|c| &mut c.event_id));

    for id in ids {
        if id.is_empty() {
            id.clone_from(&event.event_id);
        } else if *id != event.event_id {
            return Err(DataError::ForeignPoint {
                event_id: event.event_id.clone(),
                found: id.clone(),
            });
        }
    }

    Ok(())
}
