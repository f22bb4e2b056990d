//! Probability model descriptor
//!
//! The model itself is an opaque oracle: the store already holds one
//! probability per timestamp. What the core does need to know is which
//! inputs the model consumed, resolved once when the dataset is loaded.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Inputs a probability model may consume
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelInput {
    ScoreDifferential,
    TimeRemaining,
    Possession,
    PregameSpread,
    /// The market's own implied price
    MarketPrice,
}

/// Manifest shipped alongside a model artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub required_inputs: Vec<ModelInput>,
}

/// Resolved capability descriptor for one model artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCapabilities {
    name: String,
    version: String,
    inputs: BTreeSet<ModelInput>,
}

impl ModelCapabilities {
    /// Resolve capabilities from a manifest
    pub fn resolve(manifest: &ModelManifest) -> Self {
        Self {
            name: manifest.name.clone(),
            version: manifest.version.clone(),
            inputs: manifest.required_inputs.iter().copied().collect(),
        }
    }

    /// Whether the model needs the given input
    pub fn requires(&self, input: ModelInput) -> bool {
        self.inputs.contains(&input)
    }

    /// A model fed the market price cannot diverge from it independently
    pub fn consumes_market_price(&self) -> bool {
        self.requires(ModelInput::MarketPrice)
    }

    /// Required inputs in a stable order
    pub fn inputs(&self) -> impl Iterator<Item = ModelInput> + '_ {
        self.inputs.iter().copied()
    }

    /// `name@version`
    pub fn label(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}
