//! Deterministic train/validation/test partition of events

use super::Split;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Event ids per split. Each list is in shuffled order, which is also the
/// order metrics are accumulated in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSplit {
    pub seed: u64,
    pub train: Vec<String>,
    pub validation: Vec<String>,
    pub test: Vec<String>,
}

fn round_share(n: usize, pct: u32) -> usize {
    (n * pct as usize + 50) / 100
}

impl EventSplit {
    /// Partition `event_ids`. Ids are sorted and deduplicated first, so the
    /// result depends only on the set of ids and the seed.
    ///
    /// With three or more events every split is non-empty; smaller
    /// universes go entirely to train.
    pub fn compute(event_ids: &[String], seed: u64, train_pct: u32, validation_pct: u32) -> Self {
        let mut ids: Vec<String> = event_ids.to_vec();
        ids.sort();
        ids.dedup();

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        ids.shuffle(&mut rng);

        let n = ids.len();
        if n < 3 {
            return Self {
                seed,
                train: ids,
                validation: Vec::new(),
                test: Vec::new(),
            };
        }

        let validation_len = round_share(n, validation_pct).clamp(1, n - 2);
        let train_len = round_share(n, train_pct).clamp(1, n - validation_len - 1);

        let test = ids.split_off(train_len + validation_len);
        let validation = ids.split_off(train_len);
        Self {
            seed,
            train: ids,
            validation,
            test,
        }
    }

    pub fn ids(&self, split: Split) -> &[String] {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.validation,
            Split::Test => &self.test,
        }
    }

    pub fn split_of(&self, event_id: &str) -> Option<Split> {
        Split::ALL
            .into_iter()
            .find(|&split| self.ids(split).iter().any(|id| id == event_id))
    }

    pub fn len(&self) -> usize {
        self.train.len() + self.validation.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
