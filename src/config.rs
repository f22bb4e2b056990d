//! Configuration types for divergence-backtest

use crate::optimizer::{GridError, ParameterGrid};
use crate::telemetry::LogFormat;
use anyhow::Context;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upper bound for every configured time window (one day)
pub const MAX_WINDOW_SECONDS: u64 = 86_400;

/// Configured seconds as a `Duration`, saturating at `Duration::MAX`
pub fn window(seconds: u64) -> Duration {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .unwrap_or(Duration::MAX)
}

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub aligner: AlignerConfig,
    #[serde(default)]
    pub strategy: StrategyConfig,
    #[serde(default)]
    pub costs: CostConfig,
    #[serde(default)]
    pub grid: GridConfig,
    #[serde(default)]
    pub optimizer: OptimizerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Configuration validation errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be {requirement}, got {value}")]
    OutOfRange {
        field: &'static str,
        requirement: &'static str,
        value: String,
    },
    #[error("Train and validation percentages leave no test split ({train}% + {validation}%)")]
    NoTestSplit { train: u32, validation: u32 },
    #[error("Invalid grid: {0}")]
    Grid(#[from] GridError),
}

fn out_of_range(field: &'static str, requirement: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        requirement,
        value: value.to_string(),
    }
}

/// Snapshot alignment configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignerConfig {
    /// Maximum distance between a probability point and its candle
    #[serde(default = "default_tolerance_seconds")]
    pub tolerance_seconds: u64,

    /// Largest plausible move of the home price between consecutive snapshots
    #[serde(default = "default_max_price_step")]
    pub max_price_step: Decimal,

    /// How close home + converted away must be to 1.0 to look un-inverted
    #[serde(default = "default_sum_to_one_tolerance")]
    pub sum_to_one_tolerance: Decimal,

    /// How far converted home and away prices may drift apart before the
    /// sum-to-one check applies
    #[serde(default = "default_side_disagreement_tolerance")]
    pub side_disagreement_tolerance: Decimal,

    /// Drop snapshots this close to the event start
    #[serde(default)]
    pub exclude_first_seconds: u64,

    /// Drop snapshots this close to the event end
    #[serde(default)]
    pub exclude_last_seconds: u64,
}

fn default_tolerance_seconds() -> u64 {
    60
}
fn default_max_price_step() -> Decimal {
    Decimal::new(25, 2) // 0.25
}
fn default_sum_to_one_tolerance() -> Decimal {
    Decimal::new(2, 2) // 0.02
}
fn default_side_disagreement_tolerance() -> Decimal {
    Decimal::new(10, 2) // 0.10
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            tolerance_seconds: 60,
            max_price_step: Decimal::new(25, 2),
            sum_to_one_tolerance: Decimal::new(2, 2),
            side_disagreement_tolerance: Decimal::new(10, 2),
            exclude_first_seconds: 0,
            exclude_last_seconds: 0,
        }
    }
}

/// Trading policy configuration shared by every grid combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Capital at risk per trade
    #[serde(default = "default_stake")]
    pub stake: Decimal,

    /// Minimum holding time before a normal exit
    #[serde(default = "default_min_hold_seconds")]
    pub min_hold_seconds: u64,
}

fn default_stake() -> Decimal {
    Decimal::new(100, 0)
}
fn default_min_hold_seconds() -> u64 {
    30
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            stake: Decimal::new(100, 0),
            min_hold_seconds: 30,
        }
    }
}

/// Execution cost configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostConfig {
    /// Fee coefficient in `fee_rate * p * (1 - p) * stake`
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,

    /// Penalty (price units) when an exit falls back to the derived price
    #[serde(default = "default_fallback_slippage_units")]
    pub fallback_slippage_units: Decimal,

    /// Extra penalty (price units) for end-of-event liquidation
    #[serde(default = "default_forced_liquidation_units")]
    pub forced_liquidation_units: Decimal,
}

fn default_fee_rate() -> Decimal {
    Decimal::new(7, 2) // 0.07
}
fn default_fallback_slippage_units() -> Decimal {
    Decimal::ONE
}
fn default_forced_liquidation_units() -> Decimal {
    Decimal::TWO
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            fee_rate: Decimal::new(7, 2),
            fallback_slippage_units: Decimal::ONE,
            forced_liquidation_units: Decimal::TWO,
        }
    }
}

/// Inclusive `start..=stop` range walked in `step` increments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeSpec {
    pub start: Decimal,
    pub stop: Decimal,
    pub step: Decimal,
}

/// Parameter grid configuration. Explicit lists win over ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(default)]
    pub entry_thresholds: Option<Vec<Decimal>>,
    #[serde(default)]
    pub exit_thresholds: Option<Vec<Decimal>>,
    #[serde(default = "default_entry_range")]
    pub entry_range: RangeSpec,
    #[serde(default = "default_exit_range")]
    pub exit_range: RangeSpec,
}

fn default_entry_range() -> RangeSpec {
    RangeSpec {
        start: Decimal::new(2, 2),
        stop: Decimal::new(20, 2),
        step: Decimal::new(1, 2),
    }
}
fn default_exit_range() -> RangeSpec {
    RangeSpec {
        start: Decimal::ZERO,
        stop: Decimal::new(5, 2),
        step: Decimal::new(1, 2),
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            entry_thresholds: None,
            exit_thresholds: None,
            entry_range: default_entry_range(),
            exit_range: default_exit_range(),
        }
    }
}

/// Grid optimizer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Seed for the train/validation/test shuffle
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// How many train leaders advance to validation
    #[serde(default = "default_top_n")]
    pub top_n: usize,

    /// Worker pool size; defaults to available parallelism
    #[serde(default)]
    pub workers: Option<usize>,

    /// Progress polling interval
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,

    #[serde(default = "default_train_pct")]
    pub train_pct: u32,

    #[serde(default = "default_validation_pct")]
    pub validation_pct: u32,
}

fn default_seed() -> u64 {
    42
}
fn default_top_n() -> usize {
    10
}
fn default_progress_interval_ms() -> u64 {
    100
}
fn default_train_pct() -> u32 {
    70
}
fn default_validation_pct() -> u32 {
    15
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            top_n: 10,
            workers: None,
            progress_interval_ms: 100,
            train_pct: 70,
            validation_pct: 15,
        }
    }
}

impl OptimizerConfig {
    /// Effective worker pool size
    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|&n| n > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }
}

/// Input and output locations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

fn default_dataset_path() -> PathBuf {
    PathBuf::from("./data/events.json")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from("./output")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            output_dir: default_output_dir(),
        }
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port; disabled when unset
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path`, or the built-in example when the file does not exist.
    ///
    /// A file that exists but fails to parse or validate is an error.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            let config: Config = toml::from_str(include_str!("../config.toml.example"))
                .context("Invalid built-in default configuration")?;
            return Ok(config);
        }
        Self::load(path).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Check the parameter surface that is not covered by the grid itself
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.strategy.stake <= Decimal::ZERO {
            return Err(out_of_range("strategy.stake", "> 0", self.strategy.stake));
        }
        if self.costs.fee_rate < Decimal::ZERO {
            return Err(out_of_range("costs.fee_rate", ">= 0", self.costs.fee_rate));
        }
        if self.costs.fallback_slippage_units < Decimal::ZERO {
            return Err(out_of_range(
                "costs.fallback_slippage_units",
                ">= 0",
                self.costs.fallback_slippage_units,
            ));
        }
        if self.costs.forced_liquidation_units < Decimal::ZERO {
            return Err(out_of_range(
                "costs.forced_liquidation_units",
                ">= 0",
                self.costs.forced_liquidation_units,
            ));
        }
        if self.aligner.tolerance_seconds == 0 {
            return Err(out_of_range("aligner.tolerance_seconds", "> 0", 0));
        }
        let windows = [
            ("aligner.tolerance_seconds", self.aligner.tolerance_seconds),
            ("aligner.exclude_first_seconds", self.aligner.exclude_first_seconds),
            ("aligner.exclude_last_seconds", self.aligner.exclude_last_seconds),
            ("strategy.min_hold_seconds", self.strategy.min_hold_seconds),
        ];
        for (field, seconds) in windows {
            if seconds > MAX_WINDOW_SECONDS {
                return Err(out_of_range(field, "<= 86400", seconds));
            }
        }
        if self.aligner.max_price_step <= Decimal::ZERO {
            return Err(out_of_range(
                "aligner.max_price_step",
                "> 0",
                self.aligner.max_price_step,
            ));
        }
        if self.optimizer.top_n == 0 {
            return Err(out_of_range("optimizer.top_n", ">= 1", 0));
        }
        if self.optimizer.progress_interval_ms == 0 {
            return Err(out_of_range("optimizer.progress_interval_ms", "> 0", 0));
        }
        let (train, validation) = (self.optimizer.train_pct, self.optimizer.validation_pct);
        if train + validation >= 100 {
            return Err(ConfigError::NoTestSplit { train, validation });
        }
        ParameterGrid::from_config(&self.grid)?;
        Ok(())
    }
}
