//! divergence-backtest: backtester for a probability-divergence strategy
//!
//! This library provides the core components for:
//! - Aligning model probabilities with market candles in home-probability space
//! - A single-position trade state machine with quote-based execution
//! - Risk-neutral sizing and fee/slippage accounting
//! - Per-event simulation and split metrics
//! - A seeded grid optimizer with two-stage train/validation selection
//! - Progress reporting to channel observers
//! - Trade ledger export to Parquet
//! - Structured logging and Prometheus metrics

pub mod align;
pub mod backtest;
pub mod cli;
pub mod config;
pub mod data;
pub mod execution;
pub mod model;
pub mod optimizer;
pub mod progress;
pub mod risk;
pub mod signal;
pub mod telemetry;
