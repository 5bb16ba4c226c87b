//! Core domain types and logic.

pub mod rate_point;
pub mod signal;
pub mod detector;
pub mod comparison;
pub mod position;
pub mod simulator;
pub mod metrics;
pub mod report;
pub mod backtest;
pub mod event;
pub mod config_validation;
pub mod error;
