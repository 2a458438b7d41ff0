//! Core domain types and logic.

pub mod config_validation;
pub mod drawdown;
pub mod error;
pub mod ledger;
pub mod metrics;
pub mod price;
pub mod schedule;
pub mod simulation;
pub mod strategy;
pub mod sweep;
pub mod tier;
