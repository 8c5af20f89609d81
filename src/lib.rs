//! Model Retraining Orchestrator
//!
//! Automated retraining pipeline for the predictive models behind a
//! prediction-market monitoring system.
//!
//! ## Architecture
//!
//! ```text
//! Timer Bank / Performance Poll → Orchestrator → Collect → Train → Validate → Deploy
//!                                      ↓                                        ↓
//!                                History & Statistics              Rollback on gate failure
//! ```
//!
//! The orchestrator owns the job state machine; schedules, the history
//! ledger and the event bus are internal collaborators. Training, data
//! collection and production accuracy lookups are pluggable traits with
//! simulated fallbacks, so the whole pipeline runs with zero external
//! collaborators registered.

pub mod collector;
pub mod config;
pub mod error;
pub mod history;
pub mod job;
pub mod notify;
pub mod orchestrator;
pub mod pipeline;
pub mod schedule;
pub mod types;

#[cfg(test)]
mod config_tests;

pub use error::{Result, RetrainerError};
pub use orchestrator::RetrainingOrchestrator;
