//! Retraining pipeline stages
//!
//! Collect → train → validate → deploy. Each stage is independently
//! testable; the orchestrator sequences them per job.

pub mod deployment;
pub mod training;
pub mod validation;

pub use deployment::{DeploymentOutcome, DeploymentStage, HealthCheck};
pub use training::{ModelTrainer, TrainedModel, TrainingStage};
pub use validation::{PerformanceSource, ValidationOutcome, ValidationStage};
