//! Retraining jobs
//!
//! A job is one end-to-end attempt to retrain and (conditionally) deploy
//! a model. Its configuration is frozen at creation; only the orchestrator
//! mutates the record while the job is active, and nothing mutates it once
//! it reaches a terminal status.

use crate::config::SchedulerConfig;
use crate::pipeline::{DeploymentOutcome, ValidationOutcome};
use crate::types::{
    DataCollectionPolicy, DeploymentPolicy, JobPriority, ModelType, TrainingMetrics, TriggerReason,
    ValidationPolicy,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// Lifecycle states, in transition order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    CollectingData,
    Training,
    Validating,
    Deploying,
    Completed,
    Failed,
    Cancelled,
    RolledBack,
}

impl JobStatus {
    /// Terminal states admit no further mutation
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled | JobStatus::RolledBack
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::CollectingData => "collecting_data",
            JobStatus::Training => "training",
            JobStatus::Validating => "validating",
            JobStatus::Deploying => "deploying",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::RolledBack => "rolled_back",
        };
        write!(f, "{}", s)
    }
}

/// Frozen per-job configuration
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub model_type: ModelType,
    pub data_collection: DataCollectionPolicy,
    pub validation: ValidationPolicy,
    pub deployment: DeploymentPolicy,
    pub reason: TriggerReason,
    pub schedule_id: Option<Uuid>,
    pub priority: JobPriority,
    pub tags: Vec<String>,
}

/// Per-call overrides for `trigger_retraining`; `None` falls through to
/// the scheduler default (which itself starts from the compiled-in default)
#[derive(Debug, Clone, Default)]
pub struct TriggerOptions {
    pub data_collection: Option<DataCollectionPolicy>,
    pub validation: Option<ValidationPolicy>,
    pub deployment: Option<DeploymentPolicy>,
    pub schedule_id: Option<Uuid>,
    pub priority: Option<JobPriority>,
    pub tags: Vec<String>,
}

impl JobConfig {
    /// Resolve the effective config: call-site > scheduler default >
    /// compiled-in default
    pub fn resolve(
        model_type: ModelType,
        reason: TriggerReason,
        scheduler: &SchedulerConfig,
        options: TriggerOptions,
    ) -> Self {
        Self {
            model_type,
            data_collection: options
                .data_collection
                .unwrap_or_else(|| scheduler.default_data_collection.clone()),
            validation: options
                .validation
                .unwrap_or_else(|| scheduler.default_validation.clone()),
            deployment: options
                .deployment
                .unwrap_or_else(|| scheduler.default_deployment.clone()),
            reason,
            schedule_id: options.schedule_id,
            priority: options.priority.unwrap_or(JobPriority::Normal),
            tags: options.tags,
        }
    }
}

/// One retraining job
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub config: JobConfig,
    pub status: JobStatus,
    /// Monotonically non-decreasing, 0..=100
    pub progress: u8,
    pub stage_message: String,
    pub previous_model_id: Option<String>,
    pub new_model_id: Option<String>,
    pub training_metrics: Option<TrainingMetrics>,
    pub validation: Option<ValidationOutcome>,
    pub deployment: Option<DeploymentOutcome>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
}

impl Job {
    pub fn new(config: JobConfig) -> Self {
        Self {
            id: Uuid::new_v4(),
            config,
            status: JobStatus::Pending,
            progress: 0,
            stage_message: "Queued".to_string(),
            previous_model_id: None,
            new_model_id: None,
            training_metrics: None,
            validation: None,
            deployment: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Stamp the terminal timestamps; `duration_ms` is set exactly when
    /// `completed_at` is
    pub fn finalize(&mut self, status: JobStatus) {
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        let started = self.started_at.unwrap_or(self.created_at);
        self.duration_ms = Some((now - started).num_milliseconds());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JobConfig {
        JobConfig::resolve(
            ModelType::PriceMovement,
            TriggerReason::Manual,
            &SchedulerConfig::default(),
            TriggerOptions::default(),
        )
    }

    #[test]
    fn test_new_job_is_pending() {
        let job = Job::new(config());
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(!job.is_terminal());
        assert!(job.started_at.is_none());
        assert!(job.duration_ms.is_none());
    }

    #[test]
    fn test_terminal_states() {
        for status in [
            JobStatus::Completed,
            JobStatus::Failed,
            JobStatus::Cancelled,
            JobStatus::RolledBack,
        ] {
            assert!(status.is_terminal());
        }
        for status in [
            JobStatus::Pending,
            JobStatus::CollectingData,
            JobStatus::Training,
            JobStatus::Validating,
            JobStatus::Deploying,
        ] {
            assert!(!status.is_terminal());
        }
    }

    #[test]
    fn test_finalize_sets_duration_with_completion() {
        let mut job = Job::new(config());
        job.started_at = Some(Utc::now());
        job.finalize(JobStatus::Completed);

        assert!(job.completed_at.is_some());
        assert!(job.duration_ms.is_some());
        assert!(job.completed_at.unwrap() >= job.started_at.unwrap());
        assert!(job.started_at.unwrap() >= job.created_at);
    }

    #[test]
    fn test_resolve_prefers_call_site_overrides() {
        let mut scheduler = SchedulerConfig::default();
        scheduler.default_validation.min_accuracy = 0.65;

        let options = TriggerOptions {
            validation: Some(ValidationPolicy {
                min_accuracy: 0.9,
                ..Default::default()
            }),
            priority: Some(JobPriority::High),
            ..Default::default()
        };
        let config = JobConfig::resolve(
            ModelType::Sentiment,
            TriggerReason::PerformanceDrop,
            &scheduler,
            options,
        );

        // call-site wins over scheduler default
        assert_eq!(config.validation.min_accuracy, 0.9);
        // unoverridden policies fall through to the scheduler default
        assert_eq!(config.data_collection.min_samples, 100);
        assert_eq!(config.priority, JobPriority::High);
    }

    #[test]
    fn test_resolve_falls_back_to_scheduler_default() {
        let mut scheduler = SchedulerConfig::default();
        scheduler.default_validation.min_accuracy = 0.65;

        let config = JobConfig::resolve(
            ModelType::Sentiment,
            TriggerReason::Manual,
            &scheduler,
            TriggerOptions::default(),
        );
        assert_eq!(config.validation.min_accuracy, 0.65);
        assert_eq!(config.priority, JobPriority::Normal);
    }
}
