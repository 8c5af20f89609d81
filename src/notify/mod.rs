//! Notification channel for orchestrator events
//!
//! Events carry identifiers and a minimal payload, never authoritative
//! state; listeners look up full records through the orchestrator's query
//! methods. Built on a broadcast topic, so a lagging subscriber may miss
//! events without affecting the pipeline.

use crate::types::{ModelType, TriggerReason};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

/// Everything observable about the orchestrator
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RetrainEvent {
    ScheduleCreated { schedule_id: Uuid, model_type: ModelType },
    ScheduleUpdated { schedule_id: Uuid },
    ScheduleDeleted { schedule_id: Uuid },
    JobCreated { job_id: Uuid, model_type: ModelType, reason: TriggerReason },
    JobStarted { job_id: Uuid },
    JobProgress { job_id: Uuid, progress: u8, stage: String },
    JobCompleted { job_id: Uuid, new_model_id: String },
    JobFailed { job_id: Uuid, error: String },
    JobRolledBack { job_id: Uuid, reason: String },
    JobCancelled { job_id: Uuid },
    ValidationPassed { job_id: Uuid, improvement: f64 },
    ValidationFailed { job_id: Uuid, reason: String },
    ModelDeployed { job_id: Uuid, model_type: ModelType, model_id: String },
    PerformanceTriggerFired { model_type: ModelType, current_accuracy: f64, baseline: f64 },
    DataVolumeTriggerFired { model_type: ModelType, sample_count: usize },
    Error { message: String },
}

/// A timestamped event as delivered to subscribers
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub at: DateTime<Utc>,
    #[serde(flatten)]
    pub event: RetrainEvent,
}

/// Broadcast topic shared by the orchestrator and its collaborators
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Notification>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Publish an event; dropped silently when nobody is listening
    pub fn publish(&self, event: RetrainEvent) {
        let _ = self.tx.send(Notification { at: Utc::now(), event });
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
