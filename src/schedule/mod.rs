//! Retraining schedules
//!
//! The [`ScheduleStore`] owns every schedule record; the timer bank holds
//! schedule ids only, never copies. Time-based kinds get a computed next
//! execution; trigger kinds are evaluated by explicit polls.

pub mod timers;

pub use timers::TimerBank;

#[cfg(test)]
mod tests;

use crate::types::ModelType;
use chrono::{DateTime, Duration, DurationRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// What drives a schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScheduleKind {
    /// Fixed repeat period, driven by a timer
    Interval { every_ms: i64 },
    /// Cron-like expression. Next execution is approximated as the next
    /// whole hour; full cron evaluation is deliberately not implemented.
    Cron { expression: String },
    /// Fires when production accuracy drops past the threshold; evaluated
    /// by an explicit poll, not a timer
    PerformanceTrigger { drop_threshold: f64 },
    /// Fires when enough new samples accumulate; evaluated by an explicit
    /// poll, not a timer
    DataVolumeTrigger { min_new_samples: usize },
    /// Only operator-initiated triggers
    Manual,
}

impl ScheduleKind {
    /// Only interval schedules are timer-driven
    pub fn is_timer_driven(&self) -> bool {
        matches!(self, ScheduleKind::Interval { .. })
    }
}

/// One standing retraining rule
#[derive(Debug, Clone, Serialize)]
pub struct Schedule {
    pub id: Uuid,
    pub model_type: ModelType,
    pub kind: ScheduleKind,
    pub enabled: bool,
    pub last_executed_at: Option<DateTime<Utc>>,
    pub next_execution_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial schedule update; `None` fields keep their current value
#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub kind: Option<ScheduleKind>,
    pub enabled: Option<bool>,
}

/// Compute the next execution time for a kind, from `now`
fn next_execution(kind: &ScheduleKind, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match kind {
        ScheduleKind::Interval { every_ms } => Some(now + Duration::milliseconds(*every_ms)),
        // Simplification: advance to the next whole hour instead of
        // evaluating the expression.
        ScheduleKind::Cron { .. } => {
            let top = now.duration_trunc(Duration::hours(1)).unwrap_or(now);
            Some(top + Duration::hours(1))
        }
        _ => None,
    }
}

/// Owns all schedule records; CRUD plus execution stamping
pub struct ScheduleStore {
    schedules: RwLock<HashMap<Uuid, Schedule>>,
}

impl ScheduleStore {
    pub fn new() -> Self {
        Self {
            schedules: RwLock::new(HashMap::new()),
        }
    }

    pub async fn create(&self, model_type: ModelType, kind: ScheduleKind) -> Schedule {
        let now = Utc::now();
        let schedule = Schedule {
            id: Uuid::new_v4(),
            model_type,
            next_execution_at: next_execution(&kind, now),
            kind,
            enabled: true,
            last_executed_at: None,
            created_at: now,
            updated_at: now,
        };
        self.schedules
            .write()
            .await
            .insert(schedule.id, schedule.clone());
        tracing::info!("Created {:?} schedule {} for {}", schedule.kind, schedule.id, model_type);
        schedule
    }

    /// Apply a partial update; returns the new record, or `None` when the
    /// schedule does not exist
    pub async fn update(&self, id: Uuid, update: ScheduleUpdate) -> Option<Schedule> {
        let mut schedules = self.schedules.write().await;
        let schedule = schedules.get_mut(&id)?;
        let now = Utc::now();
        if let Some(kind) = update.kind {
            schedule.next_execution_at = next_execution(&kind, now);
            schedule.kind = kind;
        }
        if let Some(enabled) = update.enabled {
            schedule.enabled = enabled;
        }
        schedule.updated_at = now;
        Some(schedule.clone())
    }

    pub async fn delete(&self, id: Uuid) -> bool {
        self.schedules.write().await.remove(&id).is_some()
    }

    pub async fn get(&self, id: Uuid) -> Option<Schedule> {
        self.schedules.read().await.get(&id).cloned()
    }

    pub async fn list_all(&self) -> Vec<Schedule> {
        self.schedules.read().await.values().cloned().collect()
    }

    pub async fn list_for_model(&self, model_type: ModelType) -> Vec<Schedule> {
        self.schedules
            .read()
            .await
            .values()
            .filter(|s| s.model_type == model_type)
            .cloned()
            .collect()
    }

    /// Advance execution stamps after a timer fire
    pub async fn mark_executed(&self, id: Uuid) -> Option<Schedule> {
        let mut schedules = self.schedules.write().await;
        let schedule = schedules.get_mut(&id)?;
        let now = Utc::now();
        schedule.last_executed_at = Some(now);
        schedule.next_execution_at = next_execution(&schedule.kind, now);
        schedule.updated_at = now;
        Some(schedule.clone())
    }

    pub async fn clear(&self) {
        self.schedules.write().await.clear();
    }
}

impl Default for ScheduleStore {
    fn default() -> Self {
        Self::new()
    }
}
