//! History ledger and statistics
//!
//! Every terminal job produces exactly one immutable history entry. The
//! ledger supports append and filtered/paginated reads only. Statistics
//! are recomputed on demand from the live job table and cached for a TTL;
//! job mutations never invalidate the cache proactively.

use crate::job::{Job, JobStatus};
use crate::types::{ModelType, TriggerReason};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Denormalized summary of one finished job
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub job_id: Uuid,
    pub model_type: ModelType,
    pub reason: TriggerReason,
    pub status: JobStatus,
    pub previous_accuracy: Option<f64>,
    pub new_accuracy: Option<f64>,
    pub improvement: Option<f64>,
    pub sample_count: usize,
    pub duration_ms: Option<i64>,
    pub at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Summarize a job that just reached a terminal state
    pub fn from_job(job: &Job) -> Self {
        let validation = job.validation.as_ref();
        Self {
            job_id: job.id,
            model_type: job.config.model_type,
            reason: job.config.reason,
            status: job.status,
            previous_accuracy: validation.map(|v| v.old_accuracy),
            new_accuracy: validation.map(|v| v.new_accuracy),
            improvement: validation.map(|v| v.improvement),
            sample_count: job
                .training_metrics
                .as_ref()
                .map(|m| m.sample_count)
                .unwrap_or(0),
            duration_ms: job.duration_ms,
            at: job.completed_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Filters for `get_history`; applied as filter → sort → offset → limit
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub model_type: Option<ModelType>,
    pub status: Option<JobStatus>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

/// Aggregate counters derived from the job table
#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub total_jobs: usize,
    pub completed: usize,
    pub failed: usize,
    pub rolled_back: usize,
    pub cancelled: usize,
    pub active: usize,
    pub by_model_type: HashMap<String, usize>,
    pub by_reason: HashMap<String, usize>,
    pub avg_duration_ms: Option<f64>,
    pub avg_improvement_percent: Option<f64>,
}

impl Statistics {
    /// Recompute from the live job table
    pub fn compute(jobs: &[Job]) -> Self {
        let mut stats = Statistics {
            total_jobs: jobs.len(),
            ..Default::default()
        };

        let mut durations = Vec::new();
        let mut improvements = Vec::new();
        for job in jobs {
            match job.status {
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Failed => stats.failed += 1,
                JobStatus::RolledBack => stats.rolled_back += 1,
                JobStatus::Cancelled => stats.cancelled += 1,
                _ => stats.active += 1,
            }
            *stats
                .by_model_type
                .entry(job.config.model_type.to_string())
                .or_insert(0) += 1;
            *stats
                .by_reason
                .entry(job.config.reason.to_string())
                .or_insert(0) += 1;
            if let Some(d) = job.duration_ms {
                durations.push(d as f64);
            }
            if let Some(v) = &job.validation {
                improvements.push(v.improvement_percent);
            }
        }

        stats.avg_duration_ms = mean(&durations);
        stats.avg_improvement_percent = mean(&improvements);
        stats
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Baseline accuracy assumed when no successful retraining exists yet
pub const DEFAULT_BASELINE_ACCURACY: f64 = 0.75;

/// Successful retrainings considered for the rolling baseline
const BASELINE_WINDOW: usize = 5;

/// Append-only ledger plus the statistics result cache
pub struct HistoryLedger {
    entries: RwLock<Vec<HistoryEntry>>,
    cache: Mutex<Option<(Instant, Statistics)>>,
}

impl HistoryLedger {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
            cache: Mutex::new(None),
        }
    }

    /// Entries are appended in terminal order, not creation order
    pub async fn append(&self, entry: HistoryEntry) {
        tracing::debug!(
            "History: {} {} for {} ({:?}ms)",
            entry.status,
            entry.job_id,
            entry.model_type,
            entry.duration_ms
        );
        self.entries.write().await.push(entry);
    }

    pub async fn query(&self, filter: &HistoryFilter) -> Vec<HistoryEntry> {
        let entries = self.entries.read().await;
        let mut matched: Vec<HistoryEntry> = entries
            .iter()
            .filter(|e| filter.model_type.map_or(true, |mt| e.model_type == mt))
            .filter(|e| filter.status.map_or(true, |s| e.status == s))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.at.cmp(&a.at));
        matched
            .into_iter()
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .collect()
    }

    /// Mean new-accuracy over the last five successful retrainings for a
    /// model type; [`DEFAULT_BASELINE_ACCURACY`] when none exist
    pub async fn rolling_baseline(&self, model_type: ModelType) -> f64 {
        let entries = self.entries.read().await;
        let accuracies: Vec<f64> = entries
            .iter()
            .rev()
            .filter(|e| e.model_type == model_type && e.status == JobStatus::Completed)
            .filter_map(|e| e.new_accuracy)
            .take(BASELINE_WINDOW)
            .collect();
        match mean(&accuracies) {
            Some(m) => m,
            None => DEFAULT_BASELINE_ACCURACY,
        }
    }

    /// Cached statistics when fresher than `ttl`
    pub fn cached_statistics(&self, ttl: Duration) -> Option<Statistics> {
        let cache = self.cache.lock();
        cache
            .as_ref()
            .filter(|(at, _)| at.elapsed() < ttl)
            .map(|(_, stats)| stats.clone())
    }

    pub fn store_statistics(&self, stats: Statistics) {
        *self.cache.lock() = Some((Instant::now(), stats));
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
        *self.cache.lock() = None;
    }
}

impl Default for HistoryLedger {
    fn default() -> Self {
        Self::new()
    }
}
