//! Job orchestrator
//!
//! Owns the retraining job state machine:
//!
//! ```text
//! PENDING → COLLECTING_DATA → TRAINING → VALIDATING → DEPLOYING → COMPLETED
//!                                             |            |
//!                                             |            ├→ ROLLED_BACK
//!                                             └→ ROLLED_BACK   └→ FAILED
//! ```
//!
//! `CANCELLED` is reachable from any non-terminal state. The job table and
//! the active set live behind one lock so the concurrency ceiling stays
//! exact under concurrent triggers. Each job's stage sequence runs as a
//! spawned task the triggering call does not wait on.


use crate::collector::{DataCollector, SyntheticCollector};
use crate::config::SchedulerConfig;
use crate::error::{Result, RetrainerError};
use crate::history::{HistoryEntry, HistoryFilter, HistoryLedger, Statistics};
use crate::job::{Job, JobConfig, JobStatus, TriggerOptions};
use crate::notify::{EventBus, Notification, RetrainEvent};
use crate::pipeline::{
    DeploymentStage, ModelTrainer, PerformanceSource, TrainingStage, ValidationStage,
};
use crate::schedule::{Schedule, ScheduleKind, ScheduleStore, ScheduleUpdate, TimerBank};
use crate::types::{JobPriority, ModelType, TriggerReason};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Job table and active set; one lock keeps ceiling accounting atomic
/// with creation and finalization
#[derive(Default)]
struct JobTable {
    jobs: HashMap<Uuid, Job>,
    active: HashSet<Uuid>,
}

/// Builder for an explicitly wired orchestrator instance
#[derive(Default)]
pub struct OrchestratorBuilder {
    config: Option<SchedulerConfig>,
    collector: Option<Arc<dyn DataCollector>>,
    trainer: Option<Arc<dyn ModelTrainer>>,
    performance: Option<Arc<dyn PerformanceSource>>,
}

impl OrchestratorBuilder {
    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn collector(mut self, collector: Arc<dyn DataCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    pub fn trainer(mut self, trainer: Arc<dyn ModelTrainer>) -> Self {
        self.trainer = Some(trainer);
        self
    }

    pub fn performance_source(mut self, source: Arc<dyn PerformanceSource>) -> Self {
        self.performance = Some(source);
        self
    }

    pub fn build(self) -> Arc<RetrainingOrchestrator> {
        let config = self.config.unwrap_or_default();
        let schedules = Arc::new(ScheduleStore::new());
        let (fire_tx, fire_rx) = mpsc::channel(64);
        Arc::new(RetrainingOrchestrator {
            config: RwLock::new(config),
            table: RwLock::new(JobTable::default()),
            last_retrained: RwLock::new(HashMap::new()),
            deployed_models: RwLock::new(HashMap::new()),
            timers: TimerBank::new(Arc::clone(&schedules), fire_tx),
            schedules,
            history: HistoryLedger::new(),
            events: EventBus::default(),
            collector: self
                .collector
                .unwrap_or_else(|| Arc::new(SyntheticCollector::new())),
            training: TrainingStage::new(self.trainer),
            validation: ValidationStage::new(self.performance.clone()),
            deployment: DeploymentStage::new(),
            performance: self.performance,
            fire_rx: Mutex::new(Some(fire_rx)),
            dispatch: Mutex::new(None),
        })
    }
}

/// The retraining orchestrator; construct via [`RetrainingOrchestrator::builder`]
/// and pass the `Arc` to every collaborator that needs it
pub struct RetrainingOrchestrator {
    config: RwLock<SchedulerConfig>,
    table: RwLock<JobTable>,
    /// Per model type, when a retraining last completed successfully.
    /// Read by the minimum-interval guard; a soft guarantee, not a lock.
    last_retrained: RwLock<HashMap<ModelType, DateTime<Utc>>>,
    /// Model id currently in production, per model type
    deployed_models: RwLock<HashMap<ModelType, String>>,
    schedules: Arc<ScheduleStore>,
    timers: TimerBank,
    history: HistoryLedger,
    events: EventBus,
    collector: Arc<dyn DataCollector>,
    training: TrainingStage,
    validation: ValidationStage,
    deployment: DeploymentStage,
    performance: Option<Arc<dyn PerformanceSource>>,
    fire_rx: Mutex<Option<mpsc::Receiver<Uuid>>>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
}

impl RetrainingOrchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    /// Subscribe to the notification channel
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }

    pub async fn get_config(&self) -> SchedulerConfig {
        self.config.read().await.clone()
    }

    pub async fn update_config(&self, update: crate::config::SchedulerConfigUpdate) {
        self.config.write().await.apply_update(update);
    }

    // ---- lifecycle -------------------------------------------------------

    /// Start the timer-fire dispatcher and the timers of every enabled
    /// interval schedule
    pub async fn start(self: &Arc<Self>) {
        let rx = self.fire_rx.lock().take();
        if let Some(mut rx) = rx {
            let weak = Arc::downgrade(self);
            let handle = tokio::spawn(async move {
                while let Some(schedule_id) = rx.recv().await {
                    let Some(orch) = weak.upgrade() else { break };
                    orch.handle_timer_fire(schedule_id).await;
                }
            });
            *self.dispatch.lock() = Some(handle);
        }

        for schedule in self.schedules.list_all().await {
            if schedule.enabled && schedule.kind.is_timer_driven() {
                self.timers.start(schedule.id).await;
            }
        }
        tracing::info!("Retraining orchestrator started");
    }

    /// Stop all timers; active jobs run to completion
    pub fn stop(&self) {
        self.timers.stop_all();
        tracing::info!("Retraining orchestrator stopped");
    }

    /// Stop everything and discard all in-memory state
    pub async fn destroy(&self) {
        self.stop();
        if let Some(handle) = self.dispatch.lock().take() {
            handle.abort();
        }
        self.schedules.clear().await;
        self.history.clear().await;
        {
            let mut table = self.table.write().await;
            table.jobs.clear();
            table.active.clear();
        }
        self.last_retrained.write().await.clear();
        self.deployed_models.write().await.clear();
        tracing::info!("Retraining orchestrator destroyed");
    }

    // ---- schedules -------------------------------------------------------

    pub async fn create_schedule(self: &Arc<Self>, model_type: ModelType, kind: ScheduleKind) -> Schedule {
        let schedule = self.schedules.create(model_type, kind).await;
        if schedule.kind.is_timer_driven() {
            self.timers.start(schedule.id).await;
        }
        self.events.publish(RetrainEvent::ScheduleCreated {
            schedule_id: schedule.id,
            model_type,
        });
        schedule
    }

    pub async fn update_schedule(
        self: &Arc<Self>,
        id: Uuid,
        update: ScheduleUpdate,
    ) -> Option<Schedule> {
        let schedule = self.schedules.update(id, update).await?;
        if schedule.kind.is_timer_driven() {
            if schedule.enabled {
                // (re)start is idempotent
                self.timers.start(id).await;
            } else {
                self.timers.stop(id);
            }
        } else {
            self.timers.stop(id);
        }
        self.events.publish(RetrainEvent::ScheduleUpdated { schedule_id: id });
        Some(schedule)
    }

    /// Stops any running timer first, then deletes the record
    pub async fn delete_schedule(&self, id: Uuid) -> bool {
        self.timers.stop(id);
        let deleted = self.schedules.delete(id).await;
        if deleted {
            self.events.publish(RetrainEvent::ScheduleDeleted { schedule_id: id });
        }
        deleted
    }

    pub async fn get_schedule(&self, id: Uuid) -> Option<Schedule> {
        self.schedules.get(id).await
    }

    pub async fn get_all_schedules(&self) -> Vec<Schedule> {
        self.schedules.list_all().await
    }

    pub async fn get_schedules_for_model(&self, model_type: ModelType) -> Vec<Schedule> {
        self.schedules.list_for_model(model_type).await
    }

    // ---- triggering ------------------------------------------------------

    /// Create a retraining job and schedule its pipeline. Returns the job
    /// in `PENDING` immediately; the outcome is observed via the
    /// notification channel or by polling. Rejects when disabled or when
    /// the concurrency ceiling is reached; no job is created then.
    pub async fn trigger_retraining(
        self: &Arc<Self>,
        model_type: ModelType,
        reason: TriggerReason,
        options: TriggerOptions,
    ) -> Result<Job> {
        let config = self.config.read().await.clone();
        if !config.enabled {
            return Err(RetrainerError::Disabled);
        }

        let job = {
            let mut table = self.table.write().await;
            if table.active.len() >= config.max_concurrent_jobs {
                return Err(RetrainerError::ConcurrencyLimit(config.max_concurrent_jobs));
            }
            let job = Job::new(JobConfig::resolve(model_type, reason, &config, options));
            table.active.insert(job.id);
            table.jobs.insert(job.id, job.clone());
            job
        };

        tracing::info!(
            "Created retraining job {} for {} (reason: {})",
            job.id,
            model_type,
            reason
        );
        self.events.publish(RetrainEvent::JobCreated {
            job_id: job.id,
            model_type,
            reason,
        });

        let orch = Arc::clone(self);
        let job_id = job.id;
        tokio::spawn(async move {
            orch.run_job(job_id).await;
        });

        Ok(job)
    }

    /// Evaluate the performance trigger for every model type; returns the
    /// first job started, if any. Requires a registered performance source.
    /// An enabled performance-trigger schedule for a model type overrides
    /// the global drop threshold.
    pub async fn check_performance_and_trigger(self: &Arc<Self>) -> Result<Option<Job>> {
        let config = self.config.read().await.clone();
        if !config.auto_performance_retraining {
            return Ok(None);
        }
        let Some(source) = self.performance.clone() else {
            tracing::debug!("No performance source registered, skipping performance check");
            return Ok(None);
        };

        for &model_type in ModelType::all() {
            let Some(current) = source.accuracy_of(model_type).await else {
                continue;
            };
            let baseline = self.history.rolling_baseline(model_type).await;
            if baseline <= 0.0 {
                continue;
            }
            let threshold = self
                .schedules
                .list_for_model(model_type)
                .await
                .into_iter()
                .filter(|s| s.enabled)
                .find_map(|s| match s.kind {
                    ScheduleKind::PerformanceTrigger { drop_threshold } => Some(drop_threshold),
                    _ => None,
                })
                .unwrap_or(config.performance_drop_threshold);
            let drop = (baseline - current) / baseline;
            if drop <= threshold {
                continue;
            }
            if !self.guard_allows(model_type, &config).await {
                tracing::debug!(
                    "Performance drop on {} but within min retraining interval, skipping",
                    model_type
                );
                continue;
            }

            tracing::warn!(
                "Accuracy of {} dropped {:.1}% below baseline ({:.4} vs {:.4})",
                model_type,
                drop * 100.0,
                current,
                baseline
            );
            self.events.publish(RetrainEvent::PerformanceTriggerFired {
                model_type,
                current_accuracy: current,
                baseline,
            });
            let job = self
                .trigger_retraining(
                    model_type,
                    TriggerReason::PerformanceDrop,
                    TriggerOptions {
                        priority: Some(JobPriority::High),
                        ..Default::default()
                    },
                )
                .await?;
            return Ok(Some(job));
        }
        Ok(None)
    }

    /// Report accumulated new samples for a model type; starts a job when
    /// an enabled data-volume schedule's threshold is crossed and the
    /// minimum-interval guard allows it
    pub async fn report_data_volume(
        self: &Arc<Self>,
        model_type: ModelType,
        new_samples: usize,
    ) -> Result<Option<Job>> {
        let config = self.config.read().await.clone();
        let crossed = self
            .schedules
            .list_for_model(model_type)
            .await
            .into_iter()
            .filter(|s| s.enabled)
            .any(|s| matches!(s.kind, ScheduleKind::DataVolumeTrigger { min_new_samples } if new_samples >= min_new_samples));
        if !crossed {
            return Ok(None);
        }
        if !self.guard_allows(model_type, &config).await {
            return Ok(None);
        }

        self.events.publish(RetrainEvent::DataVolumeTriggerFired {
            model_type,
            sample_count: new_samples,
        });
        let job = self
            .trigger_retraining(model_type, TriggerReason::DataVolume, TriggerOptions::default())
            .await?;
        Ok(Some(job))
    }

    /// Minimum-interval guard. Advisory only: the timer and trigger-poll
    /// paths consult it, manual `trigger_retraining` calls do not.
    async fn guard_allows(&self, model_type: ModelType, config: &SchedulerConfig) -> bool {
        let last = self.last_retrained.read().await.get(&model_type).copied();
        match last {
            Some(at) => {
                Utc::now() - at >= ChronoDuration::milliseconds(config.min_retraining_interval_ms)
            }
            None => true,
        }
    }

    async fn handle_timer_fire(self: &Arc<Self>, schedule_id: Uuid) {
        let Some(schedule) = self.schedules.get(schedule_id).await else {
            return;
        };
        if !schedule.enabled {
            return;
        }
        let config = self.config.read().await.clone();
        if !self.guard_allows(schedule.model_type, &config).await {
            tracing::debug!(
                "Schedule {} fired but {} was retrained recently, skipping",
                schedule_id,
                schedule.model_type
            );
            return;
        }

        self.schedules.mark_executed(schedule_id).await;
        let result = self
            .trigger_retraining(
                schedule.model_type,
                TriggerReason::Scheduled,
                TriggerOptions {
                    schedule_id: Some(schedule_id),
                    ..Default::default()
                },
            )
            .await;
        if let Err(e) = result {
            // No queueing of rejected triggers; the next fire retries.
            tracing::warn!("Scheduled trigger for {} rejected: {}", schedule.model_type, e);
            self.events.publish(RetrainEvent::Error {
                message: format!("scheduled trigger rejected: {}", e),
            });
        }
    }

    // ---- job queries -----------------------------------------------------

    pub async fn get_job(&self, id: Uuid) -> Option<Job> {
        self.table.read().await.jobs.get(&id).cloned()
    }

    pub async fn get_all_jobs(&self) -> Vec<Job> {
        self.table.read().await.jobs.values().cloned().collect()
    }

    pub async fn get_active_jobs(&self) -> Vec<Job> {
        let table = self.table.read().await;
        table
            .active
            .iter()
            .filter_map(|id| table.jobs.get(id).cloned())
            .collect()
    }

    pub async fn get_jobs_by_status(&self, status: JobStatus) -> Vec<Job> {
        self.table
            .read()
            .await
            .jobs
            .values()
            .filter(|j| j.status == status)
            .cloned()
            .collect()
    }

    /// Cancel a job not yet in a terminal state. Cooperative: a stage
    /// already executing is not interrupted, but its later transitions are
    /// suppressed. The job leaves the active set immediately, so the
    /// concurrency ceiling is soft around cancellation.
    pub async fn cancel_job(&self, id: Uuid) -> bool {
        let entry = {
            let mut table = self.table.write().await;
            let Some(job) = table.jobs.get_mut(&id) else {
                return false;
            };
            if job.is_terminal() {
                return false;
            }
            job.error = Some("job cancelled".to_string());
            job.finalize(JobStatus::Cancelled);
            let entry = HistoryEntry::from_job(job);
            table.active.remove(&id);
            entry
        };
        self.history.append(entry).await;
        self.events.publish(RetrainEvent::JobCancelled { job_id: id });
        tracing::info!("Cancelled retraining job {}", id);
        true
    }

    // ---- history & statistics -------------------------------------------

    pub async fn get_history(&self, filter: HistoryFilter) -> Vec<HistoryEntry> {
        self.history.query(&filter).await
    }

    /// Recompute aggregate statistics from the live job table; cached for
    /// the configured TTL when caching is enabled. Staleness up to the TTL
    /// is accepted; nothing invalidates the cache proactively.
    pub async fn get_statistics(&self) -> Statistics {
        let config = self.config.read().await.clone();
        if config.cache_enabled {
            if let Some(stats) = self
                .history
                .cached_statistics(Duration::from_millis(config.cache_ttl_ms))
            {
                return stats;
            }
        }
        let jobs = self.get_all_jobs().await;
        let stats = Statistics::compute(&jobs);
        if config.cache_enabled {
            self.history.store_statistics(stats.clone());
        }
        stats
    }

    // ---- pipeline execution ---------------------------------------------

    /// Drive one job through the stage sequence. Every error is caught
    /// here and mapped to `FAILED`; no stage leaves the job half-applied.
    async fn run_job(self: Arc<Self>, id: Uuid) {
        let Some(config) = self.get_job(id).await.map(|j| j.config) else {
            return;
        };
        let model_type = config.model_type;

        // PENDING → COLLECTING_DATA
        let proceed = self
            .advance(id, JobStatus::CollectingData, 5, "Collecting training data", |job| {
                job.started_at = Some(Utc::now());
            })
            .await;
        if !proceed {
            return;
        }
        self.events.publish(RetrainEvent::JobStarted { job_id: id });

        let samples = match self.collector.collect(model_type, &config.data_collection).await {
            Ok(samples) => samples,
            Err(e) => {
                self.fail_job(id, e.to_string()).await;
                return;
            }
        };
        if samples.len() < config.data_collection.min_samples {
            let err = RetrainerError::InsufficientSamples {
                got: samples.len(),
                min: config.data_collection.min_samples,
            };
            self.fail_job(id, err.to_string()).await;
            return;
        }
        let message = format!("Collected {} samples", samples.len());
        if !self.advance(id, JobStatus::CollectingData, 10, &message, |_| {}).await {
            return;
        }

        // COLLECTING_DATA → TRAINING
        let previous_model_id = self.deployed_models.read().await.get(&model_type).cloned();
        if !self
            .advance(id, JobStatus::Training, 30, "Training model", |job| {
                job.previous_model_id = previous_model_id.clone();
            })
            .await
        {
            return;
        }
        let trained = match self.training.run(model_type, &samples).await {
            Ok(trained) => trained,
            Err(e) => {
                self.fail_job(id, e.to_string()).await;
                return;
            }
        };

        // TRAINING → VALIDATING
        let metrics = trained.metrics.clone();
        let new_model_id = trained.model_id.clone();
        if !self
            .advance(id, JobStatus::Validating, 60, "Validating model", |job| {
                job.new_model_id = Some(new_model_id.clone());
                job.training_metrics = Some(metrics.clone());
            })
            .await
        {
            return;
        }
        let outcome = self
            .validation
            .run(model_type, &config.validation, &trained.metrics)
            .await;
        let passed = outcome.passed;
        let failure_reason = outcome.failure_reason.clone();
        let improvement = outcome.improvement;
        {
            let mut table = self.table.write().await;
            if let Some(job) = table.jobs.get_mut(&id) {
                if job.is_terminal() {
                    return;
                }
                job.validation = Some(outcome);
            }
        }

        if !passed {
            // Deployment never runs when validation fails.
            let reason = failure_reason.unwrap_or_else(|| "validation failed".to_string());
            if self.finish_job(id, JobStatus::RolledBack, Some(reason.clone())).await {
                self.events.publish(RetrainEvent::ValidationFailed {
                    job_id: id,
                    reason: reason.clone(),
                });
                self.events
                    .publish(RetrainEvent::JobRolledBack { job_id: id, reason });
            }
            return;
        }
        self.events.publish(RetrainEvent::ValidationPassed {
            job_id: id,
            improvement,
        });

        // VALIDATING → DEPLOYING
        if !self.advance(id, JobStatus::Deploying, 80, "Deploying model", |_| {}).await {
            return;
        }
        let deployment = self
            .deployment
            .run(
                model_type,
                &config.deployment,
                &trained.model_id,
                previous_model_id.as_deref(),
            )
            .await;
        let success = deployment.success;
        let rolled_back = deployment.rolled_back;
        let rollback_reason = deployment.rollback_reason.clone();
        {
            let mut table = self.table.write().await;
            if let Some(job) = table.jobs.get_mut(&id) {
                if job.is_terminal() {
                    return;
                }
                job.deployment = Some(deployment);
            }
        }

        if success {
            if self.finish_job(id, JobStatus::Completed, None).await {
                self.deployed_models
                    .write()
                    .await
                    .insert(model_type, trained.model_id.clone());
                self.last_retrained
                    .write()
                    .await
                    .insert(model_type, Utc::now());
                self.events.publish(RetrainEvent::ModelDeployed {
                    job_id: id,
                    model_type,
                    model_id: trained.model_id.clone(),
                });
                self.events.publish(RetrainEvent::JobCompleted {
                    job_id: id,
                    new_model_id: trained.model_id,
                });
            }
        } else if rolled_back {
            let reason =
                rollback_reason.unwrap_or_else(|| "deployment rolled back".to_string());
            if self.finish_job(id, JobStatus::RolledBack, Some(reason.clone())).await {
                self.events
                    .publish(RetrainEvent::JobRolledBack { job_id: id, reason });
            }
        } else {
            self.fail_job(id, "deployment health check failed".to_string()).await;
        }
    }

    /// Apply one stage transition. Returns false when the job is gone or
    /// already terminal (e.g. cancelled), in which case the pipeline stops
    /// and reports nothing further.
    async fn advance<F>(
        &self,
        id: Uuid,
        status: JobStatus,
        progress: u8,
        message: &str,
        mutate: F,
    ) -> bool
    where
        F: FnOnce(&mut Job),
    {
        let mut table = self.table.write().await;
        let Some(job) = table.jobs.get_mut(&id) else {
            return false;
        };
        if job.is_terminal() {
            return false;
        }
        job.status = status;
        job.progress = job.progress.max(progress);
        job.stage_message = message.to_string();
        mutate(job);
        let progress = job.progress;
        drop(table);

        self.events.publish(RetrainEvent::JobProgress {
            job_id: id,
            progress,
            stage: message.to_string(),
        });
        true
    }

    /// Terminal transition: stamp timestamps, free the concurrency slot,
    /// append exactly one history entry. Returns false when the job is
    /// gone or already terminal (e.g. cancelled); callers must not report
    /// an outcome then.
    async fn finish_job(&self, id: Uuid, status: JobStatus, error: Option<String>) -> bool {
        let entry = {
            let mut table = self.table.write().await;
            let Some(job) = table.jobs.get_mut(&id) else {
                return false;
            };
            if job.is_terminal() {
                return false;
            }
            job.error = error;
            job.progress = 100;
            job.stage_message = status.to_string();
            job.finalize(status);
            let entry = HistoryEntry::from_job(job);
            table.active.remove(&id);
            entry
        };
        self.history.append(entry).await;
        self.events.publish(RetrainEvent::JobProgress {
            job_id: id,
            progress: 100,
            stage: status.to_string(),
        });
        true
    }

    async fn fail_job(&self, id: Uuid, error: String) {
        tracing::error!("Retraining job {} failed: {}", id, error);
        if self.finish_job(id, JobStatus::Failed, Some(error.clone())).await {
            self.events.publish(RetrainEvent::JobFailed { job_id: id, error });
        }
    }
}
