//! Model retraining orchestrator
//!
//! Keeps the predictive models of a prediction-market monitoring system
//! fresh: schedules retraining, runs the collect/train/validate/deploy
//! pipeline and rolls back anything that misses the quality gates.

use clap::{Parser, Subcommand};
use model_retrainer::{
    config::Config,
    history::HistoryFilter,
    job::TriggerOptions,
    notify::RetrainEvent,
    orchestrator::RetrainingOrchestrator,
    schedule::ScheduleKind,
    types::{ModelType, TriggerReason},
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "model-retrainer")]
#[command(about = "Automated model retraining for prediction-market trading models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "retrainer.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the orchestrator with the configured schedules
    Run,
    /// Trigger one manual retraining and wait for the outcome
    Trigger {
        /// Model type to retrain (e.g. price_movement)
        model: ModelType,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run => run(config).await,
        Commands::Trigger { model } => trigger(config, model).await,
    }
}

fn build(config: &Config) -> Arc<RetrainingOrchestrator> {
    // Training backend, data collector and performance source are wired
    // here when the surrounding system provides them; without them the
    // orchestrator runs on its simulated fallbacks.
    RetrainingOrchestrator::builder()
        .config(config.scheduler.clone())
        .build()
}

async fn run(config: Config) -> anyhow::Result<()> {
    tracing::info!("Starting model retraining orchestrator");
    let orch = build(&config);

    for bootstrap in &config.schedules {
        let kind = match bootstrap.kind.as_str() {
            "interval" => {
                let minutes = bootstrap.interval_minutes.unwrap_or(360);
                ScheduleKind::Interval {
                    every_ms: minutes as i64 * 60 * 1000,
                }
            }
            "cron" => ScheduleKind::Cron {
                expression: bootstrap.cron.clone().unwrap_or_else(|| "0 * * * *".into()),
            },
            other => {
                tracing::warn!("Unknown schedule kind '{}' in config, skipping", other);
                continue;
            }
        };
        let schedule = orch.create_schedule(bootstrap.model_type, kind).await;
        tracing::info!(
            "Bootstrapped schedule {} for {} (next: {:?})",
            schedule.id,
            schedule.model_type,
            schedule.next_execution_at
        );
    }

    let mut events = orch.subscribe();
    orch.start().await;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
                break;
            }
            note = events.recv() => {
                match note {
                    Ok(note) => {
                        tracing::info!("{}", serde_json::to_string(&note)?);
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Event stream lagged, {} notifications dropped", n);
                    }
                    Err(_) => break,
                }
            }
        }
    }

    orch.stop();
    let stats = orch.get_statistics().await;
    tracing::info!(
        "Final tally: {} jobs ({} completed, {} failed, {} rolled back)",
        stats.total_jobs,
        stats.completed,
        stats.failed,
        stats.rolled_back
    );
    orch.destroy().await;
    Ok(())
}

async fn trigger(config: Config, model: ModelType) -> anyhow::Result<()> {
    let orch = build(&config);
    let mut events = orch.subscribe();

    let job = orch
        .trigger_retraining(model, TriggerReason::Manual, TriggerOptions::default())
        .await?;
    tracing::info!("Triggered retraining job {} for {}", job.id, model);

    // follow the job until it reaches a terminal state
    while let Ok(note) = events.recv().await {
        match &note.event {
            RetrainEvent::JobProgress { job_id, progress, stage } if *job_id == job.id => {
                tracing::info!("[{:>3}%] {}", progress, stage);
            }
            RetrainEvent::JobCompleted { job_id, new_model_id } if *job_id == job.id => {
                tracing::info!("Completed: deployed {}", new_model_id);
                break;
            }
            RetrainEvent::JobFailed { job_id, error } if *job_id == job.id => {
                tracing::error!("Failed: {}", error);
                break;
            }
            RetrainEvent::JobRolledBack { job_id, reason } if *job_id == job.id => {
                tracing::warn!("Rolled back: {}", reason);
                break;
            }
            _ => {}
        }
    }

    let history = orch
        .get_history(HistoryFilter {
            limit: Some(1),
            ..Default::default()
        })
        .await;
    if let Some(entry) = history.first() {
        println!("{}", serde_json::to_string_pretty(entry)?);
    }
    orch.destroy().await;
    Ok(())
}
