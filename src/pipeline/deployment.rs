//! Deployment stage
//!
//! Executes the configured rollout strategy and a post-deploy health
//! check. A failed check triggers automatic rollback when the policy asks
//! for it; otherwise the deployment is marked failed and the old model
//! stays in production. Quality-gate failures here are expected outcomes,
//! not errors.

use crate::types::{DeploymentPolicy, DeploymentStrategy, ModelType};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

/// Post-deploy health snapshot
#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub healthy: bool,
    pub latency_ms: f64,
    pub error_rate: f64,
}

/// Immutable outcome of one deployment, produced once per job
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentOutcome {
    pub strategy: DeploymentStrategy,
    pub success: bool,
    pub deployed_model_id: String,
    pub previous_model_id: Option<String>,
    pub deployed_at: DateTime<Utc>,
    pub rolled_back: bool,
    pub rollback_reason: Option<String>,
    pub health: Option<HealthCheck>,
}

/// Executes rollouts; simulated until a real model registry is wired in
pub struct DeploymentStage;

impl DeploymentStage {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(
        &self,
        model_type: ModelType,
        policy: &DeploymentPolicy,
        new_model_id: &str,
        previous_model_id: Option<&str>,
    ) -> DeploymentOutcome {
        tracing::info!(
            "Deploying {} model {} via {} strategy",
            model_type,
            new_model_id,
            policy.strategy
        );
        self.execute_strategy(policy.strategy).await;

        let health = if policy.health_check {
            Some(self.simulate_health_check(policy.health_failure_rate))
        } else {
            None
        };

        let healthy = health.as_ref().map(|h| h.healthy).unwrap_or(true);
        if healthy {
            return DeploymentOutcome {
                strategy: policy.strategy,
                success: true,
                deployed_model_id: new_model_id.to_string(),
                previous_model_id: previous_model_id.map(str::to_string),
                deployed_at: Utc::now(),
                rolled_back: false,
                rollback_reason: None,
                health,
            };
        }

        if policy.auto_rollback {
            let reason = "post-deploy health check failed".to_string();
            tracing::warn!(
                "Health check failed for {}, rolling back to {:?}",
                new_model_id,
                previous_model_id
            );
            DeploymentOutcome {
                strategy: policy.strategy,
                success: false,
                deployed_model_id: new_model_id.to_string(),
                previous_model_id: previous_model_id.map(str::to_string),
                deployed_at: Utc::now(),
                rolled_back: true,
                rollback_reason: Some(reason),
                health,
            }
        } else {
            tracing::error!(
                "Health check failed for {} and auto-rollback is disabled",
                new_model_id
            );
            DeploymentOutcome {
                strategy: policy.strategy,
                success: false,
                deployed_model_id: new_model_id.to_string(),
                previous_model_id: previous_model_id.map(str::to_string),
                deployed_at: Utc::now(),
                rolled_back: false,
                rollback_reason: None,
                health,
            }
        }
    }

    /// Strategy execution placeholder; rollout pacing only
    async fn execute_strategy(&self, strategy: DeploymentStrategy) {
        let pacing = match strategy {
            DeploymentStrategy::Immediate => Duration::from_millis(1),
            DeploymentStrategy::Gradual => Duration::from_millis(10),
            DeploymentStrategy::Canary => Duration::from_millis(10),
            DeploymentStrategy::BlueGreen => Duration::from_millis(5),
        };
        tokio::time::sleep(pacing).await;
    }

    fn simulate_health_check(&self, failure_rate: f64) -> HealthCheck {
        let mut rng = rand::rng();
        let healthy = rng.random::<f64>() >= failure_rate;
        HealthCheck {
            healthy,
            latency_ms: rng.random_range(5.0..50.0),
            error_rate: if healthy {
                rng.random_range(0.0..0.01)
            } else {
                rng.random_range(0.05..0.30)
            },
        }
    }
}

impl Default for DeploymentStage {
    fn default() -> Self {
        Self::new()
    }
}
