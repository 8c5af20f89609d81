//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use crate::types::{DeploymentStrategy, ModelType};

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert!(config.enabled);
        assert!(config.auto_performance_retraining);
        assert_eq!(config.performance_drop_threshold, 0.05);
        assert_eq!(config.min_retraining_interval_ms, 3_600_000);
        assert!(config.cache_enabled);
        assert_eq!(config.cache_ttl_ms, 60_000);
    }

    #[test]
    fn test_scheduler_config_empty_toml() {
        let config: SchedulerConfig = toml::from_str("").unwrap();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.default_validation.min_accuracy, 0.6);
        assert_eq!(config.default_deployment.strategy, DeploymentStrategy::Gradual);
    }

    #[test]
    fn test_scheduler_config_overrides() {
        let toml_str = r#"
max_concurrent_jobs = 5
enabled = false
performance_drop_threshold = 0.1

[default_validation]
min_accuracy = 0.8
min_improvement = 0.01
max_degradation = -0.02
holdout_fraction = 0.3
"#;
        let config: SchedulerConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_concurrent_jobs, 5);
        assert!(!config.enabled);
        assert_eq!(config.performance_drop_threshold, 0.1);
        assert_eq!(config.default_validation.min_accuracy, 0.8);
        // untouched sections keep defaults
        assert!(config.default_deployment.auto_rollback);
    }

    #[test]
    fn test_apply_update_merges_field_by_field() {
        let mut config = SchedulerConfig::default();
        config.apply_update(SchedulerConfigUpdate {
            max_concurrent_jobs: Some(4),
            enabled: Some(false),
            ..Default::default()
        });
        assert_eq!(config.max_concurrent_jobs, 4);
        assert!(!config.enabled);
        // fields not named by the update are untouched
        assert_eq!(config.performance_drop_threshold, 0.05);
        assert!(config.cache_enabled);
    }

    #[test]
    fn test_config_file_with_schedules() {
        let toml_str = r#"
[scheduler]
max_concurrent_jobs = 3

[[schedules]]
model_type = "price_movement"
kind = "interval"
interval_minutes = 360

[[schedules]]
model_type = "sentiment"
kind = "cron"
cron = "0 * * * *"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.scheduler.max_concurrent_jobs, 3);
        assert_eq!(config.schedules.len(), 2);
        assert_eq!(config.schedules[0].model_type, ModelType::PriceMovement);
        assert_eq!(config.schedules[0].interval_minutes, Some(360));
        assert_eq!(config.schedules[1].cron.as_deref(), Some("0 * * * *"));
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = Config::load("/nonexistent/retrainer.toml").unwrap();
        assert_eq!(config.scheduler.max_concurrent_jobs, 2);
        assert!(config.schedules.is_empty());
    }
}
