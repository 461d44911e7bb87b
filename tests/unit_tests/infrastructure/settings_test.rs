use std::time::Duration;

use audioscribe::presentation::config::{
    Environment, ScaffoldSettings, Settings, TranscriptionProviderSetting,
};

#[test]
fn given_defaults_when_validating_then_settings_are_usable() {
    let settings = Settings::default();

    assert!(settings.validate().is_ok());
    assert!(!settings.database.enabled);
    assert!(!settings.queue.use_redis);
    assert!(settings.cache.enabled);
    assert_eq!(settings.worker.max_attempts, 3);
    assert_eq!(
        settings.transcription.provider,
        TranscriptionProviderSetting::Mock
    );
}

#[test]
fn given_liveness_not_above_attempt_timeout_when_validating_then_rejects() {
    let mut settings = Settings::default();
    settings.worker.attempt_timeout_secs = 600;
    settings.reconciler.liveness_timeout_secs = 600;

    assert!(settings.validate().is_err());
}

#[test]
fn given_empty_pool_when_validating_then_rejects() {
    let mut settings = Settings::default();
    settings.worker.pool_size = 0;

    assert!(settings.validate().is_err());
}

#[test]
fn given_zero_reconciler_interval_when_validating_then_rejects() {
    let mut settings = Settings::default();
    settings.reconciler.interval_secs = 0;

    let err = settings.validate().unwrap_err();
    assert!(err.to_string().contains("reconciler.interval_secs"));
}

#[test]
fn given_zero_attempt_timeout_when_validating_then_rejects() {
    let mut settings = Settings::default();
    settings.worker.attempt_timeout_secs = 0;

    let err = settings.validate().unwrap_err();
    assert!(err.to_string().contains("worker.attempt_timeout_secs"));
}

#[test]
fn given_environment_names_when_parsing_then_accepts_known_values() {
    assert_eq!(
        Environment::try_from("LOCAL".to_string()),
        Ok(Environment::Local)
    );
    assert_eq!(
        Environment::try_from("production".to_string()),
        Ok(Environment::Prod)
    );
    assert!(Environment::try_from("staging".to_string()).is_err());
}

#[test]
fn given_environment_when_displayed_then_matches_settings_file_suffix() {
    assert_eq!(Environment::Test.to_string(), "test");
}

#[test]
fn given_short_form_scaffold_variables_when_applied_then_override_file_values() {
    let scaffold = ScaffoldSettings::default().with_env_overrides(|key| match key {
        "SCAFFOLD_MODE" => Some("TRUE".to_string()),
        "MOCK_RESPONSE_DELAY" => Some("250".to_string()),
        _ => None,
    });

    assert!(scaffold.enabled);
    assert_eq!(scaffold.mock_delay(), Duration::from_millis(250));
}

#[test]
fn given_unparseable_delay_when_applied_then_file_value_is_kept() {
    let scaffold = ScaffoldSettings {
        enabled: true,
        mock_delay_ms: 40,
    }
    .with_env_overrides(|key| match key {
        "MOCK_RESPONSE_DELAY" => Some("soon".to_string()),
        _ => None,
    });

    assert!(scaffold.enabled);
    assert_eq!(scaffold.mock_delay_ms, 40);
}

#[test]
fn given_scaffold_mode_when_choosing_backends_then_everything_stays_in_memory() {
    let mut settings = Settings::default();
    settings.database.enabled = true;
    settings.queue.use_redis = true;
    settings.cache.use_redis = true;
    assert!(settings.uses_postgres());
    assert!(settings.uses_redis_queue());
    assert!(settings.uses_redis_cache());

    settings.scaffold.enabled = true;

    assert!(!settings.uses_postgres());
    assert!(!settings.uses_redis_queue());
    assert!(!settings.uses_redis_cache());
}
