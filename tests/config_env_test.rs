//! Config environment variable tests
//!
//! These tests verify that Config::from_env() correctly reads and applies
//! environment variable overrides. Config::from_env() also loads a .env file
//! via dotenvy, so these tests focus on override behavior.
//!
//! Tests use #[serial] to prevent race conditions with shared env vars.

use serial_test::serial;
use std::env;
use ticket_sentiment::analysis::AggregationStrategy;
use ticket_sentiment::config::{Config, LogFormat};
use ticket_sentiment::error::AppError;

#[test]
#[serial]
fn test_config_from_env_loads_successfully() {
    // every setting has a default
    let result = Config::from_env();
    assert!(result.is_ok(), "Config::from_env() should succeed with defaults");
}

#[test]
#[serial]
fn test_config_from_env_custom_classifier() {
    env::set_var("ML_SERVICE_URL", "http://ml.internal:9000");
    env::set_var("CLASSIFIER_TIMEOUT_MS", "2500");
    env::set_var("CLASSIFIER_MAX_TEXT_CHARS", "800");

    let config = Config::from_env().unwrap();
    assert_eq!(config.classifier.base_url, "http://ml.internal:9000");
    assert_eq!(config.classifier.timeout_ms, 2500);
    assert_eq!(config.classifier.max_text_chars, 800);

    env::remove_var("ML_SERVICE_URL");
    env::remove_var("CLASSIFIER_TIMEOUT_MS");
    env::remove_var("CLASSIFIER_MAX_TEXT_CHARS");
}

#[test]
#[serial]
fn test_config_from_env_custom_database() {
    env::set_var("DATABASE_PATH", "/custom/path.db");
    env::set_var("DATABASE_MAX_CONNECTIONS", "10");

    let config = Config::from_env().unwrap();
    assert_eq!(config.database.path.to_str().unwrap(), "/custom/path.db");
    assert_eq!(config.database.max_connections, 10);

    env::remove_var("DATABASE_PATH");
    env::remove_var("DATABASE_MAX_CONNECTIONS");
}

#[test]
#[serial]
fn test_config_from_env_job_store() {
    env::set_var("REDIS_URL", "redis://localhost:6379/2");
    env::set_var("JOB_TTL_SECS", "3600");
    env::set_var("JOB_INDEX_CAP", "50");

    let config = Config::from_env().unwrap();
    assert_eq!(
        config.job_store.redis_url.as_deref(),
        Some("redis://localhost:6379/2")
    );
    assert_eq!(config.job_store.ttl_secs, 3600);
    assert_eq!(config.job_store.index_cap, 50);

    env::set_var("REDIS_URL", "   ");
    let config = Config::from_env().unwrap();
    assert!(config.job_store.redis_url.is_none(), "blank REDIS_URL means unset");

    env::remove_var("REDIS_URL");
    env::remove_var("JOB_TTL_SECS");
    env::remove_var("JOB_INDEX_CAP");
}

#[test]
#[serial]
fn test_config_from_env_ingest() {
    env::set_var("INGEST_CHUNK_SIZE", "50");
    env::set_var("AGGREGATION_STRATEGY", "trajectory");
    env::set_var("MAX_REPORTED_ERRORS", "7");
    env::set_var("MIN_SAMPLE_SIZE", "3");

    let config = Config::from_env().unwrap();
    assert_eq!(config.ingest.chunk_size, 50);
    assert_eq!(config.ingest.strategy, AggregationStrategy::Trajectory);
    assert_eq!(config.ingest.max_reported_errors, 7);
    assert_eq!(config.ingest.min_sample_size, 3);

    env::remove_var("INGEST_CHUNK_SIZE");
    env::remove_var("AGGREGATION_STRATEGY");
    env::remove_var("MAX_REPORTED_ERRORS");
    env::remove_var("MIN_SAMPLE_SIZE");
}

#[test]
#[serial]
fn test_config_from_env_rejects_zero_chunk_size() {
    env::set_var("INGEST_CHUNK_SIZE", "0");

    let result = Config::from_env();
    assert!(result.is_err());

    env::remove_var("INGEST_CHUNK_SIZE");
}

#[test]
#[serial]
fn test_config_from_env_rejects_unknown_strategy() {
    env::set_var("AGGREGATION_STRATEGY", "loudest");

    let result = Config::from_env();
    assert!(result.is_err());

    env::remove_var("AGGREGATION_STRATEGY");
}

#[test]
#[serial]
fn test_config_from_env_json_log_format() {
    env::set_var("LOG_FORMAT", "json");

    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Json);

    env::set_var("LOG_FORMAT", "pretty");
    let config = Config::from_env().unwrap();
    assert_eq!(config.logging.format, LogFormat::Pretty);

    env::remove_var("LOG_FORMAT");
}

#[test]
#[serial]
fn test_config_from_env_custom_request() {
    env::set_var("REQUEST_TIMEOUT_MS", "60000");
    env::set_var("MAX_RETRIES", "5");
    env::set_var("RETRY_DELAY_MS", "2000");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.timeout_ms, 60000);
    assert_eq!(config.request.max_retries, 5);
    assert_eq!(config.request.retry_delay_ms, 2000);

    env::remove_var("REQUEST_TIMEOUT_MS");
    env::remove_var("MAX_RETRIES");
    env::remove_var("RETRY_DELAY_MS");
}

#[test]
#[serial]
fn test_config_invalid_number_is_config_error() {
    env::set_var("DATABASE_MAX_CONNECTIONS", "many");

    let result = Config::from_env();
    env::remove_var("DATABASE_MAX_CONNECTIONS");

    match result {
        Err(AppError::Config { message }) => assert!(message.contains("DATABASE_MAX_CONNECTIONS")),
        other => panic!("Expected config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
#[serial]
fn test_config_blank_number_uses_default() {
    env::set_var("MAX_RETRIES", "  ");

    let config = Config::from_env().unwrap();
    assert_eq!(config.request.max_retries, 3);

    env::remove_var("MAX_RETRIES");
}
