use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::analysis::AggregationStrategy;
use crate::error::AppError;

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub classifier: ClassifierConfig,
    pub database: DatabaseConfig,
    pub job_store: JobStoreConfig,
    pub ingest: IngestConfig,
    pub logging: LoggingConfig,
    pub request: RequestConfig,
}

/// Classification service configuration
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub base_url: String,
    /// Upper bound for a single classification call before falling back.
    pub timeout_ms: u64,
    /// Texts are truncated to this many characters before being sent.
    pub max_text_chars: usize,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
}

/// Job status store configuration
#[derive(Debug, Clone)]
pub struct JobStoreConfig {
    /// Redis URL; `None` selects the in-memory store.
    pub redis_url: Option<String>,
    pub ttl_secs: u64,
    /// Maximum number of job ids kept in the recency index.
    pub index_cap: usize,
}

/// Ingestion pipeline configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub chunk_size: usize,
    pub strategy: AggregationStrategy,
    /// Maximum number of per-row error messages kept on a job record.
    pub max_reported_errors: usize,
    pub min_sample_size: usize,
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

/// Log output format
#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Pretty,
    Json,
}

/// HTTP request configuration
#[derive(Debug, Clone)]
pub struct RequestConfig {
    pub timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

/// Parse an optional variable; unset or blank gives the default, garbage is an error
fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, AppError> {
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw.trim().parse().map_err(|_| AppError::Config {
            message: format!("{} must be a number, got {:?}", key, raw),
        }),
        _ => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, AppError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let classifier = ClassifierConfig {
            base_url: env::var("ML_SERVICE_URL")
                .unwrap_or_else(|_| "http://localhost:5001".to_string()),
            timeout_ms: env_parse("CLASSIFIER_TIMEOUT_MS", 10_000)?,
            max_text_chars: env_parse("CLASSIFIER_MAX_TEXT_CHARS", 5_000)?,
        };

        let database = DatabaseConfig {
            path: PathBuf::from(
                env::var("DATABASE_PATH").unwrap_or_else(|_| "./data/sentiment.db".to_string()),
            ),
            max_connections: env_parse("DATABASE_MAX_CONNECTIONS", 5)?,
        };

        let job_store = JobStoreConfig {
            redis_url: env::var("REDIS_URL").ok().filter(|s| !s.trim().is_empty()),
            ttl_secs: env_parse("JOB_TTL_SECS", JobStoreConfig::DEFAULT_TTL_SECS)?,
            index_cap: env_parse("JOB_INDEX_CAP", JobStoreConfig::DEFAULT_INDEX_CAP)?,
        };

        let strategy = match env::var("AGGREGATION_STRATEGY") {
            Ok(raw) => raw.parse().map_err(|e: String| AppError::Config { message: e })?,
            Err(_) => AggregationStrategy::default(),
        };

        let ingest = IngestConfig {
            chunk_size: env_parse("INGEST_CHUNK_SIZE", 500)?,
            strategy,
            max_reported_errors: env_parse("MAX_REPORTED_ERRORS", 100)?,
            min_sample_size: env_parse("MIN_SAMPLE_SIZE", 30)?,
        };

        if ingest.chunk_size == 0 {
            return Err(AppError::Config {
                message: "INGEST_CHUNK_SIZE must be greater than zero".to_string(),
            });
        }

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: match env::var("LOG_FORMAT")
                .unwrap_or_else(|_| "pretty".to_string())
                .to_lowercase()
                .as_str()
            {
                "json" => LogFormat::Json,
                _ => LogFormat::Pretty,
            },
        };

        let request = RequestConfig {
            timeout_ms: env_parse("REQUEST_TIMEOUT_MS", 30_000)?,
            max_retries: env_parse("MAX_RETRIES", 3)?,
            retry_delay_ms: env_parse("RETRY_DELAY_MS", 1_000)?,
        };

        Ok(Config {
            classifier,
            database,
            job_store,
            ingest,
            logging,
            request,
        })
    }
}

impl JobStoreConfig {
    /// Job records expire after seven days.
    pub const DEFAULT_TTL_SECS: u64 = 7 * 24 * 60 * 60;
    pub const DEFAULT_INDEX_CAP: usize = 1_000;
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5001".to_string(),
            timeout_ms: 10_000,
            max_text_chars: 5_000,
        }
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 30000,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            strategy: AggregationStrategy::default(),
            max_reported_errors: 100,
            min_sample_size: 30,
        }
    }
}

impl Default for JobStoreConfig {
    fn default() -> Self {
        Self {
            redis_url: None,
            ttl_secs: Self::DEFAULT_TTL_SECS,
            index_cap: Self::DEFAULT_INDEX_CAP,
        }
    }
}
