use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use super::types::{EntitiesResponse, Entity, SentimentResponse, SentimentResult, TextRequest};
use super::SentimentClassifier;
use crate::config::{ClassifierConfig, RequestConfig};
use crate::error::{ClassifierError, ClassifierResult};

const SENTIMENT_PATH: &str = "/ml/analyze-sentiment";
const ENTITIES_PATH: &str = "/ml/extract-entities";

/// `base_ms · 2^(retry-1)`, saturating instead of overflowing
fn backoff_delay(base_ms: u64, retry: u32) -> Duration {
    let factor = 2_u64.saturating_pow(retry.saturating_sub(1));
    Duration::from_millis(base_ms.saturating_mul(factor))
}

/// Client for the ML microservice that labels sentiment and extracts entities
#[derive(Clone)]
pub struct MlServiceClient {
    client: Client,
    base_url: String,
    max_text_chars: usize,
    request_config: RequestConfig,
}

impl MlServiceClient {
    /// Create a new ML service client
    pub fn new(config: &ClassifierConfig, request_config: RequestConfig) -> ClassifierResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ClassifierError::Http)?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_text_chars: config.max_text_chars,
            request_config,
        })
    }

    /// Post a text payload with retry and exponential backoff
    async fn post_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        request: &TextRequest,
    ) -> ClassifierResult<T> {
        let url = format!("{}{}", self.base_url, path);

        let mut last_error = None;
        let mut retries = 0;

        while retries <= self.request_config.max_retries {
            if retries > 0 {
                let delay = backoff_delay(self.request_config.retry_delay_ms, retries);
                warn!(
                    endpoint = %path,
                    retry = retries,
                    delay_ms = delay.as_millis(),
                    "Retrying classifier request"
                );
                tokio::time::sleep(delay).await;
            }

            let start = Instant::now();

            match self.execute_request(&url, request).await {
                Ok(response) => {
                    debug!(
                        endpoint = %path,
                        latency_ms = start.elapsed().as_millis(),
                        "Classifier call succeeded"
                    );
                    return Ok(response);
                }
                // Client errors will not change on retry
                Err(e @ ClassifierError::Api { status: 400..=499, .. })
                | Err(e @ ClassifierError::InvalidResponse { .. }) => {
                    error!(endpoint = %path, error = %e, "Classifier rejected request");
                    return Err(e);
                }
                Err(e) => {
                    error!(
                        endpoint = %path,
                        error = %e,
                        latency_ms = start.elapsed().as_millis(),
                        retry = retries,
                        "Classifier call failed"
                    );
                    last_error = Some(e);
                    retries += 1;
                }
            }
        }

        Err(ClassifierError::Unavailable {
            message: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "Unknown error".to_string()),
            retries,
        })
    }

    /// Execute a single request (internal)
    async fn execute_request<T: DeserializeOwned>(
        &self,
        url: &str,
        request: &TextRequest,
    ) -> ClassifierResult<T> {
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClassifierError::Timeout {
                        timeout_ms: self.request_config.timeout_ms,
                    }
                } else {
                    ClassifierError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ClassifierError::InvalidResponse {
                message: format!("Failed to parse response: {}", e),
            })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Probe the service once at startup; failures are only logged
    pub async fn check_health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                info!(base_url = %self.base_url, "Classification service reachable");
                true
            }
            Ok(response) => {
                warn!(
                    base_url = %self.base_url,
                    status = response.status().as_u16(),
                    "Classification service unhealthy, fragments will fall back to neutral"
                );
                false
            }
            Err(e) => {
                warn!(
                    base_url = %self.base_url,
                    error = %e,
                    "Classification service unreachable, fragments will fall back to neutral"
                );
                false
            }
        }
    }
}

#[async_trait]
impl SentimentClassifier for MlServiceClient {
    async fn analyze_sentiment(&self, text: &str) -> ClassifierResult<SentimentResult> {
        let request = TextRequest::truncated(text, self.max_text_chars);
        if request.text.is_empty() {
            return Err(ClassifierError::InvalidResponse {
                message: "Cannot classify empty text".to_string(),
            });
        }

        let response: SentimentResponse = self.post_with_retry(SENTIMENT_PATH, &request).await?;
        response.into_result()
    }

    async fn extract_entities(&self, text: &str) -> ClassifierResult<Vec<Entity>> {
        let request = TextRequest::truncated(text, self.max_text_chars);
        if request.text.is_empty() {
            return Ok(Vec::new());
        }

        let response: EntitiesResponse = self.post_with_retry(ENTITIES_PATH, &request).await?;
        Ok(response.entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let config = ClassifierConfig {
            base_url: "http://localhost:5001/".to_string(),
            timeout_ms: 1000,
            max_text_chars: 5000,
        };

        let client = MlServiceClient::new(&config, RequestConfig::default());
        assert!(client.is_ok());
        assert_eq!(client.unwrap().base_url(), "http://localhost:5001");
    }

    #[test]
    fn test_backoff_doubles_per_retry() {
        assert_eq!(backoff_delay(100, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(100, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(100, 4), Duration::from_millis(800));
    }

    #[test]
    fn test_backoff_saturates_for_large_retry_counts() {
        assert_eq!(backoff_delay(1000, 80), Duration::from_millis(u64::MAX));
        assert_eq!(backoff_delay(u64::MAX, 2), Duration::from_millis(u64::MAX));
    }
}
