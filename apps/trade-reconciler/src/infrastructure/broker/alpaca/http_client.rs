//! HTTP client wrapper with retry logic.

use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::api_types::AlpacaErrorResponse;
use super::config::{AlpacaConfig, RetryConfig};
use super::error::AlpacaError;

/// HTTP client for the Alpaca trading API with retry logic.
#[derive(Debug, Clone)]
pub struct AlpacaHttpClient {
    client: Client,
    api_key: String,
    api_secret: String,
    base_url: String,
    retry_config: RetryConfig,
}

impl AlpacaHttpClient {
    /// Create a new HTTP client from config.
    pub fn new(config: &AlpacaConfig) -> Result<Self, AlpacaError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(AlpacaError::AuthenticationFailed(
                "API key and secret are required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AlpacaError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            base_url: config.trading_base_url().to_string(),
            retry_config: config.retry.clone(),
        })
    }

    /// GET a JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, AlpacaError> {
        self.request(Method::GET, path, None::<&()>).await
    }

    /// POST a JSON body.
    #[allow(clippy::future_not_send)]
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, AlpacaError> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// DELETE a resource, ignoring any response body.
    pub async fn delete(&self, path: &str) -> Result<(), AlpacaError> {
        let _: serde_json::Value = self.request(Method::DELETE, path, None::<&()>).await?;
        Ok(())
    }

    /// Internal request implementation with retry logic.
    ///
    /// Order submissions are safe to retry because every order carries its
    /// client order id; a retried duplicate comes back as
    /// `DuplicateClientOrderId`.
    #[allow(clippy::future_not_send)]
    async fn request<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, AlpacaError> {
        let url = format!("{}{path}", self.base_url);
        let mut backoff = ExponentialBackoff::new(&self.retry_config);

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("APCA-API-KEY-ID", &self.api_key)
                .header("APCA-API-SECRET-KEY", &self.api_secret);
            if let Some(b) = body {
                request = request.json(b);
            }

            let response = match request.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            error = %e,
                            delay_ms = delay.as_millis(),
                            attempt = backoff.attempt,
                            "Network error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    if backoff.attempt <= 1 {
                        return Err(AlpacaError::Network(e.to_string()));
                    }
                    return Err(AlpacaError::MaxRetriesExceeded {
                        attempts: backoff.attempt,
                    });
                }
            };

            let status = response.status();

            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|e| AlpacaError::Network(e.to_string()))?;
                let text = if text.trim().is_empty() { "null" } else { &text };
                return serde_json::from_str(text)
                    .map_err(|e| AlpacaError::JsonParse(e.to_string()));
            }

            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok());

            let error_body = response.text().await.unwrap_or_default();
            let (error_code, error_message) =
                match serde_json::from_str::<AlpacaErrorResponse>(&error_body) {
                    Ok(err) => (
                        err.code
                            .map_or_else(|| status.as_u16().to_string(), |c| c.to_string()),
                        err.message,
                    ),
                    Err(_) => (status.as_u16().to_string(), error_body),
                };

            match categorize_status(status) {
                ErrorCategory::RateLimited => {
                    if let Some(delay) = backoff.next_backoff() {
                        let delay = retry_after.map_or(delay, Duration::from_secs);
                        tracing::warn!(
                            code = %error_code,
                            delay_ms = delay.as_millis(),
                            "Rate limited, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(AlpacaError::RateLimited {
                        retry_after_secs: retry_after.unwrap_or(60),
                    });
                }
                ErrorCategory::Retryable => {
                    if let Some(delay) = backoff.next_backoff() {
                        tracing::warn!(
                            code = %error_code,
                            message = %error_message,
                            delay_ms = delay.as_millis(),
                            "Retryable error, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(AlpacaError::Server {
                        status: status.as_u16(),
                        message: error_message,
                    });
                }
                ErrorCategory::NonRetryable => {
                    return Err(classify_rejection(status, path, error_code, error_message));
                }
            }
        }
    }
}

/// Error category for determining retry behavior.
enum ErrorCategory {
    RateLimited,
    Retryable,
    NonRetryable,
}

/// Categorize HTTP status code for retry handling.
const fn categorize_status(status: StatusCode) -> ErrorCategory {
    match status.as_u16() {
        429 => ErrorCategory::RateLimited,
        408 | 500 | 502 | 503 | 504 => ErrorCategory::Retryable,
        _ => ErrorCategory::NonRetryable,
    }
}

/// Map a non-retryable response onto a specific error.
///
/// Alpaca reuses 403 and 422 for several conditions, so the message decides.
fn classify_rejection(status: StatusCode, path: &str, code: String, message: String) -> AlpacaError {
    let lower = message.to_ascii_lowercase();
    match status {
        StatusCode::UNAUTHORIZED => AlpacaError::AuthenticationFailed(message),
        StatusCode::FORBIDDEN if lower.contains("insufficient") => {
            AlpacaError::InsufficientFunds(message)
        }
        StatusCode::FORBIDDEN => AlpacaError::AuthenticationFailed(message),
        StatusCode::NOT_FOUND => AlpacaError::OrderNotFound {
            order_id: path.to_string(),
        },
        StatusCode::CONFLICT => AlpacaError::DuplicateClientOrderId(message),
        StatusCode::UNPROCESSABLE_ENTITY
            if lower.contains("client_order_id") && lower.contains("unique") =>
        {
            AlpacaError::DuplicateClientOrderId(message)
        }
        StatusCode::UNPROCESSABLE_ENTITY
            if lower.contains("not cancelable") || lower.contains("already") =>
        {
            AlpacaError::NotCancelable(message)
        }
        StatusCode::UNPROCESSABLE_ENTITY if lower.contains("insufficient") => {
            AlpacaError::InsufficientFunds(message)
        }
        StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST => {
            AlpacaError::OrderRejected(message)
        }
        _ => AlpacaError::Api { code, message },
    }
}

/// Exponential backoff calculator.
struct ExponentialBackoff {
    attempt: u32,
    max_attempts: u32,
    current_backoff: Duration,
    max_backoff: Duration,
    multiplier: f64,
}

impl ExponentialBackoff {
    const fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts,
            current_backoff: config.initial_backoff,
            max_backoff: config.max_backoff,
            multiplier: config.multiplier,
        }
    }

    fn next_backoff(&mut self) -> Option<Duration> {
        self.attempt += 1;
        if self.attempt >= self.max_attempts {
            return None;
        }

        let backoff = self.current_backoff;
        self.current_backoff = Duration::from_secs_f64(
            (self.current_backoff.as_secs_f64() * self.multiplier)
                .min(self.max_backoff.as_secs_f64()),
        );

        Some(backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categorize_rate_limited() {
        assert!(matches!(
            categorize_status(StatusCode::TOO_MANY_REQUESTS),
            ErrorCategory::RateLimited
        ));
    }

    #[test]
    fn categorize_retryable() {
        for status in [
            StatusCode::REQUEST_TIMEOUT,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_GATEWAY,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            assert!(matches!(categorize_status(status), ErrorCategory::Retryable));
        }
    }

    #[test]
    fn categorize_non_retryable() {
        for status in [
            StatusCode::BAD_REQUEST,
            StatusCode::NOT_FOUND,
            StatusCode::UNAUTHORIZED,
            StatusCode::UNPROCESSABLE_ENTITY,
        ] {
            assert!(matches!(categorize_status(status), ErrorCategory::NonRetryable));
        }
    }

    #[test]
    fn unprocessable_entity_is_split_by_message() {
        let classify = |msg: &str| {
            classify_rejection(
                StatusCode::UNPROCESSABLE_ENTITY,
                "/v2/orders",
                "40010001".to_string(),
                msg.to_string(),
            )
        };
        assert!(matches!(
            classify("client_order_id must be unique"),
            AlpacaError::DuplicateClientOrderId(_)
        ));
        assert!(matches!(
            classify("order is not cancelable"),
            AlpacaError::NotCancelable(_)
        ));
        assert!(matches!(
            classify("qty must be > 0"),
            AlpacaError::OrderRejected(_)
        ));
    }

    #[test]
    fn forbidden_is_split_by_message() {
        assert!(matches!(
            classify_rejection(
                StatusCode::FORBIDDEN,
                "/v2/orders",
                "40310000".to_string(),
                "insufficient balance for USD".to_string()
            ),
            AlpacaError::InsufficientFunds(_)
        ));
        assert!(matches!(
            classify_rejection(
                StatusCode::FORBIDDEN,
                "/v2/account",
                "403".to_string(),
                "forbidden".to_string()
            ),
            AlpacaError::AuthenticationFailed(_)
        ));
    }

    #[test]
    fn exponential_backoff_increments() {
        let config = RetryConfig {
            max_attempts: 4,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2.0,
        };

        let mut backoff = ExponentialBackoff::new(&config);

        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(100)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(200)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_millis(400)));
        assert!(backoff.next_backoff().is_none());
    }

    #[test]
    fn single_attempt_never_retries() {
        let mut backoff = ExponentialBackoff::new(&RetryConfig::none());
        assert!(backoff.next_backoff().is_none());
    }
}
