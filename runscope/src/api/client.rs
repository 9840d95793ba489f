use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::common::{ApiErrorResponse, ApiResponse};
use super::error::ApiError;

pub const DEFAULT_API_URL: &str = "https://api.runscope.com";

/// Runscope API client
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    retry_config: RetryConfig,
}

#[derive(Clone, Debug)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub timeout_seconds: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 100,
            max_backoff_ms: 10000,
            timeout_seconds: 30,
        }
    }
}

impl RetryConfig {
    /// Exponential backoff before retry `attempt` (1-based), capped at `max_backoff_ms`
    pub fn backoff_ms(&self, attempt: u32) -> u64 {
        let factor = 2_u64.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff_ms
            .saturating_mul(factor)
            .min(self.max_backoff_ms)
    }
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(api_url: &str, access_token: &str) -> Result<Self, ApiError> {
        Self::with_config(api_url, access_token, RetryConfig::default())
    }

    /// Create a new API client with custom retry configuration
    pub fn with_config(
        api_url: &str,
        access_token: &str,
        retry_config: RetryConfig,
    ) -> Result<Self, ApiError> {
        let parsed = url::Url::parse(api_url)
            .map_err(|e| ApiError::InvalidUrl(format!("{}: {}", api_url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(format!(
                "{}: scheme must be http or https",
                api_url
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(retry_config.timeout_seconds))
            .build()?;

        let base_url = parsed.as_str().trim_end_matches('/').to_string();
        let auth_header = format!("Bearer {}", access_token);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url,
                auth_header,
                retry_config,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Bucket operations
    pub fn buckets(&self) -> crate::api::bucket::BucketsApi<'_> {
        crate::api::bucket::BucketsApi::new(self)
    }

    /// Test operations
    pub fn tests(&self) -> crate::api::test::TestsApi<'_> {
        crate::api::test::TestsApi::new(self)
    }

    /// Test step operations
    pub fn steps(&self) -> crate::api::step::StepsApi<'_> {
        crate::api::step::StepsApi::new(self)
    }

    /// Shared and test-specific environment operations
    pub fn environments(&self) -> crate::api::environment::EnvironmentsApi<'_> {
        crate::api::environment::EnvironmentsApi::new(self)
    }

    /// Team integration lookups
    pub fn integrations(&self) -> crate::api::integration::IntegrationsApi<'_> {
        crate::api::integration::IntegrationsApi::new(self)
    }

    /// Execute a GET request with retry logic
    pub async fn get<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T, ApiError> {
        self.execute_with_retry::<T, ()>(Method::GET, path, None).await
    }

    /// Execute a POST request. Only transport-level failures and 429s are retried.
    pub async fn post<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute_with_retry(Method::POST, path, Some(body)).await
    }

    /// Execute a PUT request with retry logic
    pub async fn put<T: for<'de> Deserialize<'de>, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute_with_retry(Method::PUT, path, Some(body)).await
    }

    /// Execute a DELETE request with retry logic. An empty body is accepted.
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute_with_retry::<Option<serde_json::Value>, ()>(Method::DELETE, path, None)
            .await
            .map(|_| ())
    }

    /// Execute request with retry logic
    async fn execute_with_retry<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: for<'de> Deserialize<'de>,
        B: Serialize,
    {
        let url = format!("{}{}", self.inner.base_url, path);
        let retry_server_errors = method != Method::POST;
        let mut attempt = 0;
        let mut last_error = None;

        while attempt <= self.inner.retry_config.max_retries {
            if attempt > 0 {
                let backoff = self.inner.retry_config.backoff_ms(attempt);
                tracing::debug!(
                    "Retrying request to {} after {}ms (attempt {})",
                    path,
                    backoff,
                    attempt
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }

            tracing::debug!("{} request to: {}", method, url);

            let mut request = self
                .inner
                .http_client
                .request(method.clone(), &url)
                .header(AUTHORIZATION, &self.inner.auth_header)
                .header(
                    USER_AGENT,
                    concat!("terraform-provider-runscope/", env!("CARGO_PKG_VERSION")),
                );
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    tracing::debug!("{} {} returned {}", method, path, status);

                    if status.is_success() {
                        return self.parse_success_response(response).await;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED {
                        return Err(ApiError::AuthError);
                    }

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(ApiError::RateLimited);
                    } else if status.is_server_error() && retry_server_errors {
                        last_error = Some(self.error_from_response(response).await);
                    } else {
                        return Err(self.error_from_response(response).await);
                    }
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error =
                            Some(ApiError::Timeout(self.inner.retry_config.timeout_seconds));
                    } else if e.is_connect() {
                        last_error = Some(ApiError::ServiceUnavailable);
                    } else {
                        return Err(ApiError::Request(e));
                    }
                }
            }

            attempt += 1;
        }

        Err(last_error.unwrap_or(ApiError::ServiceUnavailable))
    }

    /// Parse successful response, unwrapping the `data` envelope
    async fn parse_success_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await?;
        tracing::debug!("API response body: {}", text);

        let text = if text.trim().is_empty() { "null" } else { text.as_str() };

        let parse_error = |e: serde_json::Error| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::Parse(format!("Failed to parse response: {}", e))
        };

        let body: serde_json::Value = serde_json::from_str(text).map_err(parse_error)?;

        // Only bodies without an envelope are read as the payload itself
        let enveloped = body.as_object().is_some_and(|o| o.contains_key("data"));
        if enveloped {
            serde_json::from_value::<ApiResponse<T>>(body)
                .map(|wrapper| wrapper.data)
                .map_err(parse_error)
        } else {
            serde_json::from_value::<T>(body).map_err(parse_error)
        }
    }

    /// Turn a non-success response into an error, preferring the envelope message
    async fn error_from_response(&self, response: reqwest::Response) -> ApiError {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        let message = serde_json::from_str::<ApiErrorResponse>(&text)
            .ok()
            .and_then(|e| e.message())
            .unwrap_or(text);

        if status == 404 {
            ApiError::NotFound { message }
        } else {
            ApiError::Api { status, message }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::{create_test_client, fast_retry_client};
    use mockito::Server;

    #[derive(Debug, Deserialize)]
    struct Thing {
        name: String,
    }

    #[tokio::test]
    async fn client_unwraps_data_envelope_and_sends_bearer_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/things/1")
            .match_header("authorization", "Bearer test-token")
            .with_body(r#"{"data": {"name": "one"}, "meta": {"status": "success"}, "error": null}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let thing: Thing = client.get("/things/1").await.unwrap();
        assert_eq!(thing.name, "one");

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_maps_404_to_not_found_with_envelope_message() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/things/missing")
            .with_status(404)
            .with_body(r#"{"data": [], "meta": {"status": "error"}, "error": {"status": 404, "message": "thing not found"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client.get::<Thing>("/things/missing").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("thing not found"));
    }

    #[tokio::test]
    async fn client_maps_401_to_auth_error() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/things/1")
            .with_status(401)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        match client.get::<Thing>("/things/1").await {
            Err(ApiError::AuthError) => {}
            other => panic!("Expected AuthError, got {:?}", other.map(|t| t.name)),
        }
    }

    #[tokio::test]
    async fn client_does_not_retry_server_errors_on_post() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/things")
            .with_status(500)
            .with_body(r#"{"error": {"status": 500, "message": "boom"}}"#)
            .expect(1)
            .create_async()
            .await;

        let client = fast_retry_client(&server.url());
        let err = client
            .post::<Thing, _>("/things", &serde_json::json!({"name": "x"}))
            .await
            .unwrap_err();
        match err {
            ApiError::Api { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("Expected Api error, got {:?}", other),
        }

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_retries_server_errors_on_get() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/things/1")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = fast_retry_client(&server.url());
        let err = client.get::<Thing>("/things/1").await.unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 503, .. }));

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_retries_rate_limited_post() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock("POST", "/things")
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let client = fast_retry_client(&server.url());
        let err = client
            .post::<Thing, _>("/things", &serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::RateLimited));

        limited.assert_async().await;
    }

    #[tokio::test]
    async fn client_rejects_envelope_with_malformed_data() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/buckets/b1/tests/t1/steps/s1")
            .with_body(r#"{"data": "not a step", "meta": {"status": "success"}, "error": null}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let err = client
            .get::<crate::api::step::Step>("/buckets/b1/tests/t1/steps/s1")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Parse(_)), "got {:?}", err);
    }

    #[tokio::test]
    async fn client_accepts_body_without_envelope() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/things/1")
            .with_body(r#"{"name": "bare"}"#)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        let thing: Thing = client.get("/things/1").await.unwrap();
        assert_eq!(thing.name, "bare");
    }

    #[test]
    fn backoff_doubles_and_saturates_at_cap() {
        let config = RetryConfig::default();
        assert_eq!(config.backoff_ms(1), 100);
        assert_eq!(config.backoff_ms(2), 200);
        assert_eq!(config.backoff_ms(4), 800);
        assert_eq!(config.backoff_ms(8), 10000);
        assert_eq!(config.backoff_ms(100), 10000);
    }

    #[tokio::test]
    async fn client_delete_accepts_empty_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("DELETE", "/things/1")
            .with_status(204)
            .create_async()
            .await;

        let client = create_test_client(&server.url());
        client.delete("/things/1").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn client_strips_trailing_slash_from_api_url() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/things/1")
            .with_body(r#"{"data": {"name": "one"}}"#)
            .create_async()
            .await;

        let client = create_test_client(&format!("{}/", server.url()));
        let _: Thing = client.get("/things/1").await.unwrap();

        mock.assert_async().await;
    }

    #[test]
    fn client_rejects_invalid_api_url() {
        assert!(matches!(
            Client::new("not a url", "token"),
            Err(ApiError::InvalidUrl(_))
        ));
        assert!(matches!(
            Client::new("ftp://api.runscope.com", "token"),
            Err(ApiError::InvalidUrl(_))
        ));
    }
}
