//! Test helpers for the Runscope API

#[cfg(test)]
pub fn create_test_client(url: &str) -> super::Client {
    super::Client::new(url, "test-token").unwrap()
}

/// Client with millisecond backoff so retry tests stay fast
#[cfg(test)]
pub fn fast_retry_client(url: &str) -> super::Client {
    super::Client::with_config(
        url,
        "test-token",
        super::RetryConfig {
            max_retries: 2,
            initial_backoff_ms: 1,
            max_backoff_ms: 5,
            timeout_seconds: 5,
        },
    )
    .unwrap()
}

/// Wraps a JSON payload in the Runscope response envelope
#[cfg(test)]
pub fn envelope(data: &str) -> String {
    format!(
        r#"{{"data": {}, "meta": {{"status": "success"}}, "error": null}}"#,
        data
    )
}
