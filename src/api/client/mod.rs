//! API client orchestration for the Messages API.
//!
//! - dispatch wiring and error hints are delegated to `transport`.
//! - retry policy logic is delegated to `retry`.

mod retry;
mod transport;

use super::messages;
use super::ModelClient;
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::types::{MessagesRequest, MessagesResponse};
use async_trait::async_trait;
use retry::RetryPolicy;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Client for the Anthropic Messages API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    retry_policy: RetryPolicy,
}

impl ApiClient {
    /// Build a client from resolved API configuration.
    pub fn new(config: &ApiConfig, timeout: Duration) -> Self {
        Self::new_with_retry_policy(config, timeout, RetryPolicy::default())
    }

    fn new_with_retry_policy(
        config: &ApiConfig,
        timeout: Duration,
        retry_policy: RetryPolicy,
    ) -> Self {
        Self {
            http: transport::build_http_client(timeout),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.trim().to_string(),
            retry_policy,
        }
    }

    /// Send one messages request, retrying transient failures.
    pub async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse, ApiError> {
        let mut attempt: u32 = 0;
        loop {
            let result = messages::request(&self.http, &self.base_url, &self.api_key, request).await;
            match result {
                Ok(response) => {
                    if let Some(usage) = response.usage {
                        debug!(
                            input_tokens = usage.input_tokens,
                            output_tokens = usage.output_tokens,
                            "model usage"
                        );
                    }
                    return Ok(response);
                }
                Err(err) => {
                    if !self.retry_policy.should_retry(&err, attempt) {
                        return Err(transport::with_diagnostic_hints(err));
                    }
                    let delay = self.retry_policy.retry_delay_for(attempt, &err);
                    warn!(attempt = attempt + 1, error = %err, ?delay, "retrying model request");
                    attempt = attempt.saturating_add(1);
                    sleep(delay).await;
                }
            }
        }
    }
}

#[async_trait]
impl ModelClient for ApiClient {
    async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse, ApiError> {
        ApiClient::send(self, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ContentBlock, Message};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request() -> MessagesRequest {
        MessagesRequest {
            model: "dummy-model".into(),
            max_tokens: 64,
            system: None,
            messages: vec![Message::user("hello")],
            tools: Vec::new(),
            temperature: None,
        }
    }

    #[tokio::test]
    async fn api_client_respects_timeout_policy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        // Accept one connection and keep it open so the client must time out.
        let _accept = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let api = ApiConfig {
            base_url: format!("http://{addr}"),
            api_key: "test-key".to_string(),
            ..ApiConfig::default()
        };
        let retry_policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        let client = ApiClient::new_with_retry_policy(&api, Duration::from_millis(50), retry_policy);
        let err = client.send(&request()).await.expect_err("timeout expected");
        match err {
            ApiError::Http(inner) => {
                assert!(inner.is_timeout(), "unexpected error: {inner}");
            }
            other => panic!("expected timeout Http error, got: {other}"),
        }
    }

    #[tokio::test]
    async fn api_client_retries_transient_429_with_retry_after() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let mut first_request = String::new();
            for attempt in 0..2 {
                let (mut stream, _) = listener.accept().await.expect("accept");
                let mut request_buf = [0u8; 8192];
                let n = stream.read(&mut request_buf).await.unwrap_or(0);
                if attempt == 0 {
                    first_request = String::from_utf8_lossy(&request_buf[..n]).to_string();
                    let response = concat!(
                        "HTTP/1.1 429 Too Many Requests\r\n",
                        "Content-Type: application/json\r\n",
                        "Retry-After: 1\r\n",
                        "Content-Length: 16\r\n",
                        "Connection: close\r\n",
                        "\r\n",
                        "{\"error\":\"rate\"}"
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                } else {
                    let body = r#"{"id":"msg_1","type":"message","role":"assistant","content":[{"type":"text","text":"done"}],"stop_reason":"end_turn","usage":{"input_tokens":3,"output_tokens":1}}"#;
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = stream.write_all(response.as_bytes()).await;
                }
            }
            first_request
        });

        let api = ApiConfig {
            base_url: format!("http://{addr}/"),
            api_key: "test-key".to_string(),
            ..ApiConfig::default()
        };
        let retry_policy = RetryPolicy {
            max_attempts: 2,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(5),
        };
        let client = ApiClient::new_with_retry_policy(&api, Duration::from_secs(3), retry_policy);
        let response = client.send(&request()).await.expect("retry should recover");
        assert_eq!(response.content, vec![ContentBlock::text("done")]);

        let first_request = server.await.unwrap().to_ascii_lowercase();
        assert!(first_request.starts_with("post /v1/messages "), "{first_request}");
        assert!(first_request.contains("x-api-key: test-key"));
        assert!(first_request.contains("anthropic-version: 2023-06-01"));
    }

    #[tokio::test]
    async fn api_client_does_not_retry_client_errors() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 8192];
            let _ = stream.read(&mut buf).await;
            let body = r#"{"error":"bad key"}"#;
            let response = format!(
                "HTTP/1.1 401 Unauthorized\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = stream.write_all(response.as_bytes()).await;
        });

        let api = ApiConfig {
            base_url: format!("http://{addr}"),
            ..ApiConfig::default()
        };
        let client = ApiClient::new(&api, Duration::from_secs(3));
        let err = client.send(&request()).await.unwrap_err();
        assert_eq!(err.status_code(), Some(401));
        assert!(err.to_string().contains("ANTHROPIC_API_KEY"));
    }
}
