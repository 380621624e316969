//! HTTP client for the Anthropic Messages API.
//!
//! - `messages`: `POST /v1/messages` request/response handling
//! - `client`: retry orchestration and the [`ModelClient`] implementation

use crate::error::ApiError;
use crate::types::{MessagesRequest, MessagesResponse};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::SystemTime;

mod client;
mod messages;

pub use client::ApiClient;

/// Minimal model API interface used by the conversation loop.
///
/// Tests provide scripted responses through this trait; the production path
/// uses [`ApiClient`].
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn send(&self, request: &MessagesRequest) -> Result<MessagesResponse, ApiError>;
}

/// Parse a `Retry-After` header given either as delta-seconds or an HTTP date.
pub(crate) fn parse_retry_after_secs(headers: &HeaderMap) -> Option<u64> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(seconds);
    }
    let when = httpdate::parse_http_date(value).ok()?;
    Some(
        when.duration_since(SystemTime::now())
            .map(|d| d.as_secs())
            .unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use std::time::Duration;

    #[test]
    fn retry_after_accepts_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(parse_retry_after_secs(&headers), Some(7));
    }

    #[test]
    fn retry_after_accepts_http_date() {
        let when = SystemTime::now() + Duration::from_secs(120);
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_str(&httpdate::fmt_http_date(when)).unwrap(),
        );
        let secs = parse_retry_after_secs(&headers).unwrap();
        assert!((100..=120).contains(&secs), "got {secs}");
    }

    #[test]
    fn retry_after_in_the_past_is_zero_and_garbage_is_none() {
        let mut headers = HeaderMap::new();
        headers.insert(
            RETRY_AFTER,
            HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"),
        );
        assert_eq!(parse_retry_after_secs(&headers), Some(0));
        headers.insert(RETRY_AFTER, HeaderValue::from_static("soon"));
        assert_eq!(parse_retry_after_secs(&headers), None);
        assert_eq!(parse_retry_after_secs(&HeaderMap::new()), None);
    }
}
