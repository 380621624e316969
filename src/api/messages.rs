//! `/v1/messages` protocol request helper.

use crate::api::parse_retry_after_secs;
use crate::error::ApiError;
use crate::types::{MessagesRequest, MessagesResponse};

/// API version header value sent with every request.
pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Send one `/v1/messages` request and parse the response payload.
pub(crate) async fn request(
    http: &reqwest::Client,
    base_url: &str,
    api_key: &str,
    request: &MessagesRequest,
) -> Result<MessagesResponse, ApiError> {
    let url = format!("{base_url}/v1/messages");
    let mut req = http
        .post(&url)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .json(request);
    if !api_key.trim().is_empty() {
        req = req.header("x-api-key", api_key.trim());
    }

    let response = req.send().await?;
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let retry_after_secs = parse_retry_after_secs(response.headers());
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::status(status, body, retry_after_secs));
    }

    let body = response.text().await?;
    serde_json::from_str::<MessagesResponse>(&body)
        .map_err(|e| ApiError::InvalidResponse(format!("{e}: {}", truncate(&body, 200))))
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
