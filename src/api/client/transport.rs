//! HTTP transport helpers for model API requests.

use crate::error::ApiError;
use std::time::Duration;

/// Build an HTTP client with timeout applied.
pub(super) fn build_http_client(timeout: Duration) -> reqwest::Client {
    // Fall back to reqwest defaults if builder creation fails for any reason.
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Add operator hints to common misconfiguration statuses.
pub(super) fn with_diagnostic_hints(err: ApiError) -> ApiError {
    let ApiError::Status {
        code,
        mut body,
        retry_after_secs,
    } = err
    else {
        return err;
    };

    match code {
        401 => body.push_str(
            "\nHint: check ANTHROPIC_API_KEY (or BUTLER_API_KEY / `model.api_key` in butler.toml).",
        ),
        404 => body.push_str(
            "\nHint: `model.base_url` should be the API origin without `/v1`, e.g. https://api.anthropic.com.",
        ),
        _ => {}
    }
    ApiError::status(code, body, retry_after_secs)
}
