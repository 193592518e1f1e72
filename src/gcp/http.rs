//! HTTP utilities for GCP REST API calls

use crate::error::{ResourceError, ResourceResult};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for GCP API calls
#[derive(Clone)]
pub struct GcpHttpClient {
    client: Client,
}

impl GcpHttpClient {
    /// Create a new HTTP client
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("tfleet/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client })
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str, token: &str) -> ResourceResult<Value> {
        tracing::debug!("GET {}", url);
        self.send(self.client.get(url).bearer_auth(token), url).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str, token: &str) -> ResourceResult<Value> {
        tracing::debug!("DELETE {}", url);
        self.send(self.client.delete(url).bearer_auth(token), url).await
    }

    async fn send(&self, request: RequestBuilder, url: &str) -> ResourceResult<Value> {
        let response = request.send().await.map_err(|e| {
            tracing::warn!("Request to {} failed: {}", url, e);
            ResourceError::transient("Request failed. Check your network connection and try again.")
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ResourceError::transient(format!("Failed to read response body: {}", e)))?;

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(status_error(status, url));
        }

        // Handle empty response
        if body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&body)
            .map_err(|e| ResourceError::transient(format!("Failed to parse response JSON: {}", e)))
    }
}

/// Map a non-success status onto the error taxonomy
/// Security: messages are generic and never echo the API's error body
pub fn status_error(status: StatusCode, url: &str) -> ResourceError {
    match status {
        StatusCode::NOT_FOUND => ResourceError::NotFound(resource_path(url).to_string()),
        StatusCode::UNAUTHORIZED => ResourceError::Credential(
            "Authentication failed. Run 'gcloud auth application-default login'.".to_string(),
        ),
        StatusCode::FORBIDDEN => {
            ResourceError::transient("Permission denied. Check your GCP IAM permissions.")
        }
        StatusCode::TOO_MANY_REQUESTS => {
            ResourceError::transient("Rate limit exceeded. Please try again later.")
        }
        StatusCode::BAD_REQUEST => ResourceError::transient("Invalid request. Check your parameters."),
        StatusCode::CONFLICT => ResourceError::transient(
            "Resource conflict. The resource may already exist or be in use.",
        ),
        s if s.is_server_error() => {
            ResourceError::transient("GCP service temporarily unavailable. Please try again.")
        }
        s => ResourceError::transient(format!("API request failed: {}", s)),
    }
}

/// Last path segments of a URL, without host or query
fn resource_path(url: &str) -> &str {
    let path = url.split('?').next().unwrap_or(url);
    path.rsplit_once("/projects/")
        .map(|(_, rest)| rest)
        .unwrap_or_else(|| path.rsplit('/').next().unwrap_or(path))
}

/// Format an error for one line of terminal output
/// Security: Truncates long error messages and removes non-printable characters
pub fn format_gcp_error(error: &ResourceError) -> String {
    let error_str = error.to_string();

    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(160)
        .collect::<String>();

    if sanitized.len() < error_str.len() {
        format!("{}...", sanitized)
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let out = sanitize_for_log(&body);
        assert!(out.starts_with(&"x".repeat(200)));
        assert!(out.contains("500 bytes total"));
        assert_eq!(sanitize_for_log("ok\nbody"), "okbody");
    }

    #[test]
    fn test_status_mapping() {
        let url = "https://compute.googleapis.com/compute/v1/projects/p/zones/z/instances/vm?alt=json";
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, url),
            ResourceError::NotFound(p) if p == "p/zones/z/instances/vm"
        ));
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, url),
            ResourceError::Credential(_)
        ));
        assert!(matches!(
            status_error(StatusCode::SERVICE_UNAVAILABLE, url),
            ResourceError::Transient(m) if m.contains("temporarily unavailable")
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, url),
            ResourceError::Transient(m) if m.contains("IAM")
        ));
    }

    #[test]
    fn test_format_error_truncates() {
        let err = ResourceError::transient("y".repeat(300));
        let out = format_gcp_error(&err);
        assert!(out.ends_with("..."));
        assert_eq!(out.len(), 163);
    }
}
