//! HTTP utilities for ARM REST API calls

use anyhow::{Context, Result};
use reqwest::header::HeaderMap;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

const ASYNC_OPERATION_HEADER: &str = "azure-asyncoperation";
const REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// Longest error shown to the user
const MAX_ERROR_LENGTH: usize = 400;

/// Sanitize response body for logging
/// Truncates long responses and drops non-printable characters
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

/// `code: message` from an ARM error body
fn arm_error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    let code = error.get("code").and_then(|v| v.as_str()).unwrap_or("Unknown");
    let message = error.get("message").and_then(|v| v.as_str()).unwrap_or("");
    Some(format!("{}: {}", code, message))
}

/// A non-success response other than 404
#[derive(Debug, Clone, Error)]
#[error("API request failed: {status}{}", .detail.as_deref().map(|d| format!(": {}", d)).unwrap_or_default())]
pub struct ApiError {
    pub status: reqwest::StatusCode,
    /// Sanitized `code: message` from the error body
    pub detail: Option<String>,
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        self.status == reqwest::StatusCode::UNAUTHORIZED
    }
}

/// A successful (or 404) response with the headers long-running operations need
#[derive(Debug, Clone)]
pub struct ArmResponse {
    pub status: u16,
    pub async_operation: Option<String>,
    pub location: Option<String>,
    pub retry_after: Option<Duration>,
    pub body: Value,
}

impl ArmResponse {
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// The service accepted the request and continues asynchronously
    pub fn is_accepted(&self) -> bool {
        self.status == 202
    }

    fn from_parts(status: u16, headers: &HeaderMap, body: Value) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(|s| s.to_string())
        };

        Self {
            status,
            async_operation: header(ASYNC_OPERATION_HEADER),
            location: header("location"),
            retry_after: header("retry-after")
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
            body,
        }
    }
}

/// HTTP client wrapper for ARM API calls
#[derive(Clone)]
pub struct ArmHttpClient {
    client: Client,
}

impl ArmHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("azrm/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request
    pub async fn get(&self, url: &str, token: &str) -> Result<ArmResponse> {
        tracing::debug!("GET {}", url);
        self.send(self.client.get(url), token).await
    }

    /// Make a PUT request with a JSON body
    pub async fn put(&self, url: &str, token: &str, body: &Value) -> Result<ArmResponse> {
        tracing::debug!("PUT {}", url);
        self.send(self.client.put(url).json(body), token).await
    }

    /// Make a DELETE request
    pub async fn delete(&self, url: &str, token: &str) -> Result<ArmResponse> {
        tracing::debug!("DELETE {}", url);
        self.send(self.client.delete(url), token).await
    }

    async fn send(&self, request: RequestBuilder, token: &str) -> Result<ArmResponse> {
        let request_id = Uuid::new_v4();

        let response = request
            .bearer_auth(token)
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if status.as_u16() == 404 {
            tracing::debug!("request {} returned 404", request_id);
            return Ok(ArmResponse::from_parts(404, &headers, Value::Null));
        }

        if !status.is_success() {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!(
                "API error (request {}): {} - {}",
                request_id,
                status,
                sanitize_for_log(&body)
            );
            return Err(ApiError {
                status,
                detail: arm_error_message(&body).map(|d| sanitize_for_log(&d)),
            }
            .into());
        }

        // Handle empty response
        let value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body).context("Failed to parse response JSON")?
        };

        Ok(ArmResponse::from_parts(status.as_u16(), &headers, value))
    }
}

/// Format an ARM API error for display
/// Security: Sanitizes error messages to avoid leaking sensitive API details
pub fn format_arm_error(error: &anyhow::Error) -> String {
    let error_str = format!("{:#}", error);
    let status = |code: &str| error_str.contains(&format!("API request failed: {}", code));

    if status("403") {
        return "Permission denied. Check your Azure role assignments.".to_string();
    }
    if status("401") {
        return "Authentication failed. Run 'az login' or set AZURE_ACCESS_TOKEN.".to_string();
    }
    if status("429") {
        return "Rate limit exceeded. Please try again later.".to_string();
    }
    if status("409") {
        return "Resource conflict. The resource may already exist or be in use.".to_string();
    }
    if status("500") || status("503") {
        return "Azure service temporarily unavailable. Please try again.".to_string();
    }

    // Truncate long error messages and remove potential sensitive data
    let sanitized = error_str
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .take(MAX_ERROR_LENGTH)
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
    fn test_sanitize_truncates() {
        let long = "x".repeat(500);
        let out = sanitize_for_log(&long);
        assert!(out.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(out.contains("truncated"));
    }

    #[test]
    fn test_arm_error_message() {
        let body = r#"{"error":{"code":"ResourceGroupNotFound","message":"Resource group 'rg' could not be found."}}"#;
        assert_eq!(
            arm_error_message(body).unwrap(),
            "ResourceGroupNotFound: Resource group 'rg' could not be found."
        );
        assert!(arm_error_message("not json").is_none());
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError {
            status: reqwest::StatusCode::CONFLICT,
            detail: Some("Conflict: busy".to_string()),
        };
        assert_eq!(err.to_string(), "API request failed: 409 Conflict: Conflict: busy");
        assert!(!err.is_unauthorized());

        let err = ApiError {
            status: reqwest::StatusCode::UNAUTHORIZED,
            detail: None,
        };
        assert_eq!(err.to_string(), "API request failed: 401 Unauthorized");
        assert!(err.is_unauthorized());
    }

    #[test]
    fn test_format_arm_error() {
        let err = anyhow::anyhow!("API request failed: 403 Forbidden");
        assert!(format_arm_error(&err).starts_with("Permission denied"));

        let err = anyhow::anyhow!("API request failed: 409 Conflict").context("Failed to provision x");
        assert!(format_arm_error(&err).starts_with("Resource conflict"));

        let err = anyhow::anyhow!("name must be 1-500 characters");
        assert_eq!(format_arm_error(&err), "name must be 1-500 characters");

        let err = anyhow::anyhow!("something else");
        assert_eq!(format_arm_error(&err), "something else");
    }
}
