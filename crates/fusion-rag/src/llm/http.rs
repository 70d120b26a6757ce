//! Shared HTTP plumbing for the OpenAI-compatible clients.

use anyhow::{anyhow, Result};
use reqwest::Client;
use std::time::Duration;

pub fn build_client(timeout_secs: u64) -> Result<Client> {
    Ok(Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(timeout_secs.max(1)))
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_nodelay(true)
        .build()?)
}

/// Turn a transport error into a message that says what went wrong.
pub fn send_error(endpoint: &str, e: reqwest::Error) -> anyhow::Error {
    if e.is_timeout() {
        tracing::error!(endpoint = %endpoint, "Request timed out");
        anyhow!("Request to {} timed out", endpoint)
    } else if e.is_connect() {
        tracing::error!(endpoint = %endpoint, error = %e, "Connection failed");
        anyhow!("Failed to connect to {}: {}", endpoint, e)
    } else {
        tracing::error!(endpoint = %endpoint, error = %e, "Request failed");
        anyhow!("Request to {} failed: {}", endpoint, e)
    }
}

/// Parse a response body as JSON, returning a clear error if the server returned HTML
/// (e.g. a gateway error page) instead of valid JSON.
pub async fn parse_json_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    endpoint: &str,
) -> Result<T> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| anyhow!("Failed to read response body from {}: {}", endpoint, e))?;

    parse_json_body(&body, status.as_u16(), endpoint)
}

fn parse_json_body<T: serde::de::DeserializeOwned>(
    body: &str,
    status: u16,
    endpoint: &str,
) -> Result<T> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('<') {
        let preview: String = trimmed.chars().take(200).collect();
        return Err(anyhow!(
            "Endpoint {} returned HTML instead of JSON (HTTP {}). Response: {}",
            endpoint,
            status,
            preview
        ));
    }

    serde_json::from_str::<T>(body).map_err(|e| {
        let preview: String = body.chars().take(300).collect();
        anyhow!(
            "Failed to parse JSON from {} (HTTP {}): {}. Response body: {}",
            endpoint,
            status,
            e,
            preview
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_body_rejected() {
        let err = parse_json_body::<serde_json::Value>("<!DOCTYPE html><html>", 502, "http://x")
            .unwrap_err();
        assert!(err.to_string().contains("returned HTML"));
    }

    #[test]
    fn test_json_body_parsed() {
        let v: serde_json::Value = parse_json_body(r#"{"ok": true}"#, 200, "http://x").unwrap();
        assert_eq!(v["ok"], true);
    }
}
