//! Long-running operation polling
//!
//! ARM acknowledges slow PUTs and DELETEs with `201`/`202` and one of:
//!
//! - `Azure-AsyncOperation`: a status monitor returning `{"status": ...}`
//! - `Location`: returns `202` while running, `200`/`204` once done
//! - neither: the resource's own `properties.provisioningState` is polled
//!   (or, for deletes, the resource is polled until it returns `404`)

use super::client::ArmClient;
use super::http::ArmResponse;
use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use std::time::Duration;
use tokio::time::Instant;

/// Polling cadence and overall deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// Kind of request that started the operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    CreateOrUpdate,
    Delete,
}

/// State of an operation as reported by ARM
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    InProgress,
    Succeeded,
    Failed(String),
    Canceled,
}

impl OperationStatus {
    /// Interpret an operation or provisioning state. Anything not terminal is in progress.
    pub fn from_state(state: &str, body: &Value) -> Self {
        match state.to_ascii_lowercase().as_str() {
            "succeeded" => OperationStatus::Succeeded,
            "failed" => OperationStatus::Failed(operation_error(body)),
            "canceled" | "cancelled" => OperationStatus::Canceled,
            _ => OperationStatus::InProgress,
        }
    }
}

fn operation_error(body: &Value) -> String {
    let error = &body["error"];
    match (error["code"].as_str(), error["message"].as_str()) {
        (Some(code), Some(message)) => format!("{}: {}", code, message),
        (Some(code), None) => code.to_string(),
        (None, Some(message)) => message.to_string(),
        (None, None) => "operation failed".to_string(),
    }
}

fn provisioning_state(body: &Value) -> Option<&str> {
    body.get("properties")?.get("provisioningState")?.as_str()
}

/// Wait until the operation started by `initial` completes
pub async fn wait_for_completion(
    client: &ArmClient,
    operation: Operation,
    initial: &ArmResponse,
    resource_id: &str,
    api_version: &str,
    options: &PollOptions,
) -> Result<()> {
    let deadline = Instant::now() + options.timeout;

    if let Some(url) = &initial.async_operation {
        tracing::debug!("polling async operation for {}", resource_id);
        return poll_async_operation(client, url, initial, deadline, options).await;
    }

    if initial.is_accepted() {
        if let Some(url) = &initial.location {
            tracing::debug!("polling location for {}", resource_id);
            return poll_location(client, url, initial, deadline, options).await;
        }
    }

    match operation {
        Operation::Delete if initial.is_accepted() => {
            poll_until_gone(client, resource_id, api_version, initial, deadline, options).await
        }
        Operation::Delete => Ok(()),
        Operation::CreateOrUpdate => {
            poll_provisioning_state(client, resource_id, api_version, initial, deadline, options)
                .await
        }
    }
}

async fn pause(previous: &ArmResponse, deadline: Instant, options: &PollOptions) -> Result<()> {
    let now = Instant::now();
    if now >= deadline {
        bail!(
            "Timed out after {:?} waiting for the operation to complete",
            options.timeout
        );
    }
    let delay = previous.retry_after.unwrap_or(options.interval);
    tokio::time::sleep(delay.min(deadline - now)).await;
    Ok(())
}

async fn poll_async_operation(
    client: &ArmClient,
    url: &str,
    initial: &ArmResponse,
    deadline: Instant,
    options: &PollOptions,
) -> Result<()> {
    let mut last = initial.clone();
    loop {
        pause(&last, deadline, options).await?;
        last = client.get_url(url).await?;

        let state = last.body["status"].as_str().unwrap_or("InProgress");
        match OperationStatus::from_state(state, &last.body) {
            OperationStatus::Succeeded => return Ok(()),
            OperationStatus::Failed(reason) => bail!("Operation failed: {}", reason),
            OperationStatus::Canceled => bail!("Operation was canceled"),
            OperationStatus::InProgress => {
                tracing::trace!("operation still {}", state);
            }
        }
    }
}

async fn poll_location(
    client: &ArmClient,
    url: &str,
    initial: &ArmResponse,
    deadline: Instant,
    options: &PollOptions,
) -> Result<()> {
    let mut last = initial.clone();
    loop {
        pause(&last, deadline, options).await?;
        last = client.get_url(url).await?;

        if last.is_accepted() {
            continue;
        }
        if last.is_not_found() {
            return Err(anyhow!("Operation status monitor disappeared"));
        }
        return Ok(());
    }
}

async fn poll_until_gone(
    client: &ArmClient,
    resource_id: &str,
    api_version: &str,
    initial: &ArmResponse,
    deadline: Instant,
    options: &PollOptions,
) -> Result<()> {
    let mut last = initial.clone();
    loop {
        pause(&last, deadline, options).await?;
        last = client.get(resource_id, api_version).await?;
        if last.is_not_found() {
            return Ok(());
        }
    }
}

async fn poll_provisioning_state(
    client: &ArmClient,
    resource_id: &str,
    api_version: &str,
    initial: &ArmResponse,
    deadline: Instant,
    options: &PollOptions,
) -> Result<()> {
    let mut last = initial.clone();
    loop {
        let Some(state) = provisioning_state(&last.body) else {
            return Ok(());
        };
        match OperationStatus::from_state(state, &last.body) {
            OperationStatus::Succeeded => return Ok(()),
            OperationStatus::Failed(reason) => bail!("Provisioning failed: {}", reason),
            OperationStatus::Canceled => bail!("Provisioning was canceled"),
            OperationStatus::InProgress => {
                tracing::trace!("{} is {}", resource_id, state);
            }
        }

        pause(&last, deadline, options).await?;
        last = client.get(resource_id, api_version).await?;
        if last.is_not_found() {
            bail!("{} disappeared while provisioning", resource_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_from_state() {
        assert_eq!(
            OperationStatus::from_state("Succeeded", &Value::Null),
            OperationStatus::Succeeded
        );
        assert_eq!(
            OperationStatus::from_state("Creating", &Value::Null),
            OperationStatus::InProgress
        );
        assert_eq!(
            OperationStatus::from_state("Canceled", &Value::Null),
            OperationStatus::Canceled
        );
        assert_eq!(
            OperationStatus::from_state(
                "Failed",
                &json!({"error": {"code": "QuotaExceeded", "message": "no cores left"}})
            ),
            OperationStatus::Failed("QuotaExceeded: no cores left".to_string())
        );
    }

    #[test]
    fn test_provisioning_state() {
        assert_eq!(
            provisioning_state(&json!({"properties": {"provisioningState": "Updating"}})),
            Some("Updating")
        );
        assert_eq!(provisioning_state(&json!({"location": "x"})), None);
    }
}
