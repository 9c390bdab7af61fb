//! ARM Authentication
//!
//! Bearer tokens come from `AZURE_ACCESS_TOKEN` when set, otherwise from the
//! Azure CLI (`az account get-access-token`). Tokens are cached until shortly
//! before they expire.

use crate::resource::validate::is_subscription_id;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::RwLock;

/// Resource the ARM tokens are issued for
pub const ARM_RESOURCE: &str = "https://management.azure.com/";

/// Refresh tokens this long before they actually expire
const TOKEN_EXPIRY_BUFFER_SECS: i64 = 60;

/// TTL assumed when the token source reports no expiry
const DEFAULT_TOKEN_TTL_SECS: i64 = 30 * 60;

#[derive(Clone)]
enum TokenSource {
    /// A fixed token, e.g. from the environment
    Static(String),
    /// `az account get-access-token`
    AzureCli,
}

/// ARM credentials holder with token caching
#[derive(Clone)]
pub struct ArmCredentials {
    source: TokenSource,
    token_cache: Arc<RwLock<Option<CachedToken>>>,
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    /// When this token expires (with buffer applied)
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Utc::now() < self.expires_at
    }
}

/// Output of `az account get-access-token --output json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CliToken {
    access_token: String,
    /// Unix timestamp, present in recent CLI versions
    #[serde(default, rename = "expires_on")]
    expires_on: Option<i64>,
}

impl ArmCredentials {
    /// `AZURE_ACCESS_TOKEN` if set, otherwise the Azure CLI
    pub fn from_env() -> Self {
        match std::env::var("AZURE_ACCESS_TOKEN") {
            Ok(token) if !token.trim().is_empty() => {
                tracing::info!("Using access token from AZURE_ACCESS_TOKEN");
                Self::from_token(token.trim())
            }
            _ => Self {
                source: TokenSource::AzureCli,
                token_cache: Arc::new(RwLock::new(None)),
            },
        }
    }

    /// Always use the given token
    pub fn from_token(token: &str) -> Self {
        Self {
            source: TokenSource::Static(token.to_string()),
            token_cache: Arc::new(RwLock::new(None)),
        }
    }

    /// Get an access token for API calls
    pub async fn get_token(&self) -> Result<String> {
        if let TokenSource::Static(token) = &self.source {
            return Ok(token.clone());
        }

        // Check cache first - but only return if token is still valid
        {
            let cache = self.token_cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.is_valid() {
                    return Ok(cached.token.clone());
                }
                tracing::debug!("Cached token expired, fetching new token");
            }
        }

        let (token, expires_at) = fetch_cli_token().await?;
        let expires_at = expires_at - ChronoDuration::seconds(TOKEN_EXPIRY_BUFFER_SECS);

        {
            let mut cache = self.token_cache.write().await;
            *cache = Some(CachedToken {
                token: token.clone(),
                expires_at,
            });
        }

        tracing::debug!("New token cached, expires at {}", expires_at);

        Ok(token)
    }

    /// Force refresh the token
    pub async fn refresh_token(&self) -> Result<String> {
        {
            let mut cache = self.token_cache.write().await;
            *cache = None;
        }

        self.get_token().await
    }
}

async fn fetch_cli_token() -> Result<(String, DateTime<Utc>)> {
    let output = Command::new("az")
        .args([
            "account",
            "get-access-token",
            "--resource",
            ARM_RESOURCE,
            "--output",
            "json",
        ])
        .output()
        .await
        .context("Failed to run 'az'. Install the Azure CLI or set AZURE_ACCESS_TOKEN")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!(
            "'az account get-access-token' failed: {}",
            stderr.lines().next().unwrap_or("unknown error")
        ));
    }

    parse_cli_token(&output.stdout)
}

fn parse_cli_token(stdout: &[u8]) -> Result<(String, DateTime<Utc>)> {
    let parsed: CliToken =
        serde_json::from_slice(stdout).context("Failed to parse Azure CLI token output")?;

    let expires_at = parsed
        .expires_on
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(|| Utc::now() + ChronoDuration::seconds(DEFAULT_TOKEN_TTL_SECS));

    Ok((parsed.access_token, expires_at))
}

/// Get the Azure CLI configuration directory
pub fn get_azure_config_dir() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("AZURE_CONFIG_DIR") {
        return Some(PathBuf::from(path));
    }

    dirs::home_dir().map(|p| p.join(".azure"))
}

#[derive(Debug, Deserialize)]
struct AzureProfile {
    #[serde(default)]
    subscriptions: Vec<ProfileSubscription>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileSubscription {
    id: String,
    #[serde(default)]
    is_default: bool,
}

/// Read the default subscription from the environment or the Azure CLI profile
pub fn get_default_subscription() -> Option<String> {
    if let Ok(subscription) = std::env::var("AZURE_SUBSCRIPTION_ID") {
        if is_subscription_id(&subscription) {
            return Some(subscription);
        }
        tracing::warn!("Invalid subscription id format in AZURE_SUBSCRIPTION_ID");
    }

    let profile_path = get_azure_config_dir()?.join("azureProfile.json");
    let content = std::fs::read_to_string(&profile_path).ok()?;
    default_subscription_from_profile(&content)
}

fn default_subscription_from_profile(content: &str) -> Option<String> {
    // The CLI writes this file with a UTF-8 BOM
    let content = content.trim_start_matches('\u{feff}');
    let profile: AzureProfile = match serde_json::from_str(content) {
        Ok(profile) => profile,
        Err(e) => {
            tracing::warn!("Failed to parse azureProfile.json: {}", e);
            return None;
        }
    };

    profile
        .subscriptions
        .into_iter()
        .find(|s| s.is_default && is_subscription_id(&s.id))
        .map(|s| s.id)
}
