//! Azure Resource Manager API interaction module
//!
//! # Module Structure
//!
//! - [`auth`] - Bearer tokens from the environment or the Azure CLI
//! - [`client`] - Main ARM client for making API requests
//! - [`http`] - HTTP utilities for REST API calls
//! - [`poller`] - Waiting for long-running operations
//!
//! # Example
//!
//! ```ignore
//! use azrm::arm::{auth::ArmCredentials, client::ArmClient};
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = ArmClient::new("https://management.azure.com", ArmCredentials::from_env())?;
//!     let group = client.get("/subscriptions/.../resourceGroups/rg1", "2021-04-01").await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod poller;
