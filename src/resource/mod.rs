//! Resource abstraction layer
//!
//! Every supported resource type is a strongly typed [`schema::Resource`]
//! registered once in an immutable [`Registry`]. The [`Provider`] dispatches
//! CRUD requests to the matching handler and the ARM API.
//!
//! # Architecture
//!
//! - [`schema`] - The `Resource` trait and its object-safe adapter
//! - [`validate`] - Reusable argument validators
//! - [`types`] - The built-in resource types
//! - [`registry`] - Type name and ARM type lookup
//! - [`provider`] - Create, read, update, delete, import, apply and refresh
//!
//! # Example
//!
//! ```ignore
//! use azrm::resource::{Provider, Registry};
//!
//! async fn read_group(client: azrm::arm::client::ArmClient) -> anyhow::Result<()> {
//!     let registry = Registry::builtin()?;
//!     let provider = Provider::new(&registry, client, "12345678-1234-9876-4563-123456789012");
//!     let state = provider
//!         .read("azurerm_resource_group", "/subscriptions/12345678-1234-9876-4563-123456789012/resourceGroups/rg1")
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod provider;
pub mod registry;
pub mod schema;
pub mod types;
pub mod validate;

pub use provider::{Applied, ApplyAction, Provider, Refreshed, ResourceState};
pub use registry::Registry;
pub use schema::{Diagnostic, Diagnostics, Planned, Resource, ResourceHandler, ValidationErrors};
