//! Resource Provider - CRUD dispatch against ARM
//!
//! Maps create/read/update/delete/import requests for a resource type onto
//! the matching [`ResourceHandler`] and the ARM REST API, waiting for
//! long-running operations to finish.

use super::registry::Registry;
use super::schema::{Planned, ResourceHandler};
use crate::arm::client::ArmClient;
use crate::arm::poller::{wait_for_completion, Operation, PollOptions};
use crate::manifest::Manifest;
use crate::resourceid::ResourceIdentifier;
use anyhow::{anyhow, bail, Context, Result};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;

/// Concurrent reads used by [`Provider::refresh`] unless configured otherwise
pub const DEFAULT_CONCURRENCY: usize = 4;

/// A resource as last read from ARM
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceState {
    #[serde(rename = "type")]
    pub resource_type: &'static str,
    pub id: String,
    pub state: Value,
}

/// What [`Provider::apply`] did with a manifest entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyAction {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Applied {
    pub action: ApplyAction,
    #[serde(flatten)]
    pub resource: ResourceState,
}

/// Outcome of reading one id during [`Provider::refresh`]
#[derive(Debug)]
pub struct Refreshed {
    pub id: String,
    /// `Ok(None)` when the resource no longer exists
    pub result: Result<Option<ResourceState>>,
}

/// CRUD dispatcher over a [`Registry`]
pub struct Provider<'r> {
    registry: &'r Registry,
    client: ArmClient,
    subscription_id: String,
    readonly: bool,
    poll: PollOptions,
    concurrency: usize,
}

impl<'r> Provider<'r> {
    pub fn new(registry: &'r Registry, client: ArmClient, subscription_id: &str) -> Self {
        Self {
            registry,
            client,
            subscription_id: subscription_id.to_string(),
            readonly: false,
            poll: PollOptions::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Reject every write before it reaches the API
    pub fn with_readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn with_poll_options(mut self, poll: PollOptions) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    fn ensure_writable(&self, operation: &str) -> Result<()> {
        if self.readonly {
            bail!("Read-only mode: {} is disabled", operation);
        }
        Ok(())
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Create a resource that must not exist yet
    pub async fn create(&self, type_name: &str, args: &Value) -> Result<ResourceState> {
        self.ensure_writable("create")?;
        let handler = self.registry.require(type_name)?;
        let planned = handler.plan(args, &self.subscription_id)?;

        let existing = self.client.get(&planned.id, handler.api_version()).await?;
        if !existing.is_not_found() {
            bail!(
                "{} already exists, import it to manage it: {}",
                type_name,
                planned.id
            );
        }

        tracing::info!("Creating {} {}", type_name, planned.id);
        self.put_and_wait(handler, &planned).await
    }

    /// Read a resource. `None` means it no longer exists.
    pub async fn read(&self, type_name: &str, id: &str) -> Result<Option<ResourceState>> {
        let handler = self.registry.require(type_name)?;
        let id = handler.canonical_id(id)?;
        self.read_with(handler, &id).await
    }

    /// Update a resource in place. The arguments must address the same id.
    pub async fn update(&self, type_name: &str, id: &str, args: &Value) -> Result<ResourceState> {
        self.ensure_writable("update")?;
        let handler = self.registry.require(type_name)?;
        let id = handler.canonical_id(id)?;
        let planned = handler.plan(args, &self.subscription_id)?;

        if planned.id != id {
            bail!(
                "Cannot update {} in place: arguments address {} instead of {}, the resource must be replaced",
                type_name,
                planned.id,
                id
            );
        }

        tracing::info!("Updating {} {}", type_name, id);
        self.put_and_wait(handler, &planned).await
    }

    /// Delete a resource. Deleting one that is already gone succeeds.
    pub async fn delete(&self, type_name: &str, id: &str) -> Result<()> {
        self.ensure_writable("delete")?;
        let handler = self.registry.require(type_name)?;
        let id = handler.canonical_id(id)?;

        tracing::info!("Deleting {} {}", type_name, id);
        let response = self.client.delete(&id, handler.api_version()).await?;
        if response.is_not_found() {
            tracing::info!("{} was already deleted", id);
            return Ok(());
        }

        wait_for_completion(
            &self.client,
            Operation::Delete,
            &response,
            &id,
            handler.api_version(),
            &self.poll,
        )
        .await
        .with_context(|| format!("Failed to delete {}", id))
    }

    /// Read an existing resource of any registered type
    pub async fn import(&self, id: &str) -> Result<ResourceState> {
        let handler = self.handler_for_id(id)?;
        let id = handler.canonical_id(id)?;
        self.read_with(handler, &id)
            .await?
            .ok_or_else(|| anyhow!("Cannot import {}: resource does not exist", id))
    }

    // =========================================================================
    // Batch operations
    // =========================================================================

    /// Create or update every manifest entry, in order.
    /// Every entry is validated before the first request is made.
    pub async fn apply(&self, manifest: &Manifest) -> Result<Vec<Applied>> {
        self.ensure_writable("apply")?;
        let entries = manifest.plan(self.registry, &self.subscription_id)?;

        let mut applied = Vec::with_capacity(entries.len());
        for entry in entries {
            let handler = entry.handler;
            let existing = self
                .client
                .get(&entry.planned.id, handler.api_version())
                .await?;

            let action = if existing.is_not_found() {
                tracing::info!("Creating {} {}", handler.type_name(), entry.planned.id);
                ApplyAction::Created
            } else {
                tracing::info!("Updating {} {}", handler.type_name(), entry.planned.id);
                ApplyAction::Updated
            };

            let resource = self.put_and_wait(handler, &entry.planned).await?;
            applied.push(Applied { action, resource });
        }

        Ok(applied)
    }

    /// Read several resources of any registered type concurrently.
    /// Results come back in the order of `ids`.
    pub async fn refresh(&self, ids: &[String]) -> Vec<Refreshed> {
        let reads = ids.iter().enumerate().map(|(index, id)| async move {
            let result = match self.handler_for_id(id) {
                Ok(handler) => match handler.canonical_id(id) {
                    Ok(canonical) => self.read_with(handler, &canonical).await,
                    Err(e) => Err(e.into()),
                },
                Err(e) => Err(e),
            };
            (
                index,
                Refreshed {
                    id: id.clone(),
                    result,
                },
            )
        });

        let mut results: Vec<(usize, Refreshed)> = stream::iter(reads)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);

        tracing::debug!("refreshed {} resources", results.len());
        results.into_iter().map(|(_, refreshed)| refreshed).collect()
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Route an arbitrary id to the handler for its ARM type
    fn handler_for_id(&self, id: &str) -> Result<&'r dyn ResourceHandler> {
        let parsed = ResourceIdentifier::parse(id)?;
        let arm_type = parsed.resource_type();
        self.registry
            .find_by_arm_type(&arm_type)
            .ok_or_else(|| anyhow!("No registered resource type handles {}", arm_type))
    }

    async fn read_with(
        &self,
        handler: &dyn ResourceHandler,
        id: &str,
    ) -> Result<Option<ResourceState>> {
        let response = self.client.get(id, handler.api_version()).await?;
        if response.is_not_found() {
            tracing::info!("{} not found", id);
            return Ok(None);
        }

        let state = handler.state(id, response.body)?;
        Ok(Some(ResourceState {
            resource_type: handler.type_name(),
            id: id.to_string(),
            state,
        }))
    }

    async fn put_and_wait(
        &self,
        handler: &dyn ResourceHandler,
        planned: &Planned,
    ) -> Result<ResourceState> {
        let api_version = handler.api_version();
        let response = self
            .client
            .put(&planned.id, api_version, &planned.body)
            .await?;

        wait_for_completion(
            &self.client,
            Operation::CreateOrUpdate,
            &response,
            &planned.id,
            api_version,
            &self.poll,
        )
        .await
        .with_context(|| format!("Failed to provision {}", planned.id))?;

        self.read_with(handler, &planned.id)
            .await?
            .ok_or_else(|| anyhow!("{} disappeared after provisioning", planned.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::auth::ArmCredentials;
    use serde_json::json;

    const SUB: &str = "12345678-1234-9876-4563-123456789012";

    fn provider(registry: &Registry) -> Provider<'_> {
        // Nothing listens here; these tests must fail before any request
        let client = ArmClient::new("http://127.0.0.1:9", ArmCredentials::from_token("t")).unwrap();
        Provider::new(registry, client, SUB).with_readonly(true)
    }

    #[test]
    fn test_readonly_rejects_writes() {
        let registry = Registry::builtin().unwrap();
        let provider = provider(&registry);
        let args = json!({"name": "rg1", "location": "westeurope"});

        let err = tokio_test::block_on(provider.create("azurerm_resource_group", &args)).unwrap_err();
        assert!(err.to_string().contains("Read-only"));

        let id = format!("/subscriptions/{}/resourceGroups/rg1", SUB);
        let err = tokio_test::block_on(provider.delete("azurerm_resource_group", &id)).unwrap_err();
        assert!(err.to_string().contains("Read-only"));
    }

    #[test]
    fn test_handler_for_id() {
        let registry = Registry::builtin().unwrap();
        let provider = provider(&registry);

        let handler = provider
            .handler_for_id(&format!(
                "/subscriptions/{}/resourceGroups/rg1/providers/Microsoft.Storage/storageAccounts/sa1",
                SUB
            ))
            .unwrap();
        assert_eq!(handler.type_name(), "azurerm_storage_account");

        let err = provider
            .handler_for_id(&format!(
                "/subscriptions/{}/resourceGroups/rg1/providers/Microsoft.Web/sites/app1",
                SUB
            ))
            .err()
            .unwrap();
        assert!(err.to_string().contains("Microsoft.Web/sites"));
    }

    #[test]
    fn test_concurrency_is_at_least_one() {
        let registry = Registry::builtin().unwrap();
        let provider = provider(&registry).with_concurrency(0);
        assert_eq!(provider.concurrency, 1);
    }
}
