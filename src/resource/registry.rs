//! Resource Registry - the table of supported resource types
//!
//! The registry is built once at startup and handed to the dispatcher by
//! reference. It is never mutated after [`RegistryBuilder::build`].

use super::schema::{Handler, Resource, ResourceHandler};
use super::types::{
    batch_account::BatchAccount, batch_pool::BatchPool, resource_group::ResourceGroup,
    storage_account::StorageAccount, subnet::Subnet, virtual_network::VirtualNetwork,
};
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashMap};

/// Immutable mapping from type name to handler
pub struct Registry {
    handlers: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
    by_arm_type: HashMap<String, &'static str>,
}

/// Collects handlers before freezing them into a [`Registry`]
#[derive(Default)]
pub struct RegistryBuilder {
    handlers: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
}

impl RegistryBuilder {
    /// Add a resource type. Each type name and ARM type may only be registered once.
    pub fn register<R: Resource>(mut self) -> Result<Self> {
        let handler: Box<dyn ResourceHandler> = Box::new(Handler::<R>::new());
        let arm_type = handler.arm_type();

        if self.handlers.contains_key(R::TYPE_NAME) {
            return Err(anyhow!("Resource type registered twice: {}", R::TYPE_NAME));
        }
        if let Some(existing) = self.handlers.values().find(|h| h.arm_type() == arm_type) {
            return Err(anyhow!(
                "ARM type {} already handled by {}",
                arm_type,
                existing.type_name()
            ));
        }

        self.handlers.insert(R::TYPE_NAME, handler);
        Ok(self)
    }

    pub fn build(self) -> Registry {
        let by_arm_type = self
            .handlers
            .iter()
            .map(|(name, handler)| (handler.arm_type(), *name))
            .collect();

        tracing::debug!("registry built with {} resource types", self.handlers.len());

        Registry {
            handlers: self.handlers,
            by_arm_type,
        }
    }
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Registry with every built-in resource type
    pub fn builtin() -> Result<Self> {
        Ok(Self::builder()
            .register::<ResourceGroup>()?
            .register::<BatchAccount>()?
            .register::<BatchPool>()?
            .register::<StorageAccount>()?
            .register::<VirtualNetwork>()?
            .register::<Subnet>()?
            .build())
    }

    /// Get a handler by type name
    pub fn get(&self, type_name: &str) -> Option<&dyn ResourceHandler> {
        self.handlers.get(type_name).map(|h| h.as_ref())
    }

    /// Like [`Registry::get`], failing for unknown types
    pub fn require(&self, type_name: &str) -> Result<&dyn ResourceHandler> {
        self.get(type_name)
            .ok_or_else(|| anyhow!("Unknown resource type: {}", type_name))
    }

    /// Get a handler by ARM resource type, e.g. `Microsoft.Batch/batchAccounts/pools`.
    /// The match is exact, in line with the strict id decoder.
    pub fn find_by_arm_type(&self, arm_type: &str) -> Option<&dyn ResourceHandler> {
        self.by_arm_type
            .get(arm_type)
            .and_then(|name| self.get(name))
    }

    /// All type names, sorted
    pub fn type_names(&self) -> Vec<&'static str> {
        self.handlers.keys().copied().collect()
    }

    pub fn handlers(&self) -> impl Iterator<Item = &dyn ResourceHandler> {
        self.handlers.values().map(|h| h.as_ref())
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_loads_successfully() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(registry.len(), 6, "Registry should have every built-in type");
    }

    #[test]
    fn test_batch_pool_resource_exists() {
        let registry = Registry::builtin().unwrap();
        let handler = registry.get("azurerm_batch_pool");
        assert!(handler.is_some(), "Batch pool resource should exist");

        let handler = handler.unwrap();
        assert_eq!(handler.arm_type(), "Microsoft.Batch/batchAccounts/pools");
        assert_eq!(handler.api_version(), "2023-05-01");
    }

    #[test]
    fn test_get_all_type_names() {
        let registry = Registry::builtin().unwrap();
        let names = registry.type_names();
        assert!(names.contains(&"azurerm_resource_group"));
        assert!(names.contains(&"azurerm_subnet"));
        let mut sorted = names.clone();
        sorted.sort_unstable();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_find_by_arm_type() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(
            registry
                .find_by_arm_type("Microsoft.Network/virtualNetworks/subnets")
                .map(|h| h.type_name()),
            Some("azurerm_subnet")
        );
        assert_eq!(
            registry
                .find_by_arm_type("Microsoft.Resources/resourceGroups")
                .map(|h| h.type_name()),
            Some("azurerm_resource_group")
        );
        assert!(registry.find_by_arm_type("microsoft.network/virtualnetworks").is_none());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let result = Registry::builder()
            .register::<Subnet>()
            .and_then(|b| b.register::<Subnet>());
        assert!(result.is_err());
    }

    #[test]
    fn test_require_unknown_type() {
        let registry = Registry::builtin().unwrap();
        let err = registry.require("azurerm_nope").err().unwrap();
        assert!(err.to_string().contains("azurerm_nope"));
    }
}
